use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::applicator::DamageApplicator;
use crate::entity::{
    EngineHost, EntityHandle, EntityHandleRegistry, EntityId, EntityLifecycle, Tick, Vec2,
};
use crate::ledger::AfflictionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EchoId(pub u64);

/// A delayed damage pulse bound to the handle captured when it was queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoEvent {
    pub id: EchoId,
    pub target: EntityHandle,
    pub damage: u32,
    pub origin_position: Vec2,
    pub visual_scale: f32,
    pub fire_tick: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TargetInvalid,
    TargetRemoved,
    Rejected,
}

/// Terminal state of a queued echo. Every echo ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchoOutcome {
    Fired {
        echo_id: EchoId,
        target: EntityHandle,
        damage: u32,
        origin_position: Vec2,
        visual_scale: f32,
        fire_tick: Tick,
    },
    Dropped {
        echo_id: EchoId,
        target: EntityHandle,
        reason: DropReason,
    },
}

impl EchoOutcome {
    pub fn echo_id(&self) -> EchoId {
        match self {
            Self::Fired { echo_id, .. } | Self::Dropped { echo_id, .. } => *echo_id,
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self, Self::Fired { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedEcho(EchoEvent);

impl PartialEq for QueuedEcho {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedEcho {}

impl PartialOrd for QueuedEcho {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEcho {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .fire_tick
            .cmp(&other.0.fire_tick)
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

/// Time-ordered queue of pending echoes. Ties on `fire_tick` resolve in queue
/// order. The queue depth is unbounded and echoes against the same target never
/// merge.
#[derive(Debug, Default)]
pub struct EchoScheduler {
    pending: BinaryHeap<Reverse<QueuedEcho>>,
    next_echo_id: u64,
}

impl EchoScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_echo<L: EntityLifecycle + ?Sized>(
        &mut self,
        registry: &EntityHandleRegistry<'_, L>,
        target: EntityId,
        damage: u32,
        delay_ticks: u64,
        origin_position: Vec2,
        visual_scale: f32,
        now: Tick,
    ) -> Option<EchoId> {
        let Some(handle) = registry.capture(target) else {
            trace!(entity = target.0, "echo_target_absent");
            return None;
        };
        let id = EchoId(self.next_echo_id);
        self.next_echo_id = self.next_echo_id.saturating_add(1);
        let fire_tick = now.after(delay_ticks);
        self.pending.push(Reverse(QueuedEcho(EchoEvent {
            id,
            target: handle,
            damage,
            origin_position,
            visual_scale,
            fire_tick,
        })));
        trace!(
            echo = id.0,
            entity = target.0,
            damage,
            fire_tick = fire_tick.0,
            "echo_queued"
        );
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_for(&self, target: EntityId) -> usize {
        self.pending
            .iter()
            .filter(|Reverse(queued)| queued.0.target.id == target)
            .count()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.next_echo_id = 0;
    }

    fn pop_due(&mut self, now: Tick) -> Option<EchoEvent> {
        let Reverse(next) = self.pending.peek()?;
        if next.0.fire_tick > now {
            return None;
        }
        self.pending.pop().map(|Reverse(queued)| queued.0)
    }

    /// Consumes every echo due at or before `now`, oldest first.
    pub fn tick<H: EngineHost + ?Sized>(
        &mut self,
        now: Tick,
        host: &mut H,
        ledger: &mut AfflictionLedger,
        applicator: &DamageApplicator,
    ) -> Vec<EchoOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = self.pop_due(now) {
            let target_valid = EntityHandleRegistry::new(&*host).is_valid(event.target);
            let outcome = if target_valid {
                applicator.apply(&event, host, ledger, now)
            } else {
                debug!(
                    echo = event.id.0,
                    entity = event.target.id.0,
                    "echo_dropped_target_invalid"
                );
                EchoOutcome::Dropped {
                    echo_id: event.id,
                    target: event.target,
                    reason: DropReason::TargetInvalid,
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
