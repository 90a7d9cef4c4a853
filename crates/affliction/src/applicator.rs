use tracing::{debug, warn};

use crate::echo::{DropReason, EchoEvent, EchoOutcome};
use crate::entity::{DamageError, EngineHost, EntityHandleRegistry, Tick};
use crate::ledger::AfflictionLedger;

/// Bridges fired echoes to the host's combat resolution.
///
/// `apply` only ever sees the ledger and the host, never the scheduler, so an
/// echo has no way to queue another echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplicator {
    restack_on_hit: bool,
    restack_amount: u32,
}

impl DamageApplicator {
    pub fn new(restack_on_hit: bool, restack_amount: u32) -> Self {
        Self {
            restack_on_hit,
            restack_amount,
        }
    }

    pub fn apply<H: EngineHost + ?Sized>(
        &self,
        event: &EchoEvent,
        host: &mut H,
        ledger: &mut AfflictionLedger,
        now: Tick,
    ) -> EchoOutcome {
        let target = event.target;
        match host.deal_damage(target.id, event.damage, event.origin_position) {
            Ok(()) => {}
            Err(DamageError::TargetRemoved(_)) => {
                debug!(echo = event.id.0, entity = target.id.0, "echo_target_removed");
                return EchoOutcome::Dropped {
                    echo_id: event.id,
                    target,
                    reason: DropReason::TargetRemoved,
                };
            }
            Err(error) => {
                warn!(echo = event.id.0, error = %error, "echo_damage_rejected");
                return EchoOutcome::Dropped {
                    echo_id: event.id,
                    target,
                    reason: DropReason::Rejected,
                };
            }
        }

        if self.restack_on_hit && self.restack_amount > 0 {
            let registry = EntityHandleRegistry::new(&*host);
            // The hit may have killed the target; re-affliction only lands on
            // the same occupant the echo was aimed at.
            if registry.is_valid(target) {
                ledger.add_stack(&registry, target.id, self.restack_amount, now);
            }
        }

        debug!(
            echo = event.id.0,
            entity = target.id.0,
            damage = event.damage,
            tick = now.0,
            "echo_fired"
        );
        EchoOutcome::Fired {
            echo_id: event.id,
            target,
            damage: event.damage,
            origin_position: event.origin_position,
            visual_scale: event.visual_scale,
            fire_tick: event.fire_tick,
        }
    }
}
