use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::entity::{EntityHandle, EntityHandleRegistry, EntityId, EntityLifecycle, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfflictionRecord {
    pub handle: EntityHandle,
    pub stacks: u32,
    pub last_refresh_tick: Tick,
    pub decay_deadline_tick: Tick,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTickStats {
    pub stacks_decayed: u32,
    pub records_expired: u32,
    pub records_evicted: u32,
}

/// Decaying stack counters keyed by entity id. A record never sits at zero
/// stacks; it is removed instead.
#[derive(Debug)]
pub struct AfflictionLedger {
    max_stacks: u32,
    decay_window_ticks: u64,
    records: BTreeMap<EntityId, AfflictionRecord>,
}

impl AfflictionLedger {
    pub fn new(max_stacks: u32, decay_window_ticks: u64) -> Self {
        Self {
            max_stacks: max_stacks.max(1),
            decay_window_ticks: decay_window_ticks.max(1),
            records: BTreeMap::new(),
        }
    }

    pub fn max_stacks(&self) -> u32 {
        self.max_stacks
    }

    pub fn decay_window_ticks(&self) -> u64 {
        self.decay_window_ticks
    }

    pub fn add_stack<L: EntityLifecycle + ?Sized>(
        &mut self,
        registry: &EntityHandleRegistry<'_, L>,
        target: EntityId,
        amount: u32,
        now: Tick,
    ) {
        let Some(handle) = registry.capture(target) else {
            trace!(entity = target.0, "add_stack_target_absent");
            return;
        };
        if amount == 0 && !self.records.contains_key(&target) {
            return;
        }

        let deadline = now.after(self.decay_window_ticks);
        let max_stacks = self.max_stacks;
        let record = self.records.entry(target).or_insert(AfflictionRecord {
            handle,
            stacks: 0,
            last_refresh_tick: now,
            decay_deadline_tick: deadline,
        });
        // A record left behind by a previous occupant of this id starts over.
        if record.handle != handle {
            record.handle = handle;
            record.stacks = 0;
        }
        record.stacks = record.stacks.saturating_add(amount).min(max_stacks);
        record.last_refresh_tick = now;
        record.decay_deadline_tick = deadline;

        if record.stacks == 0 {
            self.records.remove(&target);
        }
    }

    pub fn get_stacks<L: EntityLifecycle + ?Sized>(
        &self,
        registry: &EntityHandleRegistry<'_, L>,
        target: EntityId,
    ) -> u32 {
        self.records
            .get(&target)
            .filter(|record| registry.is_valid(record.handle))
            .map_or(0, |record| record.stacks)
    }

    #[cfg(test)]
    pub(crate) fn record(&self, target: EntityId) -> Option<&AfflictionRecord> {
        self.records.get(&target)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn tick<L: EntityLifecycle + ?Sized>(
        &mut self,
        registry: &EntityHandleRegistry<'_, L>,
        now: Tick,
    ) -> LedgerTickStats {
        let mut stats = LedgerTickStats::default();
        let window = self.decay_window_ticks;

        self.records.retain(|id, record| {
            if !registry.is_valid(record.handle) {
                stats.records_evicted = stats.records_evicted.saturating_add(1);
                debug!(entity = id.0, "affliction_evicted");
                return false;
            }
            if record.decay_deadline_tick <= now {
                let elapsed_windows = (now.0 - record.decay_deadline_tick.0) / window + 1;
                let decayed = u32::try_from(elapsed_windows)
                    .unwrap_or(u32::MAX)
                    .min(record.stacks);
                record.stacks -= decayed;
                record.decay_deadline_tick = record
                    .decay_deadline_tick
                    .after(elapsed_windows.saturating_mul(window));
                stats.stacks_decayed = stats.stacks_decayed.saturating_add(decayed);
            }
            if record.stacks == 0 {
                stats.records_expired = stats.records_expired.saturating_add(1);
                debug!(entity = id.0, tick = now.0, "affliction_expired");
                return false;
            }
            true
        });

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_support::FakeHost;
    use crate::entity::Vec2;

    const MAX: u32 = 10;
    const WINDOW: u64 = 60;

    fn host_with(ids: &[u64]) -> FakeHost {
        let mut host = FakeHost::default();
        for id in ids {
            host.spawn(*id, Vec2::default());
        }
        host
    }

    #[test]
    fn add_stack_clamps_to_ceiling() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        for amount in [3, 4, 9, u32::MAX, 1] {
            ledger.add_stack(&registry, EntityId(1), amount, Tick(0));
            assert!(ledger.get_stacks(&registry, EntityId(1)) <= MAX);
        }
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), MAX);
    }

    #[test]
    fn unknown_entity_reports_zero_and_creates_nothing() {
        let host = host_with(&[]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&registry, EntityId(3), 2, Tick(0));
        assert_eq!(ledger.get_stacks(&registry, EntityId(3)), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn zero_amount_never_creates_a_record() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&registry, EntityId(1), 0, Tick(0));
        assert!(ledger.record(EntityId(1)).is_none());
    }

    #[test]
    fn decays_one_stack_per_window_then_disappears() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&registry, EntityId(1), 3, Tick(0));

        let mut previous = 3;
        for now in 1..=(WINDOW * 4) {
            ledger.tick(&registry, Tick(now));
            let stacks = ledger.get_stacks(&registry, EntityId(1));
            if now % WINDOW == 0 && previous > 0 {
                assert_eq!(stacks, previous - 1, "tick {now}");
            } else {
                assert_eq!(stacks, previous, "tick {now}");
            }
            previous = stacks;
        }
        assert_eq!(previous, 0);
        assert!(ledger.record(EntityId(1)).is_none());
    }

    #[test]
    fn refresh_resets_decay_window() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&registry, EntityId(1), 2, Tick(0));
        for now in 1..=59 {
            ledger.tick(&registry, Tick(now));
        }
        ledger.add_stack(&registry, EntityId(1), 1, Tick(59));
        ledger.tick(&registry, Tick(60));
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 3);

        let record = ledger.record(EntityId(1)).expect("record");
        assert_eq!(record.last_refresh_tick, Tick(59));
        assert_eq!(record.decay_deadline_tick, Tick(119));
    }

    #[test]
    fn skipped_ticks_catch_up_one_stack_per_elapsed_window() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&registry, EntityId(1), 5, Tick(0));
        let stats = ledger.tick(&registry, Tick(WINDOW * 2));
        assert_eq!(stats.stacks_decayed, 2);
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 3);
    }

    #[test]
    fn long_jump_with_huge_ceiling_decays_in_one_pass() {
        let host = host_with(&[1]);
        let registry = EntityHandleRegistry::new(&host);
        let mut ledger = AfflictionLedger::new(u32::MAX, 1);
        ledger.add_stack(&registry, EntityId(1), u32::MAX, Tick(0));

        let stats = ledger.tick(&registry, Tick(u64::from(u32::MAX) - 11));
        assert_eq!(stats.stacks_decayed, u32::MAX - 11);
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 11);
        let record = ledger.record(EntityId(1)).expect("record");
        assert_eq!(record.decay_deadline_tick, Tick(u64::from(u32::MAX) - 10));

        let stats = ledger.tick(&registry, Tick(u64::MAX));
        assert_eq!(stats.stacks_decayed, 11);
        assert_eq!(stats.records_expired, 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn despawned_target_is_evicted_on_tick() {
        let mut host = host_with(&[1, 2]);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        {
            let registry = EntityHandleRegistry::new(&host);
            ledger.add_stack(&registry, EntityId(1), 4, Tick(0));
            ledger.add_stack(&registry, EntityId(2), 4, Tick(0));
        }
        host.despawn(EntityId(1));

        let registry = EntityHandleRegistry::new(&host);
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 0);
        let stats = ledger.tick(&registry, Tick(1));
        assert_eq!(stats.records_evicted, 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get_stacks(&registry, EntityId(2)), 4);
    }

    #[test]
    fn reused_id_does_not_inherit_previous_stacks() {
        let mut host = host_with(&[1]);
        let mut ledger = AfflictionLedger::new(MAX, WINDOW);
        ledger.add_stack(&EntityHandleRegistry::new(&host), EntityId(1), 8, Tick(0));

        host.despawn(EntityId(1));
        host.spawn(1, Vec2::default());

        let registry = EntityHandleRegistry::new(&host);
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 0);
        ledger.add_stack(&registry, EntityId(1), 1, Tick(5));
        assert_eq!(ledger.get_stacks(&registry, EntityId(1)), 1);
    }
}
