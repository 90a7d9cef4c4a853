use std::collections::{BTreeMap, HashMap};

use affliction::{CombatSink, DamageError, EntityId, EntityLifecycle, Generation, Vec2};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dummy {
    pub(crate) name: String,
    pub(crate) position: Vec2,
    pub(crate) health: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DamageRecord {
    pub(crate) name: String,
    pub(crate) amount: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: Generation,
    occupant: Option<Dummy>,
}

/// Slot arena of training dummies. A freed slot is handed to the next spawn
/// with its generation bumped, so handles to the old occupant go stale.
#[derive(Debug, Default)]
pub(crate) struct ArenaWorld {
    slots: Vec<Slot>,
    free_slots: Vec<u64>,
    pending_despawns: Vec<EntityId>,
    ids_by_name: HashMap<String, EntityId>,
    damage_log: Vec<DamageRecord>,
}

impl ArenaWorld {
    /// Names stay unique among live dummies; a spawn reusing a live name is
    /// refused.
    pub(crate) fn spawn(&mut self, name: &str, position: Vec2, health: u32) -> Option<EntityId> {
        if let Some(existing) = self.ids_by_name.get(name) {
            warn!(name, id = existing.0, "dummy_name_taken");
            return None;
        }
        let dummy = Dummy {
            name: name.to_string(),
            position,
            health,
        };
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u64
            }
        };
        let id = EntityId(index);
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.occupant = Some(dummy);
        }
        self.ids_by_name.insert(name.to_string(), id);
        debug!(name, id = id.0, "dummy_spawned");
        Some(id)
    }

    /// Despawn is deferred to `apply_pending`, like every other removal.
    pub(crate) fn despawn(&mut self, id: EntityId) -> bool {
        if self.dummy(id).is_none() {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub(crate) fn apply_pending(&mut self) {
        if self.pending_despawns.is_empty() {
            return;
        }
        self.pending_despawns.sort_by_key(|id| id.0);
        self.pending_despawns.dedup();
        for id in self.pending_despawns.drain(..) {
            let Some(slot) = self.slots.get_mut(id.0 as usize) else {
                continue;
            };
            let Some(dummy) = slot.occupant.take() else {
                continue;
            };
            slot.generation = slot.generation.next();
            if self.ids_by_name.get(&dummy.name) == Some(&id) {
                self.ids_by_name.remove(&dummy.name);
            }
            if slot.generation.is_last() {
                warn!(id = id.0, "slot_retired");
            } else {
                self.free_slots.push(id.0);
            }
            info!(name = %dummy.name, id = id.0, "dummy_despawned");
        }
        // Lowest index is reused first.
        self.free_slots.sort_unstable_by(|a, b| b.cmp(a));
    }

    pub(crate) fn id_by_name(&self, name: &str) -> Option<EntityId> {
        self.ids_by_name.get(name).copied()
    }

    pub(crate) fn dummy(&self, id: EntityId) -> Option<&Dummy> {
        self.slots
            .get(id.0 as usize)
            .and_then(|slot| slot.occupant.as_ref())
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.occupant.is_some())
            .count()
    }

    pub(crate) fn damage_log(&self) -> &[DamageRecord] {
        &self.damage_log
    }

    pub(crate) fn damage_by_name(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for record in &self.damage_log {
            let total = totals.entry(record.name.clone()).or_insert(0u64);
            *total = total.saturating_add(u64::from(record.amount));
        }
        totals
    }

    fn is_pending_despawn(&self, id: EntityId) -> bool {
        self.pending_despawns.contains(&id)
    }
}

impl EntityLifecycle for ArenaWorld {
    fn is_entity_present(&self, id: EntityId) -> bool {
        self.dummy(id).is_some()
    }

    fn current_generation(&self, id: EntityId) -> Option<Generation> {
        self.slots.get(id.0 as usize).map(|slot| slot.generation)
    }

    fn position(&self, id: EntityId) -> Option<Vec2> {
        self.dummy(id).map(|dummy| dummy.position)
    }
}

impl CombatSink for ArenaWorld {
    fn deal_damage(
        &mut self,
        target: EntityId,
        amount: u32,
        source_position: Vec2,
    ) -> Result<(), DamageError> {
        // A dummy killed earlier in the same step is already gone for combat.
        if self.is_pending_despawn(target) {
            return Err(DamageError::TargetRemoved(target));
        }
        let Some(dummy) = self
            .slots
            .get_mut(target.0 as usize)
            .and_then(|slot| slot.occupant.as_mut())
        else {
            return Err(DamageError::TargetRemoved(target));
        };
        dummy.health = dummy.health.saturating_sub(amount);
        let died = dummy.health == 0;
        debug!(
            entity = target.0,
            amount,
            health = dummy.health,
            source_x = source_position.x,
            source_y = source_position.y,
            "dummy_hit"
        );
        let name = dummy.name.clone();
        self.damage_log.push(DamageRecord { name, amount });
        if died {
            self.pending_despawns.push(target);
        }
        Ok(())
    }
}
