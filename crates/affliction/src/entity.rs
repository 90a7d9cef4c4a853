use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u32);

impl Generation {
    /// Saturates at `u32::MAX`. Hosts retire a slot once it reaches the last
    /// generation instead of handing it out again.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn is_last(self) -> bool {
        self.0 == u32::MAX
    }
}

/// Simulation step counter. Tick 0 is the state before the first step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    pub fn after(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Id plus the generation observed when the handle was captured.
///
/// A handle outlives the entity it names; the registry answers whether it still
/// refers to the same occupant of that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub id: EntityId,
    pub generation: Generation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DamageError {
    #[error("entity {0:?} was removed before damage could be applied")]
    TargetRemoved(EntityId),
    #[error("damage rejected for entity {target:?}: {reason}")]
    Rejected { target: EntityId, reason: String },
}

/// Entity lifecycle queries answered by the host engine.
pub trait EntityLifecycle {
    fn is_entity_present(&self, id: EntityId) -> bool;
    fn current_generation(&self, id: EntityId) -> Option<Generation>;
    fn position(&self, id: EntityId) -> Option<Vec2>;
}

/// Combat resolution owned by the host engine.
pub trait CombatSink {
    fn deal_damage(
        &mut self,
        target: EntityId,
        amount: u32,
        source_position: Vec2,
    ) -> Result<(), DamageError>;
}

pub trait EngineHost: EntityLifecycle + CombatSink {}

impl<T: EntityLifecycle + CombatSink + ?Sized> EngineHost for T {}

/// Liveness oracle over the host's entity lifecycle. Holds no state of its own,
/// so every check reflects the host at the moment of the call.
pub struct EntityHandleRegistry<'a, L: EntityLifecycle + ?Sized> {
    lifecycle: &'a L,
}

impl<'a, L: EntityLifecycle + ?Sized> EntityHandleRegistry<'a, L> {
    pub fn new(lifecycle: &'a L) -> Self {
        Self { lifecycle }
    }

    pub fn capture(&self, id: EntityId) -> Option<EntityHandle> {
        if !self.lifecycle.is_entity_present(id) {
            return None;
        }
        let generation = self.lifecycle.current_generation(id)?;
        Some(EntityHandle { id, generation })
    }

    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        self.lifecycle.is_entity_present(handle.id)
            && self.lifecycle.current_generation(handle.id) == Some(handle.generation)
    }

    pub fn position_of(&self, handle: EntityHandle) -> Option<Vec2> {
        if !self.is_valid(handle) {
            return None;
        }
        self.lifecycle.position(handle.id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Slot {
        generation: Generation,
        position: Vec2,
        present: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct DamageCall {
        pub(crate) target: EntityId,
        pub(crate) amount: u32,
        pub(crate) source_position: Vec2,
    }

    /// In-memory host that records every damage call.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHost {
        slots: BTreeMap<EntityId, Slot>,
        pub(crate) damage_calls: Vec<DamageCall>,
        pub(crate) reject_with: Option<DamageError>,
    }

    impl FakeHost {
        pub(crate) fn spawn(&mut self, id: u64, position: Vec2) -> EntityId {
            let id = EntityId(id);
            let slot = self.slots.entry(id).or_insert(Slot {
                generation: Generation::default(),
                position,
                present: false,
            });
            if slot.present {
                return id;
            }
            slot.present = true;
            slot.position = position;
            id
        }

        pub(crate) fn despawn(&mut self, id: EntityId) {
            if let Some(slot) = self.slots.get_mut(&id) {
                if slot.present {
                    slot.present = false;
                    slot.generation = slot.generation.next();
                }
            }
        }
    }

    impl EntityLifecycle for FakeHost {
        fn is_entity_present(&self, id: EntityId) -> bool {
            self.slots.get(&id).is_some_and(|slot| slot.present)
        }

        fn current_generation(&self, id: EntityId) -> Option<Generation> {
            self.slots.get(&id).map(|slot| slot.generation)
        }

        fn position(&self, id: EntityId) -> Option<Vec2> {
            self.slots
                .get(&id)
                .filter(|slot| slot.present)
                .map(|slot| slot.position)
        }
    }

    impl CombatSink for FakeHost {
        fn deal_damage(
            &mut self,
            target: EntityId,
            amount: u32,
            source_position: Vec2,
        ) -> Result<(), DamageError> {
            if let Some(error) = self.reject_with.clone() {
                return Err(error);
            }
            if !self.is_entity_present(target) {
                return Err(DamageError::TargetRemoved(target));
            }
            self.damage_calls.push(DamageCall {
                target,
                amount,
                source_position,
            });
            Ok(())
        }
    }
}
