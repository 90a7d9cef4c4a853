//! Per-target affliction stacks and delayed damage echoes.
//!
//! Hits add decaying stacks to their target and may queue an echo: an
//! independent damage pulse that lands on the same target a fixed number of
//! ticks later. All entity references go through [`EntityHandleRegistry`], so a
//! target that despawns simply stops receiving effects.

mod applicator;
mod config;
mod echo;
mod entity;
mod handle;
mod ledger;
mod session;

pub use applicator::DamageApplicator;
pub use config::{
    AfflictionConfig, ConfigError, DEFAULT_DECAY_WINDOW_TICKS, DEFAULT_ECHO_RESTACK_AMOUNT,
    DEFAULT_MAX_STACKS,
};
pub use echo::{DropReason, EchoEvent, EchoId, EchoOutcome, EchoScheduler};
pub use entity::{
    CombatSink, DamageError, EngineHost, EntityHandle, EntityHandleRegistry, EntityId,
    EntityLifecycle, Generation, Tick, Vec2,
};
pub use handle::SessionHandle;
pub use ledger::{AfflictionLedger, AfflictionRecord, LedgerTickStats};
pub use session::{CombatSession, SessionSystemId, TickReport, SESSION_SYSTEM_ORDER};
