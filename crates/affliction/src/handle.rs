use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::entity::EngineHost;
use crate::session::CombatSession;

static SESSION_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_session_lock_poison_once() {
    if SESSION_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!("session lock poisoned; recovered inner value");
    }
}

/// Shared access to a session for hosts that drive it from more than one thread.
/// Every call holds the one lock for its whole duration, so a tick and a hit
/// never interleave.
pub struct SessionHandle<H: EngineHost> {
    session: Arc<Mutex<CombatSession<H>>>,
}

impl<H: EngineHost> Clone for SessionHandle<H> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<H: EngineHost> SessionHandle<H> {
    pub fn new(session: CombatSession<H>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut CombatSession<H>) -> R) -> R {
        match self.session.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => {
                warn_session_lock_poison_once();
                let mut guard = poisoned.into_inner();
                f(&mut guard)
            }
        }
    }
}
