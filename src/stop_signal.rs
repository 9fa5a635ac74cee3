use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Broadcast-once stop condition. Every clone observes the stop; nobody consumes it.
#[derive(Clone, Default)]
pub struct StopSignal {
    condition: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; safe to call from any thread, any number of times.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.condition;
        let mut should_stop = lock.lock();
        if !*should_stop {
            tracing::debug!("stop signal raised");
        }
        *should_stop = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.condition;
        *lock.lock()
    }

    /// Returns whether the stop was raised before `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.condition;
        let mut should_stop = lock.lock();
        cvar.wait_while_for(&mut should_stop, |should_stop| !*should_stop, timeout);
        *should_stop
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.condition;
        let mut should_stop = lock.lock();
        cvar.wait_while(&mut should_stop, |should_stop| !*should_stop);
    }
}
