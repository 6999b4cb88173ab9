use std::sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    /// Bumped on every notify so sleepers can tell a wake-up from a timeout.
    epoch: u64,
}

/// Pause flag that a worker can sleep on. Every state change wakes sleepers
/// so pause, resume and stop are observed without waiting out a poll tick.
#[derive(Clone, Debug, Default)]
pub struct PauseGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut GateState)) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
        state.epoch = state.epoch.wrapping_add(1);
        cvar.notify_all();
    }

    pub fn pause(&self) {
        self.update(|s| s.paused = true);
    }

    pub fn resume(&self) {
        self.update(|s| s.paused = false);
    }

    /// Wake sleepers without changing the pause flag.
    pub fn notify(&self) {
        self.update(|_| {});
    }

    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(|e| e.into_inner()).paused
    }

    /// Sleep up to `timeout`, returning early on any notification.
    pub fn wait(&self, timeout: Duration) {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let epoch = guard.epoch;
        let _ = cvar
            .wait_timeout_while(guard, timeout, |s| s.epoch == epoch)
            .unwrap_or_else(|e| e.into_inner());
    }
}
