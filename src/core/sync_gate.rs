//! Single-flight gate for host requests.
//!
//! The authoring host's script bridge is not reentrant: two overlapping calls
//! can hang or crash it. Every host request is made while holding a
//! [`GateGuard`]; a second [`HostSyncGate::try_enter`] fails until the guard
//! is gone. Release happens on drop, so success, error and panic paths all
//! free the gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared busy flag. Clones observe the same gate.
#[derive(Clone, Debug, Default)]
pub struct HostSyncGate {
    busy: Arc<AtomicBool>,
}

impl HostSyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. `None` while another request is in flight.
    pub fn try_enter(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { busy: Arc::clone(&self.busy) })
    }

    /// Loading-state signal for the UI.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of gate ownership; releases on drop.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl GateGuard {
    /// Release explicitly (same as dropping).
    pub fn exit(self) {}
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_enter_fails_until_exit() {
        let gate = HostSyncGate::new();
        let first = gate.try_enter().expect("gate free");
        assert!(gate.is_busy());
        assert!(gate.try_enter().is_none());

        first.exit();
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let gate = HostSyncGate::new();
        let other = gate.clone();
        let _guard = gate.try_enter().unwrap();
        assert!(other.is_busy());
        assert!(other.try_enter().is_none());
    }

    #[test]
    fn test_released_on_panic() {
        let gate = HostSyncGate::new();
        let inner = gate.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.try_enter().unwrap();
            panic!("host call blew up");
        });
        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_contended_across_threads() {
        let gate = HostSyncGate::new();
        let held = gate.try_enter().unwrap();
        let g = gate.clone();
        let entered = std::thread::spawn(move || g.try_enter().is_some()).join().unwrap();
        assert!(!entered);
        drop(held);
        let g = gate.clone();
        let entered = std::thread::spawn(move || g.try_enter().is_some()).join().unwrap();
        assert!(entered);
    }
}
