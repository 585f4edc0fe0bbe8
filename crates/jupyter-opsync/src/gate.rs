//! Reentrancy guard preventing remote-apply from re-emitting as local-submit.

use std::cell::Cell;
use std::rc::Rc;

/// A plain suppression flag for the single-threaded, cooperative event loop.
///
/// Holding the gate returns an RAII [`GateGuard`]: the flag is set for
/// exactly the guard's lifetime and cleared on drop, including the early
/// returns of a failed apply. The guard is `!Send` and every engine entry
/// point is synchronous, so the flag can never be observed set across a
/// suspension point.
#[derive(Debug, Clone, Default)]
pub struct SyncGate {
    flag: Rc<Cell<bool>>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an application is currently in progress under this gate.
    pub fn is_held(&self) -> bool {
        self.flag.get()
    }

    /// Set the flag for the lifetime of the returned guard.
    pub fn hold(&self) -> GateGuard {
        debug_assert!(!self.flag.get(), "gate held reentrantly");
        self.flag.set(true);
        GateGuard {
            flag: Rc::clone(&self.flag),
        }
    }
}

/// Clears the gate when dropped.
#[derive(Debug)]
pub struct GateGuard {
    flag: Rc<Cell<bool>>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
