//! Started/stopped state owned by the startup and shutdown wiring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable started flag. Operations only read it; [`startup`](crate::client::startup) and
/// [`shutdown`](crate::client::shutdown) flip it.
#[derive(Clone, Debug, Default)]
pub struct Lifecycle {
    started: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn reset_started(&self) {
        self.started.store(false, Ordering::Release);
    }

    /// Sets the flag, returning false if it was already set.
    pub(crate) fn try_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
