// Scoped ownership of an AtomicBool flag

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds `flag` set until dropped.
///
/// Dropping happens on early return, on error and when the owning future is
/// cancelled, so the flag cannot stay stuck.
pub struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// Set the flag, or return `None` if it is already set
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlagGuard(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
