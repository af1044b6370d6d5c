//! Producer lifecycle plumbing.
//!
//! A sync or stream state and every view it hands out share one release
//! flag. `release()` (or dropping the producer) flips it, after which
//! payload accessors on outstanding views fail instead of serving bytes
//! whose owner is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ReleasedResourceError;

/// Shared Active/Released marker. Cloning hands out another handle to the
/// same flag.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReleaseFlag(Arc<AtomicBool>);

impl ReleaseFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// One-way transition to Released. Safe to call repeatedly.
    pub(crate) fn release(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_released(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard for buffer-touching operations.
    #[inline]
    pub(crate) fn ensure_active(&self) -> Result<(), ReleasedResourceError> {
        if self.is_released() {
            Err(ReleasedResourceError)
        } else {
            Ok(())
        }
    }
}
