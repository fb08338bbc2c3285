//! Cooperative cancellation for long traversals.

use crate::service::error::{TreeError, TreeResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared between a caller and an operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with `Cancelled` once `cancel` has been called.
    pub fn check(&self) -> TreeResult<()> {
        if self.is_cancelled() {
            return Err(TreeError::Cancelled);
        }
        Ok(())
    }
}
