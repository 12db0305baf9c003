use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CdxError;

/// Cooperative cancellation flag shared between a long-running operation and
/// its caller.
///
/// Operations check the token at natural suspension points: between lines in
/// streaming filters, between chunks in the ZipNum writer/reader, and
/// between bisection probes in search. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(CdxError::Cancelled)` once [`cancel`](Self::cancel) has
    /// been called. Convenient with `?` inside streaming loops.
    pub fn check(&self) -> Result<(), CdxError> {
        if self.is_cancelled() {
            Err(CdxError::Cancelled)
        } else {
            Ok(())
        }
    }
}
