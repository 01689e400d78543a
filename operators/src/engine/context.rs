use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::Error;
use crate::util::Result;

/// A shared flag to stop a running computation.
///
/// Cancelling is checked once per tile: running tiles finish, no new ones are started.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Fails with `Cancelled` if the token was cancelled.
    ///
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Progress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

/// Counts finished work items of a computation, shared between the workers and observers
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    progress: Arc<Progress>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&self, total: usize) {
        self.progress.completed.store(0, Ordering::SeqCst);
        self.progress.total.store(total, Ordering::SeqCst);
    }

    pub fn increment(&self) {
        self.progress.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed(&self) -> usize {
        self.progress.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.progress.total.load(Ordering::SeqCst)
    }

    /// Finished share of the work in `[0, 1]`, `0` if the amount of work is unknown
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.completed() as f64 / total as f64).min(1.0)
    }
}

/// What a tile computation can observe about the running computation
#[derive(Debug, Clone, Default)]
pub struct TileContext {
    cancellation: CancellationToken,
    progress: ProgressHandle,
}

impl TileContext {
    pub fn new(cancellation: CancellationToken, progress: ProgressHandle) -> Self {
        Self {
            cancellation,
            progress,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert!(token.check().is_ok());
        clone.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn progress_fraction() {
        let progress = ProgressHandle::new();
        assert!(progress.fraction().abs() < f64::EPSILON);

        progress.reset(4);
        let observer = progress.clone();
        progress.increment();
        progress.increment();
        progress.increment();

        assert_eq!(observer.completed(), 3);
        assert_eq!(observer.total(), 4);
        assert!((observer.fraction() - 0.75).abs() < f64::EPSILON);
    }
}
