//! Progress monitoring for extraction runs.

use crate::types::Progress;

/// Receives a completion snapshot once at the start of a run and once per
/// finished member.
///
/// Calls are synchronous and happen while the run's state lock is held, so a
/// slow monitor slows the whole run.
pub trait ProgressMonitor: Send + Sync {
    /// Called with the current snapshot.
    fn notify(&self, progress: Progress);
}

impl<F> ProgressMonitor for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn notify(&self, progress: Progress) {
        self(progress)
    }
}

/// Monitor that ignores progress entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl ProgressMonitor for NoopMonitor {
    fn notify(&self, _progress: Progress) {}
}
