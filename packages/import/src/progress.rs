//! Progress reporting for import jobs.
//!
//! [`ProgressCallback`] decouples the job from any rendering backend
//! (`indicatif` bars in the CLI, silence in tests). Import jobs report in
//! percent: the total is set to 100 and positions are absolute.

use std::sync::Arc;

/// Receives progress updates from a running job.
///
/// Implementations must be `Send + Sync` so a job can be shared with an
/// observer on another task.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
