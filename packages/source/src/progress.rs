//! Progress reporting for registry fetches and geocoding batches.
//!
//! [`ProgressCallback`] keeps the pipeline independent of how progress is
//! shown. The CLI renders it with `indicatif`; tests and library callers
//! use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a long-running step.
///
/// `Send + Sync` so one reporter can be shared across tasks.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total units of work.
    fn set_total(&self, total: u64);

    /// Sets the absolute position.
    fn set_position(&self, pos: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Marks the step complete, leaving `msg` visible.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
