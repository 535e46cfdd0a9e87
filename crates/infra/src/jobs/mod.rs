//! In-process background job accounting.
//!
//! Request handlers hand detached work (uploads, report refreshes) to the
//! runtime through a [`JobTracker`]. The tracker counts jobs that have been
//! registered but not yet finished so shutdown can wait for them.
//!
//! ## Components
//!
//! - `BackgroundJob`: id, kind and target entity of one piece of work
//! - `JobTracker`: shared in-flight counter with drain notification
//! - `JobGuard`: scoped registration; dropping it marks the job complete

pub mod tracker;
pub mod types;

pub use tracker::{JobGuard, JobTracker, JobTrackerError};
pub use types::{BackgroundJob, JobId, JobKind};
