//! Aggregate report maintenance.

pub mod updater;

pub use updater::{ReportError, ReportUpdater};
