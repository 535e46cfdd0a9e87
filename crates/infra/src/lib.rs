//! Infrastructure layer: background jobs, file storage, persistence, config.

pub mod config;
pub mod jobs;
pub mod persistence;
pub mod report;
pub mod storage;
pub mod upload;

mod integration_tests;
