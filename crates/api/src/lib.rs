//! HTTP API: routing, request/response mapping and process shutdown.

pub mod app;
pub mod shutdown;
