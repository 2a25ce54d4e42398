//! HTTP API client

pub mod client;
pub mod sessions;
