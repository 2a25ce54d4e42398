//! Labwatch Library
//!
//! Client for monitoring long-running exam-lab cluster provisioning jobs:
//! a reconnecting push log channel, an independent status poller, and the
//! arbitration that reconciles both into a single terminal notification.

pub mod classify;
pub mod config;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod monitor;
pub mod transport;
pub mod utils;
pub mod workers;
