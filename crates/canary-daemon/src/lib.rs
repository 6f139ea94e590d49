//! Canary daemon library
//!
//! This module provides the components of `canaryd`:
//! - REST API (metric exposition, cycle trigger, health)
//! - Configuration loading
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use server::Server;
