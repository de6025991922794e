//! Infrastructure layer providing external service integrations.
//!
//! This module contains the HTTP client for the tax policy service, file
//! persistence, configuration loading and logging setup.

pub mod api;
pub mod config;
pub mod logging;
pub mod persistence;

pub use api::*;
pub use config::*;
pub use logging::*;
pub use persistence::*;
