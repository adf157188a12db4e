//! Clopetracker - smoking tracker with an avatar upload pipeline
//!
//! This library crate exposes the core functionality for integration testing.

pub mod avatar;
pub mod config;
pub mod profiles;
pub mod server;
