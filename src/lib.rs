//! ilrt - OpenMAX IL component runtime
//!
//! This library crate exposes the graph configuration and the scripted runner
//! for integration testing.

pub mod config;
pub mod runner;
