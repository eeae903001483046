//! Stream temperature logger firmware library.
//!
//! Exposes the domain core and every adapter for integration testing and
//! the host simulator. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;
pub mod session;
