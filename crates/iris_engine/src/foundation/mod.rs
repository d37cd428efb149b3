//! Foundation module - core utilities and types
//!
//! - Math types and projection helpers
//! - Slot map keys and their packed indices
//! - Logging setup

pub mod collections;
pub mod logging;
pub mod math;
