//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math and value types (vectors, quaternions, colours, planes)
//! - Logging utilities

pub mod math;
pub mod logging;
