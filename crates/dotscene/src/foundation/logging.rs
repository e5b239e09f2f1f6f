//! Logging utilities
//!
//! The loader logs through the `log` facade. Binaries and tools install a
//! sink with [`init`]; tests use [`try_init`] so repeated calls are harmless.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system, ignoring an already installed logger
pub fn try_init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
