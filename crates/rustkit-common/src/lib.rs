//! # RustKit Common
//!
//! Shared setup for the RustKit sanitizer crates.
//!
//! ## Features
//!
//! - Logging configuration and subscriber setup

pub mod logging;

pub use logging::{
    init_logging, init_test_logging, try_init_logging, LogConfig, LogFormat, LoggingError,
};
