//! # Saarthi Common Library
//!
//! Shared code for the Saarthi analytics service:
//! - Error type for configuration and filesystem helpers
//! - Configuration loading and settings resolution
//! - Atomic file writes
//! - Session identifier helpers

pub mod config;
pub mod error;
pub mod fs_utils;
pub mod uuid_utils;

pub use error::{Error, Result};
