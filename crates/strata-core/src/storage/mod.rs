//! # Strata Core Storage
//!
//! Runtime configuration files and their errors.
pub mod config;
pub mod error;

pub use config::{ConfigFormat, RuntimeConfig};
pub use error::StorageSystemError;

// Test module declaration
#[cfg(test)]
mod tests;
