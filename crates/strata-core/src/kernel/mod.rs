//! # Strata Core Kernel
//!
//! Application bootstrapping, crate-wide constants and the top-level error type.
//!
//! - **Bootstrapping**: [`Application`](bootstrap::Application) loads manifests
//!   from the configured plugins directory and drives the coordinator.
//! - **Core Constants**: defaults shared by configuration and descriptors.
//! - **Error Handling**: [`Error`](error::Error) and the `Result` alias.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{Application, LoadReport};
pub use error::{Error, Result};
