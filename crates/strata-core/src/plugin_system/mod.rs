//! # Strata Core Plugin System
//!
//! Dependency resolution and lifecycle sequencing for plugins described by
//! declarative descriptors.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: [`SemanticVersion`], the lenient `major.minor.revision`
//!   version used by descriptors and constraints.
//! - **[`dependency`]**: [`DependencyConstraint`] (a minimum-version requirement on
//!   another plugin) and the per-pass verdicts the resolver records for it.
//! - **[`descriptor`]**: The validated, immutable [`PluginDescriptor`] and its builder.
//! - **[`resolver`]**: [`DependencyResolver`], which turns a descriptor set into an
//!   [`ActivationPlan`] and a [`ResolutionReport`] explaining every exclusion.
//! - **[`lifecycle`]**: The per-plugin state machine ([`PluginState`]).
//! - **[`coordinator`]**: [`LifecycleCoordinator`], which drives all state machines
//!   in plan order and unwinds partial activations.
//! - **[`traits`]**: The [`Activator`] hook trait plugin code implements.
//! - **[`loader`]**: Reads `plugin.json` manifests into descriptors.
//! - **[`error`]**: [`PluginSystemError`].
pub mod coordinator;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod resolver;
pub mod traits;
pub mod version;

pub use coordinator::{ActivationSummary, DeactivationSummary, LifecycleCoordinator};
pub use dependency::{ConstraintVerdict, DependencyConstraint, ResolveState};
pub use descriptor::{DescriptorDefaults, InitialState, PluginDescriptor};
pub use error::PluginSystemError;
pub use lifecycle::{LifecycleEvent, PluginState};
pub use loader::{ManifestLoader, ScanResult};
pub use resolver::{ActivationPlan, DependencyResolver, Resolution, ResolutionReport};
pub use traits::{Activator, ActivatorRegistry, HookError, NoopActivator, PluginContext};
pub use version::SemanticVersion;

// Test module declaration
#[cfg(test)]
mod tests;
