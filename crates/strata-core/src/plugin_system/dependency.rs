use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::version::SemanticVersion;

/// A declared dependency on another plugin with a minimum acceptable version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyConstraint {
    /// The id of the required plugin
    target_id: String,
    /// The lowest version that satisfies this constraint
    min_version: SemanticVersion,
}

impl DependencyConstraint {
    pub fn new(target_id: impl Into<String>, min_version: SemanticVersion) -> Self {
        Self {
            target_id: target_id.into(),
            min_version,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn min_version(&self) -> &SemanticVersion {
        &self.min_version
    }

    /// True iff `candidate` has the target id and at least the minimum version.
    pub fn is_satisfied_by(&self, candidate: &PluginDescriptor) -> bool {
        self.is_satisfied_by_version(candidate.id(), candidate.version())
    }

    /// Same check as [`is_satisfied_by`](Self::is_satisfied_by) on a bare id/version pair.
    pub fn is_satisfied_by_version(&self, id: &str, version: &SemanticVersion) -> bool {
        self.target_id == id && version.compare(&self.min_version).is_ge()
    }
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >= {}", self.target_id, self.min_version)
    }
}

/// Outcome of evaluating one constraint during a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveState {
    /// Not yet evaluated in the current pass
    Resolvable,
    Failed,
    Succeeded,
}

/// Resolver scratch record for a single constraint.
///
/// Verdicts are owned by the pass that produced them and never written back
/// onto the descriptor, so repeated passes over the same descriptors are
/// independent of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintVerdict {
    /// Id of the descriptor declaring the constraint
    pub owner_id: String,
    /// Position of the constraint in the owner's dependency list
    pub index: usize,
    pub constraint: DependencyConstraint,
    pub state: ResolveState,
    /// Human readable failure cause, empty unless `state` is `Failed`
    pub cause: String,
}

impl ConstraintVerdict {
    pub(crate) fn pending(owner_id: &str, index: usize, constraint: &DependencyConstraint) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            index,
            constraint: constraint.clone(),
            state: ResolveState::Resolvable,
            cause: String::new(),
        }
    }

    // Write-once: a decided verdict is left untouched.
    pub(crate) fn mark_failed(&mut self, cause: impl Into<String>) {
        if self.state == ResolveState::Resolvable {
            self.state = ResolveState::Failed;
            self.cause = cause.into();
        }
    }

    pub(crate) fn mark_succeeded(&mut self) {
        if self.state == ResolveState::Resolvable {
            self.state = ResolveState::Succeeded;
        }
    }
}

/// Reasons a dependency cannot be honored. The `Display` output doubles as the
/// cause string recorded in resolution reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("dependency {0} not found")]
    MissingPlugin(String),

    /// The plugin was found, but its version is too low
    #[error("dependency {plugin_id} requires version >= {required} but found {found}")]
    IncompatibleVersion {
        plugin_id: String,
        required: SemanticVersion,
        found: SemanticVersion,
    },

    /// The plugin is part of a dependency cycle
    #[error("circular dependency among {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// The plugin resolved on its own but something it depends on did not
    #[error("dependency {0} is not resolvable")]
    Unresolvable(String),
}
