//! # Strata Core Plugin Lifecycle
//!
//! The per-plugin finite state machine. [`PluginState::apply`] is the single
//! transition table; guards that need descriptor data (stoppability, dormant
//! initial state) are enforced by the
//! [`LifecycleCoordinator`](crate::plugin_system::coordinator::LifecycleCoordinator)
//! before it fires an event.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::plugin_system::error::PluginSystemError;

/// Runtime lifecycle state of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    /// Terminal
    Uninstalled,
}

/// Events that drive a [`PluginState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Resolved,
    ResolutionFailed,
    StartRequested,
    StartSucceeded,
    StartFailed,
    StopRequested,
    StopCompleted,
    UninstallRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal lifecycle transition from {from} on {event:?}")]
pub struct TransitionError {
    pub from: PluginState,
    pub event: LifecycleEvent,
}

impl PluginState {
    /// Returns the state reached by applying `event`, or an error if the
    /// transition is not part of the lifecycle.
    pub fn apply(self, event: LifecycleEvent) -> Result<PluginState, TransitionError> {
        use LifecycleEvent as E;
        use PluginState::*;

        match (self, event) {
            (Uninstalled, _) => Err(TransitionError { from: self, event }),
            (_, E::UninstallRequested) => Ok(Uninstalled),

            (Installed, E::Resolved) => Ok(Resolved),
            (Installed, E::ResolutionFailed) => Ok(Installed),
            // Re-resolution of an idle plugin
            (Resolved, E::Resolved) => Ok(Resolved),
            (Resolved, E::ResolutionFailed) => Ok(Installed),

            (Resolved, E::StartRequested) => Ok(Starting),
            (Starting, E::StartSucceeded) => Ok(Active),
            (Starting, E::StartFailed) => Ok(Resolved),

            (Active, E::StopRequested) => Ok(Stopping),
            (Stopping, E::StopCompleted) => Ok(Resolved),

            (
                Installed | Resolved | Starting | Active | Stopping,
                E::Resolved
                | E::ResolutionFailed
                | E::StartRequested
                | E::StartSucceeded
                | E::StartFailed
                | E::StopRequested
                | E::StopCompleted,
            ) => Err(TransitionError { from: self, event }),
        }
    }

    pub fn is_active(self) -> bool {
        self == PluginState::Active
    }

    pub fn is_terminal(self) -> bool {
        self == PluginState::Uninstalled
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PluginState::Installed => "installed",
            PluginState::Resolved => "resolved",
            PluginState::Starting => "starting",
            PluginState::Active => "active",
            PluginState::Stopping => "stopping",
            PluginState::Uninstalled => "uninstalled",
        };
        f.write_str(label)
    }
}

/// State machine instance owned by the coordinator for one plugin
#[derive(Debug, Clone)]
pub struct StateMachine {
    plugin_id: String,
    state: PluginState,
}

impl StateMachine {
    /// New machines start in `Installed`
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            state: PluginState::Installed,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Apply `event`, leaving the state unchanged on an illegal transition.
    pub fn fire(&mut self, event: LifecycleEvent) -> Result<PluginState, PluginSystemError> {
        let next = self
            .state
            .apply(event)
            .map_err(|source| PluginSystemError::IllegalTransition {
                plugin_id: self.plugin_id.clone(),
                source,
            })?;
        if next != self.state {
            log::debug!("Plugin '{}': {} -> {} ({:?})", self.plugin_id, self.state, next, event);
        }
        self.state = next;
        Ok(next)
    }
}
