//! # Strata Core Lifecycle Coordinator
//!
//! The [`LifecycleCoordinator`] owns the descriptor set and the plugin state
//! table. It is the only component that changes a [`PluginState`].
//!
//! Mutating operations are serialized by a run lock so there is a single
//! writer at a time. The state table sits behind an `RwLock` that is never
//! held across an activator hook, so queries such as [`state_of`] stay
//! responsive while a slow hook runs.
//!
//! Activation is all-or-nothing per run: if a start hook fails, times out or
//! the run is cancelled, every plugin started by that run is stopped again in
//! reverse order before the error is returned.
//!
//! [`state_of`]: LifecycleCoordinator::state_of
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::kernel::constants;
use crate::plugin_system::descriptor::{InitialState, PluginDescriptor};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::{LifecycleEvent, PluginState, StateMachine, TransitionError};
use crate::plugin_system::resolver::{ActivationPlan, DependencyResolver, Resolution};
use crate::plugin_system::traits::{Activator, HookError, HookKind, PluginContext};

/// Plugins touched by a successful activation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationSummary {
    /// Plugins started by this run, in start order
    pub started: Vec<String>,
    /// Plugins left resolved because their initial state is `installed`
    pub dormant: Vec<String>,
}

/// Outcome of [`LifecycleCoordinator::deactivate_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeactivationSummary {
    /// Plugins stopped, in stop order
    pub stopped: Vec<String>,
    /// Active plugins that refused to stop because they are not stoppable
    pub refused: Vec<String>,
    /// Plugins kept active because an active plugin still depends on them
    pub held: Vec<String>,
}

struct PluginEntry {
    descriptor: PluginDescriptor,
    machine: StateMachine,
}

#[derive(Default)]
struct StateTable {
    entries: BTreeMap<String, PluginEntry>,
    /// Tombstones; the descriptor and activator are released on uninstall
    uninstalled: BTreeSet<String>,
    /// Currently active plugins in the order they became active
    active_order: Vec<String>,
    plan: Option<ActivationPlan>,
}

impl StateTable {
    fn entry(&self, id: &str) -> Result<&PluginEntry, PluginSystemError> {
        self.entries.get(id).ok_or_else(|| PluginSystemError::PluginNotFound {
            plugin_id: id.to_string(),
        })
    }

    fn fire(&mut self, id: &str, event: LifecycleEvent) -> Result<PluginState, PluginSystemError> {
        let state = self
            .entries
            .get_mut(id)
            .ok_or_else(|| PluginSystemError::PluginNotFound {
                plugin_id: id.to_string(),
            })?
            .machine
            .fire(event)?;
        match state {
            PluginState::Active => self.active_order.push(id.to_string()),
            PluginState::Stopping | PluginState::Uninstalled => {
                self.active_order.retain(|a| a != id)
            }
            PluginState::Installed | PluginState::Resolved | PluginState::Starting => {}
        }
        Ok(state)
    }

    /// First dependency of `id` that is not active
    fn inactive_dependency(&self, id: &str) -> Option<String> {
        let entry = self.entries.get(id)?;
        entry
            .descriptor
            .dependencies()
            .iter()
            .map(|d| d.target_id())
            .find(|target| {
                !self
                    .entries
                    .get(*target)
                    .is_some_and(|d| d.machine.state().is_active())
            })
            .map(str::to_string)
    }

    /// Active plugins that declare a dependency on `id`
    fn active_dependents(&self, id: &str) -> Vec<String> {
        self.active_order
            .iter()
            .filter(|a| {
                self.entries
                    .get(a.as_str())
                    .is_some_and(|e| {
                        e.descriptor.dependencies().iter().any(|d| d.target_id() == id)
                    })
            })
            .cloned()
            .collect()
    }

    fn context(&self, id: &str) -> Result<(Arc<dyn Activator>, PluginContext), PluginSystemError> {
        let descriptor = &self.entry(id)?.descriptor;
        Ok((
            descriptor.activator(),
            PluginContext {
                plugin_id: descriptor.id().to_string(),
                version: descriptor.version().clone(),
                start_level: descriptor.start_level(),
            },
        ))
    }
}

/// Drives plugin state machines through install, resolve, start, stop and uninstall
pub struct LifecycleCoordinator {
    resolver: DependencyResolver,
    hook_timeout: Duration,
    table: RwLock<StateTable>,
    run_lock: Mutex<()>,
}

impl LifecycleCoordinator {
    /// Create a coordinator whose activator hooks are bounded by `hook_timeout`
    pub fn new(hook_timeout: Duration) -> Self {
        Self {
            resolver: DependencyResolver::new(),
            hook_timeout,
            table: RwLock::new(StateTable::default()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn hook_timeout(&self) -> Duration {
        self.hook_timeout
    }

    /// Register descriptors in the `Installed` state.
    ///
    /// The batch is rejected as a whole if any id is already installed or
    /// appears twice.
    pub async fn install(
        &self,
        descriptors: Vec<PluginDescriptor>,
    ) -> Result<(), PluginSystemError> {
        let _run = self.run_lock.lock().await;
        let mut table = self.table.write().await;

        let mut incoming = BTreeSet::new();
        for descriptor in &descriptors {
            if table.entries.contains_key(descriptor.id()) || !incoming.insert(descriptor.id()) {
                return Err(PluginSystemError::DuplicateIdentity {
                    plugin_id: descriptor.id().to_string(),
                });
            }
        }

        for descriptor in descriptors {
            let id = descriptor.id().to_string();
            log::info!("Installed plugin '{}' v{}", id, descriptor.version());
            table.uninstalled.remove(&id);
            table.entries.insert(
                id.clone(),
                PluginEntry {
                    descriptor,
                    machine: StateMachine::new(id),
                },
            );
        }
        Ok(())
    }

    /// Resolve the installed descriptors.
    ///
    /// Plugins in the plan move to `Resolved`; plugins that failed stay (or
    /// fall back to) `Installed`. The plan is kept for later stop ordering.
    pub async fn resolve(&self) -> Result<Resolution, PluginSystemError> {
        let _run = self.run_lock.lock().await;
        let mut table = self.table.write().await;

        let descriptors: Vec<PluginDescriptor> =
            table.entries.values().map(|e| e.descriptor.clone()).collect();
        let resolution = self.resolver.resolve(&descriptors)?;

        for id in resolution.plan.iter() {
            if table.entry(id)?.machine.state() == PluginState::Installed {
                table.fire(id, LifecycleEvent::Resolved)?;
            }
        }
        for failure in resolution.report.failures() {
            let state = table.entry(&failure.plugin_id)?.machine.state();
            match state {
                PluginState::Installed | PluginState::Resolved => {
                    log::warn!("Plugin '{}' could not be resolved", failure.plugin_id);
                    table.fire(&failure.plugin_id, LifecycleEvent::ResolutionFailed)?;
                }
                PluginState::Starting
                | PluginState::Active
                | PluginState::Stopping
                | PluginState::Uninstalled => {
                    log::warn!(
                        "Plugin '{}' no longer resolves but is {}; leaving it as is",
                        failure.plugin_id,
                        state
                    );
                }
            }
        }

        table.plan = Some(resolution.plan.clone());
        Ok(resolution)
    }

    /// Start every plugin of `plan` in plan order.
    pub async fn activate_all(
        &self,
        plan: &ActivationPlan,
    ) -> Result<ActivationSummary, PluginSystemError> {
        self.activate_all_with_cancel(plan, CancellationToken::new()).await
    }

    /// Start every plugin of `plan` in plan order, checking `cancel` between
    /// plugins.
    ///
    /// Plugins whose initial state is `installed` are left dormant. Plugins
    /// already active are left alone. On a failed start hook or cancellation
    /// the plugins started by this call are stopped in reverse order and the
    /// error reports how many were unwound.
    pub async fn activate_all_with_cancel(
        &self,
        plan: &ActivationPlan,
        cancel: CancellationToken,
    ) -> Result<ActivationSummary, PluginSystemError> {
        let _run = self.run_lock.lock().await;
        let mut summary = ActivationSummary::default();
        log::info!("Activating {} plugin(s)", plan.len());

        for id in plan.iter() {
            if cancel.is_cancelled() {
                log::warn!("Activation cancelled before '{}'", id);
                let unwound = self.unwind(&summary.started).await;
                return Err(PluginSystemError::ActivationCancelled { unwound });
            }

            let lookup = {
                let table = self.table.read().await;
                table.entry(id).map(|e| {
                    (
                        e.machine.state(),
                        e.descriptor.initial_state(),
                        table.inactive_dependency(id),
                    )
                })
            };
            let (state, initial_state, inactive_dependency) = match lookup {
                Ok(found) => found,
                Err(e) => {
                    self.unwind(&summary.started).await;
                    return Err(e);
                }
            };

            match state {
                PluginState::Active => {
                    log::debug!("Plugin '{}' is already active", id);
                    continue;
                }
                PluginState::Resolved if initial_state == InitialState::Installed => {
                    log::info!("Plugin '{}' stays dormant (initial state installed)", id);
                    summary.dormant.push(id.to_string());
                    continue;
                }
                PluginState::Resolved => {
                    if let Some(dependency) = inactive_dependency {
                        log::info!(
                            "Plugin '{}' stays dormant (dependency '{}' is not active)",
                            id,
                            dependency
                        );
                        summary.dormant.push(id.to_string());
                        continue;
                    }
                }
                PluginState::Installed
                | PluginState::Starting
                | PluginState::Stopping
                | PluginState::Uninstalled => {
                    let unwound = self.unwind(&summary.started).await;
                    log::error!(
                        "Plugin '{}' cannot start from {} ({} unwound)",
                        id,
                        state,
                        unwound
                    );
                    return Err(PluginSystemError::IllegalTransition {
                        plugin_id: id.to_string(),
                        source: TransitionError {
                            from: state,
                            event: LifecycleEvent::StartRequested,
                        },
                    });
                }
            }

            if let Err(error) = self.start_entry(id).await {
                let unwound = self.unwind(&summary.started).await;
                log::error!(
                    "Plugin '{}' failed to start: {}; unwound {} plugin(s)",
                    id,
                    error,
                    unwound
                );
                return Err(error.into_system(id, unwound));
            }
            summary.started.push(id.to_string());
        }

        log::info!("Activated {} plugin(s)", summary.started.len());
        Ok(summary)
    }

    /// Stop every active plugin in reverse activation order.
    ///
    /// Non-stoppable plugins are skipped and listed in the summary as
    /// refused. A plugin that still has an active dependent at its turn is
    /// held active and listed as held. Stop hook failures are logged and
    /// never abort the sequence.
    pub async fn deactivate_all(&self) -> Result<DeactivationSummary, PluginSystemError> {
        let _run = self.run_lock.lock().await;
        let mut summary = DeactivationSummary::default();

        let order: Vec<String> = {
            let table = self.table.read().await;
            table.active_order.iter().rev().cloned().collect()
        };

        for id in order {
            let (stoppable, dependents) = {
                let table = self.table.read().await;
                let entry = table.entry(&id)?;
                (entry.descriptor.is_stoppable(), table.active_dependents(&id))
            };
            if !stoppable {
                log::warn!("{}", PluginSystemError::NotStoppable { plugin_id: id.clone() });
                summary.refused.push(id);
                continue;
            }
            if !dependents.is_empty() {
                log::warn!(
                    "{}",
                    PluginSystemError::DependentsActive {
                        plugin_id: id.clone(),
                        dependents,
                    }
                );
                summary.held.push(id);
                continue;
            }
            self.stop_entry(&id).await?;
            summary.stopped.push(id);
        }
        Ok(summary)
    }

    /// Start one resolved plugin whose dependencies are all active.
    ///
    /// Unlike [`activate_all`](Self::activate_all) this also starts plugins
    /// whose initial state is `installed`.
    pub async fn start(&self, id: &str) -> Result<(), PluginSystemError> {
        let _run = self.run_lock.lock().await;
        {
            let table = self.table.read().await;
            table.entry(id)?;
            if let Some(dependency) = table.inactive_dependency(id) {
                return Err(PluginSystemError::DependencyNotActive {
                    plugin_id: id.to_string(),
                    dependency,
                });
            }
        }
        self.start_entry(id).await.map_err(|error| error.into_system(id, 0))
    }

    /// Stop one active plugin.
    ///
    /// Refused with `NotStoppable` for plugins configured `stoppable = false`
    /// and with `DependentsActive` while plugins depending on it are active.
    /// Neither refusal changes any state.
    pub async fn stop(&self, id: &str) -> Result<(), PluginSystemError> {
        let _run = self.run_lock.lock().await;
        self.check_stoppable(id).await?;
        self.stop_entry(id).await
    }

    /// Remove a plugin for good. An active plugin is stopped first.
    pub async fn uninstall(&self, id: &str) -> Result<(), PluginSystemError> {
        let _run = self.run_lock.lock().await;
        let state = {
            let table = self.table.read().await;
            table.entry(id)?.machine.state()
        };
        if state == PluginState::Active {
            self.check_stoppable(id).await?;
            self.stop_entry(id).await?;
        }

        let mut table = self.table.write().await;
        table.fire(id, LifecycleEvent::UninstallRequested)?;
        table.entries.remove(id);
        table.uninstalled.insert(id.to_string());
        if let Some(plan) = table.plan.take() {
            table.plan = Some(ActivationPlan::new(
                plan.iter().filter(|p| *p != id).map(str::to_string).collect(),
            ));
        }
        log::info!("Uninstalled plugin '{}'", id);
        Ok(())
    }

    /// Current state of `id`, `None` if it was never installed
    pub async fn state_of(&self, id: &str) -> Option<PluginState> {
        let table = self.table.read().await;
        match table.entries.get(id) {
            Some(entry) => Some(entry.machine.state()),
            None if table.uninstalled.contains(id) => Some(PluginState::Uninstalled),
            None => None,
        }
    }

    /// Ids of the active plugins in the order they became active
    pub async fn list_active(&self) -> Vec<String> {
        self.table.read().await.active_order.clone()
    }

    /// The plan of the last resolution pass
    pub async fn plan(&self) -> Option<ActivationPlan> {
        self.table.read().await.plan.clone()
    }

    pub async fn descriptor(&self, id: &str) -> Option<PluginDescriptor> {
        self.table.read().await.entries.get(id).map(|e| e.descriptor.clone())
    }

    /// Installed plugin ids with their states, sorted by id
    pub async fn states(&self) -> Vec<(String, PluginState)> {
        self.table
            .read()
            .await
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.machine.state()))
            .collect()
    }

    async fn check_stoppable(&self, id: &str) -> Result<(), PluginSystemError> {
        let table = self.table.read().await;
        let entry = table.entry(id)?;
        let state = entry.machine.state();
        if state != PluginState::Active {
            return Err(PluginSystemError::IllegalTransition {
                plugin_id: id.to_string(),
                source: TransitionError {
                    from: state,
                    event: LifecycleEvent::StopRequested,
                },
            });
        }
        if !entry.descriptor.is_stoppable() {
            return Err(PluginSystemError::NotStoppable {
                plugin_id: id.to_string(),
            });
        }
        let dependents = table.active_dependents(id);
        if !dependents.is_empty() {
            return Err(PluginSystemError::DependentsActive {
                plugin_id: id.to_string(),
                dependents,
            });
        }
        Ok(())
    }

    /// Resolved -> Starting -> Active, or back to Resolved if the hook fails.
    async fn start_entry(&self, id: &str) -> Result<(), StartError> {
        let (activator, context) = {
            let mut table = self.table.write().await;
            table.fire(id, LifecycleEvent::StartRequested)?;
            table.context(id)?
        };

        log::debug!("Starting plugin '{}'", id);
        match self.invoke_hook(activator, context, HookKind::Start).await {
            Ok(()) => {
                self.table.write().await.fire(id, LifecycleEvent::StartSucceeded)?;
                log::info!("Plugin '{}' is active", id);
                Ok(())
            }
            Err(hook_error) => {
                self.table.write().await.fire(id, LifecycleEvent::StartFailed)?;
                Err(StartError::Hook(hook_error))
            }
        }
    }

    /// Active -> Stopping -> Resolved. A failing stop hook is only logged.
    async fn stop_entry(&self, id: &str) -> Result<(), PluginSystemError> {
        let (activator, context) = {
            let mut table = self.table.write().await;
            table.fire(id, LifecycleEvent::StopRequested)?;
            table.context(id)?
        };

        log::debug!("Stopping plugin '{}'", id);
        if let Err(e) = self.invoke_hook(activator, context, HookKind::Stop).await {
            log::warn!("Plugin '{}' reported an error while stopping: {}", id, e);
        }
        self.table.write().await.fire(id, LifecycleEvent::StopCompleted)?;
        log::info!("Plugin '{}' stopped", id);
        Ok(())
    }

    /// Stop `started` in reverse order regardless of stoppability. Returns
    /// the number of plugins stopped.
    async fn unwind(&self, started: &[String]) -> usize {
        let mut unwound = 0;
        for id in started.iter().rev() {
            match self.stop_entry(id).await {
                Ok(()) => unwound += 1,
                Err(e) => log::error!("Failed to unwind plugin '{}': {}", id, e),
            }
        }
        unwound
    }

    /// Run a hook on its own task so that a panic or a timeout in plugin code
    /// surfaces as a [`HookError`].
    async fn invoke_hook(
        &self,
        activator: Arc<dyn Activator>,
        context: PluginContext,
        hook: HookKind,
    ) -> Result<(), HookError> {
        let mut handle = tokio::spawn(async move {
            match hook {
                HookKind::Start => activator.on_start(&context).await,
                HookKind::Stop => activator.on_stop(&context).await,
            }
        });

        match tokio::time::timeout(self.hook_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => {
                Err(HookError::new(format!("{} panicked", hook)))
            }
            Ok(Err(join_error)) => {
                Err(HookError::new(format!("{} was aborted: {}", hook, join_error)))
            }
            Err(_) => {
                handle.abort();
                Err(HookError::new(format!(
                    "{} timed out after {} ms",
                    hook,
                    self.hook_timeout.as_millis()
                )))
            }
        }
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_millis(constants::DEFAULT_HOOK_TIMEOUT_MS))
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("hook_timeout", &self.hook_timeout)
            .finish_non_exhaustive()
    }
}

/// Start failure inside the coordinator: plugin code failed or the state table refused
#[derive(Debug, thiserror::Error)]
enum StartError {
    #[error(transparent)]
    Hook(HookError),
    #[error(transparent)]
    System(#[from] PluginSystemError),
}

impl StartError {
    fn into_system(self, plugin_id: &str, unwound: usize) -> PluginSystemError {
        match self {
            StartError::Hook(cause) => PluginSystemError::ActivationFailure {
                plugin_id: plugin_id.to_string(),
                hook: HookKind::Start,
                cause: cause.to_string(),
                unwound,
            },
            StartError::System(error) => error,
        }
    }
}
