//! # Strata Core Dependency Resolver
//!
//! Turns a set of [`PluginDescriptor`]s into an [`ActivationPlan`] plus a
//! [`ResolutionReport`]:
//!
//! 1. ids are checked for uniqueness (a duplicate aborts the pass),
//! 2. every constraint is evaluated against the set,
//! 3. satisfied constraints become graph edges `dependent -> dependency`,
//! 4. strongly connected components are found with Tarjan's depth-first
//!    search; every component that forms a cycle is excluded,
//! 5. anything depending on an excluded plugin is excluded too,
//! 6. the rest is ordered with Kahn's algorithm, ready nodes taken by
//!    ascending start level and then id.
//!
//! A pass never mutates the descriptors it is given; verdicts live in the
//! returned report.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::plugin_system::dependency::{ConstraintVerdict, DependencyError, ResolveState};
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;

/// Ordered plugin ids, dependencies before dependents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationPlan {
    order: Vec<String>,
}

impl ActivationPlan {
    pub fn new(order: Vec<String>) -> Self {
        Self { order }
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Plan order reversed, the order for stopping
    pub fn reversed(&self) -> impl Iterator<Item = &str> {
        self.iter().rev()
    }
}

/// Why a plugin was left out of the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A constraint's target is missing or too old
    UnsatisfiedDependency,
    /// The plugin is on a dependency cycle
    CircularDependency,
    /// The plugin depends on another plugin that was left out
    ExcludedDependency,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnsatisfiedDependency => write!(f, "unsatisfied dependency"),
            FailureKind::CircularDependency => write!(f, "circular dependency"),
            FailureKind::ExcludedDependency => write!(f, "excluded dependency"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

/// All reasons one plugin could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionFailure {
    pub plugin_id: String,
    pub causes: Vec<FailureCause>,
}

impl ResolutionFailure {
    fn new(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            causes: Vec::new(),
        }
    }

    fn push(&mut self, kind: FailureKind, error: &DependencyError) {
        self.causes.push(FailureCause {
            kind,
            message: error.to_string(),
        });
    }

    /// The first recorded kind, which is the root reason for exclusion
    pub fn kind(&self) -> Option<FailureKind> {
        self.causes.first().map(|c| c.kind)
    }

    pub fn has_kind(&self, kind: FailureKind) -> bool {
        self.causes.iter().any(|c| c.kind == kind)
    }
}

/// Per-plugin failures and per-constraint verdicts of one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    failures: Vec<ResolutionFailure>,
    cycles: Vec<Vec<String>>,
    verdicts: Vec<ConstraintVerdict>,
}

impl ResolutionReport {
    /// True when every plugin made it into the plan
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures sorted by plugin id
    pub fn failures(&self) -> &[ResolutionFailure] {
        &self.failures
    }

    pub fn failure_for(&self, plugin_id: &str) -> Option<&ResolutionFailure> {
        self.failures.iter().find(|f| f.plugin_id == plugin_id)
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.plugin_id.as_str()).collect()
    }

    /// Member ids of every detected cycle, each sorted
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn verdicts(&self) -> &[ConstraintVerdict] {
        &self.verdicts
    }

    pub fn verdicts_for(&self, plugin_id: &str) -> impl Iterator<Item = &ConstraintVerdict> {
        self.verdicts.iter().filter(move |v| v.owner_id == plugin_id)
    }

    /// The report as typed errors: one `UnsatisfiedDependency` per failed
    /// constraint and one `CircularDependency` per cycle.
    pub fn to_errors(&self) -> Vec<PluginSystemError> {
        let unsatisfied = self
            .verdicts
            .iter()
            .filter(|v| v.state == ResolveState::Failed)
            .map(|v| PluginSystemError::UnsatisfiedDependency {
                plugin_id: v.owner_id.clone(),
                cause: v.cause.clone(),
            });
        let cycles = self
            .cycles
            .iter()
            .map(|members| PluginSystemError::CircularDependency {
                members: members.clone(),
            });
        unsatisfied.chain(cycles).collect()
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "all plugins resolved");
        }
        for failure in &self.failures {
            writeln!(f, "plugin '{}' cannot be resolved:", failure.plugin_id)?;
            for cause in &failure.causes {
                writeln!(f, "  - [{}] {}", cause.kind, cause.message)?;
            }
        }
        Ok(())
    }
}

/// Result of a successful resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub plan: ActivationPlan,
    pub report: ResolutionReport,
}

/// Stateless dependency graph resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `descriptors` into an activation plan.
    ///
    /// Only structural problems are errors; unsatisfied and cyclic
    /// dependencies are recorded in the report and the unaffected plugins
    /// still get a plan.
    pub fn resolve(&self, descriptors: &[PluginDescriptor]) -> Result<Resolution, PluginSystemError> {
        let by_id = index_descriptors(descriptors)?;
        log::debug!("Resolving {} plugin descriptor(s)", by_id.len());

        let mut failures: BTreeMap<&str, ResolutionFailure> = BTreeMap::new();
        let mut verdicts = Vec::new();
        let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (&id, descriptor) in &by_id {
            let deps = edges.entry(id).or_default();
            for (index, constraint) in descriptor.dependencies().iter().enumerate() {
                let mut verdict = ConstraintVerdict::pending(id, index, constraint);
                let outcome = match by_id.get(constraint.target_id()) {
                    None => Err(DependencyError::MissingPlugin(constraint.target_id().to_string())),
                    Some(candidate) if !constraint.is_satisfied_by(candidate) => {
                        Err(DependencyError::IncompatibleVersion {
                            plugin_id: constraint.target_id().to_string(),
                            required: constraint.min_version().clone(),
                            found: candidate.version().clone(),
                        })
                    }
                    Some(candidate) => Ok(candidate.id()),
                };
                match outcome {
                    Ok(target) => {
                        verdict.mark_succeeded();
                        deps.push(target);
                    }
                    Err(error) => {
                        log::debug!("Plugin '{}': {}", id, error);
                        verdict.mark_failed(error.to_string());
                        failures
                            .entry(id)
                            .or_insert_with(|| ResolutionFailure::new(id))
                            .push(FailureKind::UnsatisfiedDependency, &error);
                    }
                }
                verdicts.push(verdict);
            }
            deps.sort_unstable();
            deps.dedup();
        }

        let cycles = find_cycles(&edges);
        for members in &cycles {
            let error = DependencyError::CyclicDependency(members.iter().map(|m| m.to_string()).collect());
            log::warn!("{}", error);
            for &member in members {
                failures
                    .entry(member)
                    .or_insert_with(|| ResolutionFailure::new(member))
                    .push(FailureKind::CircularDependency, &error);
            }
        }

        exclude_dependents(&edges, &mut failures);

        let order = topological_order(&by_id, &edges, &failures);
        log::info!(
            "Resolved {} of {} plugin(s): [{}]",
            order.len(),
            by_id.len(),
            order.join(", ")
        );

        Ok(Resolution {
            plan: ActivationPlan::new(order),
            report: ResolutionReport {
                failures: failures.into_values().collect(),
                cycles: cycles
                    .into_iter()
                    .map(|members| members.into_iter().map(str::to_string).collect())
                    .collect(),
                verdicts,
            },
        })
    }
}

/// Index descriptors by id, rejecting blank and duplicate ids
fn index_descriptors(descriptors: &[PluginDescriptor]) -> Result<BTreeMap<&str, &PluginDescriptor>, PluginSystemError> {
    let mut by_id = BTreeMap::new();
    for descriptor in descriptors {
        if descriptor.id().trim().is_empty() {
            return Err(PluginSystemError::InvalidDescriptor {
                plugin_id: descriptor.id().to_string(),
                message: "plugin id can not be empty".to_string(),
            });
        }
        if by_id.insert(descriptor.id(), descriptor).is_some() {
            return Err(PluginSystemError::DuplicateIdentity {
                plugin_id: descriptor.id().to_string(),
            });
        }
    }
    Ok(by_id)
}

/// Tarjan's strongly connected components over `edges`, keeping only the
/// components that contain a cycle (more than one member, or a self edge).
fn find_cycles<'a>(edges: &BTreeMap<&'a str, Vec<&'a str>>) -> Vec<Vec<&'a str>> {
    struct Search<'g, 'a> {
        edges: &'g BTreeMap<&'a str, Vec<&'a str>>,
        next_index: usize,
        index: HashMap<&'a str, usize>,
        lowlink: HashMap<&'a str, usize>,
        stack: Vec<&'a str>,
        on_stack: HashSet<&'a str>,
        cycles: Vec<Vec<&'a str>>,
    }

    impl<'g, 'a> Search<'g, 'a> {
        fn visit(&mut self, node: &'a str) {
            self.index.insert(node, self.next_index);
            self.lowlink.insert(node, self.next_index);
            self.next_index += 1;
            self.stack.push(node);
            self.on_stack.insert(node);

            let edges = self.edges;
            let deps = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
            for &dep in deps {
                if !self.index.contains_key(dep) {
                    self.visit(dep);
                    let low = self.lowlink[node].min(self.lowlink[dep]);
                    self.lowlink.insert(node, low);
                } else if self.on_stack.contains(dep) {
                    let low = self.lowlink[node].min(self.index[dep]);
                    self.lowlink.insert(node, low);
                }
            }

            if self.lowlink[node] == self.index[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.remove(member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                if component.len() > 1 || deps.contains(&node) {
                    component.sort_unstable();
                    self.cycles.push(component);
                }
            }
        }
    }

    let mut search = Search {
        edges,
        next_index: 0,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        cycles: Vec::new(),
    };
    for &node in edges.keys() {
        if !search.index.contains_key(node) {
            search.visit(node);
        }
    }
    search.cycles.sort();
    search.cycles
}

/// Exclude every plugin that depends, directly or transitively, on a plugin
/// already in `failures`.
fn exclude_dependents<'a>(
    edges: &BTreeMap<&'a str, Vec<&'a str>>,
    failures: &mut BTreeMap<&'a str, ResolutionFailure>,
) {
    let mut changed = true;
    while changed {
        changed = false;
        for (&id, deps) in edges {
            if failures.contains_key(id) {
                continue;
            }
            let excluded: Vec<&str> = deps.iter().copied().filter(|d| failures.contains_key(d)).collect();
            if excluded.is_empty() {
                continue;
            }
            let failure = failures.entry(id).or_insert_with(|| ResolutionFailure::new(id));
            for dep in excluded {
                failure.push(
                    FailureKind::ExcludedDependency,
                    &DependencyError::Unresolvable(dep.to_string()),
                );
            }
            changed = true;
        }
    }
}

/// Kahn's algorithm over the plugins not in `failures`. Among plugins whose
/// dependencies are all placed, the lowest (start level, id) goes next.
fn topological_order(
    by_id: &BTreeMap<&str, &PluginDescriptor>,
    edges: &BTreeMap<&str, Vec<&str>>,
    failures: &BTreeMap<&str, ResolutionFailure>,
) -> Vec<String> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut ready: BTreeSet<(i32, &str)> = BTreeSet::new();

    for (&id, deps) in edges {
        if failures.contains_key(id) {
            continue;
        }
        pending.insert(id, deps.len());
        for &dep in deps {
            dependents.entry(dep).or_default().push(id);
        }
        if deps.is_empty() {
            ready.insert((by_id[id].start_level(), id));
        }
    }

    let mut order = Vec::with_capacity(pending.len());
    while let Some((_, id)) = ready.pop_first() {
        order.push(id.to_string());
        for &dependent in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert((by_id[dependent].start_level(), dependent));
                }
            }
        }
    }
    order
}
