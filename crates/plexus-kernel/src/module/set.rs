//! Immutable module set snapshots.
//!
//! A [`ModuleSet`] is never mutated. Every load or unload derives a successor
//! through [`ModuleSet::with_module`], [`ModuleSet::with_enabled`] or
//! [`ModuleSet::without_module`], bumping the generation. Configuration
//! problems exclude the offending modules and are kept in [`ModuleSet::rejected`].
//!
//! Exclusion only applies to modules entering the set. A member carried over
//! from the previous generation whose required dependency went away stays a
//! member; it is simply not enabled until the dependency returns.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::descriptor::{ModuleDependency, ModuleDescriptor};
use super::graph::{DependencyGraph, TopologicalOrder};
use super::ModuleId;
use crate::error::ConfigurationError;

/// 模块集合的可持久化投影
/// Serializable projection of a module set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSetState {
    pub enabled: Vec<ModuleId>,
    pub disabled: Vec<ModuleId>,
}

/// A sub-descriptor wired in on behalf of an optional dependency.
#[derive(Debug, Clone)]
pub struct OptionalContribution {
    /// Top-level member holding the dependency.
    pub dependent: Arc<ModuleDescriptor>,
    /// The member or content module whose descriptor declares it.
    pub declared_by: ModuleId,
    pub sub: Arc<ModuleDescriptor>,
}

/// 模块集合快照
/// Immutable snapshot of every known module
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    generation: u64,
    descriptors: BTreeMap<ModuleId, Arc<ModuleDescriptor>>,
    /// content module id -> (owner id, descriptor)
    content: HashMap<ModuleId, (ModuleId, Arc<ModuleDescriptor>)>,
    /// Ids the caller asked to enable.
    requested: BTreeSet<ModuleId>,
    /// Requested ids whose required dependencies are all effectively enabled.
    effective: BTreeSet<ModuleId>,
    graph: DependencyGraph,
    rejected: Vec<ConfigurationError>,
}

impl ModuleSet {
    /// Build the first generation.
    pub fn build(
        descriptors: impl IntoIterator<Item = Arc<ModuleDescriptor>>,
        enabled: impl IntoIterator<Item = ModuleId>,
    ) -> Self {
        Self::assemble(
            0,
            descriptors.into_iter().collect(),
            enabled.into_iter().collect(),
            Vec::new(),
            &BTreeSet::new(),
        )
    }

    /// `established` members are never excluded for an unresolved dependency.
    fn assemble(
        generation: u64,
        descriptors: Vec<Arc<ModuleDescriptor>>,
        requested: BTreeSet<ModuleId>,
        mut rejected: Vec<ConfigurationError>,
        established: &BTreeSet<ModuleId>,
    ) -> Self {
        let mut members: BTreeMap<ModuleId, Arc<ModuleDescriptor>> = BTreeMap::new();
        let mut seen: BTreeSet<ModuleId> = BTreeSet::new();
        for descriptor in descriptors {
            let clashes = std::iter::once(&descriptor.id)
                .chain(descriptor.content_modules.iter().map(|c| &c.id))
                .any(|id| seen.contains(id));
            if clashes {
                warn!(module = %descriptor.id, "Duplicate module id, keeping the first declaration");
                push_unique(&mut rejected, ConfigurationError::DuplicateModule(descriptor.id.clone()));
                continue;
            }
            seen.insert(descriptor.id.clone());
            seen.extend(descriptor.content_modules.iter().map(|c| c.id.clone()));
            members.insert(descriptor.id.clone(), descriptor);
        }

        // Exclude cycles and unresolved modules until nothing else falls out.
        let graph = loop {
            let graph = DependencyGraph::build(members.values());
            let owner = |id: &ModuleId| graph.owner_of(id).cloned().unwrap_or_else(|| id.clone());
            let mut excluded: BTreeSet<ModuleId> = BTreeSet::new();

            for members_of_cycle in graph.cycles() {
                warn!(members = ?members_of_cycle, "Cyclic module dependency, excluding members");
                excluded.extend(members_of_cycle.iter().map(&owner));
                push_unique(
                    &mut rejected,
                    ConfigurationError::CyclicDependency { members: members_of_cycle },
                );
            }
            for (module, dependency) in graph.unresolved() {
                if established.contains(&owner(module)) {
                    debug!(module = %module, dependency = %dependency, "Required dependency gone, module stays disabled");
                    continue;
                }
                warn!(module = %module, dependency = %dependency, "Required dependency missing, excluding module");
                excluded.insert(owner(module));
                push_unique(
                    &mut rejected,
                    ConfigurationError::MissingDependency {
                        module: module.clone(),
                        dependency: dependency.clone(),
                    },
                );
            }

            if excluded.is_empty() {
                break graph;
            }
            members.retain(|id, _| !excluded.contains(id));
        };

        let content = members
            .values()
            .flat_map(|owner| {
                owner
                    .content_modules
                    .iter()
                    .map(|c| (c.id.clone(), (owner.id.clone(), Arc::clone(c))))
            })
            .collect();

        let requested: BTreeSet<ModuleId> = requested
            .into_iter()
            .filter(|id| members.contains_key(id))
            .collect();

        let mut set = Self {
            generation,
            descriptors: members,
            content,
            effective: requested.clone(),
            requested,
            graph,
            rejected,
        };
        set.settle_effective();
        set
    }

    /// Drop enabled modules whose required dependencies are not effectively enabled.
    fn settle_effective(&mut self) {
        let dangling: Vec<ModuleId> = self
            .graph
            .unresolved()
            .iter()
            .map(|(module, _)| self.top_level_id(module).clone())
            .collect();
        for id in &dangling {
            self.effective.remove(id);
        }
        loop {
            let unsatisfied: Vec<ModuleId> = self
                .effective
                .iter()
                .filter(|id| {
                    let content = self.graph.content_of(id);
                    std::iter::once(*id).chain(content.iter()).any(|node| {
                        self.graph.dependencies_of(node).iter().any(|edge| {
                            if edge.optional {
                                return false;
                            }
                            let target = self.top_level_id(&edge.id);
                            target != *id && !self.effective.contains(target)
                        })
                    })
                })
                .cloned()
                .collect();

            if unsatisfied.is_empty() {
                return;
            }
            for id in unsatisfied {
                self.effective.remove(&id);
            }
        }
    }

    fn top_level_id<'a>(&'a self, id: &'a ModuleId) -> &'a ModuleId {
        self.graph.owner_of(id).unwrap_or(id)
    }

    /// Next generation. Descriptors already held by this set count as established.
    fn successor(&self, descriptors: Vec<Arc<ModuleDescriptor>>, requested: BTreeSet<ModuleId>, carried: Vec<ConfigurationError>) -> Self {
        let established: BTreeSet<ModuleId> = descriptors
            .iter()
            .filter(|d| self.descriptors.get(&d.id).is_some_and(|known| Arc::ptr_eq(known, d)))
            .map(|d| d.id.clone())
            .collect();
        Self::assemble(self.generation + 1, descriptors, requested, carried, &established)
    }

    // ------------------------------------------------------------------------
    // Derivation
    // ------------------------------------------------------------------------

    /// Successor with `id` enabled or disabled.
    pub fn with_enabled(&self, id: &ModuleId, enabled: bool) -> Self {
        let mut requested = self.requested.clone();
        if enabled {
            requested.insert(id.clone());
        } else {
            requested.remove(id);
        }
        self.successor(self.descriptors.values().cloned().collect(), requested, self.rejected.clone())
    }

    /// Successor containing `descriptor`, replacing any member with the same id.
    pub fn with_module(&self, descriptor: Arc<ModuleDescriptor>, enabled: bool) -> Self {
        self.with_modules(std::iter::once(descriptor), enabled)
    }

    /// Successor containing every descriptor of `added`, replacing members with the same ids.
    ///
    /// All descriptors join in one generation, so modules that only resolve
    /// together (or form a cycle together) are judged as a group.
    pub fn with_modules(&self, added: impl IntoIterator<Item = Arc<ModuleDescriptor>>, enabled: bool) -> Self {
        let added: Vec<Arc<ModuleDescriptor>> = added.into_iter().collect();
        let ids: BTreeSet<ModuleId> = added.iter().map(|d| d.id.clone()).collect();
        let mut descriptors: Vec<Arc<ModuleDescriptor>> = self
            .descriptors
            .values()
            .filter(|d| !ids.contains(&d.id))
            .cloned()
            .collect();
        descriptors.extend(added);

        let mut requested = self.requested.clone();
        for id in &ids {
            if enabled {
                requested.insert(id.clone());
            } else {
                requested.remove(id);
            }
        }
        let carried = self
            .rejected
            .iter()
            .filter(|e| !e.affected_modules().iter().any(|m| ids.contains(*m)))
            .cloned()
            .collect();
        self.successor(descriptors, requested, carried)
    }

    /// Successor without `id`.
    pub fn without_module(&self, id: &ModuleId) -> Self {
        let descriptors = self
            .descriptors
            .values()
            .filter(|d| &d.id != id)
            .cloned()
            .collect();
        let mut requested = self.requested.clone();
        requested.remove(id);
        self.successor(descriptors, requested, self.rejected.clone())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Member or content module with this id.
    pub fn get(&self, id: &ModuleId) -> Option<&Arc<ModuleDescriptor>> {
        self.descriptors
            .get(id)
            .or_else(|| self.content.get(id).map(|(_, d)| d))
    }

    /// Whether `id` is a top-level member.
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.descriptors.contains_key(id)
    }

    /// Whether `id` resolves to a member or to a content module of a member.
    pub fn resolves(&self, id: &ModuleId) -> bool {
        self.descriptors.contains_key(id) || self.content.contains_key(id)
    }

    pub fn owner_of(&self, id: &ModuleId) -> Option<&ModuleId> {
        self.content.get(id).map(|(owner, _)| owner)
    }

    /// Effectively enabled. A content module is enabled when its owner is.
    pub fn is_enabled(&self, id: &ModuleId) -> bool {
        self.effective.contains(self.top_level_id(id))
    }

    /// The caller asked for this module to be enabled, whether or not its dependencies allow it.
    pub fn is_requested(&self, id: &ModuleId) -> bool {
        self.requested.contains(id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.descriptors.values()
    }

    pub fn enabled_descriptors(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.descriptors
            .values()
            .filter(|d| self.effective.contains(&d.id))
    }

    pub fn enabled_ids(&self) -> &BTreeSet<ModuleId> {
        &self.effective
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Configuration errors that excluded modules, in detection order.
    pub fn rejected(&self) -> &[ConfigurationError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn state(&self) -> ModuleSetState {
        let (enabled, disabled) = self
            .descriptors
            .keys()
            .cloned()
            .partition(|id| self.requested.contains(id));
        ModuleSetState { enabled, disabled }
    }

    /// Ordering for `batch`. Batch members absent from the set are placed in an
    /// overlay graph together with the current members.
    pub fn ordering_for(&self, batch: &[Arc<ModuleDescriptor>]) -> TopologicalOrder {
        let batch_ids: BTreeSet<ModuleId> = batch
            .iter()
            .flat_map(|d| std::iter::once(d.id.clone()).chain(d.content_modules.iter().map(|c| c.id.clone())))
            .collect();

        let all_known = batch
            .iter()
            .all(|d| self.descriptors.get(&d.id).is_some_and(|known| Arc::ptr_eq(known, d)));
        if all_known {
            return TopologicalOrder::new(&self.graph, &batch_ids);
        }

        let mut overlay: BTreeMap<ModuleId, Arc<ModuleDescriptor>> = self.descriptors.clone();
        for descriptor in batch {
            overlay.insert(descriptor.id.clone(), Arc::clone(descriptor));
        }
        let graph = DependencyGraph::build(overlay.values());
        TopologicalOrder::new(&graph, &batch_ids)
    }

    /// Sub-descriptors of loaded modules that optionally depend on `id`.
    ///
    /// Returned in dependent id order. Nested sub-descriptors are only
    /// followed when their enclosing target is loaded.
    pub fn loaded_optional_dependents(&self, id: &ModuleId) -> Vec<OptionalContribution> {
        let mut found = Vec::new();
        for dependent in self.enabled_descriptors() {
            if &dependent.id == id {
                continue;
            }
            let roots = std::iter::once(dependent).chain(dependent.content_modules.iter());
            for root in roots {
                let mut stack: Vec<&ModuleDependency> = root.dependencies.iter().rev().collect();
                while let Some(dependency) = stack.pop() {
                    let Some(sub) = &dependency.sub_descriptor else {
                        continue;
                    };
                    if &dependency.target == id {
                        found.push(OptionalContribution {
                            dependent: Arc::clone(dependent),
                            declared_by: root.id.clone(),
                            sub: Arc::clone(sub),
                        });
                    } else if self.is_enabled(&dependency.target) {
                        stack.extend(sub.dependencies.iter().rev());
                    }
                }
            }
        }
        found
    }

    /// `(target, sub_descriptor)` pairs of `descriptor` whose target is loaded, outermost first.
    pub fn loaded_sub_descriptors(&self, descriptor: &ModuleDescriptor) -> Vec<(ModuleId, Arc<ModuleDescriptor>)> {
        let mut found = Vec::new();
        let mut stack: Vec<&ModuleDependency> = descriptor.dependencies.iter().rev().collect();
        while let Some(dependency) = stack.pop() {
            let Some(sub) = &dependency.sub_descriptor else {
                continue;
            };
            if self.is_enabled(&dependency.target) {
                found.push((dependency.target.clone(), Arc::clone(sub)));
                stack.extend(sub.dependencies.iter().rev());
            }
        }
        found
    }

    /// Implementation-detail members with a required dependency on `id`.
    pub fn implementation_detail_dependents(&self, id: &ModuleId) -> Vec<Arc<ModuleDescriptor>> {
        self.graph
            .dependents_of(id)
            .iter()
            .filter(|edge| !edge.optional)
            .filter_map(|edge| self.descriptors.get(&edge.id))
            .filter(|d| d.implementation_detail)
            .cloned()
            .collect()
    }
}

impl TopologicalOrder {
    /// Order `batch` against the dependency relation of `set`.
    pub fn for_batch(set: &ModuleSet, batch: &[Arc<ModuleDescriptor>]) -> Self {
        set.ordering_for(batch)
    }
}

fn push_unique(errors: &mut Vec<ConfigurationError>, error: ConfigurationError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}
