//! Dependency graph over a module set and the topological orderer built on it.
//!
//! The graph is derived, never stored on its own: a [`ModuleSet`](super::ModuleSet)
//! materializes it once at construction. Nodes are modules plus their content
//! modules. Edges point from a module to what it depends on; content modules
//! always carry a required edge to their owner.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use super::descriptor::{ModuleDependency, ModuleDescriptor};
use super::ModuleId;

/// One adjacency entry. In `dependencies` the id is the dependency target, in
/// `dependents` it is the dependent module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub id: ModuleId,
    pub optional: bool,
}

/// Materialized adjacency lists for a set of descriptors.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<ModuleId>,
    dependencies: HashMap<ModuleId, Vec<Edge>>,
    dependents: HashMap<ModuleId, Vec<Edge>>,
    content_of: HashMap<ModuleId, Vec<ModuleId>>,
    owner_of: HashMap<ModuleId, ModuleId>,
    /// (module, required target that is not a node)
    unresolved: Vec<(ModuleId, ModuleId)>,
}

impl DependencyGraph {
    /// Build the graph. Iteration order of `descriptors` determines adjacency order,
    /// so callers pass them sorted by id.
    pub fn build<'a>(descriptors: impl IntoIterator<Item = &'a Arc<ModuleDescriptor>>) -> Self {
        let descriptors: Vec<&Arc<ModuleDescriptor>> = descriptors.into_iter().collect();
        let mut graph = Self::default();

        for descriptor in &descriptors {
            graph.nodes.insert(descriptor.id.clone());
            for content in &descriptor.content_modules {
                graph.nodes.insert(content.id.clone());
                graph.owner_of.insert(content.id.clone(), descriptor.id.clone());
                graph
                    .content_of
                    .entry(descriptor.id.clone())
                    .or_default()
                    .push(content.id.clone());
            }
        }

        for descriptor in &descriptors {
            graph.add_edges(descriptor, None);
            for content in &descriptor.content_modules {
                graph.add_edges(content, Some(&descriptor.id));
            }
        }

        graph
    }

    fn add_edges(&mut self, descriptor: &ModuleDescriptor, owner: Option<&ModuleId>) {
        // target -> optional; a required declaration wins over an optional one
        let mut edges: BTreeMap<ModuleId, bool> = BTreeMap::new();
        if let Some(owner) = owner {
            edges.insert(owner.clone(), false);
        }

        // Dependencies declared inside sub-descriptors only matter while the
        // enclosing optional dependency is loaded, so they are optional edges.
        let mut stack: Vec<(&ModuleDependency, bool)> =
            descriptor.dependencies.iter().map(|d| (d, false)).collect();
        while let Some((dependency, nested)) = stack.pop() {
            let optional = dependency.optional || nested;
            edges
                .entry(dependency.target.clone())
                .and_modify(|o| *o = *o && optional)
                .or_insert(optional);
            if let Some(sub) = &dependency.sub_descriptor {
                stack.extend(sub.dependencies.iter().map(|d| (d, true)));
            }
        }

        for (target, optional) in edges {
            if self.nodes.contains(&target) {
                self.dependents.entry(target.clone()).or_default().push(Edge {
                    id: descriptor.id.clone(),
                    optional,
                });
                self.dependencies
                    .entry(descriptor.id.clone())
                    .or_default()
                    .push(Edge { id: target, optional });
            } else if !optional {
                self.unresolved.push((descriptor.id.clone(), target));
            }
        }
    }

    pub fn nodes(&self) -> &BTreeSet<ModuleId> {
        &self.nodes
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains(id)
    }

    pub fn dependencies_of(&self, id: &ModuleId) -> &[Edge] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &ModuleId) -> &[Edge] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Modules holding an optional edge to `id`.
    pub fn optional_dependents_of<'a>(&'a self, id: &ModuleId) -> impl Iterator<Item = &'a ModuleId> {
        self.dependents_of(id)
            .iter()
            .filter(|edge| edge.optional)
            .map(|edge| &edge.id)
    }

    pub fn content_of(&self, id: &ModuleId) -> &[ModuleId] {
        self.content_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owner_of(&self, id: &ModuleId) -> Option<&ModuleId> {
        self.owner_of.get(id)
    }

    /// Required dependencies that do not resolve to any node.
    pub fn unresolved(&self) -> &[(ModuleId, ModuleId)] {
        &self.unresolved
    }

    /// Every module that depends on `id`, directly or transitively, sorted by id.
    pub fn transitive_dependents(&self, id: &ModuleId, include_optional: bool) -> Vec<ModuleId> {
        let mut seen: BTreeSet<ModuleId> = BTreeSet::new();
        let mut queue: VecDeque<&ModuleId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for edge in self.dependents_of(current) {
                if edge.optional && !include_optional {
                    continue;
                }
                if &edge.id != id && seen.insert(edge.id.clone()) {
                    queue.push_back(&edge.id);
                }
            }
        }

        seen.into_iter().collect()
    }

    /// Strongly connected components that form cycles (size > 1, or a self edge).
    ///
    /// Iterative Tarjan so deep chains do not exhaust the stack.
    pub fn cycles(&self) -> Vec<Vec<ModuleId>> {
        let ids: Vec<&ModuleId> = self.nodes.iter().collect();
        let index_of: HashMap<&ModuleId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let adjacency: Vec<Vec<usize>> = ids
            .iter()
            .map(|id| {
                self.dependencies_of(id)
                    .iter()
                    .filter_map(|edge| index_of.get(&edge.id).copied())
                    .collect()
            })
            .collect();

        const UNVISITED: usize = usize::MAX;
        let n = ids.len();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0usize;
        let mut cycles = Vec::new();

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            low[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut work: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = work.last_mut() {
                let v = frame.0;
                if frame.1 < adjacency[v].len() {
                    let w = adjacency[v][frame.1];
                    frame.1 += 1;
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        low[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                work.pop();
                if let Some(parent) = work.last() {
                    let p = parent.0;
                    low[p] = low[p].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    if component.len() > 1 || adjacency[v].contains(&v) {
                        let mut members: Vec<ModuleId> =
                            component.into_iter().map(|i| ids[i].clone()).collect();
                        members.sort();
                        cycles.push(members);
                    }
                }
            }
        }

        cycles.sort();
        cycles
    }
}

// ============================================================================
// Topological ordering
// ============================================================================

/// Which way a batch is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dependencies first.
    Load,
    /// Dependents first.
    Unload,
}

/// A total order over graph nodes consistent with the dependency partial order.
///
/// Ties are broken by id. Content modules follow their owner immediately when
/// their own dependencies allow it. Optional edges only count when their target
/// is part of the batch being ordered.
#[derive(Debug, Clone, Default)]
pub struct TopologicalOrder {
    rank: HashMap<ModuleId, usize>,
}

impl TopologicalOrder {
    pub fn new(graph: &DependencyGraph, batch: &BTreeSet<ModuleId>) -> Self {
        let active = |edge: &Edge, target: &ModuleId| !edge.optional || batch.contains(target);

        let mut in_degree: HashMap<&ModuleId, usize> =
            graph.nodes.iter().map(|id| (id, 0)).collect();
        for (id, edges) in &graph.dependencies {
            let count = edges.iter().filter(|edge| active(edge, &edge.id)).count();
            if let Some(degree) = in_degree.get_mut(id) {
                *degree = count;
            }
        }

        let mut ready: BTreeSet<&ModuleId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut immediate: VecDeque<&ModuleId> = VecDeque::new();
        let mut rank: HashMap<ModuleId, usize> = HashMap::with_capacity(graph.nodes.len());

        loop {
            let next = match immediate.pop_front() {
                Some(id) => {
                    ready.remove(id);
                    id
                }
                None => match ready.pop_first() {
                    Some(id) => id,
                    None => break,
                },
            };
            rank.insert(next.clone(), rank.len());

            for edge in graph.dependents_of(next) {
                if !active(edge, next) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(&edge.id) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(&edge.id);
                    }
                }
            }
            for content in graph.content_of(next) {
                if ready.contains(content) {
                    immediate.push_back(content);
                }
            }
        }

        // Only reachable for graphs that were never validated.
        for id in &graph.nodes {
            if !rank.contains_key(id) {
                rank.insert(id.clone(), rank.len());
            }
        }

        Self { rank }
    }

    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.rank.get(id).copied()
    }

    /// Load-order comparator: dependencies before dependents.
    pub fn compare(&self, a: &ModuleId, b: &ModuleId) -> Ordering {
        match (self.rank.get(a), self.rank.get(b)) {
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    pub fn sort(&self, modules: &mut [Arc<ModuleDescriptor>], direction: Direction) {
        modules.sort_by(|a, b| {
            let ordering = self.compare(&a.id, &b.id);
            match direction {
                Direction::Load => ordering,
                Direction::Unload => ordering.reverse(),
            }
        });
    }
}
