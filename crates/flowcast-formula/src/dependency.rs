//! Dependency tracking between calculations
//!
//! An edge runs from a precedent to each calculation whose formula reads it
//! through an `R` reference. Ordering uses Tarjan's strongly connected
//! components, so every member of a cycle is found in one pass and the rest
//! of the graph still gets a valid order.

use flowcast_core::CalculationId;
use std::collections::{BTreeMap, BTreeSet};

/// Dependency graph for calculations
///
/// Edges may name calculations that are not (or no longer) nodes; such a
/// dangling precedent is ignored when ordering but keeps its dependents
/// reachable for invalidation.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: BTreeSet<CalculationId>,
    /// Calculation → calculations that depend on it (dependents)
    dependents: BTreeMap<CalculationId, BTreeSet<CalculationId>>,
    /// Calculation → calculations it depends on (precedents)
    precedents: BTreeMap<CalculationId, BTreeSet<CalculationId>>,
}

/// A safe evaluation order plus the cycles that prevent a full one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOrder {
    /// Every node, precedents before dependents; cycle members are adjacent
    pub order: Vec<CalculationId>,
    /// Each cycle's members, ascending
    pub cycles: Vec<Vec<CalculationId>>,
    cyclic: BTreeSet<CalculationId>,
}

impl EvaluationOrder {
    /// Whether `id` is part of a reference cycle
    pub fn is_cyclic(&self, id: CalculationId) -> bool {
        self.cyclic.contains(&id)
    }

    /// The cycle containing `id`, if any
    pub fn cycle_of(&self, id: CalculationId) -> Option<&[CalculationId]> {
        self.cycles
            .iter()
            .find(|cycle| cycle.contains(&id))
            .map(Vec::as_slice)
    }
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: CalculationId) {
        self.nodes.insert(id);
    }

    /// Remove a calculation and the edges to its own precedents
    ///
    /// Edges from it to its dependents stay, so a later re-added calculation
    /// with the same id is picked up again.
    pub fn remove_node(&mut self, id: CalculationId) {
        self.nodes.remove(&id);
        self.clear_precedents(id);
    }

    pub fn contains(&self, id: CalculationId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CalculationId, dependent: CalculationId) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Remove every edge into `dependent`
    pub fn clear_precedents(&mut self, dependent: CalculationId) {
        if let Some(precedents) = self.precedents.remove(&dependent) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&dependent);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
    }

    /// Replace the precedents of `dependent`
    pub fn set_precedents(
        &mut self,
        dependent: CalculationId,
        precedents: impl IntoIterator<Item = CalculationId>,
    ) {
        self.clear_precedents(dependent);
        for precedent in precedents {
            self.add_dependency(precedent, dependent);
        }
    }

    /// Get calculations that depend on the given calculation
    pub fn get_dependents(&self, id: CalculationId) -> impl Iterator<Item = CalculationId> + '_ {
        self.dependents
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get calculations that the given calculation depends on
    pub fn get_precedents(&self, id: CalculationId) -> impl Iterator<Item = CalculationId> + '_ {
        self.precedents
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// `changed` plus everything downstream of it
    pub fn transitive_dependents(&self, changed: &[CalculationId]) -> BTreeSet<CalculationId> {
        let mut seen: BTreeSet<CalculationId> = BTreeSet::new();
        let mut stack: Vec<CalculationId> = changed.to_vec();

        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.get_dependents(id));
            }
        }

        seen
    }

    /// Whether `id` depends on itself, directly or transitively
    pub fn has_circular_reference(&self, id: CalculationId) -> bool {
        let downstream = self.transitive_dependents(&[id]);
        self.get_precedents(id)
            .any(|precedent| downstream.contains(&precedent))
    }

    /// Whether giving `dependent` these precedents would close a cycle
    pub fn would_create_cycle(
        &self,
        dependent: CalculationId,
        precedents: &[CalculationId],
    ) -> bool {
        let downstream = self.transitive_dependents(&[dependent]);
        precedents.iter().any(|p| downstream.contains(p))
    }

    /// Order all nodes so precedents come first, collecting cycles
    pub fn evaluation_order(&self) -> EvaluationOrder {
        let mut tarjan = Tarjan {
            graph: self,
            index: 0,
            indices: BTreeMap::new(),
            lowlinks: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            result: EvaluationOrder::default(),
        };

        for &id in &self.nodes {
            if !tarjan.indices.contains_key(&id) {
                tarjan.connect(id);
            }
        }

        tarjan.result
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.dependents.clear();
        self.precedents.clear();
    }
}

/// Tarjan's SCC search over precedent edges
///
/// Components complete in reverse topological order of the precedent
/// relation, which is exactly precedents-first.
struct Tarjan<'a> {
    graph: &'a DependencyGraph,
    index: usize,
    indices: BTreeMap<CalculationId, usize>,
    lowlinks: BTreeMap<CalculationId, usize>,
    stack: Vec<CalculationId>,
    on_stack: BTreeSet<CalculationId>,
    result: EvaluationOrder,
}

impl Tarjan<'_> {
    fn connect(&mut self, id: CalculationId) {
        self.indices.insert(id, self.index);
        self.lowlinks.insert(id, self.index);
        self.index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        let graph = self.graph;
        for precedent in graph.get_precedents(id) {
            if !graph.contains(precedent) {
                continue;
            }
            if !self.indices.contains_key(&precedent) {
                self.connect(precedent);
                self.lower(id, self.lowlinks[&precedent]);
            } else if self.on_stack.contains(&precedent) {
                self.lower(id, self.indices[&precedent]);
            }
        }

        if self.lowlinks[&id] != self.indices[&id] {
            return;
        }

        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(&member);
            component.push(member);
            if member == id {
                break;
            }
        }
        component.sort_unstable();

        let self_loop = graph.get_precedents(id).any(|p| p == id);
        if component.len() > 1 || self_loop {
            self.result.cyclic.extend(component.iter().copied());
            self.result.cycles.push(component.clone());
        }
        self.result.order.extend(component);
    }

    fn lower(&mut self, id: CalculationId, candidate: usize) {
        if let Some(low) = self.lowlinks.get_mut(&id) {
            *low = (*low).min(candidate);
        }
    }
}
