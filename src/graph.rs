//! Justification graph: flat id-keyed tables dual-indexed with petgraph.
//!
//! Beliefs and justifications live in `BTreeMap` arenas and reference each
//! other by id, never by pointer — support structures are cyclic in general,
//! and the flat layout keeps the graph serializable. A petgraph `DiGraph`
//! mirrors the antecedent → consequent edges of *active* justifications and
//! is used for affected-closure traversal during propagation.

use std::collections::BTreeSet;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::belief::{BeliefId, BeliefNode, Status};
use crate::conflict::NegationPairs;
use crate::justification::{Justification, JustificationId};

/// Belief and justification arenas plus the dependency index.
#[derive(Debug, Clone, Default)]
pub struct JustificationGraph {
    /// Belief arena, keyed by id (source of truth for statuses).
    beliefs: std::collections::BTreeMap<BeliefId, BeliefNode>,
    /// Justification arena. Retracted records stay here for the audit trail.
    justifications: std::collections::BTreeMap<JustificationId, Justification>,
    /// Dependency edges of active justifications: antecedent → consequent,
    /// weighted by the justification id.
    dependency: DiGraph<BeliefId, JustificationId>,
    /// BeliefId → NodeIndex mapping for O(log n) node lookups.
    node_index: std::collections::BTreeMap<BeliefId, NodeIndex>,
}

impl JustificationGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Beliefs
    // -----------------------------------------------------------------------

    /// Insert a fresh belief node. Also registers it in the dependency index.
    pub fn insert_belief(&mut self, id: BeliefId) {
        self.beliefs.entry(id).or_insert_with(|| BeliefNode::new(id));
        if !self.node_index.contains_key(&id) {
            let idx = self.dependency.add_node(id);
            self.node_index.insert(id, idx);
        }
    }

    /// Whether a belief exists in the store.
    pub fn contains_belief(&self, id: BeliefId) -> bool {
        self.beliefs.contains_key(&id)
    }

    /// Look up a belief node.
    pub fn belief(&self, id: BeliefId) -> Option<&BeliefNode> {
        self.beliefs.get(&id)
    }

    /// Look up a belief node mutably.
    pub fn belief_mut(&mut self, id: BeliefId) -> Option<&mut BeliefNode> {
        self.beliefs.get_mut(&id)
    }

    /// Iterate over all belief nodes in id (creation) order.
    pub fn beliefs(&self) -> impl Iterator<Item = &BeliefNode> {
        self.beliefs.values()
    }

    /// Number of beliefs in the store.
    pub fn belief_count(&self) -> usize {
        self.beliefs.len()
    }

    /// Count the active justifications that reference a belief in any position.
    pub fn active_refs(&self, id: BeliefId) -> usize {
        let Some(node) = self.beliefs.get(&id) else {
            return 0;
        };
        let supporting = node
            .justifications
            .iter()
            .filter(|j| self.is_active(**j))
            .count();
        let consuming = node
            .consumers
            .iter()
            .filter(|j| self.is_active(**j))
            .count();
        supporting + consuming
    }

    /// Physically remove a belief and purge any retracted justifications
    /// that still mention it.
    ///
    /// The caller guarantees no *active* justification references the belief.
    pub fn remove_belief(&mut self, id: BeliefId) {
        let Some(node) = self.beliefs.remove(&id) else {
            return;
        };

        // Retracted justifications mentioning the belief would dangle; drop
        // them from the audit trail along with their back-references.
        let stale: Vec<JustificationId> = node
            .justifications
            .iter()
            .chain(node.consumers.iter())
            .copied()
            .collect();
        for jid in stale {
            if let Some(just) = self.justifications.remove(&jid) {
                for antecedent in just.antecedents() {
                    if let Some(n) = self.beliefs.get_mut(&antecedent) {
                        n.consumers.remove(&jid);
                    }
                }
                if let Some(n) = self.beliefs.get_mut(&just.consequent) {
                    n.justifications.retain(|j| *j != jid);
                }
            }
        }

        // Remove the dependency node. petgraph swaps the last node into the
        // hole, so the moved node's index mapping must be refreshed.
        if let Some(idx) = self.node_index.remove(&id) {
            self.dependency.remove_node(idx);
            if let Some(moved) = self.dependency.node_weight(idx).copied() {
                self.node_index.insert(moved, idx);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Justifications
    // -----------------------------------------------------------------------

    /// Insert an active justification, wiring up consumer back-references
    /// and dependency edges. All referenced beliefs must already exist.
    pub fn insert_justification(&mut self, just: Justification) {
        let jid = just.id;

        if let Some(node) = self.beliefs.get_mut(&just.consequent) {
            node.justifications.push(jid);
        }
        for antecedent in just.antecedents() {
            if let Some(node) = self.beliefs.get_mut(&antecedent) {
                node.consumers.insert(jid);
            }
        }

        let target = self.node_index[&just.consequent];
        for antecedent in just.antecedents() {
            let source = self.node_index[&antecedent];
            self.dependency.add_edge(source, target, jid);
        }

        self.justifications.insert(jid, just);
    }

    /// Look up a justification record.
    pub fn justification(&self, id: JustificationId) -> Option<&Justification> {
        self.justifications.get(&id)
    }

    /// Whether a justification exists and is active.
    pub fn is_active(&self, id: JustificationId) -> bool {
        self.justifications.get(&id).is_some_and(|j| j.active)
    }

    /// Deactivate a justification and drop its dependency edges.
    ///
    /// The record stays in the arena (audit trail); only the derived index
    /// forgets it. The caller validated existence and activity.
    pub fn deactivate(&mut self, id: JustificationId) {
        if let Some(just) = self.justifications.get_mut(&id) {
            just.active = false;
        }
        let stale: Vec<_> = self
            .dependency
            .edge_indices()
            .filter(|e| self.dependency[*e] == id)
            .collect();
        // Remove highest-index first: petgraph swap-removes edges.
        for edge in stale.into_iter().rev() {
            self.dependency.remove_edge(edge);
        }
    }

    /// Reactivate a justification and restore its dependency edges.
    ///
    /// Used only to roll back a retraction whose propagation diverged.
    pub(crate) fn reactivate(&mut self, id: JustificationId) {
        let Some(just) = self.justifications.get_mut(&id) else {
            return;
        };
        just.active = true;
        let consequent = just.consequent;
        let antecedents: Vec<BeliefId> = just.antecedents().collect();
        let target = self.node_index[&consequent];
        for antecedent in antecedents {
            let source = self.node_index[&antecedent];
            self.dependency.add_edge(source, target, id);
        }
    }

    /// Physically remove a justification, including back-references and edges.
    ///
    /// Used only to roll back an insertion whose propagation diverged.
    pub(crate) fn remove_justification(&mut self, id: JustificationId) {
        self.deactivate(id);
        if let Some(just) = self.justifications.remove(&id) {
            for antecedent in just.antecedents() {
                if let Some(n) = self.beliefs.get_mut(&antecedent) {
                    n.consumers.remove(&id);
                }
            }
            if let Some(n) = self.beliefs.get_mut(&just.consequent) {
                n.justifications.retain(|j| *j != id);
            }
        }
    }

    /// Iterate over all justification records in id order.
    pub fn justifications(&self) -> impl Iterator<Item = &Justification> {
        self.justifications.values()
    }

    /// Active justifications supporting a belief, in id order.
    pub fn active_justifications_for(
        &self,
        belief: BeliefId,
    ) -> impl Iterator<Item = &Justification> {
        self.beliefs
            .get(&belief)
            .into_iter()
            .flat_map(|n| n.justifications.iter())
            .filter_map(|jid| self.justifications.get(jid))
            .filter(|j| j.active)
    }

    /// Find an active justification with identical shape, if any.
    pub fn find_duplicate(
        &self,
        in_list: &[BeliefId],
        out_list: &[BeliefId],
        consequent: BeliefId,
    ) -> Option<JustificationId> {
        self.active_justifications_for(consequent)
            .find(|j| j.same_shape(in_list, out_list, consequent))
            .map(|j| j.id)
    }

    /// Total number of justification records (including retracted).
    pub fn justification_count(&self) -> usize {
        self.justifications.len()
    }

    /// Number of active justifications.
    pub fn active_justification_count(&self) -> usize {
        self.justifications.values().filter(|j| j.active).count()
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Consequents of active justifications consuming the given belief.
    pub fn consumer_consequents(&self, belief: BeliefId) -> Vec<BeliefId> {
        let Some(&idx) = self.node_index.get(&belief) else {
            return Vec::new();
        };
        let mut out: Vec<BeliefId> = self
            .dependency
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.dependency[e.target()])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The affected closure of a mutation: the seed beliefs plus everything
    /// reachable through active dependency edges and negation pairings.
    ///
    /// Any belief whose status could change during the triggered propagation
    /// is in this set.
    pub fn affected_closure(
        &self,
        seeds: &[BeliefId],
        negations: &NegationPairs,
    ) -> BTreeSet<BeliefId> {
        let mut closure = BTreeSet::new();
        let mut frontier: Vec<BeliefId> = Vec::new();

        for &seed in seeds {
            if self.beliefs.contains_key(&seed) && closure.insert(seed) {
                frontier.push(seed);
            }
        }

        while let Some(current) = frontier.pop() {
            for next in self.consumer_consequents(current) {
                if closure.insert(next) {
                    frontier.push(next);
                }
            }
            if let Some(partner) = negations.partner(current) {
                if self.beliefs.contains_key(&partner) && closure.insert(partner) {
                    frontier.push(partner);
                }
            }
        }

        closure
    }

    /// Snapshot the full status map (used as the propagation scratch base).
    pub fn status_map(&self) -> std::collections::BTreeMap<BeliefId, Status> {
        self.beliefs
            .iter()
            .map(|(id, node)| (*id, node.status))
            .collect()
    }
}

/// Serializable form of the graph: the two arenas. The dependency index is
/// derived and rebuilt on deserialization.
#[derive(Debug, Serialize, Deserialize)]
struct GraphTables {
    beliefs: Vec<BeliefNode>,
    justifications: Vec<Justification>,
}

impl Serialize for JustificationGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GraphTables {
            beliefs: self.beliefs.values().cloned().collect(),
            justifications: self.justifications.values().cloned().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JustificationGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tables = GraphTables::deserialize(deserializer)?;
        let mut graph = JustificationGraph::new();
        for node in tables.beliefs {
            let id = node.id;
            graph.insert_belief(id);
            // Back-references are rebuilt from the justification records
            // below; only the propagated state is restored here.
            if let Some(n) = graph.beliefs.get_mut(&id) {
                n.status = node.status;
                n.support = node.support;
            }
        }
        for just in tables.justifications {
            if just.active {
                graph.insert_justification(just);
            } else {
                // Retracted records keep back-references (audit trail) but
                // contribute no dependency edges.
                let jid = just.id;
                if let Some(n) = graph.beliefs.get_mut(&just.consequent) {
                    n.justifications.push(jid);
                }
                for antecedent in just.antecedents() {
                    if let Some(n) = graph.beliefs.get_mut(&antecedent) {
                        n.consumers.insert(jid);
                    }
                }
                graph.justifications.insert(jid, just);
            }
        }
        Ok(graph)
    }
}
