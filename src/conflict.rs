//! Conflict handling: negation pairs, contradictions, and support chains.
//!
//! The core never inspects belief content, so opposition is declared, not
//! inferred: the caller pairs a belief with its negation, and the pairing
//! drives the non-monotonic machinery — a belief is OUT exactly when its
//! partner is IN. When *both* members of a pair end up IN with grounded
//! support, that is a [`Contradiction`]: reported with both support chains,
//! never silently resolved, and never fatal to the engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefId, Status};
use crate::graph::JustificationGraph;
use crate::justification::{Justification, JustificationId};
use crate::registry::BeliefRegistry;

// ---------------------------------------------------------------------------
// Negation pairs
// ---------------------------------------------------------------------------

/// Why a pairing request was rejected. Mapped to diagnostic errors by the
/// engine, which knows the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRejection {
    /// A belief cannot negate itself.
    SelfNegation,
    /// One of the beliefs is already paired with a different belief.
    AlreadyPaired {
        belief: BeliefId,
        existing: BeliefId,
    },
}

/// Symmetric negation pairings. Each belief has at most one partner.
/// Stored both ways for O(log n) lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NegationPairs {
    partners: BTreeMap<BeliefId, BeliefId>,
}

impl NegationPairs {
    /// Create an empty pairing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare two beliefs as negations of each other.
    ///
    /// Idempotent for an identical re-declaration; rejected if either belief
    /// is already paired with a different one.
    pub fn pair(&mut self, a: BeliefId, b: BeliefId) -> Result<(), PairRejection> {
        if a == b {
            return Err(PairRejection::SelfNegation);
        }
        for (belief, other) in [(a, b), (b, a)] {
            if let Some(existing) = self.partners.get(&belief) {
                if *existing != other {
                    return Err(PairRejection::AlreadyPaired {
                        belief,
                        existing: *existing,
                    });
                }
            }
        }
        self.partners.insert(a, b);
        self.partners.insert(b, a);
        Ok(())
    }

    /// The negation partner of a belief, if declared.
    pub fn partner(&self, belief: BeliefId) -> Option<BeliefId> {
        self.partners.get(&belief).copied()
    }

    /// Drop any pairing involving the belief.
    pub fn unpair(&mut self, belief: BeliefId) {
        if let Some(partner) = self.partners.remove(&belief) {
            self.partners.remove(&partner);
        }
    }

    /// Iterate over pairs once each, `(low, high)` by id.
    pub fn pairs(&self) -> impl Iterator<Item = (BeliefId, BeliefId)> + '_ {
        self.partners
            .iter()
            .filter(|&(a, b)| a < b)
            .map(|(a, b)| (*a, *b))
    }

    /// Number of declared pairs.
    pub fn len(&self) -> usize {
        self.partners.len() / 2
    }

    /// Whether no pairs are declared.
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Contradictions and support chains
// ---------------------------------------------------------------------------

/// One step in a support chain: a belief and the justification grounding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// The supported belief.
    pub belief: BeliefId,
    /// The belief's label.
    pub label: String,
    /// The justification grounding the belief at this step.
    pub justification: JustificationId,
}

/// Both members of a negation pair are IN with grounded support.
///
/// Reported, not resolved: the caller inspects the two chains and retracts
/// one side. Unrelated beliefs are unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    /// The lower-id member of the pair.
    pub belief: BeliefId,
    /// Its label.
    pub belief_label: String,
    /// The higher-id member of the pair.
    pub negation: BeliefId,
    /// Its label.
    pub negation_label: String,
    /// Support chain grounding the lower-id member.
    pub belief_chain: Vec<ChainLink>,
    /// Support chain grounding the higher-id member.
    pub negation_chain: Vec<ChainLink>,
}

/// A grounded alternative support for a belief, exposed for choice sets.
///
/// The engine applies no preference between candidates; callers pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedCandidate {
    /// The satisfied, grounded justification.
    pub justification: JustificationId,
    /// The full chain from the belief down to axioms via this justification.
    pub chain: Vec<ChainLink>,
}

/// Scan the negation pairs for members that are simultaneously IN.
///
/// Returns `(low, high)` id pairs in deterministic order.
pub fn contradictory_pairs(
    graph: &JustificationGraph,
    negations: &NegationPairs,
) -> Vec<(BeliefId, BeliefId)> {
    negations
        .pairs()
        .filter(|(a, b)| {
            graph.belief(*a).map(|n| n.status) == Some(Status::In)
                && graph.belief(*b).map(|n| n.status) == Some(Status::In)
        })
        .collect()
}

/// Build the support chain for a belief's current IN status.
///
/// Walks the committed support pointers: the belief's own support, then each
/// in-list antecedent's support, and for out-list antecedents the support of
/// the negation partner supplying the OUT evidence. Empty if the belief is
/// not IN. Supports are well-founded, so the walk terminates; a visited set
/// guards the shared-antecedent diamond case.
pub fn support_chain(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    registry: &BeliefRegistry,
    belief: BeliefId,
) -> Vec<ChainLink> {
    let Some(support) = graph.belief(belief).and_then(|n| n.support) else {
        return Vec::new();
    };
    let mut chain = Vec::new();
    let mut visited = BTreeSet::new();
    extend_chain(graph, negations, registry, belief, support, &mut visited, &mut chain);
    chain
}

/// Build the support chain a specific justification would give a belief.
///
/// Used for choice sets: the justification is a grounded candidate whose
/// antecedents carry their own committed supports.
pub fn candidate_chain(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    registry: &BeliefRegistry,
    belief: BeliefId,
    justification: JustificationId,
) -> Vec<ChainLink> {
    let mut chain = Vec::new();
    let mut visited = BTreeSet::new();
    extend_chain(
        graph,
        negations,
        registry,
        belief,
        justification,
        &mut visited,
        &mut chain,
    );
    chain
}

/// Whether a justification grounds a belief without relying on the belief
/// itself.
///
/// Walks committed support pointers from the justification's antecedents
/// (out-list antecedents through the partner supplying the OUT evidence). A
/// chain that reaches back to the belief is circular: the justification is
/// satisfied only because the belief is already IN, so it cannot serve as an
/// independent support. Committed supports are well-founded, so the walk
/// terminates; a visited set guards shared antecedents.
pub fn independently_grounded(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    belief: BeliefId,
    justification: &Justification,
) -> bool {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<BeliefId> = Vec::new();
    push_antecedent_supports(negations, justification, &mut stack);

    while let Some(current) = stack.pop() {
        if current == belief {
            return false;
        }
        if !visited.insert(current) {
            continue;
        }
        let Some(support) = graph.belief(current).and_then(|n| n.support) else {
            continue;
        };
        if let Some(just) = graph.justification(support) {
            push_antecedent_supports(negations, just, &mut stack);
        }
    }
    true
}

fn push_antecedent_supports(
    negations: &NegationPairs,
    justification: &Justification,
    stack: &mut Vec<BeliefId>,
) {
    for antecedent in &justification.in_list {
        stack.push(*antecedent);
    }
    for antecedent in &justification.out_list {
        if let Some(partner) = negations.partner(*antecedent) {
            stack.push(partner);
        }
    }
}

fn extend_chain(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    registry: &BeliefRegistry,
    belief: BeliefId,
    justification: JustificationId,
    visited: &mut BTreeSet<BeliefId>,
    chain: &mut Vec<ChainLink>,
) {
    if !visited.insert(belief) {
        return;
    }
    chain.push(ChainLink {
        belief,
        label: registry.resolve_label(belief),
        justification,
    });

    let Some(just) = graph.justification(justification) else {
        return;
    };
    for antecedent in &just.in_list {
        if let Some(support) = graph.belief(*antecedent).and_then(|n| n.support) {
            extend_chain(graph, negations, registry, *antecedent, support, visited, chain);
        }
    }
    for antecedent in &just.out_list {
        // OUT evidence is the partner's IN support.
        if let Some(partner) = negations.partner(*antecedent) {
            if let Some(support) = graph.belief(partner).and_then(|n| n.support) {
                extend_chain(graph, negations, registry, partner, support, visited, chain);
            }
        }
    }
}
