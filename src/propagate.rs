//! Fixed-point status propagation with well-founded grounding.
//!
//! Every graph mutation triggers a settle pass over the affected closure:
//!
//! 1. The closure (consequent plus transitive consumers and negation
//!    partners) is reset to UNKNOWN in a scratch status map — this erases any
//!    stale circular support from the previous settled state.
//! 2. A worklist re-evaluates beliefs until no status changes: IN if some
//!    active justification is satisfied, OUT if the negation partner is IN,
//!    UNKNOWN otherwise.
//! 3. A grounding pass assigns each IN belief its support: the lowest-id
//!    satisfied justification whose antecedents are themselves grounded.
//!    IN beliefs kept alive only by mutual (circular) satisfaction have no
//!    such candidate; they are demoted to UNKNOWN and the worklist re-runs.
//! 4. A hard iteration cap proportional to graph size converts unstratified
//!    pathologies (beliefs with no stable status) into a
//!    [`PropagationError::Divergence`] instead of an infinite loop.
//!
//! The settle pass never touches the committed graph: the caller commits the
//! scratch map only on success, so mutations are all-or-nothing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefId, Status};
use crate::conflict::NegationPairs;
use crate::error::PropagationError;
use crate::graph::JustificationGraph;
use crate::justification::JustificationId;

/// One entry of the ordered change-set handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// The belief whose status flipped.
    pub belief: BeliefId,
    /// The belief's label.
    pub label: String,
    /// Status before the mutation.
    pub old: Status,
    /// Status after the mutation settled.
    pub new: Status,
}

/// The result of a settled propagation pass, ready to commit.
#[derive(Debug, Clone)]
pub(crate) struct Settlement {
    /// Beliefs whose status flipped, in creation (id) order.
    pub changes: Vec<(BeliefId, Status, Status)>,
    /// Final statuses for every belief in the affected closure.
    pub statuses: BTreeMap<BeliefId, Status>,
    /// Support pointers for every belief in the affected closure
    /// (`Some` for grounded IN beliefs, `None` otherwise).
    pub supports: BTreeMap<BeliefId, Option<JustificationId>>,
    /// The affected closure itself (used to scope contradiction reporting).
    pub closure: BTreeSet<BeliefId>,
    /// Worklist iterations consumed.
    pub iterations: usize,
}

/// Run propagation to a grounded fixed point over the affected closure.
pub(crate) fn settle(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    seeds: &[BeliefId],
) -> Result<Settlement, PropagationError> {
    let closure = graph.affected_closure(seeds, negations);
    if closure.is_empty() {
        return Ok(Settlement {
            changes: Vec::new(),
            statuses: BTreeMap::new(),
            supports: BTreeMap::new(),
            closure,
            iterations: 0,
        });
    }

    let mut scratch = graph.status_map();
    for belief in &closure {
        scratch.insert(*belief, Status::Unknown);
    }

    let cap = iteration_cap(graph);
    let mut iterations = 0usize;

    let mut queue: VecDeque<BeliefId> = closure.iter().copied().collect();
    let mut queued: BTreeSet<BeliefId> = closure.clone();

    // Demotion can only shrink the IN set, so the outer loop is bounded by
    // the closure size; the cap inside the worklist is the real guard.
    for _pass in 0..=closure.len() {
        run_worklist(
            graph,
            negations,
            &closure,
            &mut scratch,
            &mut queue,
            &mut queued,
            &mut iterations,
            cap,
        )?;

        let (supports, ungrounded) = ground(graph, negations, &closure, &scratch);
        if ungrounded.is_empty() {
            return Ok(finish(graph, closure, scratch, supports, iterations));
        }

        // Unfounded set: IN beliefs alive only through circular satisfaction.
        // Demote them and let the worklist re-evaluate their consumers.
        for belief in ungrounded {
            scratch.insert(belief, Status::Unknown);
            schedule_dependents(graph, negations, &closure, belief, &mut queue, &mut queued);
        }
    }

    Err(PropagationError::Divergence { iterations: cap })
}

/// Worklist budget: generous for any stratified graph, finite for the rest.
fn iteration_cap(graph: &JustificationGraph) -> usize {
    4 * (graph.belief_count() + 2) * (graph.active_justification_count() + 2)
}

#[allow(clippy::too_many_arguments)]
fn run_worklist(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    closure: &BTreeSet<BeliefId>,
    scratch: &mut BTreeMap<BeliefId, Status>,
    queue: &mut VecDeque<BeliefId>,
    queued: &mut BTreeSet<BeliefId>,
    iterations: &mut usize,
    cap: usize,
) -> Result<(), PropagationError> {
    while let Some(belief) = queue.pop_front() {
        queued.remove(&belief);
        *iterations += 1;
        if *iterations > cap {
            return Err(PropagationError::Divergence { iterations: cap });
        }

        let new = evaluate(graph, negations, scratch, belief);
        let old = scratch.get(&belief).copied().unwrap_or_default();
        if new != old {
            scratch.insert(belief, new);
            schedule_dependents(graph, negations, closure, belief, queue, queued);
        }
    }
    Ok(())
}

/// Recompute one belief's status against the scratch map.
///
/// IN wins over OUT: a belief with a satisfied justification stays IN even
/// while its negation partner is IN — that is a contradiction to report, not
/// a status to suppress.
fn evaluate(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    scratch: &BTreeMap<BeliefId, Status>,
    belief: BeliefId,
) -> Status {
    if graph
        .active_justifications_for(belief)
        .any(|j| j.is_satisfied(scratch))
    {
        return Status::In;
    }
    if let Some(partner) = negations.partner(belief) {
        if scratch.get(&partner) == Some(&Status::In) {
            return Status::Out;
        }
    }
    Status::Unknown
}

/// Push a changed belief's consumers and negation partner, closure-scoped.
fn schedule_dependents(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    closure: &BTreeSet<BeliefId>,
    belief: BeliefId,
    queue: &mut VecDeque<BeliefId>,
    queued: &mut BTreeSet<BeliefId>,
) {
    for consumer in graph.consumer_consequents(belief) {
        if closure.contains(&consumer) && queued.insert(consumer) {
            queue.push_back(consumer);
        }
    }
    if let Some(partner) = negations.partner(belief) {
        if closure.contains(&partner) && queued.insert(partner) {
            queue.push_back(partner);
        }
    }
}

/// Assign deterministic support pointers to the closure's IN beliefs.
///
/// Round-based least fixed point: a belief grounds when its lowest-id
/// satisfied justification has all in-list antecedents grounded-IN and all
/// out-list antecedents OUT with a grounded-IN partner. Beliefs outside the
/// closure count as grounded (their committed supports were validated by the
/// pass that set them). Returns the supports plus any IN beliefs that never
/// ground — the unfounded set.
fn ground(
    graph: &JustificationGraph,
    negations: &NegationPairs,
    closure: &BTreeSet<BeliefId>,
    scratch: &BTreeMap<BeliefId, Status>,
) -> (BTreeMap<BeliefId, JustificationId>, Vec<BeliefId>) {
    let mut grounded: BTreeSet<BeliefId> = BTreeSet::new();
    let mut supports: BTreeMap<BeliefId, JustificationId> = BTreeMap::new();

    let grounded_in = |b: BeliefId, grounded: &BTreeSet<BeliefId>| {
        scratch.get(&b) == Some(&Status::In) && (!closure.contains(&b) || grounded.contains(&b))
    };

    loop {
        let mut progressed = false;
        for &belief in closure {
            if scratch.get(&belief) != Some(&Status::In) || grounded.contains(&belief) {
                continue;
            }
            let candidate = graph.active_justifications_for(belief).find(|j| {
                j.is_satisfied(scratch)
                    && j.in_list.iter().all(|a| grounded_in(*a, &grounded))
                    && j.out_list.iter().all(|a| {
                        negations
                            .partner(*a)
                            .is_some_and(|p| grounded_in(p, &grounded))
                    })
            });
            if let Some(just) = candidate {
                supports.insert(belief, just.id);
                grounded.insert(belief);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let ungrounded = closure
        .iter()
        .copied()
        .filter(|b| scratch.get(b) == Some(&Status::In) && !grounded.contains(b))
        .collect();
    (supports, ungrounded)
}

fn finish(
    graph: &JustificationGraph,
    closure: BTreeSet<BeliefId>,
    scratch: BTreeMap<BeliefId, Status>,
    supports: BTreeMap<BeliefId, JustificationId>,
    iterations: usize,
) -> Settlement {
    let mut changes = Vec::new();
    let mut statuses = BTreeMap::new();
    let mut final_supports = BTreeMap::new();

    for &belief in &closure {
        let new = scratch.get(&belief).copied().unwrap_or_default();
        let old = graph
            .belief(belief)
            .map(|n| n.status)
            .unwrap_or_default();
        if old != new {
            changes.push((belief, old, new));
        }
        statuses.insert(belief, new);
        final_supports.insert(belief, supports.get(&belief).copied());
    }

    Settlement {
        changes,
        statuses,
        supports: final_supports,
        closure,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::justification::Justification;

    fn bid(raw: u64) -> BeliefId {
        BeliefId::new(raw).unwrap()
    }

    fn jid(raw: u64) -> JustificationId {
        JustificationId::new(raw).unwrap()
    }

    fn graph_with_beliefs(n: u64) -> JustificationGraph {
        let mut g = JustificationGraph::new();
        for raw in 1..=n {
            g.insert_belief(bid(raw));
        }
        g
    }

    fn commit(graph: &mut JustificationGraph, settlement: &Settlement) {
        for (&belief, &status) in &settlement.statuses {
            let node = graph.belief_mut(belief).unwrap();
            node.status = status;
            node.support = settlement.supports.get(&belief).copied().flatten();
        }
    }

    #[test]
    fn axiom_grounds_consequent_with_itself_as_support() {
        let mut g = graph_with_beliefs(1);
        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        assert_eq!(s.statuses[&bid(1)], Status::In);
        assert_eq!(s.supports[&bid(1)], Some(jid(1)));
        assert_eq!(s.changes, vec![(bid(1), Status::Unknown, Status::In)]);
    }

    #[test]
    fn chain_propagates_in_creation_order() {
        // axiom → 1, 1 ⊢ 2, 2 ⊢ 3.
        let mut g = graph_with_beliefs(3);
        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![bid(1)], vec![], bid(2)));
        g.insert_justification(Justification::new(jid(3), vec![bid(2)], vec![], bid(3)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        let changed: Vec<_> = s.changes.iter().map(|(b, _, _)| *b).collect();
        assert_eq!(changed, vec![bid(1), bid(2), bid(3)]);
        assert!(s.changes.iter().all(|(_, _, new)| *new == Status::In));
    }

    #[test]
    fn retraction_cascades_back_to_unknown() {
        let mut g = graph_with_beliefs(2);
        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![bid(1)], vec![], bid(2)));
        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        commit(&mut g, &s);

        g.deactivate(jid(1));
        // Closure traversal needs the consumer edge that just vanished, so
        // seed with the consequent; its consumers are found via belief 1's
        // remaining active edges... the edge 1→2 is still active (jid 2).
        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        assert_eq!(
            s.changes,
            vec![
                (bid(1), Status::In, Status::Unknown),
                (bid(2), Status::In, Status::Unknown),
            ]
        );
    }

    #[test]
    fn direct_self_support_never_grounds() {
        let mut g = graph_with_beliefs(1);
        g.insert_justification(Justification::new(jid(1), vec![bid(1)], vec![], bid(1)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        assert_eq!(s.statuses[&bid(1)], Status::Unknown);
        assert!(s.changes.is_empty());
    }

    #[test]
    fn mutual_cycle_without_axiom_stays_unknown() {
        let mut g = graph_with_beliefs(2);
        g.insert_justification(Justification::new(jid(1), vec![bid(2)], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![bid(1)], vec![], bid(2)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1), bid(2)]).unwrap();
        assert_eq!(s.statuses[&bid(1)], Status::Unknown);
        assert_eq!(s.statuses[&bid(2)], Status::Unknown);
    }

    #[test]
    fn cycle_with_axiom_grounds_but_support_avoids_the_cycle() {
        // jid(1): 2 ⊢ 1 (cycle edge, lowest id), jid(2): axiom → 1,
        // jid(3): 1 ⊢ 2. The naive lowest-id pick for belief 1 would be the
        // cycle justification; grounding must choose the axiom.
        let mut g = graph_with_beliefs(2);
        g.insert_justification(Justification::new(jid(1), vec![bid(2)], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(3), vec![bid(1)], vec![], bid(2)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        assert_eq!(s.statuses[&bid(1)], Status::In);
        assert_eq!(s.statuses[&bid(2)], Status::In);
        assert_eq!(s.supports[&bid(1)], Some(jid(2)));
        assert_eq!(s.supports[&bid(2)], Some(jid(3)));
    }

    #[test]
    fn out_list_requires_out_not_unknown() {
        let mut g = graph_with_beliefs(2);
        g.insert_justification(Justification::new(jid(1), vec![], vec![bid(1)], bid(2)));

        let s = settle(&g, &NegationPairs::new(), &[bid(2)]).unwrap();
        assert_eq!(s.statuses[&bid(2)], Status::Unknown);
    }

    #[test]
    fn negation_axiom_drives_out_and_non_monotonic_in() {
        // pair (1, 2); axiom → 2; out=[1] ⊢ 3.
        let mut g = graph_with_beliefs(3);
        g.insert_justification(Justification::new(jid(1), vec![], vec![bid(1)], bid(3)));
        g.insert_justification(Justification::new(jid(2), vec![], vec![], bid(2)));
        let mut pairs = NegationPairs::new();
        pairs.pair(bid(1), bid(2)).unwrap();

        let s = settle(&g, &pairs, &[bid(2)]).unwrap();
        assert_eq!(s.statuses[&bid(2)], Status::In);
        assert_eq!(s.statuses[&bid(1)], Status::Out);
        assert_eq!(s.statuses[&bid(3)], Status::In);
        assert_eq!(s.supports[&bid(3)], Some(jid(1)));
        assert_eq!(s.supports[&bid(1)], None);
    }

    #[test]
    fn lowest_id_support_among_plain_alternatives() {
        let mut g = graph_with_beliefs(1);
        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![], vec![], bid(1)));

        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        assert_eq!(s.supports[&bid(1)], Some(jid(1)));
    }

    #[test]
    fn unfounded_set_is_demoted_after_support_flips() {
        // Beliefs: 1 = nq, 2 = q, 3 = a, 4 = b, 5 = s.  Pair (q, nq).
        // jid(1): axiom → nq          (q's negation evidence)
        // jid(2): out=[q] ⊢ a
        // jid(3): a ⊢ b
        // jid(4): b ⊢ a               (cycle edge between a and b)
        // jid(5): s ⊢ q
        // Committed state: nq IN, q OUT, a IN via jid(2), b IN, s UNKNOWN.
        // Adding an axiom for s flips q to IN mid-pass; a and b then survive
        // only through their mutual cycle and must be demoted to UNKNOWN.
        let mut g = graph_with_beliefs(5);
        let mut pairs = NegationPairs::new();
        pairs.pair(bid(2), bid(1)).unwrap();

        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![], vec![bid(2)], bid(3)));
        g.insert_justification(Justification::new(jid(3), vec![bid(3)], vec![], bid(4)));
        g.insert_justification(Justification::new(jid(4), vec![bid(4)], vec![], bid(3)));
        g.insert_justification(Justification::new(jid(5), vec![bid(5)], vec![], bid(2)));

        let s = settle(&g, &pairs, &[bid(1)]).unwrap();
        commit(&mut g, &s);
        assert_eq!(g.belief(bid(2)).unwrap().status, Status::Out);
        assert_eq!(g.belief(bid(3)).unwrap().status, Status::In);
        assert_eq!(g.belief(bid(4)).unwrap().status, Status::In);

        g.insert_justification(Justification::new(jid(6), vec![], vec![], bid(5)));
        let s = settle(&g, &pairs, &[bid(5)]).unwrap();

        assert_eq!(s.statuses[&bid(5)], Status::In);
        assert_eq!(s.statuses[&bid(2)], Status::In); // q, contradicting nq
        assert_eq!(s.statuses[&bid(1)], Status::In); // nq stays IN
        assert_eq!(s.statuses[&bid(3)], Status::Unknown); // a: cycle demoted
        assert_eq!(s.statuses[&bid(4)], Status::Unknown); // b: cycle demoted
    }

    #[test]
    fn unstratified_oscillation_reports_divergence() {
        // Beliefs: 1 = nb, 2 = b, 3 = a.  Pair (b, nb).
        // jid(1): axiom → nb   (b OUT evidence)
        // jid(2): out=[b] ⊢ a
        // jid(3): a ⊢ b
        // No stable assignment exists: b OUT → a IN → b IN → a UNKNOWN → …
        let mut g = graph_with_beliefs(3);
        let mut pairs = NegationPairs::new();
        pairs.pair(bid(2), bid(1)).unwrap();

        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        g.insert_justification(Justification::new(jid(2), vec![], vec![bid(2)], bid(3)));
        g.insert_justification(Justification::new(jid(3), vec![bid(3)], vec![], bid(2)));

        let result = settle(&g, &pairs, &[bid(1)]);
        assert!(matches!(
            result,
            Err(PropagationError::Divergence { .. })
        ));
    }

    #[test]
    fn untouched_beliefs_stay_out_of_the_change_set() {
        let mut g = graph_with_beliefs(3);
        g.insert_justification(Justification::new(jid(1), vec![], vec![], bid(1)));
        let s = settle(&g, &NegationPairs::new(), &[bid(1)]).unwrap();
        commit(&mut g, &s);

        // A second, unrelated axiom must not mention belief 1.
        g.insert_justification(Justification::new(jid(2), vec![], vec![], bid(2)));
        let s = settle(&g, &NegationPairs::new(), &[bid(2)]).unwrap();
        assert_eq!(s.changes, vec![(bid(2), Status::Unknown, Status::In)]);
        assert!(!s.closure.contains(&bid(1)));
    }
}
