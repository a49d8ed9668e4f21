//! Engine facade: top-level API for the maat truth maintenance system.
//!
//! The [`Jtms`] handle owns all subsystems — belief store, registry,
//! justification graph, negation pairs — behind a single-writer lock.
//! Mutating calls (justification add/retract, negation declaration, belief
//! removal) are transactional: the structural change is applied, propagation
//! settles on a scratch map, and only a successful settle commits. On
//! divergence the structural change is rolled back and the graph is exactly
//! as before the call. Queries take read locks and always observe a settled,
//! consistent state.

use std::sync::{Arc, Mutex, RwLock};

use crate::belief::{AtomicIdAllocator, BeliefId, Status};
use crate::conflict::{
    self, Contradiction, GroundedCandidate, NegationPairs, PairRejection,
};
use crate::error::{
    BeliefError, ConflictError, JustificationError, MaatResult,
};
use crate::export::{BeliefExport, JtmsSnapshot, JustificationExport};
use crate::graph::JustificationGraph;
use crate::justification::{Justification, JustificationId};
use crate::propagate::{self, Settlement, StatusChange};
use crate::registry::BeliefRegistry;

/// Observer invoked once per settled propagation with the ordered change-set.
pub type ChangeObserver = Box<dyn Fn(&[StatusChange]) + Send + Sync>;

/// Observers are stored shared so `notify` can snapshot the list and invoke
/// callbacks without holding the observer lock (re-entrant registration from
/// inside a callback must not deadlock).
type SharedObserver = Arc<dyn Fn(&[StatusChange]) + Send + Sync>;

/// The observable outcome of one mutating call.
#[derive(Debug, Clone)]
pub struct Revision {
    /// The justification registered by `add_justification`, if any.
    pub justification: Option<JustificationId>,
    /// Beliefs whose status flipped, in creation order.
    pub changes: Vec<StatusChange>,
    /// Contradictions that involve a belief touched by this propagation.
    pub contradictions: Vec<Contradiction>,
}

struct JtmsState {
    graph: JustificationGraph,
    registry: BeliefRegistry,
    negations: NegationPairs,
    allocator: AtomicIdAllocator,
}

impl JtmsState {
    fn resolve(&self, label: &str) -> MaatResult<BeliefId> {
        self.registry.lookup(label).ok_or_else(|| {
            BeliefError::NotFound {
                label: label.to_owned(),
            }
            .into()
        })
    }

    /// Resolve a label, creating the belief on first reference.
    ///
    /// Newly created ids are pushed onto `created` so a failed propagation
    /// can roll the creation back.
    fn intern(&mut self, label: &str, created: &mut Vec<BeliefId>) -> MaatResult<BeliefId> {
        if let Some(id) = self.registry.lookup(label) {
            return Ok(id);
        }
        let id = self.allocator.next_belief()?;
        self.graph.insert_belief(id);
        self.registry.register(label, id);
        created.push(id);
        Ok(id)
    }

    fn rollback_created(&mut self, created: &[BeliefId]) {
        for &id in created {
            self.graph.remove_belief(id);
            self.registry.remove(id);
        }
    }

    fn commit(&mut self, settlement: &Settlement) {
        for (&belief, &status) in &settlement.statuses {
            if let Some(node) = self.graph.belief_mut(belief) {
                node.status = status;
                node.support = settlement.supports.get(&belief).copied().flatten();
            }
        }
    }

    fn labeled_changes(&self, settlement: &Settlement) -> Vec<StatusChange> {
        settlement
            .changes
            .iter()
            .map(|&(belief, old, new)| StatusChange {
                belief,
                label: self.registry.resolve_label(belief),
                old,
                new,
            })
            .collect()
    }

    /// Contradiction events scoped to the beliefs this propagation touched.
    fn closure_contradictions(&self, settlement: &Settlement) -> Vec<Contradiction> {
        conflict::contradictory_pairs(&self.graph, &self.negations)
            .into_iter()
            .filter(|(a, b)| settlement.closure.contains(a) || settlement.closure.contains(b))
            .map(|(a, b)| self.build_contradiction(a, b))
            .collect()
    }

    fn build_contradiction(&self, belief: BeliefId, negation: BeliefId) -> Contradiction {
        Contradiction {
            belief,
            belief_label: self.registry.resolve_label(belief),
            negation,
            negation_label: self.registry.resolve_label(negation),
            belief_chain: conflict::support_chain(
                &self.graph,
                &self.negations,
                &self.registry,
                belief,
            ),
            negation_chain: conflict::support_chain(
                &self.graph,
                &self.negations,
                &self.registry,
                negation,
            ),
        }
    }
}

/// The maat truth maintenance engine.
pub struct Jtms {
    state: RwLock<JtmsState>,
    observers: RwLock<Vec<SharedObserver>>,
    /// Held from before the state lock is released until observers have run,
    /// so concurrent mutators deliver change-sets in commit order.
    notify_order: Mutex<()>,
}

impl Jtms {
    /// Create a new empty engine.
    pub fn new() -> Self {
        tracing::info!("initializing maat engine");
        Self {
            state: RwLock::new(JtmsState {
                graph: JustificationGraph::new(),
                registry: BeliefRegistry::new(),
                negations: NegationPairs::new(),
                allocator: AtomicIdAllocator::new(),
            }),
            observers: RwLock::new(Vec::new()),
            notify_order: Mutex::new(()),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Register a belief. Idempotent: re-adding an existing identifier
    /// returns the existing id with no side effects on the graph.
    pub fn add_belief(&self, label: &str) -> MaatResult<BeliefId> {
        let mut state = self.state.write().expect("state lock poisoned");
        let mut created = Vec::new();
        state.intern(label, &mut created)
    }

    /// Register a justification and propagate.
    ///
    /// Beliefs named but not yet known are created as a side effect. Empty
    /// in-list and out-list denotes an axiom. Returns the ordered change-set
    /// and any contradictions the propagation surfaced.
    pub fn add_justification(
        &self,
        in_list: &[&str],
        out_list: &[&str],
        consequent: &str,
    ) -> MaatResult<Revision> {
        let mut state = self.state.write().expect("state lock poisoned");
        let mut created = Vec::new();

        let result = (|| {
            // Intern in reading order (in-list, out-list, consequent) so that
            // auto-created belief ids follow the order the caller wrote them.
            let in_ids = in_list
                .iter()
                .map(|l| state.intern(l, &mut created))
                .collect::<MaatResult<Vec<_>>>()?;
            let out_ids = out_list
                .iter()
                .map(|l| state.intern(l, &mut created))
                .collect::<MaatResult<Vec<_>>>()?;
            let consequent_id = state.intern(consequent, &mut created)?;

            if let Some(existing) = state.graph.find_duplicate(&in_ids, &out_ids, consequent_id) {
                return Err(JustificationError::Duplicate {
                    consequent: consequent.to_owned(),
                    existing: existing.get(),
                }
                .into());
            }

            let jid = state.allocator.next_justification()?;
            state
                .graph
                .insert_justification(Justification::new(jid, in_ids, out_ids, consequent_id));

            match propagate::settle(&state.graph, &state.negations, &[consequent_id]) {
                Ok(settlement) => Ok((jid, settlement)),
                Err(err) => {
                    state.graph.remove_justification(jid);
                    Err(err.into())
                }
            }
        })();

        match result {
            Ok((jid, settlement)) => {
                let revision = self.finish_mutation(&mut state, Some(jid), settlement);
                self.notify_after(state, &revision.changes);
                Ok(revision)
            }
            Err(err) => {
                state.rollback_created(&created);
                Err(err)
            }
        }
    }

    /// Retract a justification and propagate the withdrawal.
    ///
    /// The record is deactivated, not destroyed: it stays visible in
    /// `list_justifications()` with `active == false`.
    pub fn retract_justification(&self, id: JustificationId) -> MaatResult<Revision> {
        let mut state = self.state.write().expect("state lock poisoned");

        let just = state
            .graph
            .justification(id)
            .ok_or(JustificationError::NotFound { id: id.get() })?;
        if !just.active {
            return Err(JustificationError::AlreadyRetracted { id: id.get() }.into());
        }
        let consequent = just.consequent;

        state.graph.deactivate(id);
        match propagate::settle(&state.graph, &state.negations, &[consequent]) {
            Ok(settlement) => {
                let revision = self.finish_mutation(&mut state, None, settlement);
                self.notify_after(state, &revision.changes);
                Ok(revision)
            }
            Err(err) => {
                state.graph.reactivate(id);
                Err(err.into())
            }
        }
    }

    /// Declare two beliefs as negations of each other and propagate.
    ///
    /// Pairing is the non-monotonic pivot: a belief becomes OUT exactly when
    /// its partner is IN, which is what out-list justifications wait for.
    pub fn declare_negation(&self, a: &str, b: &str) -> MaatResult<Revision> {
        let mut state = self.state.write().expect("state lock poisoned");
        let mut created = Vec::new();

        let result = (|| {
            let a_id = state.intern(a, &mut created)?;
            let b_id = state.intern(b, &mut created)?;

            let newly_paired = state.negations.partner(a_id).is_none();
            if let Err(rejection) = state.negations.pair(a_id, b_id) {
                return Err(match rejection {
                    PairRejection::SelfNegation => ConflictError::SelfNegation {
                        label: a.to_owned(),
                    },
                    PairRejection::AlreadyPaired { belief, existing } => {
                        ConflictError::AlreadyPaired {
                            label: state.registry.resolve_label(belief),
                            existing: state.registry.resolve_label(existing),
                        }
                    }
                }
                .into());
            }

            match propagate::settle(&state.graph, &state.negations, &[a_id, b_id]) {
                Ok(settlement) => Ok(settlement),
                Err(err) => {
                    if newly_paired {
                        state.negations.unpair(a_id);
                    }
                    Err(err.into())
                }
            }
        })();

        match result {
            Ok(settlement) => {
                let revision = self.finish_mutation(&mut state, None, settlement);
                self.notify_after(state, &revision.changes);
                Ok(revision)
            }
            Err(err) => {
                state.rollback_created(&created);
                Err(err)
            }
        }
    }

    /// Remove a belief from the store.
    ///
    /// Rejected while any active justification references the belief as
    /// consequent or antecedent. Retracted justifications that still mention
    /// it are purged from the audit trail along with it.
    pub fn remove_belief(&self, label: &str) -> MaatResult<()> {
        let mut state = self.state.write().expect("state lock poisoned");
        let id = state.resolve(label)?;

        let active_refs = state.graph.active_refs(id);
        if active_refs > 0 {
            return Err(BeliefError::InUse {
                label: label.to_owned(),
                active_refs,
            }
            .into());
        }

        state.graph.remove_belief(id);
        state.registry.remove(id);
        state.negations.unpair(id);
        Ok(())
    }

    /// Register an observer, invoked once per settled propagation with the
    /// ordered change-set.
    ///
    /// Callbacks run on the mutating thread, in commit order even under
    /// concurrent mutators. A callback may query the engine and may register
    /// further observers, but must not mutate beliefs or justifications
    /// (re-entrant mutation deadlocks on the notification ordering).
    pub fn add_observer(&self, observer: ChangeObserver) {
        self.observers
            .write()
            .expect("observer lock poisoned")
            .push(Arc::from(observer));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current status of a belief.
    pub fn get_status(&self, label: &str) -> MaatResult<Status> {
        let state = self.state.read().expect("state lock poisoned");
        let id = state.resolve(label)?;
        Ok(state.graph.belief(id).map(|n| n.status).unwrap_or_default())
    }

    /// The justification currently grounding a belief's IN status.
    pub fn get_support(&self, label: &str) -> MaatResult<Option<JustificationId>> {
        let state = self.state.read().expect("state lock poisoned");
        let id = state.resolve(label)?;
        Ok(state.graph.belief(id).and_then(|n| n.support))
    }

    /// The full support chain from a belief down to axioms.
    ///
    /// Empty unless the belief is IN.
    pub fn support_chain(&self, label: &str) -> MaatResult<Vec<conflict::ChainLink>> {
        let state = self.state.read().expect("state lock poisoned");
        let id = state.resolve(label)?;
        Ok(conflict::support_chain(
            &state.graph,
            &state.negations,
            &state.registry,
            id,
        ))
    }

    /// All grounded alternative supports for a belief, for caller-side
    /// choice between competing justifications. The engine itself applies no
    /// preference beyond the lowest-id bookkeeping tie-break.
    pub fn grounded_candidates(&self, label: &str) -> MaatResult<Vec<GroundedCandidate>> {
        let state = self.state.read().expect("state lock poisoned");
        let id = state.resolve(label)?;

        let statuses = state.graph.status_map();
        Ok(state
            .graph
            .active_justifications_for(id)
            .filter(|j| {
                // Satisfied is not enough: a justification whose antecedent
                // supports circle back through this belief would collapse the
                // moment the real support went away.
                j.is_satisfied(&statuses)
                    && conflict::independently_grounded(&state.graph, &state.negations, id, j)
            })
            .map(|j| GroundedCandidate {
                justification: j.id,
                chain: conflict::candidate_chain(
                    &state.graph,
                    &state.negations,
                    &state.registry,
                    id,
                    j.id,
                ),
            })
            .collect())
    }

    /// All negation pairs currently contradictory (both members IN).
    pub fn contradictions(&self) -> Vec<Contradiction> {
        let state = self.state.read().expect("state lock poisoned");
        conflict::contradictory_pairs(&state.graph, &state.negations)
            .into_iter()
            .map(|(a, b)| state.build_contradiction(a, b))
            .collect()
    }

    /// All beliefs with resolved labels, in creation order.
    pub fn list_beliefs(&self) -> Vec<BeliefExport> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .graph
            .beliefs()
            .map(|node| BeliefExport {
                id: state.registry.resolve_label(node.id),
                status: node.status,
            })
            .collect()
    }

    /// All justification records (retracted included), in creation order.
    pub fn list_justifications(&self) -> Vec<JustificationExport> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .graph
            .justifications()
            .map(|just| JustificationExport {
                id: just.id.get(),
                in_list: just
                    .in_list
                    .iter()
                    .map(|b| state.registry.resolve_label(*b))
                    .collect(),
                out_list: just
                    .out_list
                    .iter()
                    .map(|b| state.registry.resolve_label(*b))
                    .collect(),
                consequent: state.registry.resolve_label(just.consequent),
                active: just.active,
            })
            .collect()
    }

    /// Snapshot both tables in the canonical interchange shape.
    pub fn snapshot(&self) -> JtmsSnapshot {
        JtmsSnapshot {
            beliefs: self.list_beliefs(),
            justifications: self.list_justifications(),
        }
    }

    /// Summary counts for the engine state.
    pub fn info(&self) -> JtmsInfo {
        let state = self.state.read().expect("state lock poisoned");
        let mut in_count = 0;
        let mut out_count = 0;
        let mut unknown_count = 0;
        for node in state.graph.beliefs() {
            match node.status {
                Status::In => in_count += 1,
                Status::Out => out_count += 1,
                Status::Unknown => unknown_count += 1,
            }
        }
        JtmsInfo {
            beliefs: state.graph.belief_count(),
            justifications: state.graph.justification_count(),
            active_justifications: state.graph.active_justification_count(),
            axioms: state
                .graph
                .justifications()
                .filter(|j| j.active && j.is_axiom())
                .count(),
            negation_pairs: state.negations.len(),
            in_count,
            out_count,
            unknown_count,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn finish_mutation(
        &self,
        state: &mut JtmsState,
        justification: Option<JustificationId>,
        settlement: Settlement,
    ) -> Revision {
        state.commit(&settlement);
        let changes = state.labeled_changes(&settlement);
        let contradictions = state.closure_contradictions(&settlement);

        tracing::debug!(
            changed = changes.len(),
            iterations = settlement.iterations,
            "propagation settled"
        );
        for contradiction in &contradictions {
            tracing::warn!(
                belief = %contradiction.belief_label,
                negation = %contradiction.negation_label,
                "contradiction detected"
            );
        }

        Revision {
            justification,
            changes,
            contradictions,
        }
    }

    /// Release the state lock and deliver the change-set to observers.
    ///
    /// The ordering ticket is taken while the state lock is still held, so a
    /// concurrent mutator cannot commit and notify in between — observers see
    /// change-sets in commit order. The observer list is snapshotted before
    /// invocation, so callbacks may register observers without deadlocking;
    /// observers added mid-notification see only later propagations.
    fn notify_after(
        &self,
        state: std::sync::RwLockWriteGuard<'_, JtmsState>,
        changes: &[StatusChange],
    ) {
        let ordering = self.notify_order.lock().expect("notify lock poisoned");
        drop(state);

        let observers: Vec<SharedObserver> = self
            .observers
            .read()
            .expect("observer lock poisoned")
            .clone();
        for observer in &observers {
            observer(changes);
        }
        drop(ordering);
    }
}

impl Default for Jtms {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Jtms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.info();
        f.debug_struct("Jtms")
            .field("beliefs", &info.beliefs)
            .field("justifications", &info.justifications)
            .finish()
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JtmsInfo {
    pub beliefs: usize,
    pub justifications: usize,
    pub active_justifications: usize,
    pub axioms: usize,
    pub negation_pairs: usize,
    pub in_count: usize,
    pub out_count: usize,
    pub unknown_count: usize,
}

impl std::fmt::Display for JtmsInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "maat engine info")?;
        writeln!(f, "  beliefs:         {}", self.beliefs)?;
        writeln!(f, "  justifications:  {}", self.justifications)?;
        writeln!(f, "  active:          {}", self.active_justifications)?;
        writeln!(f, "  axioms:          {}", self.axioms)?;
        writeln!(f, "  negation pairs:  {}", self.negation_pairs)?;
        writeln!(f, "  in:              {}", self.in_count)?;
        writeln!(f, "  out:             {}", self.out_count)?;
        writeln!(f, "  unknown:         {}", self.unknown_count)?;
        Ok(())
    }
}
