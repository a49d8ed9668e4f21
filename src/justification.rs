//! Justification records: the support structure of the TMS.
//!
//! A justification links antecedent beliefs to a single consequent. It holds
//! when every in-list belief is IN and every out-list belief is OUT — the
//! out-list is the non-monotonic part, revocable by new information. A
//! justification with empty in-list and out-list is an axiom, satisfied
//! while active.

use std::collections::BTreeMap;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefId, Status};

/// Unique, niche-optimized identifier for a justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct JustificationId(NonZeroU64);

impl JustificationId {
    /// Create a `JustificationId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(JustificationId)
    }

    /// Wrap an already-validated non-zero id.
    pub fn from_nonzero(raw: NonZeroU64) -> Self {
        JustificationId(raw)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for JustificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "just:{}", self.0)
    }
}

/// A support record: in-list antecedents, out-list antecedents, consequent.
///
/// Owned by the justification graph; referenced (non-owning) by the beliefs
/// it links. Retraction clears the `active` flag instead of destroying the
/// record, preserving the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    /// Unique identifier.
    pub id: JustificationId,
    /// Beliefs that must all be IN for this justification to hold.
    pub in_list: Vec<BeliefId>,
    /// Beliefs that must all be OUT for this justification to hold.
    pub out_list: Vec<BeliefId>,
    /// The belief this justification supports when satisfied.
    pub consequent: BeliefId,
    /// Whether this justification is live. Cleared on retraction.
    pub active: bool,
}

impl Justification {
    /// Create a new active justification.
    pub fn new(
        id: JustificationId,
        in_list: Vec<BeliefId>,
        out_list: Vec<BeliefId>,
        consequent: BeliefId,
    ) -> Self {
        Self {
            id,
            in_list,
            out_list,
            consequent,
            active: true,
        }
    }

    /// An axiom has no antecedents and is satisfied while active.
    pub fn is_axiom(&self) -> bool {
        self.in_list.is_empty() && self.out_list.is_empty()
    }

    /// Iterate over all antecedent beliefs (in-list then out-list).
    pub fn antecedents(&self) -> impl Iterator<Item = BeliefId> + '_ {
        self.in_list.iter().chain(self.out_list.iter()).copied()
    }

    /// Whether this justification mentions the belief in any position.
    pub fn mentions(&self, belief: BeliefId) -> bool {
        self.consequent == belief
            || self.in_list.contains(&belief)
            || self.out_list.contains(&belief)
    }

    /// Whether this justification names the belief as an antecedent.
    pub fn has_antecedent(&self, belief: BeliefId) -> bool {
        self.in_list.contains(&belief) || self.out_list.contains(&belief)
    }

    /// Evaluate this justification against a status map.
    ///
    /// Satisfied iff active, every in-list belief is IN, and every out-list
    /// belief is OUT. UNKNOWN antecedents never satisfy either condition —
    /// no premature commitment during propagation.
    pub fn is_satisfied(&self, statuses: &BTreeMap<BeliefId, Status>) -> bool {
        self.active
            && self
                .in_list
                .iter()
                .all(|b| statuses.get(b) == Some(&Status::In))
            && self
                .out_list
                .iter()
                .all(|b| statuses.get(b) == Some(&Status::Out))
    }

    /// Whether the justification is structurally identical to the given lists.
    ///
    /// Order-sensitive, matching registration order. Used for duplicate
    /// detection among active justifications.
    pub fn same_shape(&self, in_list: &[BeliefId], out_list: &[BeliefId], consequent: BeliefId) -> bool {
        self.consequent == consequent && self.in_list == in_list && self.out_list == out_list
    }
}
