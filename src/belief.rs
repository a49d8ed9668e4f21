//! Core belief types for the maat engine.
//!
//! Beliefs are the atomic units of the truth maintenance system. Every
//! proposition is identified by a [`BeliefId`] and carries a [`Status`]
//! maintained exclusively by the propagation engine. The
//! [`AtomicIdAllocator`] provides monotone id generation, so id order is
//! creation order — the ordering used for deterministic change-sets.

use std::collections::BTreeSet;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{BeliefError, MaatResult};
use crate::justification::JustificationId;

/// Unique, niche-optimized identifier for a belief.
///
/// Uses `NonZeroU64` so that `Option<BeliefId>` is the same size as `BeliefId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BeliefId(NonZeroU64);

impl BeliefId {
    /// Create a `BeliefId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(BeliefId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for BeliefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "belief:{}", self.0)
    }
}

/// Truth status of a belief.
///
/// Three-valued: a belief with no grounded support is [`Status::Unknown`],
/// not OUT. A belief is [`Status::Out`] only on positive evidence — its
/// declared negation partner is IN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Supported by at least one satisfied, well-founded justification.
    In,
    /// The belief's negation partner is IN (and the belief itself is not).
    Out,
    /// No firm evidence either way.
    #[default]
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::In => write!(f, "in"),
            Status::Out => write!(f, "out"),
            Status::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single belief node in the store.
///
/// Mutated only by the propagation engine. The label lives in the
/// [`crate::registry::BeliefRegistry`]; the node holds the pure graph state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefNode {
    /// Unique identifier.
    pub id: BeliefId,
    /// Current truth status.
    pub status: Status,
    /// The justification currently grounding an IN status, if any.
    pub support: Option<JustificationId>,
    /// Justifications whose consequent is this belief, in id order.
    pub justifications: Vec<JustificationId>,
    /// Justifications that reference this belief as an antecedent
    /// (consumer back-references, non-owning).
    pub consumers: BTreeSet<JustificationId>,
}

impl BeliefNode {
    /// Create a fresh node with status UNKNOWN and no references.
    pub fn new(id: BeliefId) -> Self {
        Self {
            id,
            status: Status::Unknown,
            support: None,
            justifications: Vec::new(),
            consumers: BTreeSet::new(),
        }
    }

    /// Whether any justification (active or retracted) references this belief.
    pub fn is_referenced(&self) -> bool {
        !self.justifications.is_empty() || !self.consumers.is_empty()
    }
}

/// Thread-safe id allocator shared by beliefs and justifications.
///
/// Produces monotonically increasing ids starting from 1, so allocation
/// order is recoverable by comparing ids.
#[derive(Debug)]
pub struct AtomicIdAllocator {
    next: AtomicU64,
}

impl AtomicIdAllocator {
    /// Create a new allocator that starts from id 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next raw id.
    ///
    /// Returns an error if the id space is exhausted (after 2^64 - 1 allocations).
    pub fn next_raw(&self) -> MaatResult<NonZeroU64> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        NonZeroU64::new(raw).ok_or_else(|| BeliefError::IdExhausted.into())
    }

    /// Allocate the next belief id.
    pub fn next_belief(&self) -> MaatResult<BeliefId> {
        Ok(BeliefId(self.next_raw()?))
    }

    /// Allocate the next justification id.
    pub fn next_justification(&self) -> MaatResult<JustificationId> {
        Ok(JustificationId::from_nonzero(self.next_raw()?))
    }

    /// Return the next raw id that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for AtomicIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belief_id_niche_optimization() {
        // Option<BeliefId> should be the same size as BeliefId thanks to NonZeroU64.
        assert_eq!(
            std::mem::size_of::<Option<BeliefId>>(),
            std::mem::size_of::<BeliefId>()
        );
    }

    #[test]
    fn belief_id_zero_is_none() {
        assert!(BeliefId::new(0).is_none());
        assert!(BeliefId::new(1).is_some());
        assert_eq!(BeliefId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = AtomicIdAllocator::new();
        let a = alloc.next_belief().unwrap();
        let b = alloc.next_belief().unwrap();
        let c = alloc.next_justification().unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(c.get(), 3);
        assert_eq!(alloc.peek_next(), 4);
    }

    #[test]
    fn fresh_node_is_unknown_and_unreferenced() {
        let node = BeliefNode::new(BeliefId::new(1).unwrap());
        assert_eq!(node.status, Status::Unknown);
        assert!(node.support.is_none());
        assert!(!node.is_referenced());
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::In.to_string(), "in");
        assert_eq!(Status::Out.to_string(), "out");
        assert_eq!(Status::Unknown.to_string(), "unknown");
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::In).unwrap(), "\"in\"");
        assert_eq!(
            serde_json::to_string(&Status::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn belief_id_ordering_is_creation_order() {
        let alloc = AtomicIdAllocator::new();
        let a = alloc.next_belief().unwrap();
        let b = alloc.next_belief().unwrap();
        assert!(a < b);
    }
}
