//! Belief registry: bidirectional label ↔ id mapping.
//!
//! Belief identifiers are opaque strings supplied by the caller; the engine
//! works internally on dense [`BeliefId`]s. The registry provides the mapping
//! in both directions. Labels are matched exactly — identifiers are opaque,
//! so no normalization is applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::belief::BeliefId;

/// Bidirectional belief registry mapping labels to ids and back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeliefRegistry {
    /// Forward map: label → BeliefId (source of truth).
    label_to_id: BTreeMap<String, BeliefId>,
    /// Reverse map: BeliefId → label.
    id_to_label: BTreeMap<BeliefId, String>,
}

impl BeliefRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a belief label. Overwrites nothing: the caller checks
    /// `lookup` first (registration is idempotent at the store level).
    pub fn register(&mut self, label: impl Into<String>, id: BeliefId) {
        let label = label.into();
        self.label_to_id.insert(label.clone(), id);
        self.id_to_label.insert(id, label);
    }

    /// Look up a belief id by label (exact match).
    pub fn lookup(&self, label: &str) -> Option<BeliefId> {
        self.label_to_id.get(label).copied()
    }

    /// Look up the label for a belief id.
    pub fn label_of(&self, id: BeliefId) -> Option<&str> {
        self.id_to_label.get(&id).map(String::as_str)
    }

    /// Resolve an id to a human-readable string, falling back to `belief:{id}`.
    pub fn resolve_label(&self, id: BeliefId) -> String {
        self.id_to_label
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("belief:{}", id.get()))
    }

    /// Remove a belief from both maps.
    pub fn remove(&mut self, id: BeliefId) {
        if let Some(label) = self.id_to_label.remove(&id) {
            self.label_to_id.remove(&label);
        }
    }

    /// Number of registered beliefs.
    pub fn len(&self) -> usize {
        self.id_to_label.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.id_to_label.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(raw: u64) -> BeliefId {
        BeliefId::new(raw).unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = BeliefRegistry::new();
        reg.register("snow", bid(1));

        assert_eq!(reg.lookup("snow"), Some(bid(1)));
        assert_eq!(reg.label_of(bid(1)), Some("snow"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn lookup_is_exact_match() {
        let mut reg = BeliefRegistry::new();
        reg.register("Snow", bid(1));

        // Identifiers are opaque: no case folding.
        assert_eq!(reg.lookup("snow"), None);
        assert_eq!(reg.lookup("Snow"), Some(bid(1)));
    }

    #[test]
    fn resolve_label_falls_back() {
        let mut reg = BeliefRegistry::new();
        reg.register("snow", bid(1));

        assert_eq!(reg.resolve_label(bid(1)), "snow");
        assert_eq!(reg.resolve_label(bid(99)), "belief:99");
    }

    #[test]
    fn remove_clears_both_directions() {
        let mut reg = BeliefRegistry::new();
        reg.register("snow", bid(1));
        reg.register("ice", bid(2));

        reg.remove(bid(1));
        assert_eq!(reg.lookup("snow"), None);
        assert_eq!(reg.label_of(bid(1)), None);
        assert_eq!(reg.lookup("ice"), Some(bid(2)));
        assert_eq!(reg.len(), 1);
    }
}
