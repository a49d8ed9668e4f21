//! Export types for serializing engine state.
//!
//! These types provide label-resolved representations of beliefs and
//! justifications suitable for JSON export. The snapshot shape is the
//! canonical interchange form:
//!
//! ```json
//! {
//!   "beliefs": [{"id": "snow", "status": "in"}],
//!   "justifications": [
//!     {"id": 1, "in": [], "out": [], "consequent": "snow", "active": true}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::belief::Status;

/// Exported belief with resolved label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefExport {
    /// The opaque string identifier.
    pub id: String,
    /// Current status.
    pub status: Status,
}

/// Exported justification with resolved antecedent and consequent labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustificationExport {
    /// Numeric justification id.
    pub id: u64,
    /// In-list belief identifiers.
    #[serde(rename = "in")]
    pub in_list: Vec<String>,
    /// Out-list belief identifiers.
    #[serde(rename = "out")]
    pub out_list: Vec<String>,
    /// Consequent belief identifier.
    pub consequent: String,
    /// Whether the justification is live (false once retracted).
    pub active: bool,
}

/// Full engine snapshot: both tables, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JtmsSnapshot {
    /// All beliefs.
    pub beliefs: Vec<BeliefExport>,
    /// All justifications, retracted ones included (audit trail).
    pub justifications: Vec<JustificationExport>,
}

impl JtmsSnapshot {
    /// Serialize the snapshot to pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
