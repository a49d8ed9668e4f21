// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # maat
//!
//! A justification-based truth maintenance system (JTMS): a belief-revision
//! engine tracking beliefs, the justifications that support them, and the
//! status changes that ripple through the dependency graph when premises
//! change.
//!
//! ## Architecture
//!
//! - **Belief store** (`belief`, `registry`): beliefs with IN/OUT/UNKNOWN
//!   status, identified by opaque string labels mapped to dense ids
//! - **Justification graph** (`justification`, `graph`): support records with
//!   in-lists, out-lists, and consumer back-references, dual-indexed with a
//!   petgraph dependency graph
//! - **Propagation** (`propagate`): fixed-point label propagation over the
//!   affected closure, with well-founded grounding and a divergence cap
//! - **Conflict handling** (`conflict`): negation pairs, contradiction events
//!   with full support chains, grounded-candidate enumeration
//! - **Engine facade** (`engine`): the [`engine::Jtms`] handle owning all
//!   subsystems behind a single-writer lock
//!
//! ## Library usage
//!
//! ```
//! use maat::engine::Jtms;
//! use maat::belief::Status;
//!
//! let jtms = Jtms::new();
//! jtms.add_belief("snow").unwrap();
//! jtms.add_justification(&[], &[], "snow").unwrap();
//! assert_eq!(jtms.get_status("snow").unwrap(), Status::In);
//!
//! jtms.add_justification(&["snow"], &[], "ice").unwrap();
//! assert_eq!(jtms.get_status("ice").unwrap(), Status::In);
//! ```

pub mod belief;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod justification;
pub mod propagate;
pub mod registry;
