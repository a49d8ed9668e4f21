//! Rich diagnostic error types for the maat engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so callers know exactly what
//! went wrong and how to fix it. Contradictions are deliberately *not* errors:
//! they are reported events (see [`crate::conflict::Contradiction`]) that the
//! caller resolves by retracting one side.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the maat engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum MaatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Belief(#[from] BeliefError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Justification(#[from] JustificationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conflict(#[from] ConflictError),
}

// ---------------------------------------------------------------------------
// Belief errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BeliefError {
    #[error("unknown belief: \"{label}\"")]
    #[diagnostic(
        code(maat::belief::not_found),
        help(
            "No belief with this identifier was ever created. Register it with \
             `add_belief()` first, or reference it from a justification \
             (justifications auto-create the beliefs they name)."
        )
    )]
    NotFound { label: String },

    #[error("belief \"{label}\" is still referenced by {active_refs} active justification(s)")]
    #[diagnostic(
        code(maat::belief::in_use),
        help(
            "A belief cannot be removed while an active justification names it \
             as consequent or antecedent. Retract those justifications first \
             with `retract_justification()`, then remove the belief."
        )
    )]
    InUse { label: String, active_refs: usize },

    #[error("belief id space exhausted: cannot allocate more than u64::MAX beliefs")]
    #[diagnostic(
        code(maat::belief::exhausted),
        help(
            "The id space is exhausted. This is extremely unlikely in practice \
             (requires 2^64 allocations). If you see this error, check for an \
             allocation loop in the calling code."
        )
    )]
    IdExhausted,
}

// ---------------------------------------------------------------------------
// Justification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum JustificationError {
    #[error("unknown justification: {id}")]
    #[diagnostic(
        code(maat::justification::not_found),
        help(
            "No justification with this id exists. Use the id returned by \
             `add_justification()`, or inspect `list_justifications()`."
        )
    )]
    NotFound { id: u64 },

    #[error("justification {id} is already retracted")]
    #[diagnostic(
        code(maat::justification::already_retracted),
        help(
            "Retraction is idempotent only in effect, not in the API: a second \
             retraction of the same justification is a caller bug and is \
             rejected. Check `list_justifications()` for the active flag."
        )
    )]
    AlreadyRetracted { id: u64 },

    #[error("duplicate justification for \"{consequent}\": identical to justification {existing}")]
    #[diagnostic(
        code(maat::justification::duplicate),
        help(
            "An active justification with the same in-list, out-list, and \
             consequent already exists. It cannot change any belief status, so \
             the registration is rejected. No action needed."
        )
    )]
    Duplicate { consequent: String, existing: u64 },
}

// ---------------------------------------------------------------------------
// Propagation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PropagationError {
    #[error("propagation did not settle within {iterations} worklist iterations")]
    #[diagnostic(
        code(maat::propagation::divergence),
        help(
            "The fixed-point propagation exceeded its iteration cap. This \
             indicates a pathological justification structure (typically an \
             unstratified cycle through out-lists). The mutation was rolled \
             back; the graph is unchanged. Review the justifications feeding \
             the affected beliefs."
        )
    )]
    Divergence { iterations: usize },
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConflictError {
    #[error("belief \"{label}\" cannot be its own negation")]
    #[diagnostic(
        code(maat::conflict::self_negation),
        help("A negation pair must name two distinct beliefs.")
    )]
    SelfNegation { label: String },

    #[error("belief \"{label}\" is already paired with \"{existing}\"")]
    #[diagnostic(
        code(maat::conflict::already_paired),
        help(
            "Each belief participates in at most one negation pair. Remove the \
             belief and re-create it if it must be re-paired."
        )
    )]
    AlreadyPaired { label: String, existing: String },
}

/// Convenience alias for functions returning maat results.
pub type MaatResult<T> = std::result::Result<T, MaatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belief_error_converts_to_maat_error() {
        let err = BeliefError::NotFound {
            label: "snow".into(),
        };
        let maat: MaatError = err.into();
        assert!(matches!(maat, MaatError::Belief(BeliefError::NotFound { .. })));
    }

    #[test]
    fn justification_error_converts_to_maat_error() {
        let err = JustificationError::AlreadyRetracted { id: 7 };
        let maat: MaatError = err.into();
        assert!(matches!(
            maat,
            MaatError::Justification(JustificationError::AlreadyRetracted { id: 7 })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = BeliefError::InUse {
            label: "snow".into(),
            active_refs: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("snow"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn divergence_mentions_iteration_count() {
        let err = PropagationError::Divergence { iterations: 4096 };
        assert!(format!("{err}").contains("4096"));
    }
}
