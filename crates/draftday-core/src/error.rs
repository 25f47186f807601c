//! Error taxonomy for draft operations.
//!
//! Every rejected operation maps to exactly one [`DraftError`] variant, and
//! every variant carries a stable [`reason`](DraftError::reason) code that
//! callers surface verbatim. The first five variants are recoverable: the
//! draft is left exactly as it was.

use draftday_types::{DraftId, DraftStatus, ItemId, ParticipantId};

use crate::store::StoreError;

/// Errors returned by the draft manager and turn engine.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// A draft, item or participant does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The operation is illegal for the draft's current status.
    #[error("cannot {operation} draft {draft_id} while it is {status}")]
    InvalidState {
        /// The draft in question.
        draft_id: DraftId,
        /// Its current status.
        status: DraftStatus,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The named participant is not the one currently owed a pick.
    #[error("it is not {participant_id}'s turn (pick {pick_number})")]
    WrongTurn {
        /// Participant that attempted to pick.
        participant_id: ParticipantId,
        /// Pick number currently owed.
        pick_number: u32,
    },

    /// The item has already been claimed in this draft.
    #[error("item {item_id} is no longer available")]
    ItemUnavailable {
        /// The claimed item.
        item_id: ItemId,
    },

    /// The pick would put the participant over the category cap while a
    /// legal alternative still exists.
    #[error("item {item_id} exceeds the cap of {cap} for category {category}")]
    EligibilityViolation {
        /// The rejected item.
        item_id: ItemId,
        /// Category the item belongs to.
        category: String,
        /// Configured cap.
        cap: u32,
    },

    /// The durable store failed.
    #[error("persistence failure: {source}")]
    PersistenceFailure {
        /// Underlying store error.
        #[from]
        source: StoreError,
    },

    /// No item is left to select for the owed participant.
    #[error("item pool exhausted for draft {draft_id}")]
    PoolExhausted {
        /// The draft that can no longer progress.
        draft_id: DraftId,
    },

    /// Administrative input was malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request.
        reason: String,
    },
}

impl DraftError {
    /// Stable machine-readable reason code.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::WrongTurn { .. } => "wrong_turn",
            Self::ItemUnavailable { .. } => "item_unavailable",
            Self::EligibilityViolation { .. } => "eligibility_violation",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }

    /// Whether the draft is guaranteed unchanged after this error.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidState { .. }
                | Self::WrongTurn { .. }
                | Self::ItemUnavailable { .. }
                | Self::EligibilityViolation { .. }
                | Self::InvalidRequest { .. }
        )
    }

    pub(crate) fn draft_not_found(draft_id: DraftId) -> Self {
        Self::NotFound {
            entity: "draft",
            id: draft_id.to_string(),
        }
    }

    pub(crate) const fn invalid_state(
        draft_id: DraftId,
        status: DraftStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            draft_id,
            status,
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn reasons_are_distinct() {
        let errors = [
            DraftError::draft_not_found(DraftId::new()),
            DraftError::invalid_state(DraftId::new(), DraftStatus::NotStarted, "pick in"),
            DraftError::WrongTurn {
                participant_id: ParticipantId::new(),
                pick_number: 1,
            },
            DraftError::ItemUnavailable {
                item_id: ItemId::new(),
            },
            DraftError::EligibilityViolation {
                item_id: ItemId::new(),
                category: "east/north".to_owned(),
                cap: 1,
            },
            DraftError::from(StoreError::Backend {
                message: "down".to_owned(),
            }),
            DraftError::PoolExhausted {
                draft_id: DraftId::new(),
            },
            DraftError::InvalidRequest {
                reason: "bad".to_owned(),
            },
        ];
        let reasons: BTreeSet<&str> = errors.iter().map(DraftError::reason).collect();
        assert_eq!(reasons.len(), errors.len());
    }

    #[test]
    fn only_store_and_pool_errors_change_state() {
        let store = DraftError::from(StoreError::Backend {
            message: "down".to_owned(),
        });
        assert!(!store.is_rejection());
        let exhausted = DraftError::PoolExhausted {
            draft_id: DraftId::new(),
        };
        assert!(!exhausted.is_rejection());
        let wrong = DraftError::WrongTurn {
            participant_id: ParticipantId::new(),
            pick_number: 4,
        };
        assert!(wrong.is_rejection());
    }
}
