//! Crate-wide error type.
//!
//! The simulation core has no recoverable error surface at runtime: a
//! well-formed trace never fails once it has been admitted. The only
//! fallible surface is construction of the data model (malformed token
//! counts, duplicate ids, non-positive stage weights) and one scheduler
//! contract violation that a caller could otherwise trigger by misuse.

use thiserror::Error;

use crate::model::InteractionStage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("negative token count for {field}: {value}")]
    NegativeTokenCount { field: &'static str, value: i64 },

    #[error("output_tokens_target must be >= 1, got {value}")]
    ZeroOutputTarget { value: i64 },

    #[error("stage weight for {stage:?} must be > 0, got {value}")]
    NonPositiveStageWeight { stage: InteractionStage, value: f64 },

    #[error("duplicate request_id {request_id} within this run")]
    DuplicateRequestId { request_id: u64 },

    #[error("interaction {interaction_id} has zero requests")]
    EmptyInteraction { interaction_id: u64 },

    #[error("scheduler invariant violated: {0}")]
    SchedulerInvariant(String),
}
