use crate::claims::models::{ClaimId, EventKind};
use thiserror::Error;

/// Top-level error type for the executor node.
///
/// The taxonomy splits cycle-aborting faults (`LedgerUnavailable`,
/// `OrphanBindEvent`, `MalformedEvent`) from per-claim faults
/// (`OracleCallFailed`, `DepositQueryFailed`, `DispatchRejected`) that log
/// and let the cycle continue with the next claim.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("ledger unavailable: {context}")]
    LedgerUnavailable { context: String },

    #[error("bound event references claim {claim_id} with no minted record in the scan window")]
    OrphanBindEvent { claim_id: ClaimId },

    #[error("malformed {kind} event at block {block}: {detail}")]
    MalformedEvent {
        kind: EventKind,
        block: u64,
        detail: String,
    },

    #[error("eligibility check failed for claim {claim_id}: {detail}")]
    OracleCallFailed { claim_id: ClaimId, detail: String },

    #[error("deposit query failed for claim {claim_id}: {detail}")]
    DepositQueryFailed { claim_id: ClaimId, detail: String },

    #[error("dispatch rejected for claim {claim_id}: {detail}")]
    DispatchRejected { claim_id: ClaimId, detail: String },

    #[error("no unlocked accounts available on the ledger node")]
    NoAccounts,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for the executor node.
pub type ExecutorResult<T> = Result<T, ExecutorError>;
