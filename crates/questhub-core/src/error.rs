//! Typed error taxonomy returned by every core operation
//!
//! Callers get a stable machine-readable kind plus a human-readable
//! message. Storage failures keep their source for logging but their
//! Display never leaks driver error text to end users.

use thiserror::Error;

/// Error returned by all core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Workspace, invite code, membership, balance or issuance absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Role or ownership check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed code, non-positive amount, or similar caller mistake
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invite code is past its expiry
    #[error("invite code has expired")]
    Expired,

    /// Invite code has no redemption slots left
    #[error("invite code has been fully redeemed")]
    Exhausted,

    /// Debit larger than the available balance
    #[error("insufficient points balance")]
    InsufficientBalance,

    /// Resource exists but belongs to a different workspace than the request
    #[error("resource belongs to a different workspace")]
    WorkspaceMismatch,

    /// Lost a conditional-update race after exhausting internal retries,
    /// or the target row is in a state the operation cannot move from
    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    /// The external reward provider call failed
    #[error("reward provider error: {0}")]
    ExternalProvider(String),

    /// Persistence failure; details stay in the source, not the message
    #[error("storage error")]
    Storage(#[from] sea_orm::DbErr),
}

impl CoreError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::Expired => "EXPIRED",
            CoreError::Exhausted => "EXHAUSTED",
            CoreError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            CoreError::WorkspaceMismatch => "WORKSPACE_MISMATCH",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::ExternalProvider(_) => "EXTERNAL_PROVIDER_ERROR",
            CoreError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
