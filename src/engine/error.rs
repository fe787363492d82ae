//! Engine error taxonomy

use alloy_primitives::U256;

use super::types::{TermId, TxHash};

/// Failure talking to the chain (RPC, multicall, or a reverted call)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("RPC unreachable: {0}")]
    Unreachable(String),

    #[error("rate limited by RPC provider")]
    RateLimited,

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("no receipt for transaction {0}")]
    ReceiptNotFound(TxHash),
}

/// Cart contents rejected before any planning happens
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("item {item_id} has a zero amount")]
    ZeroAmount { item_id: String },

    #[error("item {item_id}: amount {amount} is below the minimum deposit {minimum}")]
    AmountBelowMinimum {
        item_id: String,
        amount: U256,
        minimum: U256,
    },

    #[error("items {first} and {second} take both sides of the same curve")]
    ConflictingItems { first: String, second: String },

    #[error("unknown subject atom {0}")]
    UnknownSubject(TermId),

    #[error("unknown predicate atom {0}")]
    UnknownPredicate(TermId),

    #[error("totem {0} does not exist and has no label to create it from")]
    UnresolvableTotem(TermId),

    #[error("slippage tolerance {0} bps exceeds 10000")]
    SlippageOutOfRange(u16),

    #[error("batch arrays have mismatched lengths")]
    MismatchedBatchArrays,
}

/// Reasons a planning pass cannot produce a plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("claim already exists as triple {triple_id}")]
    ClaimExists {
        subject_id: TermId,
        predicate_id: TermId,
        object_id: TermId,
        triple_id: TermId,
    },

    #[error("insufficient balance: need {required}, have {available} (short {deficit})")]
    InsufficientBalance {
        required: U256,
        available: U256,
        deficit: U256,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Cart mutations that could not be applied
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("no cart for subject {0}")]
    FounderNotFound(TermId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cart store error: {0}")]
    Store(#[from] StoreError),
}

/// On-device cart persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A step of a running plan failed; earlier steps stay final on-chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("step {step_index} ({step_label}) failed: {source}")]
    StepFailed {
        step_index: usize,
        step_label: String,
        source: TransportError,
    },

    #[error("execution cancelled after {completed_steps} steps")]
    Cancelled { completed_steps: usize },

    #[error("planning failed: {0}")]
    Planning(#[from] PlanError),
}
