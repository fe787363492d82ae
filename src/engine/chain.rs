//! Chain boundary
//!
//! The contract-level operations the engine consumes. Read calls that take
//! slices are multicalls: one round-trip for the whole batch.

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::TransportError;
use super::types::{decimal, ContractConfig, CurveId, Owner, TermId, TxHash, VaultKey, VaultState};

/// A state-changing protocol call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ContractCall {
    CreateAtoms {
        labels: Vec<String>,
        #[serde(with = "decimal::vec")]
        values: Vec<U256>,
    },
    CreateTriples {
        subject_ids: Vec<TermId>,
        predicate_ids: Vec<TermId>,
        object_ids: Vec<TermId>,
        #[serde(with = "decimal::vec")]
        values: Vec<U256>,
    },
    DepositBatch {
        term_ids: Vec<TermId>,
        curve_ids: Vec<CurveId>,
        #[serde(with = "decimal::vec")]
        amounts: Vec<U256>,
        #[serde(with = "decimal::vec")]
        min_shares: Vec<U256>,
    },
    RedeemBatch {
        term_ids: Vec<TermId>,
        curve_ids: Vec<CurveId>,
        #[serde(with = "decimal::vec")]
        shares: Vec<U256>,
        #[serde(with = "decimal::vec")]
        min_assets: Vec<U256>,
    },
}

impl ContractCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::CreateAtoms { .. } => "createAtoms",
            ContractCall::CreateTriples { .. } => "createTriples",
            ContractCall::DepositBatch { .. } => "depositBatch",
            ContractCall::RedeemBatch { .. } => "redeemBatch",
        }
    }

    /// Native value attached to the call
    pub fn value(&self) -> U256 {
        let values = match self {
            ContractCall::CreateAtoms { values, .. } => values,
            ContractCall::CreateTriples { values, .. } => values,
            ContractCall::DepositBatch { amounts, .. } => amounts,
            ContractCall::RedeemBatch { .. } => return U256::ZERO,
        };
        values.iter().fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    /// Number of positions/terms the call touches
    pub fn len(&self) -> usize {
        match self {
            ContractCall::CreateAtoms { labels, .. } => labels.len(),
            ContractCall::CreateTriples { subject_ids, .. } => subject_ids.len(),
            ContractCall::DepositBatch { term_ids, .. } => term_ids.len(),
            ContractCall::RedeemBatch { term_ids, .. } => term_ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub function: String,
    /// Term ids emitted by creation calls, in argument order
    pub created_ids: Vec<TermId>,
}

/// Contract operations the planner and executor depend on
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn contract_config(&self) -> Result<ContractConfig, TransportError>;

    /// Which of `ids` are created atoms, triples, or counter vaults
    async fn terms_exist(&self, ids: &[TermId]) -> Result<Vec<bool>, TransportError>;

    async fn balance_of(&self, owner: Owner) -> Result<U256, TransportError>;

    /// Direct vault reads, one entry per key
    async fn get_vaults(&self, keys: &[VaultKey]) -> Result<Vec<VaultState>, TransportError>;

    async fn get_shares(
        &self,
        owner: Owner,
        term_id: TermId,
        curve_id: CurveId,
    ) -> Result<U256, TransportError>;

    /// `get_shares` for many vaults in one multicall
    async fn get_positions(
        &self,
        owner: Owner,
        keys: &[VaultKey],
    ) -> Result<Vec<U256>, TransportError>;

    /// Per-element `None` marks an element whose preview reverted
    async fn preview_deposit(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        amounts: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError>;

    async fn preview_redeem(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError>;

    async fn submit(&self, owner: Owner, call: &ContractCall) -> Result<TxHash, TransportError>;

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> Result<TxReceipt, TransportError>;
}

pub type SharedClient = Arc<dyn ProtocolClient>;
