//! In-memory protocol simulator
//!
//! Stands in for the attestation contracts: atoms, triples, per-curve vaults,
//! positions and wallet balances. Enforces the protocol rules the planner has
//! to respect (curve exclusivity, progressive AGAINST initialisation, minimum
//! deposits, batch ceilings). The share pricing here is a placeholder for the
//! real bonding curves, good enough to produce non-trivial previews.

use alloy_primitives::{keccak256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::engine::chain::{ContractCall, ProtocolClient, TxReceipt};
use crate::engine::error::TransportError;
use crate::engine::types::{
    atom_id, counter_term_id, triple_id, ContractConfig, CurveId, Owner, TermId, TxHash, VaultKey,
    VaultState,
};

/// Shares minted to the zero address on a vault's first deposit. Never redeemable.
pub const GHOST_SHARES: u64 = 1_000_000;

/// 1 token in wei
pub const WEI_PER_TOKEN: u64 = 1_000_000_000_000_000_000;

/// Per-call position ceiling enforced by the batch entrypoints
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default costs: 0.0005 triple, 0.0003 atom, 0.0001 min deposit, 1% entry fee
pub fn default_contract_config() -> ContractConfig {
    ContractConfig {
        triple_base_cost: U256::from(500_000_000_000_000u64),
        atom_cost: U256::from(300_000_000_000_000u64),
        min_deposit: U256::from(100_000_000_000_000u64),
        entry_fee_bps: 100,
    }
}

#[derive(Debug, Clone, Copy)]
struct TripleRecord {
    subject: TermId,
    predicate: TermId,
    object: TermId,
}

#[derive(Debug, Clone, Default)]
struct SimState {
    atoms: HashMap<TermId, String>,
    triples: HashMap<TermId, TripleRecord>,
    /// counter vault id -> triple id
    counters: HashMap<TermId, TermId>,
    vaults: HashMap<VaultKey, VaultState>,
    positions: HashMap<(Owner, VaultKey), U256>,
    balances: HashMap<Owner, U256>,
}

#[derive(Debug, Default)]
struct Faults {
    unreachable: bool,
    rate_limited_calls: u32,
    fail_next_submit: Option<String>,
    previews_down: bool,
}

struct Inner {
    state: SimState,
    receipts: HashMap<TxHash, TxReceipt>,
    block_number: u64,
    nonce: u64,
    faults: Faults,
}

/// Simulated protocol deployment
pub struct SimulatedProtocol {
    config: ContractConfig,
    max_batch_size: usize,
    inner: Mutex<Inner>,
}

impl SimulatedProtocol {
    pub fn new(config: ContractConfig, max_batch_size: usize) -> Self {
        Self {
            config,
            max_batch_size,
            inner: Mutex::new(Inner {
                state: SimState::default(),
                receipts: HashMap::new(),
                block_number: 1,
                nonce: 0,
                faults: Faults::default(),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_contract_config(), DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn config(&self) -> ContractConfig {
        self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-call; the state is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- fixtures -------------------------------------------------------

    /// Create an atom without going through a call
    pub fn seed_atom(&self, label: &str) -> TermId {
        let id = atom_id(label);
        self.lock().state.atoms.insert(id, label.to_string());
        id
    }

    /// Create a triple without going through a call.
    ///
    /// With `initialize_progressive = false` the progressive FOR vault is left
    /// empty, the state of triples created before curve seeding existed.
    pub fn seed_triple(
        &self,
        subject: TermId,
        predicate: TermId,
        object: TermId,
        initialize_progressive: bool,
    ) -> TermId {
        let mut inner = self.lock();
        let id = insert_triple(&mut inner.state, subject, predicate, object);
        if !initialize_progressive {
            let key = VaultKey::new(id, CurveId::Progressive);
            inner.state.vaults.remove(&key);
            inner.state.positions.remove(&(Owner::ZERO, key));
        }
        id
    }

    /// Place a position directly (vault totals are bumped to match)
    pub fn seed_position(&self, owner: Owner, term_id: TermId, curve_id: CurveId, shares: U256) {
        let mut inner = self.lock();
        let key = VaultKey::new(term_id, curve_id);
        let vault = inner.state.vaults.entry(key).or_default();
        vault.total_shares += shares;
        vault.total_assets += shares;
        *inner.state.positions.entry((owner, key)).or_default() += shares;
    }

    /// Credit a wallet (faucet)
    pub fn mint(&self, owner: Owner, amount: U256) -> U256 {
        let mut inner = self.lock();
        let balance = inner.state.balances.entry(owner).or_default();
        *balance = balance.saturating_add(amount);
        *balance
    }

    pub fn balance(&self, owner: Owner) -> U256 {
        self.lock()
            .state
            .balances
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn shares(&self, owner: Owner, term_id: TermId, curve_id: CurveId) -> U256 {
        self.lock()
            .state
            .positions
            .get(&(owner, VaultKey::new(term_id, curve_id)))
            .copied()
            .unwrap_or_default()
    }

    pub fn vault(&self, term_id: TermId, curve_id: CurveId) -> VaultState {
        self.lock()
            .state
            .vaults
            .get(&VaultKey::new(term_id, curve_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn term_exists(&self, id: TermId) -> bool {
        let inner = self.lock();
        term_created(&inner.state, id)
    }

    /// Make every call fail as if the RPC endpoint were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().faults.unreachable = unreachable;
    }

    /// Answer the next `n` calls with `RateLimited`
    pub fn rate_limit_next(&self, n: u32) {
        self.lock().faults.rate_limited_calls = n;
    }

    /// Fail every preview call while reads and submits keep working
    pub fn set_previews_unavailable(&self, down: bool) {
        self.lock().faults.previews_down = down;
    }

    fn check_preview_faults(&self) -> Result<(), TransportError> {
        self.check_faults()?;
        if self.lock().faults.previews_down {
            return Err(TransportError::Unreachable(
                "simulated preview endpoint is down".to_string(),
            ));
        }
        Ok(())
    }

    /// Revert the next submitted call with `reason`
    pub fn fail_next_submit(&self, reason: &str) {
        self.lock().faults.fail_next_submit = Some(reason.to_string());
    }

    fn check_faults(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.faults.unreachable {
            return Err(TransportError::Unreachable(
                "simulated RPC endpoint is down".to_string(),
            ));
        }
        if inner.faults.rate_limited_calls > 0 {
            inner.faults.rate_limited_calls -= 1;
            return Err(TransportError::RateLimited);
        }
        Ok(())
    }

    // --- call execution -------------------------------------------------

    fn execute(&self, state: &mut SimState, owner: Owner, call: &ContractCall) -> Result<Vec<TermId>, String> {
        if call.len() > self.max_batch_size {
            return Err(format!(
                "BatchTooLarge: {} positions, ceiling {}",
                call.len(),
                self.max_batch_size
            ));
        }
        let value = call.value();
        let balance = state.balances.get(&owner).copied().unwrap_or_default();
        if value > balance {
            return Err(format!("InsufficientFunds: value {} balance {}", value, balance));
        }
        state.balances.insert(owner, balance - value);

        match call {
            ContractCall::CreateAtoms { labels, values } => {
                if labels.len() != values.len() {
                    return Err("ArraysNotSameLength".to_string());
                }
                let mut created = Vec::with_capacity(labels.len());
                for (label, value) in labels.iter().zip(values) {
                    let id = atom_id(label);
                    if state.atoms.contains_key(&id) {
                        return Err(format!("AtomExists: {}", id));
                    }
                    if *value < self.config.atom_cost {
                        return Err(format!("InsufficientAtomCost: {}", value));
                    }
                    state.atoms.insert(id, label.clone());
                    let excess = *value - self.config.atom_cost;
                    if !excess.is_zero() {
                        self.deposit(state, owner, VaultKey::new(id, CurveId::Linear), excess)?;
                    }
                    created.push(id);
                }
                Ok(created)
            }
            ContractCall::CreateTriples {
                subject_ids,
                predicate_ids,
                object_ids,
                values,
            } => {
                let n = subject_ids.len();
                if predicate_ids.len() != n || object_ids.len() != n || values.len() != n {
                    return Err("ArraysNotSameLength".to_string());
                }
                let mut created = Vec::with_capacity(n);
                for i in 0..n {
                    let (s, p, o) = (subject_ids[i], predicate_ids[i], object_ids[i]);
                    for atom in [s, p, o] {
                        if !state.atoms.contains_key(&atom) {
                            return Err(format!("AtomDoesNotExist: {}", atom));
                        }
                    }
                    let id = triple_id(s, p, o);
                    if state.triples.contains_key(&id) {
                        return Err(format!("TripleExists: {}", id));
                    }
                    if values[i] < self.config.triple_base_cost {
                        return Err(format!("InsufficientTripleCost: {}", values[i]));
                    }
                    insert_triple(state, s, p, o);
                    let excess = values[i] - self.config.triple_base_cost;
                    if !excess.is_zero() {
                        self.deposit(state, owner, VaultKey::new(id, CurveId::Linear), excess)?;
                    }
                    created.push(id);
                }
                Ok(created)
            }
            ContractCall::DepositBatch {
                term_ids,
                curve_ids,
                amounts,
                min_shares,
            } => {
                let n = term_ids.len();
                if curve_ids.len() != n || amounts.len() != n || min_shares.len() != n {
                    return Err("ArraysNotSameLength".to_string());
                }
                for i in 0..n {
                    let key = VaultKey::new(term_ids[i], curve_ids[i]);
                    let minted = self.deposit(state, owner, key, amounts[i])?;
                    if minted < min_shares[i] {
                        return Err(format!(
                            "SlippageExceeded: minted {} < min {}",
                            minted, min_shares[i]
                        ));
                    }
                }
                Ok(Vec::new())
            }
            ContractCall::RedeemBatch {
                term_ids,
                curve_ids,
                shares,
                min_assets,
            } => {
                let n = term_ids.len();
                if curve_ids.len() != n || shares.len() != n || min_assets.len() != n {
                    return Err("ArraysNotSameLength".to_string());
                }
                for i in 0..n {
                    let key = VaultKey::new(term_ids[i], curve_ids[i]);
                    let assets = redeem(state, owner, key, shares[i])?;
                    if assets < min_assets[i] {
                        return Err(format!(
                            "SlippageExceeded: assets {} < min {}",
                            assets, min_assets[i]
                        ));
                    }
                    let balance = state.balances.entry(owner).or_default();
                    *balance = balance.saturating_add(assets);
                }
                Ok(Vec::new())
            }
        }
    }

    fn deposit(&self, state: &mut SimState, owner: Owner, key: VaultKey, assets: U256) -> Result<U256, String> {
        if !term_created(state, key.term_id) {
            return Err(format!("TermDoesNotExist: {}", key.term_id));
        }
        if assets < self.config.min_deposit {
            return Err(format!("MinimumDeposit: {} < {}", assets, self.config.min_deposit));
        }

        if let Some(triple) = state.counters.get(&key.term_id).copied() {
            // AGAINST side
            let for_key = VaultKey::new(triple, key.curve_id);
            if position_of(state, owner, for_key) > U256::ZERO {
                return Err("HasCounterStake: FOR shares on the same curve".to_string());
            }
            if key.curve_id == CurveId::Progressive {
                let for_vault = state.vaults.get(&for_key).copied().unwrap_or_default();
                if for_vault.total_shares.is_zero() {
                    return Err("VaultNotInitialized: progressive FOR vault is empty".to_string());
                }
            }
        } else if state.triples.contains_key(&key.term_id) {
            let against_key = VaultKey::new(counter_term_id(key.term_id), key.curve_id);
            if position_of(state, owner, against_key) > U256::ZERO {
                return Err("HasCounterStake: AGAINST shares on the same curve".to_string());
            }
        }

        let shares = self.shares_for(state, key, assets);
        if shares.is_zero() {
            return Err("ZeroShares".to_string());
        }
        let vault = state.vaults.entry(key).or_default();
        if vault.total_shares.is_zero() {
            vault.total_shares = U256::from(GHOST_SHARES);
            *state
                .positions
                .entry((Owner::ZERO, key))
                .or_default() += U256::from(GHOST_SHARES);
        }
        let vault = state.vaults.entry(key).or_default();
        vault.total_assets += assets;
        vault.total_shares += shares;
        *state.positions.entry((owner, key)).or_default() += shares;
        Ok(shares)
    }

    fn shares_for(&self, state: &SimState, key: VaultKey, assets: U256) -> U256 {
        let fee = assets * U256::from(self.config.entry_fee_bps) / U256::from(10_000u64);
        let net = assets - fee;
        match key.curve_id {
            CurveId::Linear => net,
            CurveId::Progressive => {
                let scale = U256::from(WEI_PER_TOKEN);
                let total_assets = state
                    .vaults
                    .get(&key)
                    .map(|v| v.total_assets)
                    .unwrap_or_default();
                net * scale / (scale + total_assets)
            }
        }
    }

    fn assets_for(state: &SimState, key: VaultKey, shares: U256) -> Option<U256> {
        let vault = state.vaults.get(&key)?;
        if vault.total_shares.is_zero() {
            return None;
        }
        Some(shares * vault.total_assets / vault.total_shares)
    }

    fn next_tx_hash(inner: &mut Inner, owner: Owner) -> TxHash {
        inner.nonce += 1;
        let mut buf = Vec::with_capacity(28);
        buf.extend_from_slice(owner.as_slice());
        buf.extend_from_slice(&inner.nonce.to_be_bytes());
        keccak256(buf)
    }
}

fn insert_triple(state: &mut SimState, subject: TermId, predicate: TermId, object: TermId) -> TermId {
    let id = triple_id(subject, predicate, object);
    state.triples.insert(
        id,
        TripleRecord {
            subject,
            predicate,
            object,
        },
    );
    state.counters.insert(counter_term_id(id), id);
    // Creation seeds the FOR vault of every curve
    for curve in CurveId::all() {
        let key = VaultKey::new(id, *curve);
        state.vaults.insert(
            key,
            VaultState {
                total_assets: U256::ZERO,
                total_shares: U256::from(GHOST_SHARES),
            },
        );
        state
            .positions
            .insert((Owner::ZERO, key), U256::from(GHOST_SHARES));
    }
    id
}

fn term_created(state: &SimState, id: TermId) -> bool {
    state.atoms.contains_key(&id) || state.triples.contains_key(&id) || state.counters.contains_key(&id)
}

fn position_of(state: &SimState, owner: Owner, key: VaultKey) -> U256 {
    state.positions.get(&(owner, key)).copied().unwrap_or_default()
}

fn redeem(state: &mut SimState, owner: Owner, key: VaultKey, shares: U256) -> Result<U256, String> {
    if owner == Owner::ZERO {
        return Err("GhostSharesLocked".to_string());
    }
    let held = position_of(state, owner, key);
    if shares.is_zero() || shares > held {
        return Err(format!("InsufficientShares: have {}, redeem {}", held, shares));
    }
    let assets = SimulatedProtocol::assets_for(state, key, shares).unwrap_or_default();
    let vault = state.vaults.entry(key).or_default();
    vault.total_shares -= shares;
    vault.total_assets -= assets.min(vault.total_assets);
    state.positions.insert((owner, key), held - shares);
    Ok(assets)
}

#[async_trait]
impl ProtocolClient for SimulatedProtocol {
    async fn contract_config(&self) -> Result<ContractConfig, TransportError> {
        self.check_faults()?;
        Ok(self.config)
    }

    async fn terms_exist(&self, ids: &[TermId]) -> Result<Vec<bool>, TransportError> {
        self.check_faults()?;
        let inner = self.lock();
        Ok(ids.iter().map(|id| term_created(&inner.state, *id)).collect())
    }

    async fn balance_of(&self, owner: Owner) -> Result<U256, TransportError> {
        self.check_faults()?;
        Ok(self.balance(owner))
    }

    async fn get_vaults(&self, keys: &[VaultKey]) -> Result<Vec<VaultState>, TransportError> {
        self.check_faults()?;
        let inner = self.lock();
        Ok(keys
            .iter()
            .map(|k| inner.state.vaults.get(k).copied().unwrap_or_default())
            .collect())
    }

    async fn get_shares(
        &self,
        owner: Owner,
        term_id: TermId,
        curve_id: CurveId,
    ) -> Result<U256, TransportError> {
        self.check_faults()?;
        Ok(self.shares(owner, term_id, curve_id))
    }

    async fn get_positions(
        &self,
        owner: Owner,
        keys: &[VaultKey],
    ) -> Result<Vec<U256>, TransportError> {
        self.check_faults()?;
        let inner = self.lock();
        Ok(keys
            .iter()
            .map(|k| position_of(&inner.state, owner, *k))
            .collect())
    }

    async fn preview_deposit(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        amounts: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError> {
        self.check_preview_faults()?;
        let inner = self.lock();
        Ok(term_ids
            .iter()
            .zip(curve_ids)
            .zip(amounts)
            .map(|((term, curve), amount)| {
                let key = VaultKey::new(*term, *curve);
                if !term_created(&inner.state, *term) || *amount < self.config.min_deposit {
                    return None;
                }
                Some(self.shares_for(&inner.state, key, *amount))
            })
            .collect())
    }

    async fn preview_redeem(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError> {
        self.check_preview_faults()?;
        let inner = self.lock();
        Ok(term_ids
            .iter()
            .zip(curve_ids)
            .zip(shares)
            .map(|((term, curve), shares)| {
                SimulatedProtocol::assets_for(&inner.state, VaultKey::new(*term, *curve), *shares)
            })
            .collect())
    }

    async fn submit(&self, owner: Owner, call: &ContractCall) -> Result<TxHash, TransportError> {
        self.check_faults()?;
        let mut inner = self.lock();
        if let Some(reason) = inner.faults.fail_next_submit.take() {
            return Err(TransportError::Reverted(reason));
        }

        // All-or-nothing: work on a copy, commit on success
        let mut staged = inner.state.clone();
        let created = self
            .execute(&mut staged, owner, call)
            .map_err(TransportError::Reverted)?;
        inner.state = staged;

        let tx_hash = Self::next_tx_hash(&mut inner, owner);
        inner.block_number += 1;
        let receipt = TxReceipt {
            tx_hash,
            block_number: inner.block_number,
            function: call.function_name().to_string(),
            created_ids: created,
        };
        inner.receipts.insert(tx_hash, receipt);
        tracing::debug!("simulated {} mined as {}", call.function_name(), tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _confirmations: u64,
    ) -> Result<TxReceipt, TransportError> {
        self.check_faults()?;
        self.lock()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(TransportError::ReceiptNotFound(tx_hash))
    }
}

/// Atoms and triples a fresh simulator starts with
#[derive(Debug, Clone, Default)]
pub struct SeedSummary {
    pub atoms: Vec<(String, TermId)>,
    pub triples: Vec<TermId>,
}

impl SimulatedProtocol {
    /// Seed the labels every deployment ships with: the shared predicates and
    /// a handful of founders.
    pub fn seed_defaults(&self, predicates: &[&str], founders: &[&str]) -> SeedSummary {
        let mut summary = SeedSummary::default();
        let mut seen = HashSet::new();
        for label in predicates.iter().chain(founders) {
            if seen.insert(*label) {
                summary.atoms.push((label.to_string(), self.seed_atom(label)));
            }
        }
        summary
    }

    /// Subject/predicate/object of a created triple
    pub fn triple_parts(&self, id: TermId) -> Option<(TermId, TermId, TermId)> {
        self.lock()
            .state
            .triples
            .get(&id)
            .map(|t| (t.subject, t.predicate, t.object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn owner() -> Owner {
        Address::repeat_byte(0x11)
    }

    fn token(milli: u64) -> U256 {
        U256::from(milli) * U256::from(WEI_PER_TOKEN / 1000)
    }

    #[tokio::test]
    async fn test_counter_stake_on_same_curve_reverts() {
        let sim = SimulatedProtocol::with_defaults();
        let (s, p, o) = (sim.seed_atom("s"), sim.seed_atom("p"), sim.seed_atom("o"));
        let t = sim.seed_triple(s, p, o, true);
        sim.mint(owner(), token(100));

        let support = ContractCall::DepositBatch {
            term_ids: vec![t],
            curve_ids: vec![CurveId::Linear],
            amounts: vec![token(1)],
            min_shares: vec![U256::ZERO],
        };
        sim.submit(owner(), &support).await.unwrap();

        let oppose_same_curve = ContractCall::DepositBatch {
            term_ids: vec![counter_term_id(t)],
            curve_ids: vec![CurveId::Linear],
            amounts: vec![token(1)],
            min_shares: vec![U256::ZERO],
        };
        let err = sim.submit(owner(), &oppose_same_curve).await.unwrap_err();
        assert!(matches!(err, TransportError::Reverted(ref r) if r.starts_with("HasCounterStake")));

        let oppose_other_curve = ContractCall::DepositBatch {
            term_ids: vec![counter_term_id(t)],
            curve_ids: vec![CurveId::Progressive],
            amounts: vec![token(1)],
            min_shares: vec![U256::ZERO],
        };
        assert!(sim.submit(owner(), &oppose_other_curve).await.is_ok());
    }

    #[tokio::test]
    async fn test_progressive_against_needs_initialized_vault() {
        let sim = SimulatedProtocol::with_defaults();
        let (s, p, o) = (sim.seed_atom("s"), sim.seed_atom("p"), sim.seed_atom("o"));
        let t = sim.seed_triple(s, p, o, false);
        sim.mint(owner(), token(100));

        let oppose = ContractCall::DepositBatch {
            term_ids: vec![counter_term_id(t)],
            curve_ids: vec![CurveId::Progressive],
            amounts: vec![token(1)],
            min_shares: vec![U256::ZERO],
        };
        let err = sim.submit(owner(), &oppose).await.unwrap_err();
        assert!(matches!(err, TransportError::Reverted(ref r) if r.starts_with("VaultNotInitialized")));
        // failed call left the balance untouched
        assert_eq!(sim.balance(owner()), token(100));
    }

    #[tokio::test]
    async fn test_ghost_shares_survive_full_redeem() {
        let sim = SimulatedProtocol::with_defaults();
        let (s, p, o) = (sim.seed_atom("s"), sim.seed_atom("p"), sim.seed_atom("o"));
        let t = sim.seed_triple(s, p, o, false);
        sim.mint(owner(), token(100));

        let init = ContractCall::DepositBatch {
            term_ids: vec![t],
            curve_ids: vec![CurveId::Progressive],
            amounts: vec![token(1)],
            min_shares: vec![U256::ZERO],
        };
        sim.submit(owner(), &init).await.unwrap();
        let held = sim.shares(owner(), t, CurveId::Progressive);
        let redeem = ContractCall::RedeemBatch {
            term_ids: vec![t],
            curve_ids: vec![CurveId::Progressive],
            shares: vec![held],
            min_assets: vec![U256::ZERO],
        };
        sim.submit(owner(), &redeem).await.unwrap();

        assert!(sim.shares(owner(), t, CurveId::Progressive).is_zero());
        assert_eq!(
            sim.vault(t, CurveId::Progressive).total_shares,
            U256::from(GHOST_SHARES)
        );
    }

    #[tokio::test]
    async fn test_create_triples_folds_excess_into_linear_support() {
        let sim = SimulatedProtocol::with_defaults();
        let (s, p, o) = (sim.seed_atom("s"), sim.seed_atom("p"), sim.seed_atom("o"));
        sim.mint(owner(), token(100));
        let base = sim.config().triple_base_cost;

        let call = ContractCall::CreateTriples {
            subject_ids: vec![s],
            predicate_ids: vec![p],
            object_ids: vec![o],
            values: vec![base + token(2)],
        };
        let tx = sim.submit(owner(), &call).await.unwrap();
        let receipt = sim.wait_for_receipt(tx, 1).await.unwrap();
        let t = triple_id(s, p, o);
        assert_eq!(receipt.created_ids, vec![t]);
        assert!(sim.shares(owner(), t, CurveId::Linear) > U256::ZERO);

        // creating it again reverts
        assert!(sim.submit(owner(), &call).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_ceiling_enforced() {
        let sim = SimulatedProtocol::new(default_contract_config(), 2);
        let call = ContractCall::CreateAtoms {
            labels: vec!["a".into(), "b".into(), "c".into()],
            values: vec![U256::ZERO; 3],
        };
        let err = sim.submit(owner(), &call).await.unwrap_err();
        assert!(matches!(err, TransportError::Reverted(ref r) if r.starts_with("BatchTooLarge")));
    }
}
