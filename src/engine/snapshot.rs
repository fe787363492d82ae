//! Chain snapshot for one planning pass
//!
//! Everything the planner reads from chain, fetched once up front with
//! multicalls. The planner never goes back to the chain mid-pass.

use alloy_primitives::U256;
use std::collections::{HashMap, HashSet};

use super::cart::VoteCart;
use super::chain::SharedClient;
use super::error::TransportError;
use super::types::{
    triple_id, vault_term, ContractConfig, CurveId, Direction, Owner, Position, TermId, VaultKey,
};
use super::vault_gate::VaultInitGate;

#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub owner: Owner,
    pub config: ContractConfig,
    pub balance: U256,
    existing: HashSet<TermId>,
    /// Owner shares per vault touched by the cart
    shares: HashMap<VaultKey, U256>,
    /// Progressive FOR vault initialisation, per triple
    initialized: HashMap<VaultKey, bool>,
}

impl ChainSnapshot {
    /// Read config, term existence, positions, vault states and balance for
    /// everything `cart` touches
    pub async fn collect(
        client: &SharedClient,
        gate: &VaultInitGate,
        owner: Owner,
        cart: &VoteCart,
    ) -> Result<Self, TransportError> {
        let config = client.contract_config().await?;
        let balance = client.balance_of(owner).await?;

        let mut terms: Vec<TermId> = vec![cart.subject_id];
        let mut triples: Vec<TermId> = Vec::new();
        for item in &cart.items {
            terms.push(item.predicate_id);
            terms.push(item.totem_id);
            triples.push(triple_id(cart.subject_id, item.predicate_id, item.totem_id));
        }
        dedup_in_place(&mut triples);
        terms.extend(triples.iter().copied());
        dedup_in_place(&mut terms);

        let flags = client.terms_exist(&terms).await?;
        let existing: HashSet<TermId> = terms
            .iter()
            .zip(flags)
            .filter_map(|(id, exists)| exists.then_some(*id))
            .collect();

        let live: Vec<TermId> = triples
            .iter()
            .copied()
            .filter(|t| existing.contains(t))
            .collect();

        let mut keys = Vec::with_capacity(live.len() * 4);
        for t in &live {
            for direction in [Direction::Support, Direction::Oppose] {
                for curve in CurveId::all() {
                    keys.push(VaultKey::new(vault_term(*t, direction), *curve));
                }
            }
        }
        let shares = if keys.is_empty() {
            HashMap::new()
        } else {
            let values = client.get_positions(owner, &keys).await?;
            keys.into_iter().zip(values).collect()
        };

        let progressive: Vec<VaultKey> = live
            .iter()
            .map(|t| VaultKey::new(*t, CurveId::Progressive))
            .collect();
        let initialized = gate.statuses(&progressive).await?;

        tracing::debug!(
            "snapshot for {}: {} terms ({} exist), {} live triples, balance {}",
            cart.subject_id,
            terms.len(),
            existing.len(),
            live.len(),
            balance
        );

        Ok(Self {
            owner,
            config,
            balance,
            existing,
            shares,
            initialized,
        })
    }

    /// Build a snapshot by hand (tests, offline planning)
    pub fn from_parts(owner: Owner, config: ContractConfig, balance: U256) -> Self {
        Self {
            owner,
            config,
            balance,
            existing: HashSet::new(),
            shares: HashMap::new(),
            initialized: HashMap::new(),
        }
    }

    pub fn with_existing(mut self, ids: impl IntoIterator<Item = TermId>) -> Self {
        self.existing.extend(ids);
        self
    }

    pub fn with_shares(mut self, term_id: TermId, curve_id: CurveId, shares: U256) -> Self {
        self.shares.insert(VaultKey::new(term_id, curve_id), shares);
        self
    }

    pub fn with_initialized(mut self, triple: TermId, initialized: bool) -> Self {
        self.initialized
            .insert(VaultKey::new(triple, CurveId::Progressive), initialized);
        self
    }

    pub fn exists(&self, id: &TermId) -> bool {
        self.existing.contains(id)
    }

    pub fn shares(&self, term_id: TermId, curve_id: CurveId) -> U256 {
        self.shares
            .get(&VaultKey::new(term_id, curve_id))
            .copied()
            .unwrap_or_default()
    }

    /// Owner's non-zero positions on a triple, both sides and both curves
    pub fn positions_for(&self, triple: TermId) -> Vec<Position> {
        let mut out = Vec::new();
        for direction in [Direction::Support, Direction::Oppose] {
            for curve in CurveId::all() {
                let shares = self.shares(vault_term(triple, direction), *curve);
                if !shares.is_zero() {
                    out.push(Position {
                        direction,
                        curve_id: *curve,
                        shares,
                    });
                }
            }
        }
        out
    }

    /// Whether the triple's progressive FOR vault holds shares. Triples not
    /// read in this pass (not yet created) count as initialised: creation
    /// seeds every curve.
    pub fn is_progressive_initialized(&self, triple: TermId) -> bool {
        self.initialized
            .get(&VaultKey::new(triple, CurveId::Progressive))
            .copied()
            .unwrap_or(true)
    }
}

fn dedup_in_place(ids: &mut Vec<TermId>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
}
