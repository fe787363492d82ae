//! Batch planner
//!
//! Turns one founder's cart into the ordered list of calls that executes it:
//!
//! 1. redeem positions that block a requested curve
//! 2. create missing totem atoms
//! 3. create missing triples (linear support folded into creation when the
//!    atoms already exist)
//! 4. deposit on the new triples
//! 5. initialise empty progressive vaults, redeem the seed
//! 6. deposit on existing triples
//!
//! [`draft_plan`] is pure over (cart, snapshot, settings). [`BatchPlanner::plan`]
//! collects the snapshot, drafts, then prices min values and chunks every
//! call to the per-call batch ceiling.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::amount_math::{self, auto_adjust, fee_adjusted_minimum, Adjusted, AutoAdjustPolicy};
use super::cart::VoteCart;
use super::chain::{ContractCall, SharedClient};
use super::curves::{self, CurveAvailability};
use super::dedup::{deduplicate, UniqueTriple};
use super::error::{PlanError, TransportError, ValidationError};
use super::preview::ContractPreviewClient;
use super::snapshot::ChainSnapshot;
use super::types::{
    decimal, triple_id, vault_term, ContractConfig, CurveId, Direction, Owner, TermId, VaultKey,
};
use super::vault_gate::{required_step_count, VaultInitGate};

/// Knobs passed into every planning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    pub slippage_bps: u16,
    pub max_batch_size: usize,
    pub auto_adjust: AutoAdjustPolicy,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            slippage_bps: 50,
            max_batch_size: 50,
            auto_adjust: AutoAdjustPolicy::default(),
        }
    }
}

impl PlannerSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.slippage_bps > amount_math::BPS_DENOMINATOR {
            return Err(ValidationError::SlippageOutOfRange(self.slippage_bps));
        }
        Ok(())
    }
}

// ============================================================================
// Step count
// ============================================================================

/// Shape of a cart, as far as the step count is concerned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCountInput {
    pub has_new_totems: bool,
    pub has_new_triples: bool,
    pub new_triples_are_linear_support_only: bool,
    pub has_redeems: bool,
    pub has_existing_triple_deposits: bool,
    pub any_uninitialized_progressive_oppose: bool,
}

/// Upper bound on the transactions a cart of this shape needs. Never below 1.
pub fn calculate_total_transactions(input: &StepCountInput) -> usize {
    let mut steps = 0;
    if input.has_new_totems {
        steps += 2;
    }
    if input.has_new_triples {
        steps += if input.new_triples_are_linear_support_only {
            1
        } else {
            2
        };
    }
    if input.has_redeems {
        steps += 1;
    }
    if input.has_existing_triple_deposits {
        steps += if input.any_uninitialized_progressive_oppose {
            3
        } else {
            1
        };
    }
    steps.max(1)
}

// ============================================================================
// Chunking
// ============================================================================

/// One call's worth of parallel arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchChunk {
    pub term_ids: Vec<TermId>,
    pub curve_ids: Vec<CurveId>,
    pub values: Vec<U256>,
    pub min_values: Vec<U256>,
}

impl BatchChunk {
    pub fn len(&self) -> usize {
        self.term_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_ids.is_empty()
    }
}

/// Split four parallel arrays into chunks of at most `max_chunk_size`,
/// keeping index correspondence and order. Empty input gives no chunks.
/// A `max_chunk_size` of 0 is treated as 1.
pub fn chunk_batch_arrays(
    term_ids: &[TermId],
    curve_ids: &[CurveId],
    values: &[U256],
    min_values: &[U256],
    max_chunk_size: usize,
) -> Result<Vec<BatchChunk>, ValidationError> {
    let n = term_ids.len();
    if curve_ids.len() != n || values.len() != n || min_values.len() != n {
        return Err(ValidationError::MismatchedBatchArrays);
    }
    let size = max_chunk_size.max(1);
    let mut chunks = Vec::with_capacity(n.div_ceil(size));
    let mut start = 0;
    while start < n {
        let end = (start + size).min(n);
        chunks.push(BatchChunk {
            term_ids: term_ids[start..end].to_vec(),
            curve_ids: curve_ids[start..end].to_vec(),
            values: values[start..end].to_vec(),
            min_values: min_values[start..end].to_vec(),
        });
        start = end;
    }
    Ok(chunks)
}

// ============================================================================
// Plan types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripleCategory {
    /// Totem atom must be created before the triple
    NewTotem,
    /// Atoms exist, triple does not; every item is linear support, folded
    /// into the creation call
    NewLinearSupport,
    /// Atoms exist, triple does not; creation plus a separate deposit
    NewMixed,
    /// Triple exists: deposit only, or the three-call progressive sequence
    Existing,
}

impl TripleCategory {
    pub fn is_new(&self) -> bool {
        !matches!(self, TripleCategory::Existing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTriple {
    pub triple_id: TermId,
    pub predicate_id: TermId,
    pub object_id: TermId,
    pub object_name: String,
    pub category: TripleCategory,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Redeem,
    CreateAtoms,
    CreateTriples,
    Deposit,
    InitializeVault,
    RedeemInitialization,
}

/// A position to redeem in full; shares are re-read at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemTarget {
    pub term_id: TermId,
    pub curve_id: CurveId,
    /// Shares seen while planning
    #[serde(with = "decimal")]
    pub cached_shares: U256,
}

/// Before an AGAINST deposit on `curve_id`, the owner's FOR shares on the
/// same curve must be gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockingGuard {
    pub triple_id: TermId,
    pub curve_id: CurveId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StepAction {
    /// Fully specified calls, submitted in order
    Calls(Vec<ContractCall>),
    /// Redeem calls built from live shares when the step runs
    Redeem(Vec<RedeemTarget>),
    /// Redeem whatever the owner holds in these freshly seeded vaults
    RedeemInitialization(Vec<VaultKey>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub kind: StepKind,
    pub label: String,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guards: Vec<BlockingGuard>,
}

impl PlannedStep {
    fn calls(kind: StepKind, label: String, call: ContractCall) -> Self {
        Self {
            kind,
            label,
            action: StepAction::Calls(vec![call]),
            guards: Vec::new(),
        }
    }

    /// Calls known at planning time (zero for redeem steps)
    pub fn call_count(&self) -> usize {
        match &self.action {
            StepAction::Calls(calls) => calls.len(),
            StepAction::Redeem(_) | StepAction::RedeemInitialization(_) => 0,
        }
    }
}

/// An amount rounded up to the minimum deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountAdjustment {
    pub item_id: String,
    #[serde(with = "decimal")]
    pub from: U256,
    #[serde(with = "decimal")]
    pub to: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub subject_id: TermId,
    pub subject_name: String,
    pub owner: Owner,
    pub steps: Vec<PlannedStep>,
    pub estimated_steps: usize,
    #[serde(with = "decimal")]
    pub required_total: U256,
    #[serde(with = "decimal")]
    pub balance: U256,
    pub config: ContractConfig,
    pub triples: Vec<PlannedTriple>,
    pub adjustments: Vec<AmountAdjustment>,
    pub item_ids: Vec<String>,
}

impl BatchPlan {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

// ============================================================================
// Drafting
// ============================================================================

/// Validate the cart against the snapshot and lay out the steps. Deposit
/// min values are left at zero; [`BatchPlanner::plan`] fills them in.
pub fn draft_plan(
    cart: &VoteCart,
    snapshot: &ChainSnapshot,
    settings: &PlannerSettings,
) -> Result<BatchPlan, PlanError> {
    settings.validate()?;
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }
    if let Some(item) = cart.items.iter().find(|i| i.amount.is_zero()) {
        return Err(ValidationError::ZeroAmount {
            item_id: item.id.clone(),
        }
        .into());
    }
    check_conflicts(cart)?;

    let config = snapshot.config;
    if !snapshot.exists(&cart.subject_id) {
        return Err(ValidationError::UnknownSubject(cart.subject_id).into());
    }
    if let Some(item) = cart
        .items
        .iter()
        .find(|i| !snapshot.exists(&i.predicate_id))
    {
        return Err(ValidationError::UnknownPredicate(item.predicate_id).into());
    }

    // Amounts, after auto-adjust against the fee-adjusted minimum
    let minimum = fee_adjusted_minimum(config.min_deposit, config.entry_fee_bps);
    let mut adjustments = Vec::new();
    let mut amounts = HashMap::with_capacity(cart.len());
    for item in &cart.items {
        let amount = match auto_adjust(item.amount, minimum, settings.auto_adjust) {
            Adjusted::Unchanged(v) => v,
            Adjusted::RoundedUp { from, to } => {
                tracing::debug!("item {}: rounded {} up to {}", item.id, from, to);
                adjustments.push(AmountAdjustment {
                    item_id: item.id.clone(),
                    from,
                    to,
                });
                to
            }
            Adjusted::Short { amount, .. } => {
                return Err(ValidationError::AmountBelowMinimum {
                    item_id: item.id.clone(),
                    amount,
                    minimum,
                }
                .into());
            }
        };
        amounts.insert(item.id.clone(), amount);
    }
    let amount_of = |id: &str| amounts.get(id).copied().unwrap_or_default();

    // Any item proposing a totem by label creates it for the whole cart
    let mut totem_labels: HashMap<TermId, &str> = HashMap::new();
    for item in &cart.items {
        if let Some(label) = &item.totem_label {
            totem_labels.entry(item.totem_id).or_insert(label.as_str());
        }
    }

    let groups = deduplicate(cart);
    for g in &groups {
        let tid = g.triple_id();
        if g.is_proposal() && snapshot.exists(&tid) {
            return Err(PlanError::ClaimExists {
                subject_id: g.subject_id,
                predicate_id: g.predicate_id,
                object_id: g.object_id,
                triple_id: tid,
            });
        }
        if !snapshot.exists(&g.object_id) && !totem_labels.contains_key(&g.object_id) {
            return Err(ValidationError::UnresolvableTotem(g.object_id).into());
        }
    }

    // Categorise
    let mut planned = Vec::with_capacity(groups.len());
    let mut new_atom_labels: Vec<String> = Vec::new();
    let mut new_atom_ids = HashSet::new();
    for g in &groups {
        let category = categorize(g, snapshot);
        if category == TripleCategory::NewTotem && new_atom_ids.insert(g.object_id) {
            if let Some(label) = totem_labels.get(&g.object_id) {
                new_atom_labels.push(label.to_string());
            }
        }
        planned.push(PlannedTriple {
            triple_id: g.triple_id(),
            predicate_id: g.predicate_id,
            object_id: g.object_id,
            object_name: g.object_name.clone(),
            category,
            item_ids: g.items.iter().map(|i| i.id.clone()).collect(),
        });
    }

    // Blocking positions and vault initialisation on existing triples
    let mut redeem_targets: Vec<RedeemTarget> = Vec::new();
    let mut init_keys: Vec<VaultKey> = Vec::new();
    for (g, p) in groups.iter().zip(&planned) {
        if p.category != TripleCategory::Existing {
            continue;
        }
        let positions = snapshot.positions_for(p.triple_id);
        for item in &g.items {
            let availability: CurveAvailability = curves::resolve_for(
                item.direction,
                &positions,
                None,
                item.predicate_id,
                item.totem_id,
            );
            if !availability.is_available(item.curve_id) {
                let term_id = vault_term(p.triple_id, item.direction.opposite());
                tracing::info!(
                    "{} {} on {} is blocked ({}); scheduling redeem",
                    item.direction.as_str(),
                    item.curve_id.as_str(),
                    p.object_name,
                    availability.blocked_reason.as_deref().unwrap_or("opposite position")
                );
                redeem_targets.push(RedeemTarget {
                    term_id,
                    curve_id: item.curve_id,
                    cached_shares: snapshot.shares(term_id, item.curve_id),
                });
            }
            let initialized = snapshot.is_progressive_initialized(p.triple_id);
            if required_step_count(item.direction, item.curve_id, initialized) == 3 {
                let key = VaultKey::new(p.triple_id, CurveId::Progressive);
                if !init_keys.contains(&key) {
                    init_keys.push(key);
                }
            }
        }
    }

    // Balance
    let new_triple_count = planned.iter().filter(|p| p.category.is_new()).count();
    let deposits = amount_math::sum(amounts.values());
    let required_total = config
        .atom_cost
        .saturating_mul(U256::from(new_atom_labels.len()))
        .saturating_add(config.triple_base_cost.saturating_mul(U256::from(new_triple_count)))
        .saturating_add(deposits)
        .saturating_add(minimum.saturating_mul(U256::from(init_keys.len())));
    if snapshot.balance < required_total {
        return Err(PlanError::InsufficientBalance {
            required: required_total,
            available: snapshot.balance,
            deficit: required_total - snapshot.balance,
        });
    }

    // Steps
    let mut steps = Vec::new();

    if !redeem_targets.is_empty() {
        steps.push(PlannedStep {
            kind: StepKind::Redeem,
            label: format!("Redeem {} blocking position(s)", redeem_targets.len()),
            action: StepAction::Redeem(redeem_targets.clone()),
            guards: Vec::new(),
        });
    }

    if !new_atom_labels.is_empty() {
        steps.push(PlannedStep::calls(
            StepKind::CreateAtoms,
            format!("Create {} totem atom(s)", new_atom_labels.len()),
            ContractCall::CreateAtoms {
                values: vec![config.atom_cost; new_atom_labels.len()],
                labels: new_atom_labels.clone(),
            },
        ));
    }

    let mut new_linear = DepositArrays::default();
    let mut new_rest = DepositArrays::default();
    if new_triple_count > 0 {
        let (mut s, mut pr, mut o, mut v) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for (g, p) in groups.iter().zip(&planned) {
            if !p.category.is_new() {
                continue;
            }
            s.push(g.subject_id);
            pr.push(g.predicate_id);
            o.push(g.object_id);
            let mut value = config.triple_base_cost;
            for item in &g.items {
                let amount = amount_of(&item.id);
                let linear_support =
                    item.curve_id == CurveId::Linear && item.direction == Direction::Support;
                match p.category {
                    TripleCategory::NewTotem if linear_support => {
                        new_linear.push(p.triple_id, item.direction, item.curve_id, amount)
                    }
                    TripleCategory::NewLinearSupport | TripleCategory::NewMixed
                        if linear_support =>
                    {
                        value = value.saturating_add(amount)
                    }
                    _ => new_rest.push(p.triple_id, item.direction, item.curve_id, amount),
                }
            }
            v.push(value);
        }
        steps.push(PlannedStep::calls(
            StepKind::CreateTriples,
            format!("Create {} triple(s)", new_triple_count),
            ContractCall::CreateTriples {
                subject_ids: s,
                predicate_ids: pr,
                object_ids: o,
                values: v,
            },
        ));
    }
    if !new_linear.is_empty() {
        steps.push(new_linear.into_step("Deposit linear support on new triples"));
    }
    if !new_rest.is_empty() {
        steps.push(new_rest.into_step("Deposit on new triples"));
    }

    if !init_keys.is_empty() {
        steps.push(PlannedStep::calls(
            StepKind::InitializeVault,
            format!("Initialize {} progressive vault(s)", init_keys.len()),
            ContractCall::DepositBatch {
                term_ids: init_keys.iter().map(|k| k.term_id).collect(),
                curve_ids: init_keys.iter().map(|k| k.curve_id).collect(),
                amounts: vec![minimum; init_keys.len()],
                min_shares: vec![U256::ZERO; init_keys.len()],
            },
        ));
        steps.push(PlannedStep {
            kind: StepKind::RedeemInitialization,
            label: format!("Redeem {} initialization deposit(s)", init_keys.len()),
            action: StepAction::RedeemInitialization(init_keys.clone()),
            guards: Vec::new(),
        });
    }

    let mut existing = DepositArrays::default();
    for (g, p) in groups.iter().zip(&planned) {
        if p.category != TripleCategory::Existing {
            continue;
        }
        for item in &g.items {
            existing.push(p.triple_id, item.direction, item.curve_id, amount_of(&item.id));
        }
    }
    if !existing.is_empty() {
        steps.push(existing.into_step("Deposit on existing triples"));
    }

    let new_groups: Vec<&UniqueTriple> = groups
        .iter()
        .zip(&planned)
        .filter(|(_, p)| p.category.is_new())
        .map(|(g, _)| g)
        .collect();
    let estimated_steps = calculate_total_transactions(&StepCountInput {
        has_new_totems: !new_atom_labels.is_empty(),
        has_new_triples: !new_groups.is_empty(),
        new_triples_are_linear_support_only: new_groups.iter().all(|g| g.is_linear_support_only()),
        has_redeems: !redeem_targets.is_empty(),
        has_existing_triple_deposits: planned
            .iter()
            .any(|p| p.category == TripleCategory::Existing),
        any_uninitialized_progressive_oppose: !init_keys.is_empty(),
    });

    Ok(BatchPlan {
        subject_id: cart.subject_id,
        subject_name: cart.subject_name.clone(),
        owner: snapshot.owner,
        steps,
        estimated_steps,
        required_total,
        balance: snapshot.balance,
        config,
        triples: planned,
        adjustments,
        item_ids: cart.items.iter().map(|i| i.id.clone()).collect(),
    })
}

fn categorize(g: &UniqueTriple, snapshot: &ChainSnapshot) -> TripleCategory {
    if snapshot.exists(&triple_id(g.subject_id, g.predicate_id, g.object_id)) {
        TripleCategory::Existing
    } else if !snapshot.exists(&g.object_id) {
        TripleCategory::NewTotem
    } else if g.is_linear_support_only() {
        TripleCategory::NewLinearSupport
    } else {
        TripleCategory::NewMixed
    }
}

/// Support and oppose on the same triple and curve cannot both be in a cart
fn check_conflicts(cart: &VoteCart) -> Result<(), ValidationError> {
    for (i, a) in cart.items.iter().enumerate() {
        if let Some(b) = cart.items[i + 1..].iter().find(|b| {
            b.predicate_id == a.predicate_id
                && b.totem_id == a.totem_id
                && b.curve_id == a.curve_id
                && b.direction != a.direction
        }) {
            return Err(ValidationError::ConflictingItems {
                first: a.id.clone(),
                second: b.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Default)]
struct DepositArrays {
    term_ids: Vec<TermId>,
    curve_ids: Vec<CurveId>,
    amounts: Vec<U256>,
    guards: Vec<BlockingGuard>,
}

impl DepositArrays {
    fn push(&mut self, triple: TermId, direction: Direction, curve_id: CurveId, amount: U256) {
        self.term_ids.push(vault_term(triple, direction));
        self.curve_ids.push(curve_id);
        self.amounts.push(amount);
        if direction == Direction::Oppose {
            let guard = BlockingGuard {
                triple_id: triple,
                curve_id,
            };
            if !self.guards.contains(&guard) {
                self.guards.push(guard);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.term_ids.is_empty()
    }

    fn into_step(self, label: &str) -> PlannedStep {
        let n = self.term_ids.len();
        PlannedStep {
            kind: StepKind::Deposit,
            label: format!("{} ({} position(s))", label, n),
            action: StepAction::Calls(vec![ContractCall::DepositBatch {
                term_ids: self.term_ids,
                curve_ids: self.curve_ids,
                amounts: self.amounts,
                min_shares: vec![U256::ZERO; n],
            }]),
            guards: self.guards,
        }
    }
}

// ============================================================================
// Planner
// ============================================================================

#[derive(Clone)]
pub struct BatchPlanner {
    client: SharedClient,
    preview: ContractPreviewClient,
    gate: VaultInitGate,
    settings: PlannerSettings,
}

impl BatchPlanner {
    pub fn new(client: SharedClient, settings: PlannerSettings) -> Self {
        Self {
            preview: ContractPreviewClient::new(client.clone(), settings.slippage_bps),
            gate: VaultInitGate::new(client.clone()),
            client,
            settings,
        }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn preview(&self) -> &ContractPreviewClient {
        &self.preview
    }

    pub fn gate(&self) -> &VaultInitGate {
        &self.gate
    }

    /// Snapshot, draft, price, chunk
    pub async fn plan(&self, owner: Owner, cart: &VoteCart) -> Result<BatchPlan, PlanError> {
        self.settings.validate()?;
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let snapshot = ChainSnapshot::collect(&self.client, &self.gate, owner, cart).await?;
        let mut plan = draft_plan(cart, &snapshot, &self.settings)?;
        self.price_and_chunk(&mut plan).await?;

        tracing::info!(
            "Planned {} for {}: {} step(s) (estimate {}), required {}",
            cart.subject_name,
            owner,
            plan.steps.len(),
            plan.estimated_steps,
            plan.required_total
        );
        Ok(plan)
    }

    /// Fill deposit min shares from previews and split every call to the
    /// batch ceiling
    pub async fn price_and_chunk(&self, plan: &mut BatchPlan) -> Result<(), ValidationError> {
        let max = self.settings.max_batch_size;
        for step in &mut plan.steps {
            let StepAction::Calls(calls) = &mut step.action else {
                continue;
            };
            let mut out = Vec::with_capacity(calls.len());
            for call in calls.drain(..) {
                match call {
                    ContractCall::DepositBatch {
                        term_ids,
                        curve_ids,
                        amounts,
                        ..
                    } => {
                        let min_shares = self
                            .preview
                            .calculate_min_shares(&term_ids, &curve_ids, &amounts)
                            .await;
                        for chunk in
                            chunk_batch_arrays(&term_ids, &curve_ids, &amounts, &min_shares, max)?
                        {
                            out.push(ContractCall::DepositBatch {
                                term_ids: chunk.term_ids,
                                curve_ids: chunk.curve_ids,
                                amounts: chunk.values,
                                min_shares: chunk.min_values,
                            });
                        }
                    }
                    ContractCall::CreateAtoms { labels, values } => {
                        if labels.len() != values.len() {
                            return Err(ValidationError::MismatchedBatchArrays);
                        }
                        for (l, v) in labels.chunks(max.max(1)).zip(values.chunks(max.max(1))) {
                            out.push(ContractCall::CreateAtoms {
                                labels: l.to_vec(),
                                values: v.to_vec(),
                            });
                        }
                    }
                    ContractCall::CreateTriples {
                        subject_ids,
                        predicate_ids,
                        object_ids,
                        values,
                    } => {
                        let size = max.max(1);
                        let n = subject_ids.len();
                        if predicate_ids.len() != n || object_ids.len() != n || values.len() != n {
                            return Err(ValidationError::MismatchedBatchArrays);
                        }
                        let mut start = 0;
                        while start < n {
                            let end = (start + size).min(n);
                            out.push(ContractCall::CreateTriples {
                                subject_ids: subject_ids[start..end].to_vec(),
                                predicate_ids: predicate_ids[start..end].to_vec(),
                                object_ids: object_ids[start..end].to_vec(),
                                values: values[start..end].to_vec(),
                            });
                            start = end;
                        }
                    }
                    other => out.push(other),
                }
            }
            *calls = out;
        }
        Ok(())
    }

    /// Live curve availability for one prospective vote
    pub async fn curve_availability(
        &self,
        owner: Owner,
        cart: Option<&VoteCart>,
        subject_id: TermId,
        predicate_id: TermId,
        totem_id: TermId,
        direction: Direction,
    ) -> Result<CurveAvailability, TransportError> {
        let triple = triple_id(subject_id, predicate_id, totem_id);
        let mut keys = Vec::with_capacity(4);
        let mut meta = Vec::with_capacity(4);
        for d in [Direction::Support, Direction::Oppose] {
            for curve in CurveId::all() {
                keys.push(VaultKey::new(vault_term(triple, d), *curve));
                meta.push((d, *curve));
            }
        }
        let shares = self.client.get_positions(owner, &keys).await?;
        let positions: Vec<_> = meta
            .into_iter()
            .zip(shares)
            .filter(|(_, s)| !s.is_zero())
            .map(|((direction, curve_id), shares)| super::types::Position {
                direction,
                curve_id,
                shares,
            })
            .collect();
        Ok(curves::resolve_for(
            direction,
            &positions,
            cart,
            predicate_id,
            totem_id,
        ))
    }
}
