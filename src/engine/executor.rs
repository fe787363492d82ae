//! Batch executor
//!
//! Runs a plan one call at a time: submit, wait for confirmation, move on.
//! The first failure stops the run. Confirmed steps stay on-chain; the
//! report names the failed step and the cart is left for a retry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use super::cart::MultiCart;
use super::chain::{ContractCall, SharedClient, TxReceipt};
use super::error::{ExecutionError, TransportError, ValidationError};
use super::planner::{BatchPlan, BatchPlanner, BlockingGuard, PlannedStep, RedeemTarget, StepAction, StepKind};
use super::preview::is_unavailable;
use super::redeem::{RedeemOrchestrator, StalePosition};
use super::store::CartStore;
use super::types::{atom_id, counter_term_id, triple_id, Owner, TermId, TxHash, VaultKey};

/// Re-reads of a just-initialised vault before giving up on seeing it
const REFETCH_ATTEMPTS: u32 = 3;
const REFETCH_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Idle,
    Planning,
    Redeeming,
    Creating,
    Depositing,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutorState {
    fn for_step(kind: StepKind) -> Self {
        match kind {
            StepKind::Redeem | StepKind::RedeemInitialization => ExecutorState::Redeeming,
            StepKind::CreateAtoms | StepKind::CreateTriples => ExecutorState::Creating,
            StepKind::Deposit | StepKind::InitializeVault => ExecutorState::Depositing,
        }
    }
}

/// Progress notifications, in the order things happen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    StateChanged {
        subject_id: TermId,
        state: ExecutorState,
    },
    StepStarted {
        subject_id: TermId,
        index: usize,
        total: usize,
        label: String,
    },
    CallConfirmed {
        subject_id: TermId,
        index: usize,
        tx_hash: TxHash,
        block_number: u64,
    },
    StepSkipped {
        subject_id: TermId,
        index: usize,
        reason: String,
    },
    Completed {
        subject_id: TermId,
        tx_count: usize,
    },
    Failed {
        subject_id: TermId,
        index: Option<usize>,
        error: String,
    },
}

/// Flag checked between steps; cloning shares the flag
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Confirmed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub kind: StepKind,
    pub label: String,
    pub status: StepStatus,
    pub tx_hashes: Vec<TxHash>,
    pub skipped: Vec<StalePosition>,
    /// Deposit positions submitted without a share floor
    pub unguarded_positions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub subject_id: TermId,
    pub subject_name: String,
    pub state: ExecutorState,
    pub total_steps: usize,
    pub steps: Vec<StepOutcome>,
    pub error: Option<ExecutionError>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.state == ExecutorState::Completed
    }

    pub fn tx_count(&self) -> usize {
        self.steps.iter().map(|s| s.tx_hashes.len()).sum()
    }

    fn planning_failed(subject_id: TermId, subject_name: String, error: ExecutionError) -> Self {
        Self {
            subject_id,
            subject_name,
            state: ExecutorState::Failed,
            total_steps: 0,
            steps: Vec::new(),
            error: Some(error),
        }
    }
}

/// Outcome of a founder-by-founder run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiExecutionReport {
    pub reports: Vec<ExecutionReport>,
    /// Founders whose carts executed and were cleared
    pub completed: Vec<TermId>,
    /// Founders not executed, the failed one first
    pub remaining: Vec<TermId>,
}

impl MultiExecutionReport {
    pub fn is_success(&self) -> bool {
        self.remaining.is_empty()
    }
}

pub struct BatchExecutor {
    client: SharedClient,
    planner: BatchPlanner,
    orchestrator: RedeemOrchestrator,
    confirmations: u64,
    events: Option<UnboundedSender<ExecutionEvent>>,
    cancel: CancelHandle,
    state: Mutex<ExecutorState>,
}

impl BatchExecutor {
    pub fn new(client: SharedClient, planner: BatchPlanner, confirmations: u64) -> Self {
        let orchestrator = RedeemOrchestrator::new(
            client.clone(),
            planner.preview().clone(),
            planner.settings().max_batch_size,
        );
        Self {
            client,
            planner,
            orchestrator,
            confirmations,
            events: None,
            cancel: CancelHandle::new(),
            state: Mutex::new(ExecutorState::Idle),
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is watching
            let _ = tx.send(event);
        }
    }

    fn set_state(&self, subject_id: TermId, state: ExecutorState) {
        let mut current = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *current != state {
            *current = state;
            drop(current);
            self.emit(ExecutionEvent::StateChanged { subject_id, state });
        }
    }

    /// Run every step of `plan` in order
    pub async fn execute(&self, plan: &BatchPlan) -> ExecutionReport {
        let subject_id = plan.subject_id;
        let total = plan.steps.len();
        let mut report = ExecutionReport {
            subject_id,
            subject_name: plan.subject_name.clone(),
            state: ExecutorState::Idle,
            total_steps: total,
            steps: Vec::with_capacity(total),
            error: None,
        };
        let mut remap: HashMap<TermId, TermId> = HashMap::new();

        for (index, step) in plan.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Execution for {} cancelled after {}/{} steps",
                    plan.subject_name,
                    index,
                    total
                );
                self.set_state(subject_id, ExecutorState::Cancelled);
                report.state = ExecutorState::Cancelled;
                report.error = Some(ExecutionError::Cancelled {
                    completed_steps: index,
                });
                return report;
            }

            self.set_state(subject_id, ExecutorState::for_step(step.kind));
            self.emit(ExecutionEvent::StepStarted {
                subject_id,
                index,
                total,
                label: step.label.clone(),
            });
            tracing::info!("[{}/{}] {}: {}", index + 1, total, plan.subject_name, step.label);

            match self.run_step(plan.owner, subject_id, index, step, &mut remap).await {
                Ok(outcome) => {
                    if outcome.status == StepStatus::Skipped {
                        self.emit(ExecutionEvent::StepSkipped {
                            subject_id,
                            index,
                            reason: "nothing left to submit".to_string(),
                        });
                    }
                    report.steps.push(outcome);
                }
                Err(source) => {
                    tracing::error!(
                        "[{}/{}] {} failed: {}",
                        index + 1,
                        total,
                        step.label,
                        source
                    );
                    let error = ExecutionError::StepFailed {
                        step_index: index,
                        step_label: step.label.clone(),
                        source,
                    };
                    self.emit(ExecutionEvent::Failed {
                        subject_id,
                        index: Some(index),
                        error: error.to_string(),
                    });
                    self.set_state(subject_id, ExecutorState::Failed);
                    report.state = ExecutorState::Failed;
                    report.error = Some(error);
                    return report;
                }
            }
        }

        self.set_state(subject_id, ExecutorState::Completed);
        report.state = ExecutorState::Completed;
        self.emit(ExecutionEvent::Completed {
            subject_id,
            tx_count: report.tx_count(),
        });
        tracing::info!(
            "Executed {} for {}: {} step(s), {} transaction(s)",
            plan.subject_name,
            plan.owner,
            total,
            report.tx_count()
        );
        report
    }

    async fn run_step(
        &self,
        owner: Owner,
        subject_id: TermId,
        index: usize,
        step: &PlannedStep,
        remap: &mut HashMap<TermId, TermId>,
    ) -> Result<StepOutcome, TransportError> {
        let mut outcome = StepOutcome {
            index,
            kind: step.kind,
            label: step.label.clone(),
            status: StepStatus::Confirmed,
            tx_hashes: Vec::new(),
            skipped: Vec::new(),
            unguarded_positions: 0,
        };

        // Positions opened since planning can still block AGAINST deposits
        if !step.guards.is_empty() {
            let guards: Vec<BlockingGuard> = step
                .guards
                .iter()
                .map(|g| BlockingGuard {
                    triple_id: mapped(remap, g.triple_id),
                    curve_id: g.curve_id,
                })
                .collect();
            let blocking = self
                .orchestrator
                .redeem_blocking_for_positions(owner, &guards)
                .await?;
            for call in &blocking.calls {
                let receipt = self.submit_and_confirm(owner, subject_id, index, call).await?;
                outcome.tx_hashes.push(receipt.tx_hash);
            }
        }

        let calls = match &step.action {
            StepAction::Calls(calls) => {
                let mut out = Vec::with_capacity(calls.len());
                for call in calls {
                    let call = self.reprice(remap_call(call, remap)).await;
                    outcome.unguarded_positions += unguarded_positions(&call);
                    out.push(call);
                }
                out
            }
            StepAction::Redeem(targets) => {
                let targets: Vec<RedeemTarget> = targets
                    .iter()
                    .map(|t| RedeemTarget {
                        term_id: mapped(remap, t.term_id),
                        ..*t
                    })
                    .collect();
                let batch = self.orchestrator.build_redeem_batch(owner, &targets).await?;
                outcome.skipped = batch.skipped;
                batch.calls
            }
            StepAction::RedeemInitialization(keys) => {
                let keys: Vec<VaultKey> = keys
                    .iter()
                    .map(|k| VaultKey::new(mapped(remap, k.term_id), k.curve_id))
                    .collect();
                let batch = self.orchestrator.redeem_all(owner, &keys).await?;
                outcome.skipped = batch.skipped;
                batch.calls
            }
        };

        if calls.is_empty() && outcome.tx_hashes.is_empty() {
            outcome.status = StepStatus::Skipped;
            return Ok(outcome);
        }

        for call in &calls {
            let receipt = self.submit_and_confirm(owner, subject_id, index, call).await?;
            record_created_ids(call, &receipt, remap);
            outcome.tx_hashes.push(receipt.tx_hash);
        }

        if step.kind == StepKind::InitializeVault {
            self.await_initialized(&calls).await?;
        }
        Ok(outcome)
    }

    async fn submit_and_confirm(
        &self,
        owner: Owner,
        subject_id: TermId,
        index: usize,
        call: &ContractCall,
    ) -> Result<TxReceipt, TransportError> {
        tracing::debug!("submitting {} ({} position(s))", call.function_name(), call.len());
        let tx_hash = self.client.submit(owner, call).await?;
        let receipt = self
            .client
            .wait_for_receipt(tx_hash, self.confirmations)
            .await?;
        tracing::info!(
            "{} confirmed in block {} ({})",
            call.function_name(),
            receipt.block_number,
            receipt.tx_hash
        );
        self.emit(ExecutionEvent::CallConfirmed {
            subject_id,
            index,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        });
        Ok(receipt)
    }

    /// Deposits priced before their triple existed carry no min shares;
    /// price them now that it does
    async fn reprice(&self, call: ContractCall) -> ContractCall {
        match call {
            ContractCall::DepositBatch {
                term_ids,
                curve_ids,
                amounts,
                min_shares,
            } if is_unavailable(&min_shares) => {
                let min_shares = self
                    .planner
                    .preview()
                    .calculate_min_shares(&term_ids, &curve_ids, &amounts)
                    .await;
                if is_unavailable(&min_shares) {
                    tracing::warn!(
                        "no deposit preview for {} position(s); submitting without slippage protection",
                        term_ids.len()
                    );
                }
                ContractCall::DepositBatch {
                    term_ids,
                    curve_ids,
                    amounts,
                    min_shares,
                }
            }
            other => other,
        }
    }

    async fn await_initialized(&self, calls: &[ContractCall]) -> Result<(), TransportError> {
        for call in calls {
            let ContractCall::DepositBatch {
                term_ids, curve_ids, ..
            } = call
            else {
                continue;
            };
            for (term_id, curve_id) in term_ids.iter().zip(curve_ids) {
                let ready = self
                    .planner
                    .gate()
                    .refetch_until_initialized(*term_id, *curve_id, REFETCH_ATTEMPTS, REFETCH_DELAY)
                    .await?;
                if !ready {
                    tracing::warn!(
                        "vault {} ({}) still reads empty after initialization",
                        term_id,
                        curve_id.as_str()
                    );
                }
            }
        }
        Ok(())
    }

    /// Plan and execute one founder's cart. On success the cart is cleared
    /// and its store record deleted.
    pub async fn execute_founder(
        &self,
        owner: Owner,
        carts: &mut MultiCart,
        store: &dyn CartStore,
        subject_id: TermId,
    ) -> ExecutionReport {
        let Some(cart) = carts.get(&subject_id).cloned() else {
            return ExecutionReport::planning_failed(
                subject_id,
                subject_id.to_string(),
                ExecutionError::Planning(ValidationError::EmptyCart.into()),
            );
        };

        self.set_state(subject_id, ExecutorState::Planning);
        let plan = match self.planner.plan(owner, &cart).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Planning failed for {}: {}", cart.subject_name, e);
                let error = ExecutionError::Planning(e);
                self.emit(ExecutionEvent::Failed {
                    subject_id,
                    index: None,
                    error: error.to_string(),
                });
                self.set_state(subject_id, ExecutorState::Failed);
                return ExecutionReport::planning_failed(subject_id, cart.subject_name, error);
            }
        };

        let report = self.execute(&plan).await;
        if report.is_success() {
            carts.clear_founder(&subject_id);
            if let Err(e) = store.delete(&subject_id) {
                tracing::warn!("Executed cart for {} but could not delete its record: {}", subject_id, e);
            }
        }
        report
    }

    /// Execute every founder's cart, one founder at a time. Stops at the
    /// first founder that fails; later carts stay untouched.
    pub async fn execute_all(
        &self,
        owner: Owner,
        carts: &mut MultiCart,
        store: &dyn CartStore,
    ) -> MultiExecutionReport {
        let founders = carts.founders();
        let mut out = MultiExecutionReport::default();
        for (i, subject_id) in founders.iter().enumerate() {
            if self.cancel.is_cancelled() {
                out.remaining.extend_from_slice(&founders[i..]);
                break;
            }
            tracing::info!("Founder {}/{}: {}", i + 1, founders.len(), subject_id);
            let report = self.execute_founder(owner, carts, store, *subject_id).await;
            let ok = report.is_success();
            out.reports.push(report);
            if ok {
                out.completed.push(*subject_id);
            } else {
                out.remaining.extend_from_slice(&founders[i..]);
                break;
            }
        }
        out
    }
}

/// Positions in a deposit that carries no share floor at all
fn unguarded_positions(call: &ContractCall) -> usize {
    match call {
        ContractCall::DepositBatch { min_shares, .. } if is_unavailable(min_shares) => min_shares.len(),
        _ => 0,
    }
}

fn mapped(remap: &HashMap<TermId, TermId>, id: TermId) -> TermId {
    remap.get(&id).copied().unwrap_or(id)
}

fn remap_ids(remap: &HashMap<TermId, TermId>, ids: &[TermId]) -> Vec<TermId> {
    ids.iter().map(|id| mapped(remap, *id)).collect()
}

/// Substitute ids the chain assigned for the ones the plan predicted
fn remap_call(call: &ContractCall, remap: &HashMap<TermId, TermId>) -> ContractCall {
    if remap.is_empty() {
        return call.clone();
    }
    match call {
        ContractCall::CreateAtoms { .. } => call.clone(),
        ContractCall::CreateTriples {
            subject_ids,
            predicate_ids,
            object_ids,
            values,
        } => ContractCall::CreateTriples {
            subject_ids: remap_ids(remap, subject_ids),
            predicate_ids: remap_ids(remap, predicate_ids),
            object_ids: remap_ids(remap, object_ids),
            values: values.clone(),
        },
        ContractCall::DepositBatch {
            term_ids,
            curve_ids,
            amounts,
            min_shares,
        } => ContractCall::DepositBatch {
            term_ids: remap_ids(remap, term_ids),
            curve_ids: curve_ids.clone(),
            amounts: amounts.clone(),
            min_shares: min_shares.clone(),
        },
        ContractCall::RedeemBatch {
            term_ids,
            curve_ids,
            shares,
            min_assets,
        } => ContractCall::RedeemBatch {
            term_ids: remap_ids(remap, term_ids),
            curve_ids: curve_ids.clone(),
            shares: shares.clone(),
            min_assets: min_assets.clone(),
        },
    }
}

fn record_created_ids(call: &ContractCall, receipt: &TxReceipt, remap: &mut HashMap<TermId, TermId>) {
    let predicted: Vec<TermId> = match call {
        ContractCall::CreateAtoms { labels, .. } => labels.iter().map(|l| atom_id(l)).collect(),
        ContractCall::CreateTriples {
            subject_ids,
            predicate_ids,
            object_ids,
            ..
        } => subject_ids
            .iter()
            .zip(predicate_ids)
            .zip(object_ids)
            .map(|((s, p), o)| triple_id(*s, *p, *o))
            .collect(),
        _ => return,
    };
    let is_triple = matches!(call, ContractCall::CreateTriples { .. });
    for (predicted, actual) in predicted.iter().zip(&receipt.created_ids) {
        if predicted != actual {
            tracing::info!("chain assigned {} where {} was predicted", actual, predicted);
            remap.insert(*predicted, *actual);
            if is_triple {
                remap.insert(counter_term_id(*predicted), counter_term_id(*actual));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cart::{CartItemDraft, VoteCart};
    use crate::engine::planner::PlannerSettings;
    use crate::engine::store::MemoryCartStore;
    use crate::engine::types::{CurveId, Direction, Ref};
    use crate::sandbox::simulator::{SimulatedProtocol, WEI_PER_TOKEN};
    use alloy_primitives::{Address, U256};

    fn owner() -> Owner {
        Address::repeat_byte(0x33)
    }

    fn setup() -> (Arc<SimulatedProtocol>, BatchExecutor, MultiCart, TermId) {
        let sim = Arc::new(SimulatedProtocol::with_defaults());
        let founder = sim.seed_atom("founder");
        let pred = sim.seed_atom("represented_by");
        sim.mint(owner(), U256::from(WEI_PER_TOKEN));

        let client: SharedClient = sim.clone();
        let planner = BatchPlanner::new(client.clone(), PlannerSettings::default());
        let executor = BatchExecutor::new(client, planner, 1);

        let mut carts = MultiCart::new();
        carts
            .add(
                founder,
                "Founder",
                CartItemDraft {
                    totem: Ref::ByLabel("Lion".into()),
                    totem_name: None,
                    predicate: Ref::Existing(pred),
                    direction: Direction::Support,
                    curve_id: CurveId::Linear,
                    amount: U256::from(WEI_PER_TOKEN / 100),
                    current_position: None,
                },
            )
            .unwrap();
        (sim, executor, carts, founder)
    }

    #[tokio::test]
    async fn test_deposit_without_preview_is_reported_unguarded() {
        let (sim, executor, mut carts, founder) = setup();
        let store = MemoryCartStore::new();
        sim.set_previews_unavailable(true);

        let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
        assert!(report.is_success(), "{:?}", report.error);
        let deposit = report
            .steps
            .iter()
            .find(|s| s.kind == StepKind::Deposit)
            .unwrap();
        assert_eq!(deposit.unguarded_positions, 1);
        assert!(report
            .steps
            .iter()
            .filter(|s| s.kind != StepKind::Deposit)
            .all(|s| s.unguarded_positions == 0));
    }

    #[tokio::test]
    async fn test_deposit_priced_before_its_vault_is_repriced() {
        let (_sim, executor, mut carts, founder) = setup();
        let store = MemoryCartStore::new();

        let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
        assert!(report.is_success(), "{:?}", report.error);
        assert!(report.steps.iter().all(|s| s.unguarded_positions == 0));
    }

    #[tokio::test]
    async fn test_failed_step_stops_and_keeps_cart() {
        let (sim, executor, mut carts, founder) = setup();
        let store = MemoryCartStore::new();
        store.save(carts.get(&founder).unwrap()).unwrap();
        sim.fail_next_submit("boom");

        let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
        assert_eq!(report.state, ExecutorState::Failed);
        assert!(matches!(
            report.error,
            Some(ExecutionError::StepFailed { step_index: 0, .. })
        ));
        assert!(report.steps.is_empty());
        assert_eq!(carts.get(&founder).map(VoteCart::len), Some(1));
        assert!(store.load(&founder).unwrap().is_some());
        assert_eq!(executor.state(), ExecutorState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_between_steps() {
        let (_sim, executor, mut carts, founder) = setup();
        let store = MemoryCartStore::new();
        executor.cancel_handle().cancel();

        let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
        assert_eq!(report.state, ExecutorState::Cancelled);
        assert_eq!(
            report.error,
            Some(ExecutionError::Cancelled { completed_steps: 0 })
        );
        assert!(carts.get(&founder).is_some());
    }

    #[tokio::test]
    async fn test_events_follow_the_run() {
        let (_sim, executor, mut carts, founder) = setup();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let executor = executor.with_events(tx);
        let store = MemoryCartStore::new();

        let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
        assert!(report.is_success(), "{:?}", report.error);
        assert!(carts.get(&founder).is_none());

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        let started = events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::StepStarted { .. }))
            .count();
        assert_eq!(started, report.total_steps);
        assert!(matches!(events.last(), Some(ExecutionEvent::Completed { tx_count, .. }) if *tx_count == report.tx_count()));
    }
}
