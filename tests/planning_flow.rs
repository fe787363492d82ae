//! End-to-end planning and execution against the simulated protocol

use alloy_primitives::{Address, U256};
use std::sync::Arc;

use vote_cart_backend::engine::cart::{CartItemDraft, MultiCart, VoteCart};
use vote_cart_backend::engine::chain::SharedClient;
use vote_cart_backend::engine::error::{ExecutionError, PlanError};
use vote_cart_backend::engine::executor::{BatchExecutor, ExecutorState};
use vote_cart_backend::engine::planner::{BatchPlanner, PlannerSettings, StepAction, StepKind};
use vote_cart_backend::engine::store::{CartStore, MemoryCartStore};
use vote_cart_backend::engine::types::{
    atom_id, counter_term_id, triple_id, ContractConfig, CurveId, Direction, Owner, Ref, TermId,
};
use vote_cart_backend::sandbox::simulator::{default_contract_config, SimulatedProtocol, WEI_PER_TOKEN};

const MILLI: u64 = WEI_PER_TOKEN / 1000;

fn owner() -> Owner {
    Address::repeat_byte(0xA1)
}

struct Harness {
    sim: Arc<SimulatedProtocol>,
    planner: BatchPlanner,
    executor: BatchExecutor,
    pred: TermId,
}

fn harness(sim: SimulatedProtocol) -> Harness {
    let sim = Arc::new(sim);
    let pred = sim.seed_atom("represented_by");
    let client: SharedClient = sim.clone();
    let planner = BatchPlanner::new(client.clone(), PlannerSettings::default());
    let executor = BatchExecutor::new(client, planner.clone(), 1);
    Harness {
        sim,
        planner,
        executor,
        pred,
    }
}

fn vote(pred: TermId, totem: Ref, direction: Direction, curve_id: CurveId, amount: u64) -> CartItemDraft {
    CartItemDraft {
        totem,
        totem_name: None,
        predicate: Ref::Existing(pred),
        direction,
        curve_id,
        amount: U256::from(amount),
        current_position: None,
    }
}

#[tokio::test]
async fn insufficient_balance_reports_deficit_before_any_call() {
    let h = harness(SimulatedProtocol::new(
        ContractConfig {
            triple_base_cost: U256::from(MILLI / 2),
            atom_cost: U256::ZERO,
            min_deposit: U256::from(MILLI / 10),
            entry_fee_bps: 0,
        },
        50,
    ));
    let founder = h.sim.seed_atom("Ada Lovelace");
    h.sim.mint(owner(), U256::from(2 * MILLI));

    let mut cart = VoteCart::new(founder, "Ada Lovelace");
    cart.add(vote(h.pred, Ref::ByLabel("Owl".into()), Direction::Support, CurveId::Linear, 2 * MILLI))
        .unwrap();

    let err = h.planner.plan(owner(), &cart).await.unwrap_err();
    assert_eq!(
        err,
        PlanError::InsufficientBalance {
            required: U256::from(2 * MILLI + MILLI / 2),
            available: U256::from(2 * MILLI),
            deficit: U256::from(MILLI / 2),
        }
    );
    // nothing was spent
    assert_eq!(h.sim.balance(owner()), U256::from(2 * MILLI));
    assert!(!h.sim.term_exists(atom_id("Owl")));
}

#[tokio::test]
async fn new_totem_is_created_and_voted_on() {
    let h = harness(SimulatedProtocol::with_defaults());
    let founder = h.sim.seed_atom("Ada Lovelace");
    h.sim.mint(owner(), U256::from(WEI_PER_TOKEN));

    let mut carts = MultiCart::new();
    carts
        .add(
            founder,
            "Ada Lovelace",
            vote(h.pred, Ref::ByLabel("Owl".into()), Direction::Support, CurveId::Linear, 10 * MILLI),
        )
        .unwrap();
    carts
        .add(
            founder,
            "Ada Lovelace",
            vote(h.pred, Ref::ByLabel("Owl".into()), Direction::Oppose, CurveId::Progressive, 5 * MILLI),
        )
        .unwrap();
    let store = MemoryCartStore::new();
    store.save(carts.get(&founder).unwrap()).unwrap();

    let plan = h.planner.plan(owner(), carts.get(&founder).unwrap()).await.unwrap();
    assert_eq!(plan.steps[0].kind, StepKind::CreateAtoms);
    assert_eq!(plan.steps[1].kind, StepKind::CreateTriples);
    assert!(plan.steps.len() <= plan.estimated_steps);

    let report = h.executor.execute_founder(owner(), &mut carts, &store, founder).await;
    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.state, ExecutorState::Completed);

    let owl = atom_id("Owl");
    let t = triple_id(founder, h.pred, owl);
    assert!(h.sim.term_exists(owl));
    assert!(h.sim.term_exists(t));
    assert!(h.sim.shares(owner(), t, CurveId::Linear) > U256::ZERO);
    assert!(h.sim.shares(owner(), counter_term_id(t), CurveId::Progressive) > U256::ZERO);

    // executed carts are gone, in memory and on disk
    assert!(carts.is_empty());
    assert!(store.load(&founder).unwrap().is_none());
    assert!(h.sim.balance(owner()) < U256::from(WEI_PER_TOKEN));
}

#[tokio::test]
async fn existing_claims_redeem_blockers_and_initialize_progressive() {
    let h = harness(SimulatedProtocol::with_defaults());
    let founder = h.sim.seed_atom("Grace Hopper");
    let lion = h.sim.seed_atom("Lion");
    let owl = h.sim.seed_atom("Owl");
    let t_lion = h.sim.seed_triple(founder, h.pred, lion, true);
    // created before curve seeding: progressive FOR vault is empty
    let t_owl = h.sim.seed_triple(founder, h.pred, owl, false);
    h.sim.mint(owner(), U256::from(WEI_PER_TOKEN));
    h.sim
        .seed_position(owner(), counter_term_id(t_lion), CurveId::Linear, U256::from(500u64));

    let mut carts = MultiCart::new();
    carts
        .add(founder, "Grace Hopper", vote(h.pred, Ref::Existing(lion), Direction::Support, CurveId::Linear, MILLI))
        .unwrap();
    carts
        .add(founder, "Grace Hopper", vote(h.pred, Ref::Existing(owl), Direction::Oppose, CurveId::Progressive, MILLI))
        .unwrap();

    let plan = h.planner.plan(owner(), carts.get(&founder).unwrap()).await.unwrap();
    let kinds: Vec<StepKind> = plan.steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Redeem,
            StepKind::InitializeVault,
            StepKind::RedeemInitialization,
            StepKind::Deposit
        ]
    );

    let store = MemoryCartStore::new();
    let report = h.executor.execute_founder(owner(), &mut carts, &store, founder).await;
    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.steps.len(), 4);

    // blocking AGAINST position redeemed, FOR deposit landed
    assert!(h.sim.shares(owner(), counter_term_id(t_lion), CurveId::Linear).is_zero());
    assert!(h.sim.shares(owner(), t_lion, CurveId::Linear) > U256::ZERO);
    // init deposit was taken back out, the vault stays seeded
    assert!(h.sim.shares(owner(), t_owl, CurveId::Progressive).is_zero());
    assert!(h.sim.vault(t_owl, CurveId::Progressive).total_shares > U256::ZERO);
    assert!(h.sim.shares(owner(), counter_term_id(t_owl), CurveId::Progressive) > U256::ZERO);
}

#[tokio::test]
async fn execute_all_stops_at_first_failing_founder() {
    let h = harness(SimulatedProtocol::with_defaults());
    let a = h.sim.seed_atom("Ada Lovelace");
    let b = h.sim.seed_atom("Satoshi Nakamoto");
    let phoenix = h.sim.seed_atom("Phoenix");
    h.sim.mint(owner(), U256::from(WEI_PER_TOKEN));

    // runs are ordered by founder id
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    // the second founder proposes a claim that already exists
    h.sim.seed_triple(second, h.pred, phoenix, true);

    let mut carts = MultiCart::new();
    carts
        .add(first, "first", vote(h.pred, Ref::ByLabel("Owl".into()), Direction::Support, CurveId::Linear, MILLI))
        .unwrap();
    carts
        .add(second, "second", vote(h.pred, Ref::ByLabel("Phoenix".into()), Direction::Support, CurveId::Linear, MILLI))
        .unwrap();
    let store = MemoryCartStore::new();
    for cart in carts.carts() {
        store.save(cart).unwrap();
    }

    let out = h.executor.execute_all(owner(), &mut carts, &store).await;
    assert!(!out.is_success());
    assert_eq!(out.completed, vec![first]);
    assert_eq!(out.remaining, vec![second]);
    assert!(matches!(
        out.reports[1].error,
        Some(ExecutionError::Planning(PlanError::ClaimExists { .. }))
    ));

    assert!(carts.get(&first).is_none());
    assert_eq!(carts.get(&second).map(VoteCart::len), Some(1));
    assert!(store.load(&first).unwrap().is_none());
    assert!(store.load(&second).unwrap().is_some());
}

#[tokio::test]
async fn opposite_linear_position_leaves_progressive_open() {
    let h = harness(SimulatedProtocol::with_defaults());
    let founder = h.sim.seed_atom("Ada Lovelace");
    let lion = h.sim.seed_atom("Lion");
    let t = h.sim.seed_triple(founder, h.pred, lion, true);
    h.sim
        .seed_position(owner(), counter_term_id(t), CurveId::Linear, U256::from(500u64));

    let availability = h
        .planner
        .curve_availability(owner(), None, founder, h.pred, lion, Direction::Support)
        .await
        .unwrap();
    assert!(!availability.linear);
    assert!(availability.progressive);
    assert!(!availability.all_blocked);
    assert_eq!(availability.preferred_curve(), Some(CurveId::Progressive));

    // the cart also blocks: an oppose progressive item closes the other curve
    let mut cart = VoteCart::new(founder, "Ada Lovelace");
    cart.add(vote(h.pred, Ref::Existing(lion), Direction::Oppose, CurveId::Progressive, MILLI))
        .unwrap();
    let availability = h
        .planner
        .curve_availability(owner(), Some(&cart), founder, h.pred, lion, Direction::Support)
        .await
        .unwrap();
    assert!(availability.all_blocked);
}

#[tokio::test]
async fn unreachable_chain_fails_planning_cleanly() {
    let h = harness(SimulatedProtocol::with_defaults());
    let founder = h.sim.seed_atom("Ada Lovelace");
    h.sim.mint(owner(), U256::from(WEI_PER_TOKEN));
    h.sim.set_unreachable(true);

    let mut carts = MultiCart::new();
    carts
        .add(founder, "Ada Lovelace", vote(h.pred, Ref::ByLabel("Owl".into()), Direction::Support, CurveId::Linear, MILLI))
        .unwrap();
    let store = MemoryCartStore::new();
    let report = h.executor.execute_founder(owner(), &mut carts, &store, founder).await;

    assert_eq!(report.state, ExecutorState::Failed);
    assert!(matches!(
        report.error,
        Some(ExecutionError::Planning(PlanError::Transport(_)))
    ));
    assert_eq!(carts.item_count(), 1);
}

#[tokio::test]
async fn deposits_are_split_to_the_batch_ceiling() {
    let sim = Arc::new(SimulatedProtocol::new(default_contract_config(), 2));
    let pred = sim.seed_atom("represented_by");
    let founder = sim.seed_atom("Ada Lovelace");
    sim.mint(owner(), U256::from(WEI_PER_TOKEN));
    let client: SharedClient = sim.clone();
    let planner = BatchPlanner::new(
        client.clone(),
        PlannerSettings {
            max_batch_size: 2,
            ..PlannerSettings::default()
        },
    );
    let executor = BatchExecutor::new(client, planner.clone(), 1);

    let mut carts = MultiCart::new();
    let mut triples = Vec::new();
    for name in ["Lion", "Owl", "Fox", "Bear", "Wolf"] {
        let totem = sim.seed_atom(name);
        triples.push(sim.seed_triple(founder, pred, totem, true));
        carts
            .add(founder, "Ada Lovelace", vote(pred, Ref::Existing(totem), Direction::Support, CurveId::Linear, MILLI))
            .unwrap();
    }

    let plan = planner.plan(owner(), carts.get(&founder).unwrap()).await.unwrap();
    assert_eq!(plan.steps.len(), 1);
    let StepAction::Calls(calls) = &plan.steps[0].action else {
        panic!("expected deposit calls");
    };
    assert_eq!(calls.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![2, 2, 1]);

    let store = MemoryCartStore::new();
    let report = executor.execute_founder(owner(), &mut carts, &store, founder).await;
    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.tx_count(), 3);
    for t in triples {
        assert!(sim.shares(owner(), t, CurveId::Linear) > U256::ZERO);
    }
}
