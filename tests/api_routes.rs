//! HTTP surface, driven through the router without binding a socket

use alloy_primitives::{Address, U256};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use vote_cart_backend::api::{self, AppState};
use vote_cart_backend::config::AppConfig;
use vote_cart_backend::engine::chain::SharedClient;
use vote_cart_backend::engine::session::{SessionManager, StoreBackend};
use vote_cart_backend::engine::types::{counter_term_id, triple_id, TermId};
use vote_cart_backend::sandbox::simulator::{SimulatedProtocol, WEI_PER_TOKEN};

const MILLI: u64 = WEI_PER_TOKEN / 1000;

struct TestApp {
    app: Router,
    sim: Arc<SimulatedProtocol>,
    founder: TermId,
    pred: TermId,
}

fn test_app() -> TestApp {
    let sim = Arc::new(SimulatedProtocol::with_defaults());
    let founder = sim.seed_atom("Ada Lovelace");
    let pred = sim.seed_atom("represented_by");
    let client: SharedClient = sim.clone();
    let state = AppState::new(
        Arc::new(SessionManager::new(StoreBackend::Memory)),
        client,
        Some(sim.clone()),
        AppConfig::default(),
    );
    TestApp {
        app: Router::new().nest("/api", api::router(state)),
        sim,
        founder,
        pred,
    }
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open_session(app: &Router, owner: Address) -> String {
    let (status, body) = call(app, Method::POST, "/api/session", Some(json!({ "owner": owner }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["session_id"].as_str().unwrap().to_string()
}

fn owl_vote(t: &TestApp, direction: &str, curve: &str, amount: u64) -> Value {
    json!({
        "subject_id": t.founder,
        "subject_name": "Ada Lovelace",
        "totem": { "kind": "by_label", "value": "Owl" },
        "predicate": { "kind": "existing", "value": t.pred },
        "direction": direction,
        "curve_id": curve,
        "amount": amount.to_string(),
    })
}

#[tokio::test]
async fn cart_to_execution_round_trip() {
    let t = test_app();
    let owner = Address::repeat_byte(0x51);
    let sid = open_session(&t.app, owner).await;

    let (status, body) = call(
        &t.app,
        Method::POST,
        "/api/faucet",
        Some(json!({ "session_id": sid, "amount": WEI_PER_TOKEN.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["new_balance"]["wei"], WEI_PER_TOKEN.to_string());

    let (status, body) = call(
        &t.app,
        Method::POST,
        &format!("/api/cart/{}/items", sid),
        Some(owl_vote(&t, "support", "linear", 2 * MILLI)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let item_id = body["item_id"].as_str().unwrap().to_string();

    // same slot again replaces the amount
    let (_, body) = call(
        &t.app,
        Method::POST,
        &format!("/api/cart/{}/items", sid),
        Some(owl_vote(&t, "support", "linear", 3 * MILLI)),
    )
    .await;
    assert_eq!(body["item_id"], item_id);
    assert_eq!(body["cart"]["total"]["wei"], (3 * MILLI).to_string());

    let (status, body) = call(
        &t.app,
        Method::PATCH,
        &format!("/api/cart/{}/items/{}", sid, item_id),
        Some(json!({ "subject_id": t.founder, "amount": (4 * MILLI).to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["item_count"], 1);
    assert_eq!(body["total"]["wei"], (4 * MILLI).to_string());

    let (status, plan) = call(
        &t.app,
        Method::POST,
        "/api/plan",
        Some(json!({ "session_id": sid, "subject_id": t.founder })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", plan);
    assert_eq!(plan["step_count"], 3);
    assert_eq!(plan["estimated_steps"], 3);

    let (status, body) = call(
        &t.app,
        Method::POST,
        "/api/execute",
        Some(json!({ "session_id": sid, "subject_id": t.founder })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["results"][0]["state"], "completed");
    assert!(!body["events"].as_array().unwrap().is_empty());

    let owl = vote_cart_backend::engine::types::atom_id("Owl");
    let triple = triple_id(t.founder, t.pred, owl);
    assert!(t.sim.term_exists(triple));
    assert!(t
        .sim
        .shares(owner, triple, vote_cart_backend::engine::types::CurveId::Linear)
        > U256::ZERO);

    let (_, body) = call(&t.app, Method::GET, &format!("/api/cart/{}", sid), None).await;
    assert_eq!(body["item_count"], 0);

    let (_, body) = call(&t.app, Method::GET, &format!("/api/balance/{}", sid), None).await;
    let balance = U256::from_str_radix(body["balance"]["wei"].as_str().unwrap(), 10).unwrap();
    assert!(balance < U256::from(WEI_PER_TOKEN));
}

#[tokio::test]
async fn plan_errors_are_typed() {
    let t = test_app();
    let owner = Address::repeat_byte(0x52);
    let sid = open_session(&t.app, owner).await;

    // no funds at all
    call(
        &t.app,
        Method::POST,
        &format!("/api/cart/{}/items", sid),
        Some(owl_vote(&t, "support", "linear", MILLI)),
    )
    .await;
    let (status, body) = call(
        &t.app,
        Method::POST,
        "/api/plan",
        Some(json!({ "session_id": sid, "subject_id": t.founder })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "INSUFFICIENT_BALANCE");
    assert_eq!(body["details"]["available"], "0");
    assert_eq!(body["details"]["deficit"], body["details"]["required"]);

    // proposing a claim that already exists
    let owl = t.sim.seed_atom("Owl");
    t.sim.seed_triple(t.founder, t.pred, owl, true);
    t.sim.mint(owner, U256::from(WEI_PER_TOKEN));
    let (status, body) = call(
        &t.app,
        Method::POST,
        "/api/execute",
        Some(json!({ "session_id": sid, "subject_id": t.founder })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["code"], "CLAIM_EXISTS");

    // a founder with no cart
    let (status, _) = call(
        &t.app,
        Method::POST,
        "/api/plan",
        Some(json!({ "session_id": sid, "subject_id": t.pred })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn curve_availability_reflects_positions() {
    let t = test_app();
    let owner = Address::repeat_byte(0x53);
    let sid = open_session(&t.app, owner).await;
    let owl = t.sim.seed_atom("Owl");
    let triple = t.sim.seed_triple(t.founder, t.pred, owl, true);
    t.sim.seed_position(
        owner,
        counter_term_id(triple),
        vote_cart_backend::engine::types::CurveId::Linear,
        U256::from(500u64),
    );

    let (status, body) = call(
        &t.app,
        Method::POST,
        "/api/curves/availability",
        Some(json!({
            "session_id": sid,
            "subject_id": t.founder,
            "predicate": { "kind": "existing", "value": t.pred },
            "totem": { "kind": "existing", "value": owl },
            "direction": "support",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["linear"], false);
    assert_eq!(body["progressive"], true);
    assert_eq!(body["all_blocked"], false);
    assert_eq!(body["preferred_curve"], "progressive");
    assert_eq!(
        body["blocked_reason"],
        "support blocked on linear: opposite position held"
    );
}

#[tokio::test]
async fn missing_session_and_item_are_not_found() {
    let t = test_app();
    let (status, body) = call(&t.app, Method::GET, "/api/session/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let sid = open_session(&t.app, Address::repeat_byte(0x54)).await;
    let (status, _) = call(
        &t.app,
        Method::DELETE,
        &format!("/api/cart/{}/items/missing?subject_id={}", sid, t.founder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn config_reports_costs_and_settings() {
    let t = test_app();
    let (status, body) = call(&t.app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contract"]["entry_fee_bps"], 100);
    assert_eq!(body["planner"]["slippage_bps"], 50);
    assert_eq!(body["simulated"], true);
    // ceil(1e14 * 10000 / 9900)
    assert_eq!(body["effective_min_deposit"]["wei"], "101010101010102");
}
