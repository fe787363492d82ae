//! Vote cart engine
//!
//! Cart model, planning and execution of attestation batches against any
//! `ProtocolClient`. Leaf-first:
//! - types, amount_math, error
//! - chain (client trait), transport (rate-limited channel), preview
//! - cart, store, session
//! - dedup, curves, vault_gate, snapshot
//! - planner, redeem, executor

pub mod amount_math;
pub mod cart;
pub mod chain;
pub mod curves;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod planner;
pub mod preview;
pub mod redeem;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transport;
pub mod types;
pub mod vault_gate;

pub use cart::{CartItemDraft, MultiCart, VoteCart, VoteCartItem};
pub use chain::{ContractCall, ProtocolClient, SharedClient, TxReceipt};
pub use error::{CartError, ExecutionError, PlanError, StoreError, TransportError, ValidationError};
pub use executor::{BatchExecutor, CancelHandle, ExecutionEvent, ExecutionReport, ExecutorState};
pub use planner::{BatchPlan, BatchPlanner, PlannerSettings};
pub use types::{CurveId, Direction, Owner, Ref, TermId};
