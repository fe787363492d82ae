//! Vote cart backend
//!
//! Plans and executes batched attestation votes (support/oppose a claim on
//! the linear or progressive curve) for many founders at once, over an HTTP
//! API backed by an in-memory simulated protocol.

pub mod api;
pub mod config;
pub mod engine;
pub mod sandbox;
pub mod types;
