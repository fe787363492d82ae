//! Simulated protocol deployment
//!
//! In-memory stand-in for the attestation contracts, used by the server at
//! startup and by every test that needs a chain.

pub mod simulator;
