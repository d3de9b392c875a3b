//! Shared test utilities for superveo integration tests.
//!
//! This module provides:
//! - `FakeClient`, a scripted `OperationClient` that never touches the network
//! - `TestHarness` wiring state, client, and orchestrator on an in-memory store
//! - Builders for prompt blocks and operation payloads

pub mod builders;
pub mod fake_client;
pub mod harness;

pub use builders::*;
pub use fake_client::{Behavior, Call, CallKind, FakeClient};
pub use harness::TestHarness;
