//! Test utilities for integration testing.
//!
//! This module provides:
//! - In-memory repository and gateway implementations for mocking
//! - Test data factories for creating valid fixtures
//! - An `AppState` builder wiring the mocks together
//! - Webhook payload builders and a signature forger

mod app_state_builder;
mod billing_mocks;
mod factories;
mod webhook_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use webhook_mocks::*;

/// Let detached background tasks (webhook reconciliation) run to completion
/// before asserting on their effects.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
