//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory store implementing the billing repository traits
//! - Scriptable gateway and notifier doubles

mod app_state_builder;
mod billing_mocks;
mod factories;
mod gateway_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use gateway_mocks::*;
