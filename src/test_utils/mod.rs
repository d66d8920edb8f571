//! Test utilities for unit and HTTP-level testing.
//!
//! This module provides:
//! - Test data factories for creating valid fixtures
//! - In-memory repository implementations for mocking persistence
//! - A builder for constructing an `AppState` backed by mocks

mod app_state_builder;
mod factories;
mod mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use mocks::*;
