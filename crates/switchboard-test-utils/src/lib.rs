// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides an in-memory engine, a recording provider and a harness that
//! wires them into a [`switchboard_bot::Registry`] without any network.
//!
//! # Components
//!
//! - [`MockEngine`] - Internal engine and contact store recording every call
//! - [`MockProvider`] - Provider plugin capturing outbound updates
//! - [`TestHarness`] - Registry wired to the mocks and an in-memory profile store

pub mod harness;
pub mod mock_engine;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder, TEST_TOKEN};
pub use mock_engine::{EngineCall, MockEngine};
pub use mock_provider::{MockProvider, MockState, Notice, MOCK};
