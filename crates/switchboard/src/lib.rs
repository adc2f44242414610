// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard process wiring: configuration to running listeners.

pub mod serve;
pub mod shutdown;

pub use serve::{build, provider_registry, run_serve, seed_store, App};
