// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `custom` provider: JSON events to and from a customer webhook, signed
//! with a shared secret.
//!
//! Broadcast delivery reports arrive on a later webhook and are matched to
//! the waiting broadcast call by event id.

pub mod model;
pub mod provider;
pub mod sign;

use std::sync::Arc;

use switchboard_bot::{Provider, ProviderRegistry};
use switchboard_core::SwitchboardError;

pub use provider::CustomProvider;
pub use sign::{sign, verify, SIGN_HEADER};

pub const PROVIDER: &str = "custom";

/// Adds the `custom` factory to `registry`.
pub fn register(registry: &mut ProviderRegistry) -> Result<(), SwitchboardError> {
    registry.register(
        PROVIDER,
        "Custom webhook with HMAC-SHA256 signed JSON events",
        |profile, previous| -> Result<Arc<dyn Provider>, SwitchboardError> {
            Ok(Arc::new(CustomProvider::new(profile, previous)?))
        },
    )
}
