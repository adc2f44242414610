// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `infobip_whatsapp` provider: WhatsApp through the Infobip OMNI API.
//!
//! The inbound webhook is configured in the Infobip portal, so webhook
//! registration is a no-op.

pub mod model;
pub mod provider;

use std::sync::Arc;

use switchboard_bot::{Provider, ProviderRegistry};
use switchboard_core::SwitchboardError;

pub use provider::InfobipProvider;

pub const PROVIDER: &str = "infobip_whatsapp";

/// Adds the `infobip_whatsapp` factory to `registry`.
pub fn register(registry: &mut ProviderRegistry) -> Result<(), SwitchboardError> {
    registry.register(
        PROVIDER,
        "WhatsApp via the Infobip OMNI API",
        |profile, previous| -> Result<Arc<dyn Provider>, SwitchboardError> {
            Ok(Arc::new(InfobipProvider::new(profile, previous)?))
        },
    )
}
