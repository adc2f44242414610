// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard chat gateway.
//!
//! Holds the shared message and profile types, the error taxonomy, sticky
//! host selection, and the traits of the external collaborators (internal
//! engine, profile store, contact store).

pub mod cleanup;
pub mod error;
pub mod routing;
pub mod traits;
pub mod types;

pub use cleanup::log_and_continue;
pub use error::SwitchboardError;
pub use routing::{HostPin, RoundRobin};
pub use traits::{ChatEngine, ContactStore, ProfileStore};
pub use types::{Account, BotProfile, File, Message, MessageKind, UpdateTemplates};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _engine(_: &dyn ChatEngine) {}
        fn _profiles(_: &dyn ProfileStore) {}
        fn _contacts(_: &dyn ContactStore) {}
    }

    #[test]
    fn message_kind_round_trips_through_strum() {
        use std::str::FromStr;

        for kind in [
            MessageKind::Text,
            MessageKind::File,
            MessageKind::Joined,
            MessageKind::Left,
            MessageKind::Closed,
        ] {
            assert_eq!(MessageKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }
}
