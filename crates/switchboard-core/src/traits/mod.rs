// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contracts of the collaborators the gateway runtime depends on.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod engine;
pub mod store;

pub use engine::{
    ChatEngine, CheckSession, CloseCause, CloseConversation, DeleteMessage, Participant,
    SendMessage, Sent, SessionLookup, StartConversation, Started,
};
pub use store::{
    locate_profile, ContactStore, ContactUpdate, MemoryProfileStore, ProfileQuery, ProfileStore,
};
