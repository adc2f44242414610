// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot gateway runtime.
//!
//! Binds bot profiles to provider plugins, keeps per-contact channels in
//! step with the internal engine, and serves the webhook and RPC
//! listeners.

pub mod auth;
pub mod broadcast;
pub mod channel;
pub mod gateway;
pub mod http;
pub mod index;
pub mod profile;
pub mod provider;
pub mod registry;
pub mod rpc;
pub mod server;

pub use broadcast::{BroadcastSync, PendingBroadcast};
pub use channel::{Channel, ChannelState};
pub use gateway::Gateway;
pub use index::ChannelIndex;
pub use provider::{
    Broadcast, BroadcastOutcome, FailedPeer, Peer, Provider, ProviderRegistry, Update,
    WebhookRequest,
};
pub use registry::{Collaborators, Registry, RegistryConfig};
pub use server::{start_server, ServerConfig};
