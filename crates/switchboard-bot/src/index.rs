// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel lookup indices of one bot profile.
//!
//! The index is reference-counted so a replacement gateway built for an
//! edited profile shares the live channel set with the gateway it replaces.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::channel::Channel;

#[derive(Default)]
struct Maps {
    /// By internal contact id.
    internal: HashMap<i64, Arc<Channel>>,
    /// By external chat id.
    external: HashMap<String, Arc<Channel>>,
}

/// Channels of one profile, keyed both ways.
#[derive(Default)]
pub struct ChannelIndex {
    load: Mutex<()>,
    maps: RwLock<Maps>,
}

impl ChannelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes find-or-create of channels.
    pub async fn load_lock(&self) -> MutexGuard<'_, ()> {
        self.load.lock().await
    }

    /// Looks up by internal contact id first (when non-zero), then by chat id.
    pub async fn lookup(&self, contact_id: i64, chat_id: &str) -> Option<Arc<Channel>> {
        let maps = self.maps.read().await;
        if contact_id != 0
            && let Some(channel) = maps.internal.get(&contact_id)
        {
            return Some(channel.clone());
        }
        maps.external.get(chat_id).cloned()
    }

    pub async fn by_chat(&self, chat_id: &str) -> Option<Arc<Channel>> {
        self.maps.read().await.external.get(chat_id).cloned()
    }

    pub async fn by_contact(&self, contact_id: i64) -> Option<Arc<Channel>> {
        self.maps.read().await.internal.get(&contact_id).cloned()
    }

    pub async fn insert(&self, channel: &Arc<Channel>) {
        let mut maps = self.maps.write().await;
        maps.external.insert(channel.chat_id(), channel.clone());
        let contact_id = channel.account().id;
        if contact_id != 0 {
            maps.internal.insert(contact_id, channel.clone());
        }
    }

    /// Moves `channel` from `old_chat_id` to its current chat id.
    pub async fn rekey(&self, channel: &Arc<Channel>, old_chat_id: &str) {
        let mut maps = self.maps.write().await;
        if maps
            .external
            .get(old_chat_id)
            .is_some_and(|held| Arc::ptr_eq(held, channel))
        {
            maps.external.remove(old_chat_id);
        }
        maps.external.insert(channel.chat_id(), channel.clone());
    }

    /// Removes `channel` if it is the indexed instance.
    ///
    /// Returns `None` if it was not indexed, otherwise whether the external
    /// index is now empty.
    pub async fn remove(&self, channel: &Arc<Channel>) -> Option<bool> {
        let mut maps = self.maps.write().await;
        let chat_id = channel.chat_id();
        let held = maps
            .external
            .get(&chat_id)
            .is_some_and(|held| Arc::ptr_eq(held, channel));
        if !held {
            return None;
        }
        maps.external.remove(&chat_id);
        let contact_id = channel.account().id;
        if maps
            .internal
            .get(&contact_id)
            .is_some_and(|held| Arc::ptr_eq(held, channel))
        {
            maps.internal.remove(&contact_id);
        }
        Some(maps.external.is_empty())
    }

    pub async fn contains(&self, channel: &Arc<Channel>) -> bool {
        self.maps
            .read()
            .await
            .external
            .get(&channel.chat_id())
            .is_some_and(|held| Arc::ptr_eq(held, channel))
    }

    pub async fn len(&self) -> usize {
        self.maps.read().await.external.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.maps.read().await.external.is_empty()
    }

    /// Drops every channel. Used on shutdown to release gateway references.
    pub async fn clear(&self) {
        let mut maps = self.maps.write().await;
        maps.internal.clear();
        maps.external.clear();
    }
}
