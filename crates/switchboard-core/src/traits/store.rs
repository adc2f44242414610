// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile and contact store contracts, plus an in-memory profile store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::SwitchboardError;
use crate::types::{now_millis, BotProfile};

/// Filter for [`ProfileStore::search`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
    pub id: Option<i64>,
    pub uri: Option<String>,
    pub providers: Vec<String>,
    pub enabled: Option<bool>,
}

impl ProfileQuery {
    pub fn matches(&self, profile: &BotProfile) -> bool {
        self.id.is_none_or(|id| profile.id == id)
            && self.uri.as_deref().is_none_or(|uri| profile.uri == uri)
            && (self.providers.is_empty() || self.providers.contains(&profile.provider))
            && self.enabled.is_none_or(|enabled| profile.enabled == enabled)
    }
}

/// Persistent bot profile repository.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn search(&self, query: &ProfileQuery) -> Result<Vec<BotProfile>, SwitchboardError>;

    async fn create(&self, profile: BotProfile) -> Result<BotProfile, SwitchboardError>;

    async fn update(&self, profile: BotProfile) -> Result<BotProfile, SwitchboardError>;

    async fn delete(&self, id: i64) -> Result<bool, SwitchboardError>;
}

/// Finds exactly one profile by id and/or uri.
pub async fn locate_profile(
    store: &dyn ProfileStore,
    id: i64,
    uri: &str,
) -> Result<BotProfile, SwitchboardError> {
    let query = ProfileQuery {
        id: (id != 0).then_some(id),
        uri: (!uri.is_empty()).then(|| uri.to_string()),
        ..Default::default()
    };
    let mut found = store.search(&query).await?;
    match found.len() {
        0 => Err(SwitchboardError::NotFound(format!(
            "chat.bot.locate.not_found: id={id} uri={uri}"
        ))),
        1 => Ok(found.remove(0)),
        n => Err(SwitchboardError::BadRequest(format!(
            "chat.bot.locate.conflict: {n} profiles match id={id} uri={uri}"
        ))),
    }
}

/// Contact record update after a rename or chat id change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub id: i64,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub external_id: String,
    pub name: String,
}

/// Best-effort contact persistence.
#[async_trait]
pub trait ContactStore: Send + Sync + 'static {
    async fn update_contact(&self, update: ContactUpdate) -> Result<(), SwitchboardError>;
}

/// Profile store held in process memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<BTreeMap<i64, BotProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = BotProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn search(&self, query: &ProfileQuery) -> Result<Vec<BotProfile>, SwitchboardError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().filter(|p| query.matches(p)).cloned().collect())
    }

    async fn create(&self, mut profile: BotProfile) -> Result<BotProfile, SwitchboardError> {
        let mut profiles = self.profiles.write().await;
        if profile.id == 0 {
            profile.id = profiles.keys().next_back().copied().unwrap_or(0) + 1;
        }
        if profiles.contains_key(&profile.id) {
            return Err(SwitchboardError::BadRequest(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        profile.created_at = now_millis();
        profile.updated_at = profile.created_at;
        profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update(&self, mut profile: BotProfile) -> Result<BotProfile, SwitchboardError> {
        let mut profiles = self.profiles.write().await;
        let Some(current) = profiles.get_mut(&profile.id) else {
            return Err(SwitchboardError::NotFound(format!("profile {}", profile.id)));
        };
        profile.created_at = current.created_at;
        profile.created_by = current.created_by;
        profile.updated_at = now_millis();
        *current = profile.clone();
        Ok(profile)
    }

    async fn delete(&self, id: i64) -> Result<bool, SwitchboardError> {
        Ok(self.profiles.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: i64, uri: &str, provider: &str) -> BotProfile {
        BotProfile {
            id,
            uri: uri.into(),
            provider: provider.into(),
            enabled: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn locate_by_uri_and_id() {
        let store = MemoryProfileStore::with_profiles([
            profile(1, "/a", "custom"),
            profile(2, "/b", "custom"),
        ]);
        assert_eq!(locate_profile(&store, 0, "/b").await.unwrap().id, 2);
        assert_eq!(locate_profile(&store, 1, "").await.unwrap().uri, "/a");
        assert!(matches!(
            locate_profile(&store, 1, "/b").await,
            Err(SwitchboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn locate_rejects_ambiguous_match() {
        let store = MemoryProfileStore::with_profiles([
            profile(1, "/same", "custom"),
            profile(2, "/same", "custom"),
        ]);
        let err = locate_profile(&store, 0, "/same").await.unwrap_err();
        assert!(err.to_string().contains("conflict"));
    }

    #[tokio::test]
    async fn search_filters_by_provider() {
        let store = MemoryProfileStore::with_profiles([
            profile(1, "/a", "custom"),
            profile(2, "/b", "infobip_whatsapp"),
        ]);
        let query = ProfileQuery {
            providers: vec!["infobip_whatsapp".into()],
            ..Default::default()
        };
        let found = store.search(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[tokio::test]
    async fn create_assigns_next_id_and_update_keeps_audit() {
        let store = MemoryProfileStore::with_profiles([profile(4, "/a", "custom")]);
        let created = store.create(profile(0, "/b", "custom")).await.unwrap();
        assert_eq!(created.id, 5);

        let mut edited = created.clone();
        edited.name = "renamed".into();
        edited.created_at = 0;
        let updated = store.update(edited).await.unwrap();
        assert_eq!(updated.created_at, created.created_at);
        assert!(store.delete(5).await.unwrap());
        assert!(!store.delete(5).await.unwrap());
    }
}
