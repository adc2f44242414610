// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide index of running gateways.
//!
//! Two maps sit behind one read-write lock: profile id to gateway and
//! webhook path to profile id. The lock only covers index mutation; all
//! provider and engine calls happen outside it. Lazy gateway resolution is
//! serialized by a separate load lock held across the slow path.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use switchboard_core::traits::{locate_profile, ProfileQuery};
use switchboard_core::{
    log_and_continue, BotProfile, ChatEngine, ContactStore, Message, ProfileStore,
    SwitchboardError,
};

use crate::gateway::{Gateway, GatewayParts};
use crate::index::ChannelIndex;
use crate::profile::validate_profile;
use crate::provider::{Broadcast, BroadcastOutcome, ProviderRegistry};

/// Settings the registry needs from process configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Externally reachable base URL; webhook paths are appended to it.
    pub site_url: String,
    /// Provider types started at boot. Empty starts every enabled profile.
    pub startup_providers: Vec<String>,
}

/// External collaborators shared by every gateway.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ProfileStore>,
    pub engine: Arc<dyn ChatEngine>,
    pub contacts: Arc<dyn ContactStore>,
    pub providers: Arc<ProviderRegistry>,
}

#[derive(Default)]
struct GatewayIndex {
    profiles: HashMap<i64, Arc<Gateway>>,
    paths: HashMap<String, i64>,
}

/// Outcome of installing a gateway into the index.
#[derive(Default)]
pub(crate) struct Installed {
    /// Earlier gateway of the same profile.
    pub previous: Option<Arc<Gateway>>,
    /// Gateway of another profile that held the path.
    pub displaced: Option<Arc<Gateway>>,
}

pub struct Registry {
    config: RegistryConfig,
    store: Arc<dyn ProfileStore>,
    engine: Arc<dyn ChatEngine>,
    contacts: Arc<dyn ContactStore>,
    providers: Arc<ProviderRegistry>,
    load: Mutex<()>,
    index: RwLock<GatewayIndex>,
    me: Weak<Registry>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("providers", &self.providers.names())
            .finish_non_exhaustive()
    }
}

fn same(held: &Arc<Gateway>, gateway: &Gateway) -> bool {
    std::ptr::eq(Arc::as_ptr(held), gateway)
}

impl Registry {
    pub fn new(config: RegistryConfig, parts: Collaborators) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            config,
            store: parts.store,
            engine: parts.engine,
            contacts: parts.contacts,
            providers: parts.providers,
            load: Mutex::new(()),
            index: RwLock::new(GatewayIndex::default()),
            me: me.clone(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Running gateway of a profile, if any.
    pub async fn lookup(&self, profile_id: i64) -> Option<Arc<Gateway>> {
        self.index.read().await.profiles.get(&profile_id).cloned()
    }

    /// Running gateway holding a webhook path, if any.
    pub async fn lookup_path(&self, uri: &str) -> Option<Arc<Gateway>> {
        let index = self.index.read().await;
        index
            .paths
            .get(uri)
            .and_then(|id| index.profiles.get(id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.profiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.profiles.is_empty()
    }

    async fn cached(&self, profile_id: i64, uri: &str) -> Option<Arc<Gateway>> {
        let gateway = if profile_id != 0 {
            self.lookup(profile_id).await
        } else {
            self.lookup_path(uri).await
        }?;
        let matches =
            (profile_id == 0 || gateway.id() == profile_id) && (uri.is_empty() || gateway.uri() == uri);
        matches.then_some(gateway)
    }

    /// Resolves the running gateway of a profile, starting it on first use.
    ///
    /// The profile is given by id, by webhook path, or both.
    pub async fn gateway(&self, profile_id: i64, uri: &str) -> Result<Arc<Gateway>, SwitchboardError> {
        if profile_id == 0 && uri.is_empty() {
            return Err(SwitchboardError::BadRequest(
                "chat.bot.lookup.missing: profile id or uri required".into(),
            ));
        }
        if let Some(gateway) = self.cached(profile_id, uri).await {
            return Ok(gateway);
        }

        let _load = self.load.lock().await;
        if let Some(gateway) = self.cached(profile_id, uri).await {
            return Ok(gateway);
        }

        let profile = locate_profile(self.store.as_ref(), profile_id, uri).await?;
        if (profile_id != 0 && profile.id != profile_id) || (!uri.is_empty() && profile.uri != uri) {
            return Err(SwitchboardError::NotFound(format!(
                "chat.bot.locate.mismatch: id={profile_id} uri={uri}"
            )));
        }
        let gateway = self.setup(profile).await?;
        gateway.register(false).await?;

        match self.lookup(gateway.id()).await {
            Some(held) if Arc::ptr_eq(&held, &gateway) => {
                debug!(profile_id = gateway.id(), uri = %gateway.uri(), "gateway started");
                Ok(gateway)
            }
            _ => Err(SwitchboardError::Internal(format!(
                "chat.bot.lookup.lost: gateway {} registered but not cached",
                gateway.id()
            ))),
        }
    }

    /// Validates `profile` without building anything.
    pub fn validate(&self, profile: &mut BotProfile) -> Result<(), SwitchboardError> {
        validate_profile(profile, &self.providers)
    }

    /// Builds a gateway for `profile` without installing it.
    ///
    /// An already running gateway of the same profile lends its channel
    /// index, and its provider when the provider type is unchanged.
    pub async fn setup(&self, mut profile: BotProfile) -> Result<Arc<Gateway>, SwitchboardError> {
        validate_profile(&mut profile, &self.providers)?;
        let current = self.lookup(profile.id).await;

        let channels = current
            .as_ref()
            .map(|g| g.channels().clone())
            .unwrap_or_else(|| Arc::new(ChannelIndex::new()));
        let previous = current
            .as_ref()
            .filter(|g| g.provider_name() == profile.provider)
            .map(|g| g.provider().clone());

        let provider = self.providers.build(&profile, previous)?;
        Ok(Arc::new(Gateway::new(
            profile,
            GatewayParts {
                provider,
                channels,
                registry: self.me.clone(),
                engine: self.engine.clone(),
                contacts: self.contacts.clone(),
                site_url: self.config.site_url.clone(),
            },
        )))
    }

    /// Applies an edited profile: builds its gateway and replaces the
    /// running one. Open channels survive the swap.
    pub async fn setup_profile(
        &self,
        profile: BotProfile,
        force: bool,
    ) -> Result<Arc<Gateway>, SwitchboardError> {
        let _load = self.load.lock().await;
        let gateway = self.setup(profile).await?;
        gateway.register(force).await?;
        info!(
            profile_id = gateway.id(),
            uri = %gateway.uri(),
            provider = gateway.provider_name(),
            enabled = gateway.is_enabled(),
            "bot profile applied"
        );
        Ok(gateway)
    }

    /// Stops a deleted profile's gateway.
    ///
    /// The webhook is released at once. The gateway itself is disposed now
    /// if it has no open channels, or else when its last channel closes.
    pub async fn delete_profile(&self, profile_id: i64) -> Result<bool, SwitchboardError> {
        let _load = self.load.lock().await;
        let Some(gateway) = self.lookup(profile_id).await else {
            return Ok(false);
        };
        gateway.mark_deleted();
        gateway.set_enabled(false);
        log_and_continue("gateway.deregister", gateway.deregister().await);

        if gateway.channels().is_empty().await {
            gateway.dispose().await;
        } else {
            let channels = gateway.channels().len().await;
            info!(profile_id, channels, "deleted bot drains open chats");
        }
        Ok(true)
    }

    /// Starts a gateway for every enabled profile of the startup providers.
    ///
    /// Per-profile failures are logged; returns how many started.
    pub async fn start(&self) -> Result<usize, SwitchboardError> {
        let query = ProfileQuery {
            providers: self.config.startup_providers.clone(),
            enabled: Some(true),
            ..Default::default()
        };
        let profiles = self.store.search(&query).await?;
        let total = profiles.len();
        let mut started = 0;
        for profile in profiles {
            let (id, uri) = (profile.id, profile.uri.clone());
            match self.setup_profile(profile, false).await {
                Ok(_) => started += 1,
                Err(e) => error!(profile_id = id, uri, error = %e, "bot failed to start"),
            }
        }
        info!(started, total, "bot gateways started");
        Ok(started)
    }

    /// Outbound send to one external contact of a profile.
    pub async fn send_message(
        &self,
        profile_id: i64,
        external_user_id: &str,
        message: Message,
    ) -> Result<(), SwitchboardError> {
        let gateway = self.gateway(profile_id, "").await?;
        gateway.send(external_user_id, message).await
    }

    /// Outbound broadcast to many external contacts of a profile.
    pub async fn broadcast(
        &self,
        profile_id: i64,
        request: Broadcast,
    ) -> Result<BroadcastOutcome, SwitchboardError> {
        let gateway = self.gateway(profile_id, "").await?;
        gateway.broadcast(request).await
    }

    /// Evicts every gateway and closes its provider. Errors are logged.
    pub async fn shutdown(&self) {
        let gateways: Vec<Arc<Gateway>> = {
            let mut index = self.index.write().await;
            index.paths.clear();
            index.profiles.drain().map(|(_, g)| g).collect()
        };
        switchboard_prometheus::set_active_gateways(0);
        for gateway in &gateways {
            log_and_continue("provider.close", gateway.provider().close().await);
            gateway.channels().clear().await;
        }
        info!(gateways = gateways.len(), "bot gateways shut down");
    }

    /// Puts `gateway` under its id and path.
    pub(crate) async fn install(&self, gateway: &Arc<Gateway>) -> Installed {
        let mut installed = Installed::default();
        let mut index = self.index.write().await;
        let id = gateway.id();

        if let Some(previous) = index.profiles.insert(id, gateway.clone())
            && !Arc::ptr_eq(&previous, gateway)
        {
            if previous.uri() != gateway.uri() && index.paths.get(previous.uri()) == Some(&id) {
                index.paths.remove(previous.uri());
            }
            installed.previous = Some(previous);
        }

        if let Some(holder) = index.paths.insert(gateway.uri().to_string(), id)
            && holder != id
        {
            installed.displaced = index.profiles.remove(&holder);
            if let Some(displaced) = &installed.displaced {
                displaced.set_enabled(false);
                warn!(
                    uri = %gateway.uri(),
                    holder,
                    profile_id = id,
                    "webhook path reassigned"
                );
            }
        }
        switchboard_prometheus::set_active_gateways(index.profiles.len());
        installed
    }

    /// Drops the path of `gateway` if it is still the holder.
    pub(crate) async fn release_path(&self, gateway: &Gateway) -> bool {
        let mut index = self.index.write().await;
        let id = gateway.id();
        let holds = index.paths.get(gateway.uri()) == Some(&id)
            && index.profiles.get(&id).is_some_and(|held| same(held, gateway));
        if holds {
            index.paths.remove(gateway.uri());
        }
        holds
    }

    /// Removes `gateway` from both maps if it is the registered instance.
    pub(crate) async fn evict(&self, gateway: &Gateway) -> bool {
        let mut index = self.index.write().await;
        let id = gateway.id();
        if !index.profiles.get(&id).is_some_and(|held| same(held, gateway)) {
            return false;
        }
        index.profiles.remove(&id);
        if index.paths.get(gateway.uri()) == Some(&id) {
            index.paths.remove(gateway.uri());
        }
        switchboard_prometheus::set_active_gateways(index.profiles.len());
        true
    }
}
