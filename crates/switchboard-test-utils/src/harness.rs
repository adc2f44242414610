// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry harness for integration tests.
//!
//! [`TestHarness`] wires a [`Registry`] to a [`MockEngine`], the shared
//! [`MockState`] of the mock provider and an in-memory profile store. No
//! sockets are opened; HTTP surfaces are exposed as routers for `oneshot`.
//!
//! # Example
//!
//! ```rust,ignore
//! let harness = TestHarness::builder()
//!     .with_profile(TestHarness::profile(1, "/bot1"))
//!     .build()?;
//! let gateway = harness.registry.gateway(1, "").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;

use switchboard_bot::auth::AuthConfig;
use switchboard_bot::http::{webhook_router, WebhookState};
use switchboard_bot::rpc::{rpc_router, MetricsRender, RpcState};
use switchboard_bot::{Collaborators, ProviderRegistry, Registry, RegistryConfig};
use switchboard_core::traits::MemoryProfileStore;
use switchboard_core::{BotProfile, SwitchboardError};

use crate::mock_engine::MockEngine;
use crate::mock_provider::{MockProvider, MockState, MOCK};

/// Bearer token accepted by [`TestHarness::rpc_router`].
pub const TEST_TOKEN: &str = "test-token";

type ProviderSetup = Box<dyn FnOnce(&mut ProviderRegistry) -> Result<(), SwitchboardError>>;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    profiles: Vec<BotProfile>,
    site_url: String,
    startup_providers: Vec<String>,
    engine: Option<Arc<MockEngine>>,
    providers: Vec<ProviderSetup>,
    web_root: Option<PathBuf>,
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            site_url: "https://bots.test".to_string(),
            startup_providers: Vec::new(),
            engine: None,
            providers: Vec::new(),
            web_root: None,
        }
    }
}

impl TestHarnessBuilder {
    /// Seeds the profile store.
    pub fn with_profile(mut self, profile: BotProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = site_url.into();
        self
    }

    pub fn with_startup_providers(mut self, providers: &[&str]) -> Self {
        self.startup_providers = providers.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Uses a preconfigured engine instead of a fresh one.
    pub fn with_engine(mut self, engine: Arc<MockEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Registers additional provider factories next to `mock`.
    pub fn with_providers(
        mut self,
        setup: impl FnOnce(&mut ProviderRegistry) -> Result<(), SwitchboardError> + 'static,
    ) -> Self {
        self.providers.push(Box::new(setup));
        self
    }

    pub fn with_web_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.web_root = Some(root.into());
        self
    }

    pub fn build(self) -> Result<TestHarness, SwitchboardError> {
        let engine = self.engine.unwrap_or_else(|| Arc::new(MockEngine::new()));
        let provider = MockState::new();
        let store = Arc::new(MemoryProfileStore::with_profiles(self.profiles));

        let mut providers = ProviderRegistry::new();
        MockProvider::register_into(&mut providers, provider.clone())?;
        for setup in self.providers {
            setup(&mut providers)?;
        }

        let registry = Registry::new(
            RegistryConfig {
                site_url: self.site_url,
                startup_providers: self.startup_providers,
            },
            Collaborators {
                store: store.clone(),
                engine: engine.clone(),
                contacts: engine.clone(),
                providers: Arc::new(providers),
            },
        );

        Ok(TestHarness {
            registry,
            engine,
            provider,
            store,
            web_root: self.web_root,
        })
    }
}

/// A registry running against mocks.
pub struct TestHarness {
    pub registry: Arc<Registry>,
    pub engine: Arc<MockEngine>,
    /// Observations of every mock provider instance.
    pub provider: Arc<MockState>,
    pub store: Arc<MemoryProfileStore>,
    web_root: Option<PathBuf>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    /// Enabled `mock` profile bound to `uri`.
    pub fn profile(id: i64, uri: &str) -> BotProfile {
        BotProfile {
            id,
            domain_id: 1,
            uri: uri.to_string(),
            name: format!("bot {id}"),
            flow_id: 10,
            enabled: true,
            provider: MOCK.to_string(),
            ..Default::default()
        }
    }

    /// Public webhook router over this registry.
    pub fn webhook_router(&self) -> Router {
        webhook_router(WebhookState {
            registry: self.registry.clone(),
            web_root: self.web_root.clone(),
        })
    }

    /// RPC router accepting [`TEST_TOKEN`].
    pub fn rpc_router(&self, metrics: Option<MetricsRender>) -> Router {
        rpc_router(RpcState {
            registry: self.registry.clone(),
            auth: AuthConfig {
                bearer_token: Some(TEST_TOKEN.to_string()),
            },
            start_time: Instant::now(),
            metrics,
        })
    }
}
