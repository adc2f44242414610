// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport for the internal conversation engine.
//!
//! Every conversation RPC is `POST {host}/v1/chat/{method}` with a JSON
//! body. The host is chosen by the calling channel's [`HostPin`], falling
//! back to a round-robin over the configured live hosts.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use switchboard_core::traits::{
    CheckSession, CloseConversation, ContactUpdate, DeleteMessage, SendMessage, Sent,
    SessionLookup, StartConversation, Started,
};
use switchboard_core::{ChatEngine, ContactStore, HostPin, RoundRobin, SwitchboardError};

/// Error body an engine node may answer with.
#[derive(Debug, Deserialize)]
struct EngineFault {
    #[serde(default, alias = "detail", alias = "message")]
    error: String,
}

#[derive(Debug, Default, Deserialize)]
struct Empty {}

#[derive(Debug)]
pub struct HttpEngine {
    client: reqwest::Client,
    hosts: Vec<String>,
    fallback: RoundRobin,
}

impl HttpEngine {
    /// Creates a client over the live engine hosts (base URLs).
    pub fn new(hosts: Vec<String>, timeout: Duration) -> Result<Self, SwitchboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchboardError::Engine {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;
        let hosts = hosts
            .into_iter()
            .map(|h| h.trim().trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(Self {
            client,
            hosts,
            fallback: RoundRobin::new(),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    async fn call<Req, Resp>(
        &self,
        route: &HostPin,
        method: &'static str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, SwitchboardError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let Some(host) = route.select(&self.hosts, &self.fallback) else {
            return Err(SwitchboardError::engine("no live engine hosts", None));
        };
        let result = self.exchange(&host, path, body).await;
        match &result {
            Ok(_) => {
                route.record_success(&host);
                switchboard_prometheus::record_engine_call(method, "ok");
            }
            Err(e) => {
                route.record_failure();
                switchboard_prometheus::record_engine_call(method, "error");
                warn!(method, host, error = %e, "engine call failed");
            }
        }
        result
    }

    async fn exchange<Req, Resp>(
        &self,
        host: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, SwitchboardError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{host}{path}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SwitchboardError::Engine {
                message: format!("HTTP request to {url} failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(url, status = %status, "engine response received");
        let text = response.text().await.map_err(|e| SwitchboardError::Engine {
            message: format!("failed to read engine response: {e}"),
            status: Some(status.as_u16()),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<EngineFault>(&text)
                .map(|f| f.error)
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or(text);
            return Err(SwitchboardError::engine(
                format!("engine returned {status}: {detail}"),
                Some(status.as_u16()),
            ));
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| SwitchboardError::Engine {
            message: format!("failed to parse engine response: {e}"),
            status: Some(status.as_u16()),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl ChatEngine for HttpEngine {
    async fn check_session(
        &self,
        route: &HostPin,
        req: CheckSession,
    ) -> Result<SessionLookup, SwitchboardError> {
        self.call(route, "check_session", "/v1/chat/check_session", &req)
            .await
    }

    async fn start_conversation(
        &self,
        route: &HostPin,
        req: StartConversation,
    ) -> Result<Started, SwitchboardError> {
        self.call(route, "start_conversation", "/v1/chat/start_conversation", &req)
            .await
    }

    async fn send_message(&self, route: &HostPin, req: SendMessage) -> Result<Sent, SwitchboardError> {
        self.call(route, "send_message", "/v1/chat/send_message", &req)
            .await
    }

    async fn close_conversation(
        &self,
        route: &HostPin,
        req: CloseConversation,
    ) -> Result<(), SwitchboardError> {
        self.call::<_, Empty>(route, "close_conversation", "/v1/chat/close_conversation", &req)
            .await
            .map(|_| ())
    }

    async fn delete_message(
        &self,
        route: &HostPin,
        req: DeleteMessage,
    ) -> Result<(), SwitchboardError> {
        self.call::<_, Empty>(route, "delete_message", "/v1/chat/delete_message", &req)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ContactStore for HttpEngine {
    async fn update_contact(&self, update: ContactUpdate) -> Result<(), SwitchboardError> {
        self.call::<_, Empty>(&HostPin::new(), "update_contact", "/v1/contacts/update", &update)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_are_normalized() {
        let engine = HttpEngine::new(
            vec!["http://a:1/".into(), " ".into(), "http://b:2".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(engine.hosts(), ["http://a:1", "http://b:2"]);
    }

    #[tokio::test]
    async fn no_hosts_is_an_engine_error() {
        let engine = HttpEngine::new(vec![], Duration::from_secs(1)).unwrap();
        let err = engine
            .check_session(&HostPin::new(), CheckSession::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}
