//! Engine client over the engine's HTTP API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use super::{ContainerDetails, Engine, EngineError, LogStream, LogsQuery};
use crate::fleet::ContainerRecord;

/// Engine reached over HTTP (TCP endpoint such as `http://localhost:2375`).
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

/// Error body returned by the engine.
#[derive(Debug, Deserialize)]
struct EngineErrorBody {
    message: String,
}

impl HttpEngine {
    /// Create a client for the engine at `base_url`.
    ///
    /// `timeout` bounds every call except log follows, which stay open for as
    /// long as the container writes.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid engine URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Engine URL cannot carry a path: {base_url}");
        }
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to create engine HTTP client")?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Engine URL for `segments`, each percent-encoded as one path segment,
    /// plus `query`.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, EngineError> {
        let response = request.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, EngineError> {
        debug!(path = url.path(), "Engine GET");
        let response = self
            .send(self.client.get(url).timeout(self.timeout))
            .await?;
        response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn post_empty(&self, url: Url) -> Result<(), EngineError> {
        debug!(path = url.path(), "Engine POST");
        self.send(self.client.post(url).timeout(self.timeout))
            .await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> EngineError {
    EngineError::Unavailable(err.to_string())
}

async fn status_error(response: reqwest::Response) -> EngineError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<EngineErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);

    if status == 404 {
        EngineError::NotFound(message)
    } else {
        EngineError::Status { status, message }
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.send(self.client.get(self.url(&["_ping"], &[])).timeout(self.timeout))
            .await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, EngineError> {
        self.get_json(self.url(&["containers", "json"], &[("all", "true")]))
            .await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        let raw: Value = self.get_json(self.url(&["containers", id, "json"], &[])).await?;
        Ok(ContainerDetails::new(raw))
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.post_empty(self.url(&["containers", id, "start"], &[])).await
    }

    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.post_empty(self.url(&["containers", id, "stop"], &[])).await
    }

    async fn restart_container(&self, id: &str) -> Result<(), EngineError> {
        self.post_empty(self.url(&["containers", id, "restart"], &[])).await
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        debug!(id, "Engine DELETE");
        self.send(
            self.client
                .delete(self.url(&["containers", id], &[("force", "true")]))
                .timeout(self.timeout),
        )
        .await?;
        Ok(())
    }

    async fn container_logs(&self, id: &str, query: LogsQuery) -> Result<Bytes, EngineError> {
        let tail = query.tail.to_string();
        let timestamps = query.timestamps.to_string();
        let url = self.url(
            &["containers", id, "logs"],
            &[
                ("stdout", "true"),
                ("stderr", "true"),
                ("tail", &tail),
                ("timestamps", &timestamps),
            ],
        );
        let response = self
            .send(self.client.get(url).timeout(self.timeout))
            .await?;
        response.bytes().await.map_err(transport_error)
    }

    async fn follow_logs(&self, id: &str, tail: usize) -> Result<LogStream, EngineError> {
        let tail = tail.to_string();
        let url = self.url(
            &["containers", id, "logs"],
            &[
                ("stdout", "true"),
                ("stderr", "true"),
                ("follow", "true"),
                ("tail", &tail),
            ],
        );
        debug!(id, tail = %tail, "Following container log");
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes_stream().map(|r| r.map_err(transport_error)).boxed())
    }

    async fn container_stats(&self, id: &str) -> Result<Value, EngineError> {
        self.get_json(self.url(&["containers", id, "stats"], &[("stream", "false")]))
            .await
    }

    async fn info(&self) -> Result<Value, EngineError> {
        self.get_json(self.url(&["info"], &[])).await
    }
}
