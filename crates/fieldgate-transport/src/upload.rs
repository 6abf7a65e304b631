// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP upload of discovery snapshots and readings.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};

/// Posts JSON documents to the cloud side.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Posts `body` to `url`, with bearer auth when a token is given.
    ///
    /// Any non-2xx status is an error.
    async fn post_json(&self, url: &str, auth_token: Option<&str>, body: &Value) -> TransportResult<()>;
}

/// [`Uploader`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
}

impl HttpUploader {
    /// Creates an uploader whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fieldgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::connection(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn post_json(&self, url: &str, auth_token: Option<&str>, body: &Value) -> TransportResult<()> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::upload(url, e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(url, status = status.as_u16(), "Upload accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        warn!(url, status = status.as_u16(), "Upload rejected");
        Err(TransportError::upload(
            url,
            Some(status.as_u16()),
            if text.is_empty() {
                status.to_string()
            } else {
                text
            },
        ))
    }
}
