// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport wire contract.
//!
//! Request bodies are camelCase JSON:
//!
//! ```json
//! {
//!   "uploadUrl": "https://config.example.com/devices",
//!   "authToken": "…",
//!   "controllers": ["192.168.1.10"],
//!   "readerConfigs": [{"id": "r1", "ipAddress": "192.168.1.2", "isActive": true}]
//! }
//! ```
//!
//! Responses carry the outcome and the request's correlation token, base64
//! encoded, or `null` when the request had none:
//!
//! ```json
//! {"success": true, "correlationData": "cmVxLTE3"}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fieldgate_core::message::{CommandResponse, CorrelationToken};
use fieldgate_core::types::{ControllerAddress, ReaderConfig};
use serde::{Deserialize, Serialize};

/// Body of a `fetch-config` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchConfigBody {
    /// Where to post the discovered configuration.
    #[serde(default)]
    pub upload_url: Option<String>,
    /// Bearer token for that upload.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Controller addresses to discover.
    #[serde(default)]
    pub controllers: Vec<ControllerAddress>,
    /// Reader set to run with.
    #[serde(default)]
    pub reader_configs: Vec<ReaderConfig>,
}

/// Body of a `publish-points` request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPointsBody {
    /// Overrides the configured points URL.
    #[serde(default)]
    pub upload_url: Option<String>,
    /// Overrides the configured bearer token.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    /// Whether the command succeeded.
    pub success: bool,
    /// Base64 correlation token, or `null`.
    pub correlation_data: Option<String>,
    /// Failure or summary detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ResponseBody {
    /// Builds the body for a command response.
    pub fn from_response(response: &CommandResponse) -> Self {
        Self {
            success: response.success,
            correlation_data: response.correlation.as_ref().map(encode_token),
            detail: response.detail.clone(),
        }
    }
}

/// Base64-encodes a correlation token.
pub fn encode_token(token: &CorrelationToken) -> String {
    STANDARD.encode(token.as_bytes())
}

/// Decodes a base64 correlation token.
pub fn decode_token(encoded: &str) -> Result<CorrelationToken, base64::DecodeError> {
    STANDARD.decode(encoded).map(CorrelationToken::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_config_body_camel_case() {
        let body: FetchConfigBody = serde_json::from_value(json!({
            "uploadUrl": "https://example.com/devices",
            "authToken": "secret",
            "controllers": ["192.168.1.10", "192.168.1.11"],
            "readerConfigs": [{"id": "r1", "ipAddress": "192.168.1.2"}]
        }))
        .unwrap();
        assert_eq!(body.upload_url.as_deref(), Some("https://example.com/devices"));
        assert_eq!(body.controllers.len(), 2);
        assert_eq!(body.reader_configs[0].bind_address, "192.168.1.2");
        assert!(body.reader_configs[0].active);
    }

    #[test]
    fn test_response_without_token_is_null() {
        let body = ResponseBody::from_response(&CommandResponse::ok(None));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"success": true, "correlationData": null}));
    }

    #[test]
    fn test_response_token_is_base64() {
        let token = CorrelationToken::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let body = ResponseBody::from_response(&CommandResponse::failed("no url", Some(token.clone())));
        assert_eq!(body.correlation_data.as_deref(), Some("3q2+7w=="));
        assert_eq!(decode_token("3q2+7w==").unwrap(), token);
        assert!(!body.success);
    }
}
