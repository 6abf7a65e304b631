// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Message Bus Integration Tests
//!
//! Requests go in through the channel transport of a running gateway and
//! responses come back out of it, crossing every actor on the way:
//!
//! ```text
//! peer ─► dispatcher ─► network-poll ─► upload ─► transport ─► peer
//! ```
//!
//! The property under test throughout is correlation echo: a request's token
//! comes back unchanged on its response, and a request without one gets a
//! response without one.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use fieldgate_bin::runtime::RunningGateway;
use fieldgate_bin::RuntimeBuilder;
use fieldgate_config::FieldgateConfig;
use fieldgate_core::message::CorrelationToken;
use fieldgate_core::ConnectorRegistry;
use fieldgate_tests::prelude::*;
use fieldgate_transport::contract::decode_token;
use fieldgate_transport::{ChannelPeer, OutboundMessage};
use serde_json::{json, Value};

const POINTS_URL: &str = "https://ingest.example.com/points";
const DEVICES_URL: &str = "https://ingest.example.com/devices";

struct Harness {
    gateway: RunningGateway,
    peer: ChannelPeer,
    uploader: Arc<RecordingUploader>,
    requests: String,
}

impl Harness {
    async fn start(config: FieldgateConfig) -> Self {
        Self::start_with(config, None).await
    }

    async fn start_with(config: FieldgateConfig, connectors: Option<ConnectorRegistry>) -> Self {
        init_test_logging();
        let requests = config.request_topic();
        let uploader = Arc::new(RecordingUploader::new());
        let mut builder = RuntimeBuilder::new()
            .config(config)
            .no_poll(true)
            .uploader(uploader.clone());
        if let Some(connectors) = connectors {
            builder = builder.connectors(connectors);
        }
        let mut gateway = builder.build().unwrap().start().await.unwrap();
        let peer = gateway.take_peer().expect("channel transport");
        Self {
            gateway,
            peer,
            uploader,
            requests,
        }
    }

    async fn send(&self, command: &str, body: Value, token: Option<&'static str>) {
        self.peer
            .request(
                format!("{}/{}", self.requests, command),
                body.to_string(),
                token.map(CorrelationToken::from),
            )
            .await
            .unwrap();
    }

    async fn response(&mut self) -> (OutboundMessage, Value) {
        let out = tokio::time::timeout(Duration::from_secs(5), self.peer.next_published())
            .await
            .expect("response within timeout")
            .expect("transport open");
        let body: Value = serde_json::from_slice(&out.payload).unwrap();
        (out, body)
    }
}

fn config() -> FieldgateConfig {
    let mut config = ConfigFixtures::channel("bus-gw");
    config.upload.points_url = Some(POINTS_URL.to_string());
    config
}

fn fetch_body(controllers: &[&str]) -> Value {
    json!({
        "uploadUrl": DEVICES_URL,
        "authToken": "per-request",
        "controllers": controllers,
        "readerConfigs": [{"id": "reader-1", "ipAddress": "127.0.0.1"}]
    })
}

fn assert_token(out: &OutboundMessage, body: &Value, token: &'static str) {
    let expected = CorrelationToken::from(token);
    assert_eq!(out.correlation.as_ref(), Some(&expected));
    let echoed = body["correlationData"].as_str().expect("correlationData");
    assert_eq!(decode_token(echoed).unwrap(), expected);
}

fn assert_no_token(out: &OutboundMessage, body: &Value) {
    assert!(out.correlation.is_none());
    assert_eq!(body["correlationData"], Value::Null);
}

// =============================================================================
// fetch-config
// =============================================================================

#[tokio::test]
async fn test_fetch_config_echoes_token_and_uploads_devices() {
    let mut h = Harness::start(config()).await;
    h.send("fetch-config", fetch_body(&["192.168.1.10", "192.168.1.11"]), Some("cfg-1"))
        .await;

    let (out, body) = h.response().await;
    assert_eq!(out.topic, "fieldgate/bus-gw/response");
    assert_eq!(body["success"], Value::Bool(true));
    assert_token(&out, &body, "cfg-1");

    let posts = h.uploader.posts_to(DEVICES_URL);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].auth_token.as_deref(), Some("per-request"));
    assert_eq!(posts[0].body["devices"].as_array().unwrap().len(), 2);

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_fetch_config_without_token_answers_without_token() {
    let mut h = Harness::start(config()).await;
    h.send("fetch-config", fetch_body(&["192.168.1.10"]), None).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_no_token(&out, &body);

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_fetch_config_discovery_failure_keeps_token() {
    let mut h = Harness::start(config()).await;
    h.send("fetch-config", fetch_body(&["10.9.9.9"]), Some("cfg-miss")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_token(&out, &body, "cfg-miss");
    assert!(h.uploader.posts().is_empty());

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_fetch_config_new_readers_rebuild_pool() {
    let mut h = Harness::start(config()).await;
    let body = json!({
        "uploadUrl": DEVICES_URL,
        "controllers": ["192.168.1.10"],
        "readerConfigs": [
            {"id": "reader-a", "ipAddress": "127.0.0.2"},
            {"id": "reader-b", "ipAddress": "127.0.0.3"}
        ]
    });
    h.send("fetch-config", body, Some("cfg-readers")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_token(&out, &body, "cfg-readers");
    assert_eq!(h.gateway.pool().len(), 2);

    h.gateway.stop().await;
}

// =============================================================================
// run-poll / publish-points
// =============================================================================

#[tokio::test]
async fn test_run_poll_publishes_readings_with_token() {
    let mut h = Harness::start(config()).await;
    h.send("run-poll", json!({}), Some("poll-1")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_token(&out, &body, "poll-1");

    // The demo plant has five points.
    let uploaded: usize = h
        .uploader
        .posts_to(POINTS_URL)
        .iter()
        .map(|p| p.body["points"].as_array().unwrap().len())
        .sum();
    assert_eq!(uploaded, 5);
    assert_eq!(h.gateway.store().pending_len(), 0);

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_run_poll_with_failures_still_answers_with_token() {
    let network = MockNetwork::new();
    let point = NetworkFixtures::analog_input(1);
    network.add_device(NetworkFixtures::controller(7, "10.0.0.7", 2));
    network.fail_bulk(true);
    network.fail_properties(point);
    network.fail_present_value(point);

    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(MockConnector::new(&network)));
    let mut config = config();
    config.readers = NetworkFixtures::readers(1);
    config.controllers = vec!["10.0.0.7".into()];

    let mut h = Harness::start_with(config, Some(registry)).await;
    h.send("run-poll", json!({}), Some("poll-partial")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_token(&out, &body, "poll-partial");

    // The failed point is missing; the other one went out.
    let posts = h.uploader.posts_to(POINTS_URL);
    assert_eq!(posts.len(), 1);
    let points = posts[0].body["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["objectInstance"], json!(2));

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_publish_points_without_url_fails_with_token() {
    let mut h = Harness::start(ConfigFixtures::channel("bus-gw")).await;
    h.send("publish-points", json!({}), Some("pub-none")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_token(&out, &body, "pub-none");

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_publish_points_uses_request_url() {
    let mut h = Harness::start(ConfigFixtures::channel("bus-gw")).await;
    h.send(
        "publish-points",
        json!({"uploadUrl": "https://other.example.com/points", "authToken": "tok"}),
        None,
    )
    .await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_no_token(&out, &body);
    assert!(h.uploader.posts_to(POINTS_URL).is_empty());

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_upload_failure_keeps_token() {
    let mut h = Harness::start(config()).await;
    h.uploader.fail(true);
    h.send("run-poll", json!({}), Some("poll-503")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_token(&out, &body, "poll-503");
    assert_eq!(h.gateway.store().pending_len(), 5);

    h.gateway.stop().await;
}

// =============================================================================
// Rejections and interleaving
// =============================================================================

#[tokio::test]
async fn test_unknown_command_is_rejected_with_token() {
    let mut h = Harness::start(config()).await;
    h.send("reboot", json!({}), Some("bad-cmd")).await;

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["detail"].as_str().unwrap().contains("reboot"));
    assert_token(&out, &body, "bad-cmd");

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_malformed_body_is_rejected_with_token() {
    let mut h = Harness::start(config()).await;
    h.peer
        .request(
            format!("{}/fetch-config", h.requests),
            "{not json",
            Some(CorrelationToken::from("bad-body")),
        )
        .await
        .unwrap();

    let (out, body) = h.response().await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_token(&out, &body, "bad-body");

    h.gateway.stop().await;
}

#[tokio::test]
async fn test_interleaved_requests_each_get_their_own_token() {
    let mut h = Harness::start(config()).await;
    h.send("fetch-config", fetch_body(&["192.168.1.10"]), Some("a")).await;
    h.send("run-poll", json!({}), Some("b")).await;
    h.send("publish-points", json!({}), None).await;
    h.send("run-poll", json!({}), Some("c")).await;

    let mut tokens = BTreeSet::new();
    let mut untagged = 0;
    for _ in 0..4 {
        let (out, _) = h.response().await;
        match out.correlation {
            Some(token) => {
                tokens.insert(String::from_utf8(token.as_bytes().to_vec()).unwrap());
            }
            None => untagged += 1,
        }
    }
    assert_eq!(
        tokens,
        ["a", "b", "c"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
    );
    assert_eq!(untagged, 1);

    h.gateway.stop().await;
}
