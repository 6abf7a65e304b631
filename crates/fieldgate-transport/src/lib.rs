// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-transport
//!
//! Northbound side of the fieldgate gateway.
//!
//! - **Transport**: Publish/receive seam carrying an optional correlation
//!   token next to every payload, with an in-process [`ChannelTransport`] and
//!   an MQTT v5 [`MqttTransport`]
//! - **Contract**: JSON request and response bodies
//! - **Dispatcher**: Turns inbound requests into actor messages and actor
//!   responses into outbound publishes
//! - **Upload**: HTTP client posting discovery snapshots and readings
//!
//! ## Example
//!
//! ```rust,ignore
//! let (transport, inbound) = MqttTransport::connect(settings, shutdown.subscribe()).await?;
//! let dispatcher = TransportDispatcher::new(request_prefix, response_topic);
//! tokio::spawn(run_dispatcher(dispatcher, inbound, bus, Arc::new(transport), shutdown.subscribe()));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod mqtt;
pub mod transport;
pub mod upload;

pub use contract::{FetchConfigBody, PublishPointsBody, ResponseBody};
pub use dispatcher::{run_dispatcher, Route, TransportDispatcher};
pub use error::{TransportError, TransportResult};
pub use mqtt::{MqttSettings, MqttTransport};
pub use transport::{ChannelPeer, ChannelTransport, InboundMessage, OutboundMessage, Transport};
pub use upload::{HttpUploader, Uploader};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
