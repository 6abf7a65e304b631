// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The gateway's three actors.
//!
//! | Actor          | Handles                         | Sends                            |
//! |----------------|---------------------------------|----------------------------------|
//! | `network-poll` | `FetchConfig`, `RunPollCycle`   | `UploadConfig`, `PublishPoints`, |
//! |                |                                 | `ConfigUploaded` on failure      |
//! | `upload`       | `UploadConfig`, `PublishPoints` | `ConfigUploaded`, `PointsPublished` |
//! | `transport`    | `ConfigUploaded`, `PointsPublished` | transport publish            |
//!
//! Every downstream message is built with [`ActorMessage::forward`], so the
//! request's correlation token reaches the terminal response unchanged.
//!
//! [`ActorMessage::forward`]: fieldgate_core::ActorMessage::forward

mod network;
mod transport;
mod upload;

pub use network::NetworkPollActor;
pub use transport::TransportActor;
pub use upload::{UploadActor, UploadSettings};
