/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # zpipe-bridge
//!
//! `zpipe-bridge` bridges a null-delimited command stream against a
//! Zephyr-style publish/subscribe messaging service: commands in, length-
//! prefixed notice/error records out.
//!
//! Typical usage is API-first and remains centered on [`Bridge`] and the
//! [`ZephyrTransport`] collaborator seam. Internal modules are organized by
//! domain layer to keep behavior ownership explicit.
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use zpipe_bridge::{
//!     Bridge, InboundNotice, Notice, Subscription, ZephyrError, ZephyrTransport,
//! };
//!
//! # struct NoopZephyr;
//! #
//! # #[async_trait]
//! # impl ZephyrTransport for NoopZephyr {
//! #     async fn initialize(&self) -> Result<(), ZephyrError> {
//! #         Ok(())
//! #     }
//! #
//! #     async fn send(&self, _notice: Notice) -> Result<(), ZephyrError> {
//! #         Ok(())
//! #     }
//! #
//! #     async fn subscribe(&self, _subscription: &Subscription) -> Result<(), ZephyrError> {
//! #         Ok(())
//! #     }
//! #
//! #     async fn unsubscribe(&self, _subscription: &Subscription) -> Result<(), ZephyrError> {
//! #         Ok(())
//! #     }
//! #
//! #     async fn subscriptions(&self) -> Result<HashSet<Subscription>, ZephyrError> {
//! #         Ok(HashSet::new())
//! #     }
//! #
//! #     async fn receive(&self) -> Result<InboundNotice, ZephyrError> {
//! #         std::future::pending().await
//! #     }
//! #
//! #     fn check_authentication(&self, _notice: &InboundNotice) -> bool {
//! #         false
//! #     }
//! #
//! #     fn sender_identity(&self) -> String {
//! #         "doc@EXAMPLE.COM".to_string()
//! #     }
//! # }
//! #
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let transport: Arc<dyn ZephyrTransport> = Arc::new(NoopZephyr);
//! let command: &[u8] = b"command\0close_zephyr\0\0";
//! let mut output: Vec<u8> = Vec::new();
//!
//! let bridge = Bridge::new(command, &mut output, transport);
//! bridge.run().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Command plane: framed argument collection and command dispatch
//! - Notice plane: length-prefixed record encoding and flush discipline
//! - Subscription: reconciliation against the service's authoritative set
//! - Bridge: the single-task readiness loop and channel lifecycle
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events. Library code emits
//! events/spans and does not unconditionally initialize a global subscriber.
//! Binaries are responsible for one-time `tracing_subscriber` initialization
//! at process boundaries, directed away from the output channel.

mod bridge;
pub use bridge::Bridge;

mod command_plane;
mod notice_plane;
mod subscription;

mod error;
pub use error::{BridgeError, ProtocolError};

mod observability;

mod transport;
pub use transport::{
    InboundNotice, Notice, Subscription, Timestamp, ZephyrError, ZephyrTransport, WILDCARD,
};
