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

//! Messaging-collaborator seam: the [`ZephyrTransport`] trait and the data
//! types that cross it.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Wildcard filter value for subscription instance/recipient, and for the
/// catch-all class requested at bridge startup.
pub const WILDCARD: &str = "*";

/// Failure surfaced by the messaging collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZephyrError {
    /// The service could not be reached, or its connection is gone.
    #[error("zephyr service unavailable: {0}")]
    Unavailable(String),
    /// The service processed the request and turned it down.
    #[error("zephyr request rejected: {0}")]
    Rejected(String),
}

/// One (class, instance, recipient) topic filter.
///
/// The authoritative set of active subscriptions is owned by the messaging
/// service; the bridge never caches it across calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub class: String,
    pub instance: String,
    pub recipient: String,
}

impl Subscription {
    pub fn new(
        class: impl Into<String>,
        instance: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            instance: instance.into(),
            recipient: recipient.into(),
        }
    }

    /// The catch-all triple requested when the bridge starts.
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD, WILDCARD)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.class, self.instance, self.recipient)
    }
}

/// Outbound message handed to the collaborator's send operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub charset: String,
    pub sender: String,
    pub class: String,
    pub instance: String,
    pub recipient: String,
    pub opcode: String,
    pub auth: bool,
    pub payload: Vec<u8>,
}

/// Seconds and microseconds since the Unix epoch, as stamped on inbound
/// notices by the messaging service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: i64,
    pub usecs: u32,
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.secs, self.usecs)
    }
}

/// Inbound message delivered by the messaging service, consumed exactly once
/// by the record encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNotice {
    pub charset: String,
    pub timestamp: Timestamp,
    pub sender: String,
    pub class: String,
    pub instance: String,
    pub recipient: String,
    pub opcode: String,
    pub authenticated: bool,
    pub payload: Vec<u8>,
}

/// External messaging service consumed by the bridge.
///
/// The service's own transport, authentication, and wire protocol live
/// entirely behind this seam.
#[async_trait]
pub trait ZephyrTransport: Send + Sync {
    /// Connects to the messaging service. Called once, before anything else.
    async fn initialize(&self) -> Result<(), ZephyrError>;

    async fn send(&self, notice: Notice) -> Result<(), ZephyrError>;

    /// Requests a subscription. An `Ok` return means the request was
    /// accepted, not that the subscription durably exists; callers re-query
    /// [`ZephyrTransport::subscriptions`] to verify.
    async fn subscribe(&self, subscription: &Subscription) -> Result<(), ZephyrError>;

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), ZephyrError>;

    /// The authoritative set of currently active subscriptions.
    async fn subscriptions(&self) -> Result<HashSet<Subscription>, ZephyrError>;

    /// Waits for and returns the next inbound notice.
    ///
    /// Must be cancellation-safe: the bridge races this future against the
    /// command channel and drops it whenever a command wins, and no notice
    /// may be lost when that happens.
    async fn receive(&self) -> Result<InboundNotice, ZephyrError>;

    fn check_authentication(&self, notice: &InboundNotice) -> bool;

    /// Identity used as the sender when a zwrite does not name one.
    fn sender_identity(&self) -> String;
}
