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

//! In-process loopback implementation of the bridge's messaging seam.
//!
//! No real messaging service is contacted: every sent notice that matches an
//! active subscription is stamped and queued straight back onto the inbound
//! stream. Backs the `zpipe` binary's demo mode and the end-to-end tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use zpipe_bridge::{
    InboundNotice, Notice, Subscription, Timestamp, ZephyrError, ZephyrTransport, WILDCARD,
};

pub struct LoopbackZephyr {
    identity: String,
    subscriptions: Mutex<HashSet<Subscription>>,
    inbound_tx: mpsc::UnboundedSender<InboundNotice>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<InboundNotice>>,
}

impl LoopbackZephyr {
    pub fn new(identity: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            identity: identity.into(),
            subscriptions: Mutex::new(HashSet::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
        }
    }

    fn matches(subscription: &Subscription, notice: &Notice) -> bool {
        fn part(filter: &str, value: &str) -> bool {
            filter == WILDCARD || filter == value
        }
        part(&subscription.class, &notice.class)
            && part(&subscription.instance, &notice.instance)
            && part(&subscription.recipient, &notice.recipient)
    }

    fn timestamp() -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            secs: elapsed.as_secs() as i64,
            usecs: elapsed.subsec_micros(),
        }
    }
}

#[async_trait]
impl ZephyrTransport for LoopbackZephyr {
    async fn initialize(&self) -> Result<(), ZephyrError> {
        Ok(())
    }

    async fn send(&self, notice: Notice) -> Result<(), ZephyrError> {
        let subscriptions = self.subscriptions.lock().await;
        let matched = subscriptions
            .iter()
            .any(|subscription| Self::matches(subscription, &notice));
        drop(subscriptions);

        if !matched {
            debug!(
                class = %notice.class,
                instance = %notice.instance,
                "no subscription matches, dropping notice"
            );
            return Ok(());
        }

        let inbound = InboundNotice {
            charset: notice.charset,
            timestamp: Self::timestamp(),
            sender: notice.sender,
            class: notice.class,
            instance: notice.instance,
            recipient: notice.recipient,
            opcode: notice.opcode,
            authenticated: notice.auth,
            payload: notice.payload,
        };
        self.inbound_tx
            .send(inbound)
            .map_err(|_| ZephyrError::Unavailable("loopback inbound queue closed".to_string()))
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), ZephyrError> {
        self.subscriptions.lock().await.insert(subscription.clone());
        Ok(())
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), ZephyrError> {
        self.subscriptions.lock().await.remove(subscription);
        Ok(())
    }

    async fn subscriptions(&self) -> Result<HashSet<Subscription>, ZephyrError> {
        Ok(self.subscriptions.lock().await.clone())
    }

    async fn receive(&self) -> Result<InboundNotice, ZephyrError> {
        // recv() on an mpsc receiver is cancellation-safe, which the
        // bridge's readiness wait relies on.
        let mut inbound_rx = self.inbound_rx.lock().await;
        match inbound_rx.recv().await {
            Some(notice) => Ok(notice),
            None => Err(ZephyrError::Unavailable(
                "loopback inbound queue closed".to_string(),
            )),
        }
    }

    fn check_authentication(&self, notice: &InboundNotice) -> bool {
        notice.authenticated
    }

    fn sender_identity(&self) -> String {
        self.identity.clone()
    }
}
