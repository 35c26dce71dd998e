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

//! `zpipe` process boundary: CLI parsing, subscriber initialization, and
//! stdin/stdout wiring for the bridge.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zephyr_loopback::LoopbackZephyr;
use zpipe_bridge::{Bridge, ZephyrTransport};

#[derive(Debug, Parser)]
#[command(name = "zpipe")]
#[command(about = "Bridge a null-delimited command stream to a Zephyr-style messaging service")]
struct Cli {
    /// Sender identity used when a zwrite does not name one.
    #[arg(long, default_value = "zpipe@LOCAL.REALM")]
    identity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the record stream; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("zpipe failed: {error:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let transport: Arc<dyn ZephyrTransport> = Arc::new(LoopbackZephyr::new(cli.identity));
    let bridge = Bridge::new(tokio::io::stdin(), tokio::io::stdout(), transport);
    bridge.run().await.context("bridge terminated abnormally")
}
