// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::call::{CallStrategy, PerformCall};
use crate::config::{AgentConfig, CallRequest, ConnectionConfig};
use crate::error::Result;
use crate::render;

/// Invoke one JSON-RPC method over a WebSocket and pretty-print its result.
///
/// When WSRPCAGENT_SOCK or WSRPCAGENT_AUTH is set, the call is handed to the agent listening on
/// that socket instead of being made from this process.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Endpoint to call, e.g. wss://host/rpc
    pub address: String,

    pub method: String,

    /// Positional arguments, as a JSON array
    pub params: Option<String>,

    /// Root certificate PEM file
    #[arg(short = 'c')]
    pub root_cert: Option<PathBuf>,

    #[arg(short = 'u')]
    pub user: Option<String>,

    #[arg(short = 'p')]
    pub pass: Option<String>,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Diagnostics go to stderr so that stdout only ever holds the result.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Validate the inputs, make the call the chosen way, and print the result.
///
/// Everything that can be checked locally is checked before the runtime starts.
pub fn main(cli: &Cli) -> Result<()> {
    let request = CallRequest::new(&cli.method, cli.params.as_deref())?;
    let connection = ConnectionConfig::new(
        &cli.address,
        cli.root_cert.as_deref(),
        cli.user.as_deref(),
        cli.pass.as_deref(),
    )?;
    let strategy = CallStrategy::select(connection, AgentConfig::from_env());

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let interrupted = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupted, abandoning call");
                interrupted.cancel();
            }
        });

        strategy.execute(&request, &cancel).await
    })?;

    render::render(&result, &mut std::io::stdout().lock())
}
