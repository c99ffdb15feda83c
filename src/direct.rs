// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde_json::value::RawValue;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::call::PerformCall;
use crate::config::{CallRequest, ConnectionConfig};
use crate::error::{CallError, Result};
use crate::rpc;

/// How long a close handshake may take before the connection is simply dropped.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Performs calls with the credentials and trust roots held by this process.
#[derive(Debug, Clone)]
pub struct DirectCaller {
    connection: ConnectionConfig,
}

impl DirectCaller {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self { connection }
    }
}

impl PerformCall for DirectCaller {
    async fn execute(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<RawValue>> {
        let mut client = tokio::select! {
            res = rpc::Client::dial(&self.connection) => res?,
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
        };

        let outcome = tokio::select! {
            res = client.call(&request.method, &request.params) => res,
            _ = cancel.cancelled() => Err(CallError::Cancelled),
        };

        // The call's outcome stands regardless of how the close goes.
        close_within(client.close(), CLOSE_GRACE).await;

        outcome
    }
}

/// Wait at most `grace` for `close` to finish. Failures are only logged.
async fn close_within<F>(close: F, grace: Duration)
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(grace, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("{e}"),
        Err(_) => tracing::debug!("gave up closing RPC session after {grace:?}"),
    }
}
