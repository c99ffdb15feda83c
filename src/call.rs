// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentCaller;
use crate::config::{AgentConfig, CallRequest, ConnectionConfig};
use crate::direct::DirectCaller;
use crate::error::Result;

/// Something that can carry out one remote call and hand back its raw JSON result.
///
/// Implementations release whatever session or channel they opened before returning, including
/// when `cancel` fires.
#[allow(async_fn_in_trait)]
pub trait PerformCall {
    async fn execute(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<RawValue>>;
}

/// The way this invocation performs its call, chosen once at start-up.
#[derive(Debug)]
pub enum CallStrategy {
    Direct(DirectCaller),
    Delegated(AgentCaller),
}

impl CallStrategy {
    /// Delegate when either agent setting is present, otherwise call the endpoint directly.
    /// Performs no I/O.
    pub fn select(connection: ConnectionConfig, agent: AgentConfig) -> Self {
        if agent.is_present() {
            tracing::debug!("delegating call to agent at \"{}\"", agent.socket);
            CallStrategy::Delegated(AgentCaller::new(agent, connection))
        } else {
            tracing::debug!("calling {} directly", connection.address);
            CallStrategy::Direct(DirectCaller::new(connection))
        }
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self, CallStrategy::Delegated(_))
    }
}

impl PerformCall for CallStrategy {
    async fn execute(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<RawValue>> {
        match self {
            CallStrategy::Direct(caller) => caller.execute(request, cancel).await,
            CallStrategy::Delegated(caller) => caller.execute(request, cancel).await,
        }
    }
}
