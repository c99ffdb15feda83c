// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::call::PerformCall;
use crate::codec::JsonCodec;
use crate::config::{AgentConfig, CallRequest, ConnectionConfig};
use crate::error::{CallError, Result};

/// Everything the agent needs to perform a call on this process's behalf. The agent has no other
/// source of connection information.
///
/// Field names on the wire are capitalized, matching what existing agents decode.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DelegationDescriptor {
    pub address: String,

    /// PEM text of the root certificate chain, or empty. The agent parses it.
    pub root_cert: String,
    pub user: String,
    pub pass: String,
    pub method: String,

    /// The JSON array argument text as given, or empty.
    pub params: String,
}

/// The caller's view of the agent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    SendAuth,
    SendDescriptor,
    AwaitError,
    AwaitResult,
    Closed,
}

/// One delegated call over one channel. The channel is never reused.
pub struct DelegationSession<S> {
    state: State,
    channel: Option<Framed<S, JsonCodec>>,
}

impl DelegationSession<UnixStream> {
    pub async fn connect(path: &str) -> Result<Self> {
        let mut session = Self::connecting();
        tracing::debug!(state = ?session.state, "connecting to agent at \"{path}\"");
        let stream = UnixStream::connect(path).await.map_err(|e| {
            CallError::transport(format!("Could not connect to agent socket \"{path}\": {e}"))
        })?;
        session.attach(stream);
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> DelegationSession<S> {
    /// A session whose channel is not open yet.
    pub fn connecting() -> Self {
        Self {
            state: State::Connecting,
            channel: None,
        }
    }

    /// Start a session over an already open channel.
    pub fn new(stream: S) -> Self {
        let mut session = Self::connecting();
        session.attach(stream);
        session
    }

    /// Hand the opened channel to a session that is still connecting.
    fn attach(&mut self, stream: S) {
        debug_assert_eq!(self.state, State::Connecting);
        self.channel = Some(Framed::new(stream, JsonCodec));
        self.state = State::SendAuth;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Run the exchange to completion, failure, or cancellation. The channel is closed before
    /// this returns in every case.
    pub async fn run(
        mut self,
        auth: &str,
        descriptor: &DelegationDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Box<RawValue>> {
        let outcome = tokio::select! {
            res = self.exchange(auth, descriptor) => res,
            _ = cancel.cancelled() => Err(CallError::Cancelled),
        };
        if let Err(e) = &outcome {
            tracing::debug!(state = ?self.state, "delegated call failed: {e}");
        }
        self.close().await;
        outcome
    }

    async fn exchange(
        &mut self,
        auth: &str,
        descriptor: &DelegationDescriptor,
    ) -> Result<Box<RawValue>> {
        loop {
            tracing::debug!(state = ?self.state, "agent protocol step");
            match self.state {
                State::SendAuth => {
                    self.send(auth).await?;
                    self.state = State::SendDescriptor;
                }
                State::SendDescriptor => {
                    self.send(descriptor).await?;
                    self.state = State::AwaitError;
                }
                State::AwaitError => {
                    let raw = self.recv().await?;
                    let message: String = serde_json::from_str(raw.get()).map_err(|e| {
                        CallError::transport(format!("Agent sent a malformed error message: {e}"))
                    })?;
                    if !message.is_empty() {
                        // No result follows a non-empty error.
                        return Err(CallError::Remote(message));
                    }
                    self.state = State::AwaitResult;
                }
                State::AwaitResult => return self.recv().await,
                State::Connecting | State::Closed => {
                    return Err(CallError::transport("agent channel is not open"))
                }
            }
        }
    }

    async fn send<T: Serialize>(&mut self, item: T) -> Result<()> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| CallError::transport("agent channel is not open"))?;
        channel.send(item).await.map_err(|e| match e {
            CallError::Encoding(_) => e,
            other => CallError::transport(format!("Could not write to agent: {other}")),
        })
    }

    async fn recv(&mut self) -> Result<Box<RawValue>> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| CallError::transport("agent channel is not open"))?;
        match channel.next().await {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(CallError::transport(format!(
                "Could not read from agent: {e}"
            ))),
            None => Err(CallError::transport(
                "Agent closed the connection before replying",
            )),
        }
    }

    /// Release the channel. Only the first call has any effect.
    async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.get_mut().shutdown().await {
                tracing::debug!("error shutting down agent channel: {e}");
            }
            tracing::debug!(from = ?self.state, "closed agent channel");
        }
        self.state = State::Closed;
    }
}

/// Performs calls by handing them to the agent named in the environment.
#[derive(Debug, Clone)]
pub struct AgentCaller {
    agent: AgentConfig,
    connection: ConnectionConfig,
}

impl AgentCaller {
    pub fn new(agent: AgentConfig, connection: ConnectionConfig) -> Self {
        Self { agent, connection }
    }
}

impl PerformCall for AgentCaller {
    async fn execute(
        &self,
        request: &CallRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<RawValue>> {
        let descriptor = self.connection.descriptor(request);

        let session = tokio::select! {
            res = DelegationSession::connect(&self.agent.socket) => res?,
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
        };

        session.run(&self.agent.auth, &descriptor, cancel).await
    }
}
