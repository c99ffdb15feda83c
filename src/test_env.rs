// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Stand-ins for the agent and for a JSON-RPC endpoint, used by the integration tests.
//!
//! Each stand-in serves exactly one connection and records what it saw, so a test can check both
//! what the caller sent and that it hung up.

use futures::{SinkExt, StreamExt};
use serde_json::value::RawValue;
use serde_json::{json, Value};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::Framed;

use crate::agent::DelegationDescriptor;
use crate::codec::JsonCodec;

/// Given a relative `path` in the test directory, prepend the full path to the test directory.
pub fn test_path(path: &str) -> PathBuf {
    Path::new(&std::env::var("CARGO_MANIFEST_DIR").unwrap())
        .join("tests")
        .join(path)
}

/// A scratch directory for one test, emptied when the test starts.
///
/// This lives under the system temp directory rather than the source tree so that socket paths
/// stay short.
pub fn private_dir(test_id: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wsrpc-{test_id}-{}", std::process::id()));
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => panic!("Could not clean up test directory: {e}"),
    };
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// What the test agent answers once it has read a request.
#[derive(Debug, Clone)]
pub enum AgentReply {
    /// An empty error string followed by this JSON value.
    Result(String),

    /// A non-empty error string, and nothing after it.
    Error(String),

    /// Nothing at all; the agent just waits for the caller to hang up.
    Silent,
}

/// Everything the test agent observed on its one connection.
#[derive(Debug)]
pub struct AgentSession {
    pub auth: String,
    pub descriptor: DelegationDescriptor,

    /// Whether the caller closed the channel after the exchange.
    pub closed: bool,
}

/// An agent that serves one delegated call on a Unix socket.
pub struct TestAgent {
    socket_path: PathBuf,
    connected: Arc<AtomicBool>,
    handle: Option<JoinHandle<AgentSession>>,
}

impl TestAgent {
    pub async fn start(test_id: &str, reply: AgentReply) -> Self {
        let socket_path = private_dir(test_id).join("agent.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let connected = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&connected);
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            flag.store(true, Ordering::SeqCst);
            let mut channel = Framed::new(stream, JsonCodec);

            let auth = channel.next().await.unwrap().unwrap();
            let auth: String = serde_json::from_str(auth.get()).unwrap();
            let descriptor = channel.next().await.unwrap().unwrap();
            let descriptor: DelegationDescriptor =
                serde_json::from_str(descriptor.get()).unwrap();

            match reply {
                AgentReply::Result(json) => {
                    let result = RawValue::from_string(json).unwrap();
                    channel.send("").await.unwrap();
                    channel.send(&*result).await.unwrap();
                }
                AgentReply::Error(msg) => channel.send(&msg).await.unwrap(),
                AgentReply::Silent => {}
            }

            // The caller must not send anything else; the next thing seen is end of stream.
            let closed = matches!(channel.next().await, None);

            AgentSession {
                auth,
                descriptor,
                closed,
            }
        });

        Self {
            socket_path,
            connected,
            handle: Some(handle),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether any caller has connected yet.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Wait for the served connection to finish.
    pub async fn finish(mut self) -> AgentSession {
        self.handle.take().unwrap().await.unwrap()
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// What the test endpoint answers to the one call it receives.
#[derive(Debug, Clone)]
pub enum RpcReply {
    /// Answer with the first positional argument, after an unrelated notification.
    Echo,

    /// Answer with a fixed result.
    Result(Value),

    /// Answer with a JSON-RPC error object.
    Error { code: i64, message: String },

    /// Read the call and never answer it.
    Silent,
}

/// Everything the test endpoint observed on its one connection.
#[derive(Debug)]
pub struct RpcSession {
    pub authorization: Option<String>,
    pub method: String,
    pub params: Value,

    /// Whether the caller closed the WebSocket after the response.
    pub closed: bool,
}

/// A JSON-RPC over WebSocket endpoint that serves one call, optionally behind TLS.
pub struct TestRpcServer {
    addr: SocketAddr,
    tls: bool,
    handle: JoinHandle<RpcSession>,
}

impl TestRpcServer {
    pub async fn start(reply: RpcReply, tls: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            if tls {
                let acceptor = crate::tls::get_acceptor(
                    &test_path("fixtures/server.crt"),
                    &test_path("fixtures/server.key"),
                )
                .unwrap();
                let stream = acceptor.accept(stream).await.unwrap();
                serve_one_call(stream, reply).await
            } else {
                serve_one_call(stream, reply).await
            }
        });

        Self { addr, tls, handle }
    }

    /// The address a client should dial. TLS endpoints are named by the host in their
    /// certificate.
    pub fn address(&self) -> String {
        if self.tls {
            format!("wss://localhost:{}/rpc", self.addr.port())
        } else {
            format!("ws://127.0.0.1:{}/rpc", self.addr.port())
        }
    }

    pub async fn finish(self) -> RpcSession {
        self.handle.await.unwrap()
    }
}

async fn serve_one_call<S>(stream: S, reply: RpcReply) -> RpcSession
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut authorization = None;
    let mut ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            Ok(resp)
        },
    )
    .await
    .unwrap();

    let request: Value = loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => break serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    };
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();

    let response = match reply {
        RpcReply::Echo => {
            let notification = json!({"jsonrpc": "2.0", "method": "tick", "params": []});
            ws.send(Message::text(notification.to_string())).await.unwrap();
            let first = params.get(0).cloned().unwrap_or(Value::Null);
            Some(json!({"jsonrpc": "2.0", "id": id, "result": first}))
        }
        RpcReply::Result(result) => Some(json!({"jsonrpc": "2.0", "id": id, "result": result})),
        RpcReply::Error { code, message } => Some(
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}),
        ),
        RpcReply::Silent => None,
    };
    if let Some(response) = response {
        ws.send(Message::text(response.to_string())).await.unwrap();
    }

    let mut closed = false;
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                closed = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    RpcSession {
        authorization,
        method,
        params,
        closed,
    }
}
