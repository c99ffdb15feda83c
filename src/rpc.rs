// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! A minimal JSON-RPC 2.0 client over a WebSocket, enough to make one call and hang up.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::config::ConnectionConfig;
use crate::error::{CallError, Result};
use crate::tls;

#[derive(Serialize, Debug)]
pub struct Request<'a> {
    pub jsonrpc: &'a str,
    pub id: u64,
    pub method: &'a str,
    pub params: Vec<Value>,
}

#[derive(Deserialize, Debug)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default)]
    pub result: Option<Box<RawValue>>,

    #[serde(default)]
    pub error: Option<RpcError>,
}

/// The error object of a failed JSON-RPC call.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,

    #[serde(default)]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// An open session with a JSON-RPC endpoint.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl Client {
    /// Connect to the endpoint described by `config`.
    ///
    /// The handshake request and the TLS configuration are fully built before the connection is
    /// attempted, so problems with them are reported as input errors.
    pub async fn dial(config: &ConnectionConfig) -> Result<Self> {
        let mut request = config.address.as_str().into_client_request().map_err(|e| {
            CallError::input(format!("Invalid address \"{}\": {e}", config.address))
        })?;

        if let Some((user, pass)) = config.basic_auth() {
            let token = STANDARD.encode(format!("{user}:{pass}"));
            let value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|e| CallError::input(format!("Invalid credentials: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let connector = match &config.root_certificate {
            Some(root) => Some(Connector::Rustls(tls::client_config(root)?)),
            None => None,
        };

        tracing::debug!("dialing {}", config.address);
        let (ws, _) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| {
                CallError::transport(format!("Could not connect to \"{}\": {e}", config.address))
            })?;

        Ok(Self { ws, next_id: 1 })
    }

    /// Invoke `method` with positional `params` and wait for its response.
    ///
    /// Messages that do not answer this request, such as server notifications, are skipped.
    pub async fn call(&mut self, method: &str, params: &[Value]) -> Result<Box<RawValue>> {
        let id = self.next_id;
        self.next_id += 1;

        let request = serde_json::to_string(&Request {
            jsonrpc: "2.0",
            id,
            method,
            params: params.to_vec(),
        })?;
        self.ws
            .send(Message::text(request))
            .await
            .map_err(|e| CallError::transport(format!("Could not send request: {e}")))?;

        while let Some(msg) = self.ws.next().await {
            let msg =
                msg.map_err(|e| CallError::transport(format!("Could not read response: {e}")))?;
            let response: Response = match &msg {
                Message::Text(text) => serde_json::from_str(text.as_str()),
                Message::Binary(bin) => serde_json::from_slice(bin),
                Message::Close(_) => break,
                _ => continue,
            }
            .map_err(|e| CallError::transport(format!("Malformed response: {e}")))?;

            if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
                tracing::debug!("skipping message that does not answer request {id}");
                continue;
            }

            if let Some(err) = response.error {
                tracing::debug!(code = err.code, "{method} failed: {}", err.message);
                return Err(CallError::Remote(err.to_string()));
            }

            return match response.result {
                Some(result) => Ok(result),
                None => Ok(to_raw_value(&Value::Null)?),
            };
        }

        Err(CallError::transport(
            "Connection closed before a response was received",
        ))
    }

    /// End the session. Consumes the client so it can only happen once.
    pub async fn close(mut self) -> Result<()> {
        tracing::debug!("closing RPC session");
        self.ws
            .close(None)
            .await
            .map_err(|e| CallError::transport(format!("Could not close connection: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let req = Request {
            jsonrpc: "2.0",
            id: 7,
            method: "echo",
            params: vec![json!("hi")],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "echo", "params": ["hi"]})
        );
    }

    #[test]
    fn error_response_displays_message() {
        let resp: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#,
        )
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.to_string(), "method not found");
    }

    #[test]
    fn result_is_kept_raw() {
        let resp: Response =
            serde_json::from_str(r#"{"id":1,"result":{"b": 1, "a": [1.50]}}"#).unwrap();
        assert_eq!(resp.result.unwrap().get(), r#"{"b": 1, "a": [1.50]}"#);
    }

    #[tokio::test]
    async fn invalid_address_is_input_error() {
        let config = ConnectionConfig::new("not a url", None, None, None).unwrap();
        assert!(matches!(
            Client::dial(&config).await,
            Err(CallError::Input(_))
        ));
    }
}
