// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde_json::Value;
use std::path::Path;

use crate::agent::DelegationDescriptor;
use crate::error::{CallError, Result};
use crate::tls::RootCertificate;

/// Environment variable holding the path of the agent's Unix socket.
pub const SOCK_ENV: &str = "WSRPCAGENT_SOCK";

/// Environment variable holding the token that authorizes this process to use the agent.
pub const AUTH_ENV: &str = "WSRPCAGENT_AUTH";

/// The remote procedure to invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub method: String,

    /// Positional arguments, decoded from `params_text`.
    pub params: Vec<Value>,

    /// The argument text exactly as given, or empty. Forwarded unparsed to the agent.
    pub params_text: String,
}

impl CallRequest {
    /// Validate the method name and decode the optional JSON array of positional arguments.
    ///
    /// Both checks happen before any socket or connection is opened.
    pub fn new(method: &str, params_text: Option<&str>) -> Result<Self> {
        if method.is_empty() {
            return Err(CallError::input("method name must not be empty"));
        }

        let params_text = params_text.unwrap_or_default();
        let params = if params_text.is_empty() {
            Vec::new()
        } else {
            if !params_text.starts_with('[') {
                return Err(CallError::input("parameter must be JSON array"));
            }
            serde_json::from_str::<Vec<Value>>(params_text)
                .map_err(|e| CallError::input(format!("parameter must be JSON array: {e}")))?
        };

        Ok(Self {
            method: method.to_string(),
            params,
            params_text: params_text.to_string(),
        })
    }
}

/// How to reach the RPC endpoint when calling it directly.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub address: String,
    pub root_certificate: Option<RootCertificate>,
    pub user: String,
    pub pass: String,
}

impl ConnectionConfig {
    /// Build the connection settings, loading the root certificate file if one was named.
    pub fn new(
        address: &str,
        root_cert_path: Option<&Path>,
        user: Option<&str>,
        pass: Option<&str>,
    ) -> Result<Self> {
        let root_certificate = root_cert_path.map(RootCertificate::load).transpose()?;
        Ok(Self {
            address: address.to_string(),
            root_certificate,
            user: user.unwrap_or_default().to_string(),
            pass: pass.unwrap_or_default().to_string(),
        })
    }

    /// Basic auth is only sent when at least one of the credentials was given.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() && self.pass.is_empty() {
            None
        } else {
            Some((&self.user, &self.pass))
        }
    }

    /// The self-contained description of `request` that is handed to the agent.
    pub fn descriptor(&self, request: &CallRequest) -> DelegationDescriptor {
        DelegationDescriptor {
            address: self.address.clone(),
            root_cert: self
                .root_certificate
                .as_ref()
                .map(|root| root.pem().to_string())
                .unwrap_or_default(),
            user: self.user.clone(),
            pass: self.pass.clone(),
            method: request.method.clone(),
            params: request.params_text.clone(),
        }
    }
}

/// Agent settings taken from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentConfig {
    pub socket: String,
    pub auth: String,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self {
            socket: std::env::var(SOCK_ENV).unwrap_or_default(),
            auth: std::env::var(AUTH_ENV).unwrap_or_default(),
        }
    }

    /// Either setting being present is enough to delegate.
    pub fn is_present(&self) -> bool {
        !self.socket.is_empty() || !self.auth.is_empty()
    }
}
