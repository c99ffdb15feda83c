// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use thiserror::Error;

/// Every way a single call can fail.
///
/// None of these are retried. The binary prints the error and exits non-zero; library callers get
/// the variant so they can tell a bad command line from a refused call.
#[derive(Debug, Error)]
pub enum CallError {
    /// Malformed arguments or certificate material, detected before any I/O.
    #[error("{0}")]
    Input(String),

    /// The agent socket or the RPC endpoint could not be reached, written, or read.
    #[error("{0}")]
    Transport(String),

    /// The agent or the remote procedure reported a failure. Displayed verbatim.
    #[error("{0}")]
    Remote(String),

    /// A value could not be serialized or deserialized locally.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    pub fn input(msg: impl Into<String>) -> Self {
        CallError::Input(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        CallError::Transport(msg.into())
    }
}

impl From<std::io::Error> for CallError {
    fn from(e: std::io::Error) -> Self {
        CallError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for CallError {
    fn from(e: serde_json::Error) -> Self {
        CallError::Encoding(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CallError>;
