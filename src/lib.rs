// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod agent;
pub mod call;
pub mod codec;
pub mod commands;
pub mod config;
pub mod direct;
pub mod error;
pub mod render;
pub mod rpc;
pub mod test_env;
pub mod tls;

pub use call::{CallStrategy, PerformCall};
pub use config::{AgentConfig, CallRequest, ConnectionConfig};
pub use error::CallError;
