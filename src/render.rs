// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde_json::value::RawValue;
use serde_json::Value;
use std::io::Write;

use crate::error::{CallError, Result};

/// Re-encode a raw JSON result with two-space indentation and a trailing newline.
///
/// Object keys keep the order the server sent them in, and numbers keep their literal text.
pub fn pretty(raw: &RawValue) -> Result<String> {
    let value: Value = serde_json::from_str(raw.get())?;
    let mut out = serde_json::to_string_pretty(&value)?;
    out.push('\n');
    Ok(out)
}

/// Write the pretty-printed result to `out` in one piece.
pub fn render<W: Write>(raw: &RawValue, out: &mut W) -> Result<()> {
    let text = pretty(raw)?;
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| CallError::Encoding(format!("could not write result: {e}")))
}
