// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Framing for the agent channel: a stream of standalone JSON values.
//!
//! Each encoded value is followed by a newline. Decoding does not depend on the newline; a frame
//! ends wherever the JSON value ends.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use serde_json::value::RawValue;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CallError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn decode_value(
        &mut self,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<Box<RawValue>>> {
        let next = {
            let mut values =
                serde_json::Deserializer::from_slice(&src[..]).into_iter::<Box<RawValue>>();
            values
                .next()
                .map(|res| res.map(|value| (value, values.byte_offset())))
        };
        let (value, used) = match next {
            None => {
                // Only whitespace is buffered.
                src.clear();
                return Ok(None);
            }
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(found)) => found,
        };

        // A number that runs up to the end of the buffer may still be growing.
        if used == src.len() && !at_eof && !is_self_delimiting(&value) {
            return Ok(None);
        }

        src.advance(used);
        Ok(Some(value))
    }
}

fn is_self_delimiting(value: &RawValue) -> bool {
    matches!(value.get().as_bytes().last(), Some(b'}' | b']' | b'"' | b'e' | b'l'))
}

impl<T: Serialize> Encoder<T> for JsonCodec {
    type Error = CallError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        let encoded = serde_json::to_vec(&item)?;
        dst.reserve(encoded.len() + 1);
        dst.extend_from_slice(&encoded);
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Decoder for JsonCodec {
    type Item = Box<RawValue>;
    type Error = CallError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.decode_value(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode_value(src, true)? {
            Some(value) => Ok(Some(value)),
            None if src.iter().all(u8::is_ascii_whitespace) => Ok(None),
            None => Err(CallError::transport(
                "agent closed the connection in the middle of a message",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut JsonCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(v) = codec.decode(buf).unwrap() {
            out.push(v.get().to_string());
        }
        out
    }

    #[test]
    fn encode_appends_newline() {
        let mut buf = BytesMut::new();
        JsonCodec.encode("tok123", &mut buf).unwrap();
        assert_eq!(&buf[..], b"\"tok123\"\n");
    }

    #[test]
    fn decodes_consecutive_values() {
        let mut buf = BytesMut::from(&b"\"\"\ntrue\n{\"a\": [1, 2]}\n"[..]);
        let values = decode_all(&mut JsonCodec, &mut buf);
        assert_eq!(values, vec!["\"\"", "true", "{\"a\": [1, 2]}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_partial_value() {
        let mut codec = JsonCodec;
        let mut buf = BytesMut::from(&b"\"permission de"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"nied\"\n");
        let v = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(v.get(), "\"permission denied\"");
    }

    #[test]
    fn trailing_number_waits_until_delimited() {
        let mut codec = JsonCodec;
        let mut buf = BytesMut::from(&b"12"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"3\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().get(), "123");
    }

    #[test]
    fn trailing_number_accepted_at_eof() {
        let mut buf = BytesMut::from(&b"42"[..]);
        assert_eq!(JsonCodec.decode_eof(&mut buf).unwrap().unwrap().get(), "42");
    }

    #[test]
    fn truncated_value_at_eof_is_transport_error() {
        let mut buf = BytesMut::from(&b"{\"a\":"[..]);
        let err = JsonCodec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, CallError::Transport(_)));
    }

    #[test]
    fn invalid_json_is_encoding_error() {
        let mut buf = BytesMut::from(&b"}{"[..]);
        let err = JsonCodec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CallError::Encoding(_)));
    }
}
