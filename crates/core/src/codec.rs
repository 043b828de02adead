//! Transport encoding for leaf content.
//!
//! Standard base64 with padding. Content-agnostic: the bytes are never
//! interpreted, so binary payloads survive unchanged.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::errors::CodecError;

/// Byte-safe, whitespace-free text encoding used across the remote boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentCodec;

impl ContentCodec {
    pub fn encode(raw: &[u8]) -> String {
        STANDARD.encode(raw)
    }

    pub fn decode(transport: &str) -> Result<Vec<u8>, CodecError> {
        Ok(STANDARD.decode(transport)?)
    }
}
