//! Container wire codec
//!
//! Binary layout of every PTP container, all integers little-endian:
//!
//! ```text
//! offset 0   u32  length         total bytes including this header
//! offset 4   u16  kind           1 command, 2 data, 3 response, 4 event
//! offset 6   u16  code           operation / response / event code
//! offset 8   u32  transaction_id
//! offset 12  ...  parameters (u32 each) or data payload
//! ```
//!
//! Decoding is field-by-field from byte offsets; every read is bounds-checked
//! and reports a framing error instead of reading past the buffer.

use super::{Container, ContainerKind};
use crate::{PtpError, Result};
use tracing::trace;

/// Size of the fixed container header in bytes
pub const HEADER_SIZE: usize = 12;

/// Size of one packed parameter in bytes
pub const PARAM_SIZE: usize = 4;

impl Container {
    /// Serialize the container to its wire representation.
    ///
    /// The length field is always computed from the content.
    pub fn pack(&self) -> Vec<u8> {
        let length = self.length();
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&(self.kind as u16).to_le_bytes());
        out.extend_from_slice(&self.code.to_le_bytes());
        out.extend_from_slice(&self.transaction_id.to_le_bytes());
        if self.kind.carries_parameters() {
            for param in &self.parameters {
                out.extend_from_slice(&param.to_le_bytes());
            }
        } else {
            out.extend_from_slice(&self.payload);
        }
        debug_assert_eq!(out.len(), length as usize);
        out
    }

    /// Parse a complete container from its wire representation.
    ///
    /// `bytes` must hold exactly one container: the declared length has to
    /// match `bytes.len()`.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(PtpError::framing(
                "Container unpack",
                format!("Need at least {} header bytes, have {}", HEADER_SIZE, bytes.len()),
            ));
        }

        let length = read_u32_le(bytes, 0)?;
        if length as usize != bytes.len() {
            return Err(PtpError::framing(
                "Container unpack",
                format!("Declared length {} but {} bytes supplied", length, bytes.len()),
            ));
        }

        let raw_kind = read_u16_le(bytes, 4)?;
        let kind = ContainerKind::from_u16(raw_kind).ok_or_else(|| {
            PtpError::framing("Container unpack", format!("Unknown container kind {}", raw_kind))
        })?;
        let code = read_u16_le(bytes, 6)?;
        let transaction_id = read_u32_le(bytes, 8)?;
        let body = &bytes[HEADER_SIZE..];

        trace!(?kind, code, transaction_id, length, "Unpacked container");

        if kind.carries_parameters() {
            if body.len() % PARAM_SIZE != 0 {
                return Err(PtpError::framing(
                    "Container unpack",
                    format!(
                        "{:?} container has {} parameter bytes, not a multiple of {}",
                        kind,
                        body.len(),
                        PARAM_SIZE
                    ),
                ));
            }
            let parameters = body
                .chunks_exact(PARAM_SIZE)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok(Self { kind, code, transaction_id, parameters, payload: Vec::new() })
        } else {
            Ok(Self { kind, code, transaction_id, parameters: Vec::new(), payload: body.to_vec() })
        }
    }

    /// Read the declared length from the first four bytes of a container.
    pub fn peek_length(bytes: &[u8]) -> Result<u32> {
        if bytes.len() < 4 {
            return Err(PtpError::framing(
                "Container length",
                format!("Need 4 bytes to read the length field, have {}", bytes.len()),
            ));
        }
        read_u32_le(bytes, 0)
    }
}

/// Bounds-checked little-endian u16 read.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    match data.get(offset..offset.saturating_add(2)) {
        Some(b) if b.len() == 2 => Ok(u16::from_le_bytes([b[0], b[1]])),
        _ => Err(insufficient("u16", offset, 2, data.len())),
    }
}

/// Bounds-checked little-endian u32 read.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    match data.get(offset..offset.saturating_add(4)) {
        Some(b) if b.len() == 4 => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        _ => Err(insufficient("u32", offset, 4, data.len())),
    }
}

/// Bounds-checked little-endian i32 read.
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    read_u32_le(data, offset).map(|v| v as i32)
}

fn insufficient(what: &str, offset: usize, need: usize, have: usize) -> PtpError {
    PtpError::framing(
        "Integer parsing",
        format!(
            "Insufficient data for {} at offset {} (need {} bytes, have {})",
            what,
            offset,
            need,
            have.saturating_sub(offset)
        ),
    )
}
