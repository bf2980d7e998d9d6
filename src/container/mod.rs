//! PTP containers: the unit of wire exchange.
//!
//! Every message on the bulk pipe is one container: a 12-byte header
//! followed by 32-bit parameters (command, response and event containers) or
//! an opaque payload (data containers).
//!
//! ## Usage Example
//!
//! ```rust
//! use chdk_ptp::container::{Container, ContainerKind, codes};
//!
//! let cmd = Container::command(codes::operation::OPEN_SESSION, vec![1]);
//! let bytes = cmd.pack();
//! assert_eq!(bytes.len(), 16);
//!
//! let decoded = Container::unpack(&bytes).unwrap();
//! assert_eq!(decoded.kind(), ContainerKind::Command);
//! assert_eq!(decoded.param(0), Some(1));
//! ```

mod codec;
pub mod codes;

pub use codec::{HEADER_SIZE, PARAM_SIZE, read_i32_le, read_u16_le, read_u32_le};

use serde::{Deserialize, Serialize};

/// Container type tag as carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ContainerKind {
    Command = 1,
    Data = 2,
    Response = 3,
    Event = 4,
}

impl ContainerKind {
    /// Map a raw header value to a kind.
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(ContainerKind::Command),
            2 => Some(ContainerKind::Data),
            3 => Some(ContainerKind::Response),
            4 => Some(ContainerKind::Event),
            _ => None,
        }
    }

    /// Whether the body is a list of u32 parameters rather than opaque bytes.
    pub const fn carries_parameters(self) -> bool {
        !matches!(self, ContainerKind::Data)
    }
}

/// One framed PTP message.
///
/// The transaction id is stamped by the connection when the container is
/// sent; freshly built containers carry 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    kind: ContainerKind,
    code: u16,
    transaction_id: u32,
    parameters: Vec<u32>,
    payload: Vec<u8>,
}

impl Container {
    /// Build a command container.
    pub fn command(code: u16, parameters: Vec<u32>) -> Self {
        Self::with_parameters(ContainerKind::Command, code, parameters)
    }

    /// Build a data container carrying `payload`.
    pub fn data(code: u16, payload: Vec<u8>) -> Self {
        Self { kind: ContainerKind::Data, code, transaction_id: 0, parameters: Vec::new(), payload }
    }

    /// Build a response container.
    pub fn response(code: u16, parameters: Vec<u32>) -> Self {
        Self::with_parameters(ContainerKind::Response, code, parameters)
    }

    /// Build an event container.
    pub fn event(code: u16, parameters: Vec<u32>) -> Self {
        Self::with_parameters(ContainerKind::Event, code, parameters)
    }

    fn with_parameters(kind: ContainerKind, code: u16, parameters: Vec<u32>) -> Self {
        Self { kind, code, transaction_id: 0, parameters, payload: Vec::new() }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn transaction_id(&self) -> u32 {
        self.transaction_id
    }

    pub(crate) fn set_transaction_id(&mut self, id: u32) {
        self.transaction_id = id;
    }

    /// Parameters of a command, response or event container.
    pub fn parameters(&self) -> &[u32] {
        &self.parameters
    }

    /// The `n`th parameter, if present.
    pub fn param(&self, n: usize) -> Option<u32> {
        self.parameters.get(n).copied()
    }

    /// Payload of a data container.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Total wire length, header included.
    ///
    /// Saturates at `u32::MAX`; use [`Container::checked_length`] before
    /// packing containers whose size is not known to fit.
    pub fn length(&self) -> u32 {
        self.checked_length().unwrap_or(u32::MAX)
    }

    /// Total wire length, or `None` when it does not fit the 32-bit length field.
    pub fn checked_length(&self) -> Option<u32> {
        let body = if self.kind.carries_parameters() {
            self.parameters.len().checked_mul(PARAM_SIZE)?
        } else {
            self.payload.len()
        };
        wire_length(body)
    }
}

fn wire_length(body: usize) -> Option<u32> {
    body.checked_add(HEADER_SIZE).and_then(|len| u32::try_from(len).ok())
}
