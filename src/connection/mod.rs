//! Camera connection and transaction engine.
//!
//! A [`CameraConnection`] owns one [`Transport`] and the transaction-id
//! counter for it. Every operation takes `&mut self`, so a connection can
//! never have two transactions in flight; share one across threads behind a
//! `Mutex` if needed.
//!
//! ## Transaction sequencing
//!
//! ```text
//! Idle -> CommandSent -> [DataSent] -> AwaitingReply
//!      -> DataReceived -> ResponseReceived -> Complete
//!      -> ResponseReceived -> Complete
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use chdk_ptp::{CameraConnection, ConnectionConfig, Transport};
//! use chdk_ptp::container::{Container, codes};
//!
//! fn device_info<T: Transport>(transport: T) -> chdk_ptp::Result<Vec<u8>> {
//!     let mut conn = CameraConnection::with_transport(transport, ConnectionConfig::default())?;
//!     let cmd = Container::command(codes::operation::GET_DEVICE_INFO, vec![]);
//!     let timeout = conn.config().default_timeout;
//!     let result = conn.execute(cmd, None, true, timeout)?;
//!     Ok(result.data.map(|d| d.into_payload()).unwrap_or_default())
//! }
//! ```

mod transaction;


pub use transaction::TransactionResult;

use crate::{ConnectionConfig, PtpError, Result, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Progress of the current (or last) transaction on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionPhase {
    Idle,
    CommandSent,
    DataSent,
    AwaitingReply,
    DataReceived,
    ResponseReceived,
    Complete,
}

/// An open (or closed) PTP connection to one camera.
pub struct CameraConnection<T: Transport> {
    /// Bulk pipe, `None` while closed
    transport: Option<T>,

    /// Next transaction id to hand out
    next_transaction_id: u32,

    /// Phase of the current or last transaction
    phase: TransactionPhase,

    config: ConnectionConfig,
}

impl<T: Transport> CameraConnection<T> {
    /// Create a closed connection.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport: None, next_transaction_id: 0, phase: TransactionPhase::Idle, config })
    }

    /// Create a connection and open it on `transport`.
    pub fn with_transport(transport: T, config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(config)?;
        conn.open(transport)?;
        Ok(conn)
    }

    /// Take ownership of `transport` and start a fresh transaction sequence.
    ///
    /// Fails with [`PtpError::AlreadyConnected`] while another live transport
    /// is held. A held transport that reports itself closed is released and
    /// replaced.
    pub fn open(&mut self, transport: T) -> Result<()> {
        if self.is_connected() {
            return Err(PtpError::AlreadyConnected);
        }
        if !transport.is_open() {
            return Err(PtpError::NotConnected);
        }
        self.release();
        self.transport = Some(transport);
        self.next_transaction_id = 0;
        self.phase = TransactionPhase::Idle;
        info!("Camera connection opened");
        Ok(())
    }

    /// Release the transport. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.release() {
            info!("Camera connection closed");
        }
    }

    /// Close the current transport, if any, and open `transport`.
    pub fn reopen(&mut self, transport: T) -> Result<()> {
        self.close();
        self.open(transport)
    }

    /// Whether a live transport is held.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// Phase reached by the current or last transaction.
    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Borrow the transport, e.g. to inspect a test double.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Hand out the next transaction id, wrapping at `u32::MAX`.
    fn next_transaction_id(&mut self) -> u32 {
        let id = self.next_transaction_id;
        self.next_transaction_id = id.wrapping_add(1);
        id
    }

    fn transport_mut(&mut self) -> Result<&mut T> {
        match self.transport.as_mut() {
            Some(t) if t.is_open() => Ok(t),
            _ => Err(PtpError::NotConnected),
        }
    }

    fn release(&mut self) -> bool {
        match self.transport.take() {
            Some(mut transport) => {
                debug!("Releasing transport");
                transport.close();
                true
            }
            None => false,
        }
    }
}

impl<T: Transport> Drop for CameraConnection<T> {
    fn drop(&mut self) {
        self.release();
    }
}
