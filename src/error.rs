//! Error types for PTP and CHDK operations.
//!
//! Every fallible operation in this crate returns [`PtpError`]. Errors carry
//! structured context for debugging and for deciding whether the connection
//! can still be used.
//!
//! ## Error Categories
//!
//! - **Connection state**: operation on a closed connection, or a second open
//! - **Transport failures**: the USB binding reported an error (raw code kept)
//! - **Framing errors**: truncated reads, length mismatches, malformed parameters
//! - **Protocol errors**: the camera answered with a non-OK code
//! - **Timeouts**: the script polling loop ran out of time
//!
//! ## Connection health
//!
//! Any error aborts the in-flight transaction only. A transport failure is the
//! exception: the USB pipe may be out of sync, so the connection should be
//! reopened.
//!
//! ```rust
//! use chdk_ptp::{PtpError, TransportError};
//!
//! let error = PtpError::transport("bulk read", TransportError::new(-7, "timeout"));
//! assert!(error.connection_suspect());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for PTP operations.
pub type Result<T, E = PtpError> = std::result::Result<T, E>;

/// Error reported by a [`Transport`](crate::Transport) implementation.
///
/// `code` is the raw error code of the underlying USB binding (for libusb
/// bindings, the negative `LIBUSB_ERROR_*` value).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Main error type for PTP operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PtpError {
    #[error("No camera connection is open")]
    NotConnected,

    #[error("A camera connection is already open")]
    AlreadyConnected,

    #[error("Transport failure during {operation}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Framing error in {context}: {details}")]
    Framing { context: String, details: String },

    #[error("Camera rejected {context} with code {code:#06x}")]
    Protocol { context: String, code: u32 },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Live view version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Local file error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl PtpError {
    /// Returns whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PtpError::Transport { .. } => true,
            PtpError::Timeout { .. } => true,
            PtpError::NotConnected => false,
            PtpError::AlreadyConnected => false,
            PtpError::Framing { .. } => false,
            PtpError::Protocol { .. } => false,
            PtpError::VersionMismatch { .. } => false,
            PtpError::Io { .. } => false,
            PtpError::Config { .. } => false,
        }
    }

    /// Returns true when the connection should be treated as suspect and reopened.
    pub fn connection_suspect(&self) -> bool {
        matches!(self, PtpError::Transport { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PtpError::NotConnected => vec![
                "Open the connection with a transport before issuing commands",
                "Check the camera is powered on and in PTP mode",
            ],
            PtpError::AlreadyConnected => {
                vec!["Close the existing connection first", "Use reopen() to swap transports"]
            }
            PtpError::Transport { .. } => vec![
                "Reopen the connection, the USB pipe may be out of sync",
                "Check the USB cable and power state of the camera",
                "Increase the transport timeout",
            ],
            PtpError::Framing { .. } => vec![
                "Verify the camera firmware speaks standard PTP containers",
                "Reopen the connection to resynchronize the stream",
            ],
            PtpError::Protocol { .. } => vec![
                "Check the remote path or script for mistakes",
                "Verify the CHDK build supports this operation",
            ],
            PtpError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check the remote script is not stuck in a loop",
            ],
            PtpError::VersionMismatch { .. } => vec![
                "Update CHDK on the camera",
                "Update the library to a compatible version",
            ],
            PtpError::Io { .. } => {
                vec!["Check the local file exists and is readable", "Check file permissions"]
            }
            PtpError::Config { .. } => vec!["Review the connection configuration values"],
        }
    }

    /// Helper constructor for transport failures.
    pub fn transport(operation: &'static str, source: TransportError) -> Self {
        PtpError::Transport { operation, source }
    }

    /// Helper constructor for framing errors.
    pub fn framing(context: impl Into<String>, details: impl Into<String>) -> Self {
        PtpError::Framing { context: context.into(), details: details.into() }
    }

    /// Helper constructor for device-side rejections.
    pub fn protocol(context: impl Into<String>, code: u32) -> Self {
        PtpError::Protocol { context: context.into(), code }
    }

    /// Helper constructor for local file errors with path context.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        PtpError::Io { path, source }
    }
}
