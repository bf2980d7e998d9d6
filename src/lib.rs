//! PTP camera control over USB, with the CHDK extension protocol.
//!
//! chdk-ptp talks the Picture Transfer Protocol to a camera through any
//! blocking bulk transport and layers the CHDK vendor extension on top:
//! remote Lua scripting, file transfer and live view.
//!
//! # Features
//!
//! - **Container codec**: bounds-checked packing and unpacking of PTP containers
//! - **Transaction engine**: command, data and response sequencing with
//!   per-connection transaction ids
//! - **Scripting**: submit Lua, poll status, exchange messages
//! - **File transfer**: single-phase upload, staged download
//! - **Live view**: header and framebuffer parsing, YUV to RGB conversion
//!
//! USB enumeration and endpoint claiming stay outside this crate: implement
//! [`Transport`] for whatever USB binding you use and hand it to a connection.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chdk_ptp::{ChdkCamera, ConnectionConfig, Transport};
//! use std::time::Duration;
//!
//! fn run<T: Transport>(transport: T) -> chdk_ptp::Result<()> {
//!     let mut camera = ChdkCamera::connect(transport, ConnectionConfig::default())?;
//!     camera.connection_mut().open_session(1)?;
//!
//!     println!("CHDK protocol {}", camera.version()?);
//!     let reply = camera.run_script("return get_vbatt()", Duration::from_secs(10))?;
//!     println!("battery: {} mV", reply.as_integer().unwrap_or_default());
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Protocol layers
pub mod connection;
pub mod container;
pub mod transport;

// CHDK extension
pub mod chdk;
pub mod liveview;

// Core exports
pub use config::ConnectionConfig;
pub use error::*;
pub use transport::Transport;

// Main API exports
pub use chdk::{
    ChdkCamera, ChdkVersion, MessageKind, ScriptErrorKind, ScriptHandle, ScriptMessage,
    ScriptState, ScriptStatus, ValueType, WriteStatus,
};
pub use connection::{CameraConnection, TransactionPhase, TransactionResult};
pub use container::{Container, ContainerKind};
pub use liveview::{LiveViewFlags, LiveViewFrame, PixelFormat};
