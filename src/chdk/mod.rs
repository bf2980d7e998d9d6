//! CHDK extension protocol.
//!
//! CHDK multiplexes all of its functionality over one vendor operation
//! (`0x9999`); the first command parameter selects the sub-operation.
//! [`ChdkCamera`] wraps a [`CameraConnection`] and speaks that protocol:
//!
//! - remote Lua scripts ([`script`]): submit, poll, wait, message exchange
//! - file transfer ([`files`]): upload and download
//! - live view: display data request and decoding
//!
//! All calls are synchronous on the caller's thread. Nothing runs in the
//! background; polling only happens inside the call that asked for it.

pub mod files;
pub mod script;

pub use script::{
    MessageKind, ScriptErrorKind, ScriptHandle, ScriptMessage, ScriptState, ScriptStatus,
    ValueType, WriteStatus,
};

use crate::connection::TransactionResult;
use crate::container::{Container, codes};
use crate::liveview::{LiveViewFlags, LiveViewFrame};
use crate::{CameraConnection, ConnectionConfig, PtpError, Result, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// CHDK PTP protocol version reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChdkVersion {
    pub major: u32,
    pub minor: u32,
}

impl ChdkVersion {
    /// Version as `major.minor` float, e.g. `2.6`.
    pub fn as_f32(&self) -> f32 {
        self.major as f32 + self.minor as f32 / 10.0
    }
}

impl fmt::Display for ChdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A camera running CHDK.
pub struct ChdkCamera<T: Transport> {
    conn: CameraConnection<T>,
}

impl<T: Transport> ChdkCamera<T> {
    /// Wrap an existing connection.
    pub fn new(conn: CameraConnection<T>) -> Self {
        Self { conn }
    }

    /// Open a connection on `transport` and wrap it.
    pub fn connect(transport: T, config: ConnectionConfig) -> Result<Self> {
        Ok(Self::new(CameraConnection::with_transport(transport, config)?))
    }

    pub fn connection(&self) -> &CameraConnection<T> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut CameraConnection<T> {
        &mut self.conn
    }

    pub fn into_connection(self) -> CameraConnection<T> {
        self.conn
    }

    /// Query the CHDK PTP protocol version.
    pub fn version(&mut self) -> Result<ChdkVersion> {
        let timeout = self.conn.config().default_timeout;
        let result = self.chdk_op(codes::chdk::VERSION, &[], None, false, timeout, "CHDK version")?;
        let version = ChdkVersion {
            major: required_param(&result, 0, "CHDK version")?,
            minor: required_param(&result, 1, "CHDK version")?,
        };
        info!(%version, "CHDK protocol version");
        Ok(version)
    }

    /// Fetch one live view frame.
    ///
    /// `skip` is passed to [`LiveViewFrame::decode`].
    pub fn live_view(
        &mut self,
        flags: LiveViewFlags,
        skip: bool,
        timeout: Duration,
    ) -> Result<LiveViewFrame> {
        let result = self.chdk_op(
            codes::chdk::GET_DISPLAY_DATA,
            &[flags.bits()],
            None,
            true,
            timeout,
            "live view request",
        )?;
        let data = result.data.ok_or_else(|| {
            PtpError::framing("Live view request", "Camera sent no data phase")
        })?;
        debug!(bytes = data.payload().len(), "Received live view payload");
        LiveViewFrame::decode(data.payload(), skip)
    }

    /// Run one CHDK sub-operation and require an `OK` response.
    pub(crate) fn chdk_op(
        &mut self,
        sub_op: u32,
        extra: &[u32],
        data: Option<Vec<u8>>,
        want_receive: bool,
        timeout: Duration,
        context: &str,
    ) -> Result<TransactionResult> {
        let mut params = Vec::with_capacity(1 + extra.len());
        params.push(sub_op);
        params.extend_from_slice(extra);

        let command = Container::command(codes::operation::CHDK, params);
        let data = data.map(|payload| Container::data(codes::operation::CHDK, payload));
        self.conn.execute(command, data, want_receive, timeout)?.ensure_ok(context)
    }
}

/// Response parameter `n`, or a framing error naming `context`.
pub(crate) fn required_param(result: &TransactionResult, n: usize, context: &str) -> Result<u32> {
    result.response.param(n).ok_or_else(|| {
        PtpError::framing(context, format!("Response is missing parameter {}", n))
    })
}

/// Append the NUL terminator CHDK expects on strings.
pub(crate) fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::codes::response;
    use crate::liveview::PixelFormat;
    use crate::test_utils::{LiveViewPayload, MockTransport};

    fn camera(mock: MockTransport) -> ChdkCamera<MockTransport> {
        ChdkCamera::connect(mock, ConnectionConfig::default()).unwrap()
    }

    #[test]
    fn reads_protocol_version() {
        let mut mock = MockTransport::new();
        mock.queue_response(response::OK, vec![2, 6]);
        let mut cam = camera(mock);

        let version = cam.version().unwrap();
        assert_eq!(version, ChdkVersion { major: 2, minor: 6 });
        assert_eq!(version.to_string(), "2.6");
        assert!((version.as_f32() - 2.6).abs() < 1e-6);

        let sent = cam.connection().transport().unwrap().written_containers();
        assert_eq!(sent[0].code(), codes::operation::CHDK);
        assert_eq!(sent[0].parameters(), &[codes::chdk::VERSION]);
    }

    #[test]
    fn non_ok_response_is_protocol_error() {
        let mut mock = MockTransport::new();
        mock.queue_response(response::OPERATION_NOT_SUPPORTED, vec![]);
        let mut cam = camera(mock);
        match cam.version() {
            Err(PtpError::Protocol { code, .. }) => {
                assert_eq!(code, u32::from(response::OPERATION_NOT_SUPPORTED))
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn missing_version_parameter_is_framing_error() {
        let mut mock = MockTransport::new();
        mock.queue_response(response::OK, vec![2]);
        let mut cam = camera(mock);
        assert!(matches!(cam.version(), Err(PtpError::Framing { .. })));
    }

    #[test]
    fn live_view_requests_flags_and_decodes() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1)
            .pixels(vec![0, 90, 0, 90, 90, 90])
            .build();
        let mut mock = MockTransport::new();
        mock.queue_data(codes::operation::CHDK, payload).queue_response(response::OK, vec![]);
        let mut cam = camera(mock);

        let flags = LiveViewFlags { viewport: true, bitmap: false, palette: true };
        let frame = cam.live_view(flags, false, Duration::from_secs(1)).unwrap();
        assert_eq!(frame.pixels, vec![90; 12]);

        let sent = cam.connection().transport().unwrap().written_containers();
        assert_eq!(sent[0].parameters(), &[codes::chdk::GET_DISPLAY_DATA, 0x09]);
    }

    #[test]
    fn live_view_without_data_phase_is_framing_error() {
        let mut mock = MockTransport::new();
        mock.queue_response(response::OK, vec![]);
        let mut cam = camera(mock);
        let err = cam.live_view(LiveViewFlags::default(), false, Duration::from_secs(1));
        assert!(matches!(err, Err(PtpError::Framing { .. })));
    }

    #[test]
    fn nul_terminates_strings() {
        assert_eq!(nul_terminated("ab"), vec![b'a', b'b', 0]);
    }
}
