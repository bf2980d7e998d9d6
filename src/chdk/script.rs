//! Remote script execution
//!
//! ## Protocol
//!
//! - `ExecuteScript [lang]` + script text: response params `[error, script_id]`
//! - `ScriptStatus`: response param 0 holds status flags (`RUN`, `MSG`)
//! - `ReadScriptMsg`: response params `[kind, subtype, script_id]`, data phase
//!   holds the message body
//! - `WriteScriptMsg [script_id]` + message: response param 0 is the queue status
//!
//! ## Status policy
//!
//! A finished script with a queued message (`MSG` without `RUN`) is not done
//! yet from the caller's point of view: the message still has to be read.
//! Only a status with neither flag set means the script ended and every
//! message was consumed. [`ChdkCamera::wait_and_read`] therefore polls while
//! `RUN` is set, reads once the script stopped, and keeps polling when a read
//! comes back empty although `MSG` was reported. User messages queued while
//! the script runs stay in the queue for [`ChdkCamera::read_script_message`].

use super::{ChdkCamera, nul_terminated, required_param};
use crate::container::codes;
use crate::{PtpError, Result, Transport};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Handle to a script submitted to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptHandle {
    pub script_id: u32,
}

/// Raw script status flags as reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStatus(pub u32);

impl ScriptStatus {
    /// A script is running
    pub const RUN: u32 = 0x1;
    /// A message from the script is queued
    pub const MSG: u32 = 0x2;

    pub fn is_running(&self) -> bool {
        (self.0 & Self::RUN) != 0
    }

    pub fn has_message(&self) -> bool {
        (self.0 & Self::MSG) != 0
    }

    pub fn state(&self) -> ScriptState {
        if self.is_running() {
            ScriptState::Running
        } else if self.has_message() {
            ScriptState::MessagePending
        } else {
            ScriptState::Idle
        }
    }
}

/// Script lifecycle derived from [`ScriptStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptState {
    Running,
    /// Stopped (finished or failed) with a return or error message waiting
    MessagePending,
    /// Stopped with no messages left
    Idle,
}

/// Kind of a script message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Queue was empty
    None,
    Error,
    Return,
    User,
}

impl MessageKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(MessageKind::None),
            1 => Some(MessageKind::Error),
            2 => Some(MessageKind::Return),
            3 => Some(MessageKind::User),
            _ => None,
        }
    }
}

/// Value type of return and user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Unsupported,
    Nil,
    Boolean,
    Integer,
    String,
    Table,
}

impl ValueType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ValueType::Unsupported),
            1 => Some(ValueType::Nil),
            2 => Some(ValueType::Boolean),
            3 => Some(ValueType::Integer),
            4 => Some(ValueType::String),
            5 => Some(ValueType::Table),
            _ => None,
        }
    }
}

/// Subtype of error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptErrorKind {
    None,
    Compile,
    Runtime,
}

impl ScriptErrorKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ScriptErrorKind::None),
            1 => Some(ScriptErrorKind::Compile),
            2 => Some(ScriptErrorKind::Runtime),
            _ => None,
        }
    }
}

/// One message read from the script message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMessage {
    pub kind: MessageKind,
    /// Raw subtype: a [`ValueType`] for return/user messages, a
    /// [`ScriptErrorKind`] for errors
    pub subtype: u32,
    pub script_id: u32,
    pub data: Vec<u8>,
}

impl ScriptMessage {
    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            MessageKind::Return | MessageKind::User => ValueType::from_raw(self.subtype),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ScriptErrorKind> {
        match self.kind {
            MessageKind::Error => ScriptErrorKind::from_raw(self.subtype),
            _ => None,
        }
    }

    /// Message body as text, without a trailing NUL.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end])
    }

    /// Integer value of an integer message.
    pub fn as_integer(&self) -> Option<i32> {
        if self.value_type() != Some(ValueType::Integer) {
            return None;
        }
        let bytes: [u8; 4] = self.data.get(..4)?.try_into().ok()?;
        Some(i32::from_le_bytes(bytes))
    }

    /// Boolean value of a boolean message.
    pub fn as_bool(&self) -> Option<bool> {
        if self.value_type() != Some(ValueType::Boolean) {
            return None;
        }
        self.data.first().map(|b| *b != 0)
    }
}

/// Outcome of writing a message to a running script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteStatus {
    Ok,
    NotRunning,
    QueueFull,
}

impl<T: Transport> ChdkCamera<T> {
    /// Submit a Lua script.
    ///
    /// A non-zero immediate error code from the interpreter is returned as
    /// [`PtpError::Protocol`]; the compile error text stays in the message
    /// queue. With `blocking`, this call polls until the script stops running
    /// (bounded by `script_timeout`), leaving its messages for
    /// [`ChdkCamera::wait_and_read`] or [`ChdkCamera::read_script_message`].
    pub fn submit_script(&mut self, source: &str, blocking: bool) -> Result<ScriptHandle> {
        let timeout = self.conn.config().default_timeout;
        let result = self.chdk_op(
            codes::chdk::EXECUTE_SCRIPT,
            &[codes::chdk::SCRIPT_LANG_LUA],
            Some(nul_terminated(source)),
            false,
            timeout,
            "script submission",
        )?;

        let error = required_param(&result, 0, "script submission")?;
        if error != 0 {
            warn!(error, "Script rejected by interpreter");
            return Err(PtpError::protocol("script submission", error));
        }
        let handle = ScriptHandle { script_id: required_param(&result, 1, "script submission")? };
        info!(script_id = handle.script_id, bytes = source.len(), "Script submitted");

        if blocking {
            let limit = self.conn.config().script_timeout;
            self.wait_until_stopped(&handle, limit)?;
        }
        Ok(handle)
    }

    /// Alias of [`ChdkCamera::submit_script`].
    pub fn execute_lua(&mut self, source: &str, blocking: bool) -> Result<ScriptHandle> {
        self.submit_script(source, blocking)
    }

    /// Submit a script and wait for its first message.
    pub fn run_script(&mut self, source: &str, timeout: Duration) -> Result<ScriptMessage> {
        let handle = self.submit_script(source, false)?;
        self.wait_and_read(&handle, timeout)
    }

    /// Query the script status flags.
    ///
    /// CHDK keeps a single script slot, so the status always describes the
    /// latest script; `handle` is used for logging only.
    pub fn poll_status(&mut self, handle: &ScriptHandle) -> Result<ScriptStatus> {
        let timeout = self.conn.config().default_timeout;
        let result =
            self.chdk_op(codes::chdk::SCRIPT_STATUS, &[], None, false, timeout, "script status")?;
        let status = ScriptStatus(required_param(&result, 0, "script status")?);
        trace!(script_id = handle.script_id, ?status, state = ?status.state(), "Script status");
        Ok(status)
    }

    /// Poll until the script stops running or `timeout` elapses.
    pub fn wait_until_stopped(
        &mut self,
        handle: &ScriptHandle,
        timeout: Duration,
    ) -> Result<ScriptStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.poll_status(handle)?;
            if !status.is_running() {
                return Ok(status);
            }
            self.sleep_until_next_poll(deadline, timeout)?;
        }
    }

    /// Wait for the script to finish, then read its result.
    ///
    /// Polls every `poll_interval` while the script is running, even when it
    /// has already queued user messages, then reads one message. Messages
    /// left over from other scripts are skipped. A stopped script with an
    /// empty queue yields a message of kind [`MessageKind::None`]. Fails with
    /// [`PtpError::Timeout`] once `timeout` has elapsed.
    pub fn wait_and_read(
        &mut self,
        handle: &ScriptHandle,
        timeout: Duration,
    ) -> Result<ScriptMessage> {
        let deadline = Instant::now() + timeout;
        let mut polls = 0u32;
        loop {
            let status = self.poll_status(handle)?;
            polls += 1;

            if !status.is_running() {
                let message = self.read_script_message()?;
                let stale =
                    message.kind != MessageKind::None && message.script_id != handle.script_id;
                if stale {
                    warn!(
                        expected = handle.script_id,
                        found = message.script_id,
                        "Skipping message from another script"
                    );
                } else if message.kind != MessageKind::None || !status.has_message() {
                    debug!(
                        script_id = handle.script_id,
                        polls,
                        kind = ?message.kind,
                        "Script message ready"
                    );
                    return Ok(message);
                }
            }

            self.sleep_until_next_poll(deadline, timeout)?;
        }
    }

    /// Read one message from the script message queue.
    pub fn read_script_message(&mut self) -> Result<ScriptMessage> {
        let timeout = self.conn.config().default_timeout;
        let result = self.chdk_op(
            codes::chdk::READ_SCRIPT_MSG,
            &[],
            None,
            true,
            timeout,
            "script message read",
        )?;

        let raw_kind = required_param(&result, 0, "script message read")?;
        let kind = MessageKind::from_raw(raw_kind).ok_or_else(|| {
            PtpError::framing("Script message read", format!("Unknown message kind {}", raw_kind))
        })?;
        let subtype = result.response.param(1).unwrap_or(0);
        let script_id = result.response.param(2).unwrap_or(0);
        let data = result.data.map(|d| d.into_payload()).unwrap_or_default();

        trace!(?kind, subtype, script_id, bytes = data.len(), "Read script message");
        Ok(ScriptMessage { kind, subtype, script_id, data })
    }

    /// Send a message to a running script's input queue.
    pub fn write_script_message(&mut self, message: &str, script_id: u32) -> Result<WriteStatus> {
        let timeout = self.conn.config().default_timeout;
        let result = self.chdk_op(
            codes::chdk::WRITE_SCRIPT_MSG,
            &[script_id],
            Some(message.as_bytes().to_vec()),
            false,
            timeout,
            "script message write",
        )?;
        match required_param(&result, 0, "script message write")? {
            0 => Ok(WriteStatus::Ok),
            1 => Ok(WriteStatus::NotRunning),
            2 => Ok(WriteStatus::QueueFull),
            other => Err(PtpError::framing(
                "Script message write",
                format!("Unknown write status {}", other),
            )),
        }
    }

    /// Scripting capability flags of the camera's CHDK build.
    pub fn script_support(&mut self) -> Result<u32> {
        let timeout = self.conn.config().default_timeout;
        let result =
            self.chdk_op(codes::chdk::SCRIPT_SUPPORT, &[], None, false, timeout, "script support")?;
        required_param(&result, 0, "script support")
    }

    /// Whether the camera's CHDK build includes the Lua interpreter.
    pub fn supports_lua(&mut self) -> Result<bool> {
        Ok(self.script_support()? & codes::chdk::SCRIPT_SUPPORT_LUA != 0)
    }

    /// Ask the camera to power off.
    pub fn shutdown(&mut self) -> Result<ScriptHandle> {
        self.submit_script("shut_down()", false)
    }

    /// Reboot the camera, optionally into a firmware file such as `A/PS.FI2`.
    pub fn reboot(&mut self, firmware: Option<&str>) -> Result<ScriptHandle> {
        let script = match firmware {
            Some(path) => format!("reboot({:?})", path),
            None => "reboot()".to_string(),
        };
        self.submit_script(&script, false)
    }

    fn sleep_until_next_poll(&self, deadline: Instant, timeout: Duration) -> Result<()> {
        let now = Instant::now();
        if now >= deadline {
            return Err(PtpError::Timeout { duration: timeout });
        }
        std::thread::sleep(self.conn.config().poll_interval.min(deadline - now));
        Ok(())
    }
}
