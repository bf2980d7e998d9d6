//! Send, receive and the command/data/response transaction cycle

use super::{CameraConnection, TransactionPhase};
use crate::container::{Container, ContainerKind, HEADER_SIZE, codes};
use crate::{PtpError, Result, Transport};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Outcome of one [`CameraConnection::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    /// Id stamped on the command (and data) containers
    pub transaction_id: u32,
    /// The response container closing the transaction
    pub response: Container,
    /// Data phase sent by the camera, when one was requested and received
    pub data: Option<Container>,
}

impl TransactionResult {
    /// Response code of the transaction.
    pub fn code(&self) -> u16 {
        self.response.code()
    }

    /// Whether the camera answered with `OK`.
    pub fn is_ok(&self) -> bool {
        self.response.code() == codes::response::OK
    }

    /// Fail with a protocol error unless the response code is `OK`.
    pub fn ensure_ok(self, context: &str) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(PtpError::protocol(context, u32::from(self.response.code())))
        }
    }
}

impl<T: Transport> CameraConnection<T> {
    /// Pack `container` and write it to the bulk-out endpoint.
    pub fn send(&mut self, container: &Container, timeout: Duration) -> Result<()> {
        if container.checked_length().is_none() {
            return Err(PtpError::framing(
                "Container send",
                format!(
                    "{:?} container of {} payload bytes exceeds the 32-bit length field",
                    container.kind(),
                    container.payload().len()
                ),
            ));
        }
        let packed = container.pack();
        let transport = self.transport_mut()?;
        let written =
            transport.write(&packed, timeout).map_err(|e| PtpError::transport("bulk write", e))?;
        trace!(written, expected = packed.len(), kind = ?container.kind(), "Bulk write");
        if written != packed.len() {
            return Err(PtpError::framing(
                "Container send",
                format!("Short write: {} of {} bytes transferred", written, packed.len()),
            ));
        }
        Ok(())
    }

    /// Read one framed container from the bulk-in endpoint.
    ///
    /// The first read asks for `initial_read_size` bytes to learn the declared
    /// length; when the container is longer, exactly one more read fetches the
    /// remainder. A declared length above `max_container_size` is rejected
    /// before the remainder buffer is allocated. `timeout` applies to each
    /// read separately, so this can take up to twice `timeout`.
    pub fn recv(&mut self, timeout: Duration) -> Result<Container> {
        let initial = self.config.initial_read_size;
        let limit = self.config.max_container_size;
        let transport = self.transport_mut()?;

        let mut buffer = vec![0u8; initial];
        let read =
            transport.read(&mut buffer, timeout).map_err(|e| PtpError::transport("bulk read", e))?;
        trace!(read, requested = initial, "Bulk read");
        buffer.truncate(read);

        let declared = Container::peek_length(&buffer)? as usize;
        if declared < HEADER_SIZE {
            return Err(PtpError::framing(
                "Container receive",
                format!(
                    "Declared length {} is shorter than the {} byte header",
                    declared, HEADER_SIZE
                ),
            ));
        }
        if declared > limit {
            return Err(PtpError::framing(
                "Container receive",
                format!("Declared length {} exceeds the {} byte limit", declared, limit),
            ));
        }
        if read > declared {
            return Err(PtpError::framing(
                "Container receive",
                format!("Read {} bytes but container declares {}", read, declared),
            ));
        }

        if declared > read {
            buffer.resize(declared, 0);
            let remainder = transport
                .read(&mut buffer[read..], timeout)
                .map_err(|e| PtpError::transport("bulk read", e))?;
            trace!(remainder, requested = declared - read, "Bulk read (remainder)");
            if read + remainder != declared {
                return Err(PtpError::framing(
                    "Container receive",
                    format!(
                        "Truncated container: declared {} bytes, received {}",
                        declared,
                        read + remainder
                    ),
                ));
            }
        }

        Container::unpack(&buffer)
    }

    /// Run one complete PTP transaction.
    ///
    /// 1. allocate a transaction id and stamp it on `command` and `data`
    /// 2. send `command`, then `data` when present
    /// 3. when `want_receive` is set, read one container: a data container is
    ///    kept and must be followed by a response; a response ends the read
    /// 4. when no response arrived yet, read one more container and use it as
    ///    the response
    ///
    /// PTP always closes a transaction with a response, even when no data
    /// phase is requested, so a response is always read.
    ///
    /// # Timeouts
    ///
    /// `timeout` bounds every individual transport call, not the transaction.
    /// A transaction makes up to two writes and four reads, so the wall-clock
    /// time can reach several multiples of `timeout`.
    pub fn execute(
        &mut self,
        mut command: Container,
        data: Option<Container>,
        want_receive: bool,
        timeout: Duration,
    ) -> Result<TransactionResult> {
        self.transport_mut()?;
        self.phase = TransactionPhase::Idle;

        let transaction_id = self.next_transaction_id();
        command.set_transaction_id(transaction_id);
        debug!(
            transaction_id,
            code = command.code(),
            params = ?command.parameters(),
            has_data = data.is_some(),
            want_receive,
            "Starting transaction"
        );

        self.send(&command, timeout)?;
        self.phase = TransactionPhase::CommandSent;

        if let Some(mut data) = data {
            data.set_transaction_id(transaction_id);
            self.send(&data, timeout)?;
            self.phase = TransactionPhase::DataSent;
        }

        self.phase = TransactionPhase::AwaitingReply;
        let mut received_data = None;
        let mut response = None;

        if want_receive {
            let first = self.recv(timeout)?;
            match first.kind() {
                ContainerKind::Data => {
                    self.phase = TransactionPhase::DataReceived;
                    received_data = Some(first);
                    let closing = self.recv(timeout)?;
                    if closing.kind() != ContainerKind::Response {
                        return Err(PtpError::framing(
                            "Transaction",
                            format!(
                                "Expected a response after the data phase, got {:?}",
                                closing.kind()
                            ),
                        ));
                    }
                    response = Some(closing);
                }
                ContainerKind::Response => response = Some(first),
                other => {
                    warn!(
                        transaction_id,
                        kind = ?other,
                        code = first.code(),
                        "Dropping unexpected container"
                    );
                }
            }
        }

        let response = match response {
            Some(response) => response,
            None => self.recv(timeout)?,
        };
        self.phase = TransactionPhase::ResponseReceived;

        if response.kind() != ContainerKind::Response {
            warn!(transaction_id, kind = ?response.kind(), "Closing container is not a response");
        }
        if response.transaction_id() != transaction_id {
            warn!(
                expected = transaction_id,
                found = response.transaction_id(),
                "Response transaction id mismatch"
            );
        }

        debug!(
            transaction_id,
            code = response.code(),
            data = received_data.is_some(),
            "Transaction complete"
        );
        self.phase = TransactionPhase::Complete;
        Ok(TransactionResult { transaction_id, response, data: received_data })
    }

    /// Build and execute a command with the configured default timeout.
    pub fn transact(
        &mut self,
        code: u16,
        params: Vec<u32>,
        data: Option<Vec<u8>>,
        want_receive: bool,
    ) -> Result<TransactionResult> {
        let command = Container::command(code, params);
        let data = data.map(|payload| Container::data(code, payload));
        let timeout = self.config.default_timeout;
        self.execute(command, data, want_receive, timeout)
    }

    /// Open a PTP session. Cameras reject most operations outside a session.
    pub fn open_session(&mut self, session_id: u32) -> Result<()> {
        self.transact(codes::operation::OPEN_SESSION, vec![session_id], None, false)?
            .ensure_ok("OpenSession")?;
        debug!(session_id, "PTP session opened");
        Ok(())
    }

    /// Close the current PTP session.
    pub fn close_session(&mut self) -> Result<()> {
        self.transact(codes::operation::CLOSE_SESSION, vec![], None, false)?
            .ensure_ok("CloseSession")?;
        Ok(())
    }
}
