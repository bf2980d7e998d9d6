//! Shared helpers for integration tests
//!
//! `test_utils` is only compiled for unit tests and the `benchmark` feature,
//! so integration tests carry their own minimal scripted transport.

#![allow(dead_code)]

use chdk_ptp::{Container, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Wire {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
    reads: usize,
    closed: bool,
}

/// Transport replaying queued camera replies.
///
/// Clones share the same wire, so a test can keep a handle for inspection
/// after moving the transport into a connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCamera {
    wire: Arc<Mutex<Wire>>,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, container: Container) -> &Self {
        self.wire.lock().unwrap().inbound.push_back(container.pack());
        self
    }

    pub fn reply_raw(&self, bytes: Vec<u8>) -> &Self {
        self.wire.lock().unwrap().inbound.push_back(bytes);
        self
    }

    pub fn sent(&self) -> Vec<Container> {
        let wire = self.wire.lock().unwrap();
        wire.outbound.iter().map(|bytes| Container::unpack(bytes).unwrap()).collect()
    }

    pub fn reads(&self) -> usize {
        self.wire.lock().unwrap().reads
    }

    pub fn pending(&self) -> usize {
        self.wire.lock().unwrap().inbound.len()
    }

    pub fn is_closed(&self) -> bool {
        self.wire.lock().unwrap().closed
    }
}

impl Transport for ScriptedCamera {
    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.wire.lock().unwrap().outbound.push(bytes.to_vec());
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut wire = self.wire.lock().unwrap();
        wire.reads += 1;
        let Some(mut chunk) = wire.inbound.pop_front() else {
            return Err(TransportError::new(-7, "timed out"));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            wire.inbound.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn is_open(&self) -> bool {
        !self.wire.lock().unwrap().closed
    }

    fn close(&mut self) {
        self.wire.lock().unwrap().closed = true;
    }
}

pub fn ok(params: Vec<u32>) -> Container {
    Container::response(0x2001, params)
}

pub fn data(payload: Vec<u8>) -> Container {
    Container::data(0x9999, payload)
}
