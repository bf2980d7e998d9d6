//! Test utilities: a scripted transport and payload builders
//!
//! [`MockTransport`] replays queued bulk-in chunks and records everything
//! written to it, so transaction sequencing can be checked byte for byte
//! without a camera.

#![cfg(any(test, feature = "benchmark"))]

use crate::container::Container;
use crate::liveview::PixelFormat;
use crate::{Transport, TransportError};
use std::collections::VecDeque;
use std::time::Duration;

/// Install a `RUST_LOG`-driven subscriber for tests. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transport double that replays scripted reads.
///
/// Each queued chunk models one USB transfer. A read returns at most
/// `buf.len()` bytes of the front chunk; whatever does not fit stays queued
/// for the next read, the way a bulk-in pipe hands out a long container.
#[derive(Debug, Default)]
pub struct MockTransport {
    reads: VecDeque<Result<Vec<u8>, TransportError>>,
    writes: Vec<Vec<u8>>,
    read_calls: usize,
    write_limit: Option<usize>,
    write_error: Option<TransportError>,
    closed: bool,
    close_calls: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes as one transfer.
    pub fn queue_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.reads.push_back(Ok(bytes));
        self
    }

    /// Queue a packed container as one transfer.
    pub fn queue(&mut self, container: &Container) -> &mut Self {
        self.queue_bytes(container.pack())
    }

    /// Queue a response container.
    pub fn queue_response(&mut self, code: u16, params: Vec<u32>) -> &mut Self {
        self.queue(&Container::response(code, params))
    }

    /// Queue a data container.
    pub fn queue_data(&mut self, code: u16, payload: Vec<u8>) -> &mut Self {
        self.queue(&Container::data(code, payload))
    }

    /// Queue a transport failure for the next read.
    pub fn queue_read_error(&mut self, error: TransportError) -> &mut Self {
        self.reads.push_back(Err(error));
        self
    }

    /// Accept at most `limit` bytes per write.
    pub fn limit_writes(&mut self, limit: usize) -> &mut Self {
        self.write_limit = Some(limit);
        self
    }

    /// Fail every write with `error`.
    pub fn fail_writes(&mut self, error: TransportError) -> &mut Self {
        self.write_error = Some(error);
        self
    }

    /// Everything written so far, one entry per write call.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Written buffers decoded as containers.
    pub fn written_containers(&self) -> Vec<Container> {
        self.writes.iter().filter_map(|w| Container::unpack(w).ok()).collect()
    }

    /// Number of read calls made.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Number of queued transfers not consumed yet.
    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    /// Make `is_open` report false without going through `close`.
    pub fn disconnect(&mut self) {
        self.closed = true;
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        if let Some(error) = &self.write_error {
            return Err(error.clone());
        }
        let accepted = self.write_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        self.writes.push(bytes[..accepted].to_vec());
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.read_calls += 1;
        match self.reads.pop_front() {
            Some(Ok(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.reads.push_front(Ok(rest));
                }
                Ok(n)
            }
            Some(Err(error)) => Err(error),
            None => Err(TransportError::new(-7, "read timed out")),
        }
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
        self.close_calls += 1;
    }
}

/// Builder for live view payloads in the CHDK 2.x layout (2.1 by default).
#[derive(Debug, Clone)]
pub struct LiveViewPayload {
    format: PixelFormat,
    width: usize,
    height: usize,
    buffer_width: usize,
    minor: i32,
    gap: usize,
    pixels: Option<Vec<u8>>,
    palette: Option<(i32, Vec<u8>)>,
    bitmap: Option<(usize, usize, Vec<u8>)>,
}

impl LiveViewPayload {
    pub fn new(format: PixelFormat, width: usize, height: usize) -> Self {
        Self {
            format,
            width,
            height,
            buffer_width: width,
            minor: 1,
            gap: 0,
            pixels: None,
            palette: None,
            bitmap: None,
        }
    }

    /// Protocol minor version; 0 writes the shorter 2.0 header.
    pub fn minor(mut self, minor: i32) -> Self {
        self.minor = minor;
        self
    }

    /// Insert `gap` unused bytes after the header and after the descriptors.
    pub fn gap(mut self, gap: usize) -> Self {
        self.gap = gap;
        self
    }

    pub fn buffer_width(mut self, buffer_width: usize) -> Self {
        self.buffer_width = buffer_width;
        self
    }

    /// Raw viewport bytes; defaults to a generated pattern of `height` rows.
    pub fn pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = Some(pixels);
        self
    }

    pub fn palette(mut self, palette_type: i32, entries: Vec<u8>) -> Self {
        self.palette = Some((palette_type, entries));
        self
    }

    /// Add a `Palette8` bitmap overlay of `width` x `height` indices.
    pub fn bitmap(mut self, width: usize, height: usize, data: Vec<u8>) -> Self {
        self.bitmap = Some((width, height, data));
        self
    }

    pub fn build(self) -> Vec<u8> {
        const DESC: usize = 36;

        let header = if self.minor >= 1 { 32 } else { 28 };
        let vp_desc = header + self.gap;
        let bm_desc = self.bitmap.as_ref().map(|_| vp_desc + DESC);
        let after_desc = bm_desc.unwrap_or(vp_desc) + DESC + self.gap;
        let palette_start = self.palette.as_ref().map(|_| after_desc);
        let vp_data = after_desc + self.palette.as_ref().map_or(0, |(_, p)| p.len());

        let pixels = self.pixels.clone().unwrap_or_else(|| {
            let len = self.format.row_bytes(self.buffer_width) * self.height;
            (0..len).map(|i| (i * 37 % 251) as u8).collect()
        });
        let bm_data = vp_data + pixels.len();

        let mut out = Vec::new();
        let mut fields = vec![
            2,
            self.minor,
            1,
            self.palette.as_ref().map_or(0, |(t, _)| *t),
            palette_start.unwrap_or(0) as i32,
            vp_desc as i32,
            bm_desc.unwrap_or(0) as i32,
        ];
        if self.minor >= 1 {
            fields.push(0);
        }
        for field in fields {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.resize(vp_desc, 0);

        push_descriptor(&mut out, self.format, vp_data, self.buffer_width, self.width, self.height);
        if let Some((w, h, _)) = &self.bitmap {
            push_descriptor(&mut out, PixelFormat::Palette8, bm_data, *w, *w, *h);
        }
        out.resize(after_desc, 0);

        if let Some((_, entries)) = &self.palette {
            out.extend_from_slice(entries);
        }
        out.extend_from_slice(&pixels);
        if let Some((_, _, data)) = &self.bitmap {
            out.extend_from_slice(data);
        }
        out
    }
}

fn push_descriptor(
    out: &mut Vec<u8>,
    format: PixelFormat,
    data_start: usize,
    buffer_width: usize,
    width: usize,
    height: usize,
) {
    let fb_type = match format {
        PixelFormat::Yuv411 => 0,
        PixelFormat::Palette8 => 1,
        PixelFormat::Yuv422 => 2,
        PixelFormat::Yuv422Alt => 3,
        PixelFormat::Opacity8 => 4,
    };
    for field in
        [fb_type, data_start as i32, buffer_width as i32, width as i32, height as i32, 0, 0, 0, 0]
    {
        out.extend_from_slice(&field.to_le_bytes());
    }
}
