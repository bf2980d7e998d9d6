//! Live view payload structures and parsing
//!
//! ## Payload layout (CHDK live view protocol 2.x)
//!
//! 1. **Header** (28 or 32 bytes) at offset 0
//! 2. **Framebuffer descriptors** (36 bytes each) at header-given offsets
//! 3. **Palette and pixel buffers** at descriptor-given offsets
//!
//! Offsets are absolute from the start of the payload and need not be
//! contiguous; gaps between sections are allowed.
//!
//! ```c
//! typedef struct {
//!     int version_major;      // offset 0
//!     int version_minor;      // offset 4
//!     int lcd_aspect_ratio;   // offset 8
//!     int palette_type;       // offset 12
//!     int palette_data_start; // offset 16
//!     int vp_desc_start;      // offset 20
//!     int bm_desc_start;      // offset 24
//!     int bmo_desc_start;     // offset 28, minor >= 1 only
//! } lv_data_header;
//!
//! typedef struct {
//!     int fb_type;            // offset 0
//!     int data_start;         // offset 4
//!     int buffer_width;       // offset 8
//!     int visible_width;      // offset 12
//!     int visible_height;     // offset 16
//!     int margin_left;        // offset 20
//!     int margin_top;         // offset 24
//!     int margin_right;       // offset 28
//!     int margin_bot;         // offset 32
//! } lv_framebuffer_desc;
//! ```

use crate::container::read_i32_le;
use crate::{PtpError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Supported major version of the live view protocol
pub const LIVE_VIEW_VERSION_MAJOR: i32 = 2;

const HEADER_SIZE_V20: usize = 28;
const HEADER_SIZE_V21: usize = 32;
pub const FRAMEBUFFER_DESC_SIZE: usize = 36;

/// Pixel encoding of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// `UYVYYY`: 4 pixels in 6 bytes sharing one signed U/V pair
    Yuv411,
    /// 8-bit palette indices
    Palette8,
    /// `UYVY`: 2 pixels in 4 bytes sharing one U/V pair, chroma biased by 128
    Yuv422,
    /// Same packing as [`PixelFormat::Yuv422`], used by later firmwares
    Yuv422Alt,
    /// 8-bit opacity mask for the bitmap overlay
    Opacity8,
}

impl PixelFormat {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(PixelFormat::Yuv411),
            1 => Some(PixelFormat::Palette8),
            2 => Some(PixelFormat::Yuv422),
            3 => Some(PixelFormat::Yuv422Alt),
            4 => Some(PixelFormat::Opacity8),
            _ => None,
        }
    }

    /// Bytes occupied by a row of `width` pixels.
    pub fn row_bytes(self, width: usize) -> usize {
        match self {
            PixelFormat::Yuv411 => width * 12 / 8,
            PixelFormat::Yuv422 | PixelFormat::Yuv422Alt => width * 2,
            PixelFormat::Palette8 | PixelFormat::Opacity8 => width,
        }
    }

    pub fn is_yuv(self) -> bool {
        matches!(self, PixelFormat::Yuv411 | PixelFormat::Yuv422 | PixelFormat::Yuv422Alt)
    }
}

/// Live view data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveViewHeader {
    pub version_major: i32,
    pub version_minor: i32,
    pub lcd_aspect_ratio: i32,
    pub palette_type: i32,
    /// Offset of the palette, 0 when absent
    pub palette_data_start: usize,
    /// Offset of the viewport descriptor, 0 when absent
    pub vp_desc_start: usize,
    /// Offset of the bitmap overlay descriptor, 0 when absent
    pub bm_desc_start: usize,
    /// Offset of the bitmap opacity descriptor, 0 when absent
    pub bmo_desc_start: usize,
}

impl LiveViewHeader {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        trace!(payload_len = payload.len(), "Parsing live view header");
        if payload.len() < HEADER_SIZE_V20 {
            return Err(PtpError::framing(
                "Live view header",
                format!("Need {} header bytes, have {}", HEADER_SIZE_V20, payload.len()),
            ));
        }

        let version_major = read_i32_le(payload, 0)?;
        let version_minor = read_i32_le(payload, 4)?;
        if version_major != LIVE_VIEW_VERSION_MAJOR {
            return Err(PtpError::VersionMismatch {
                expected: LIVE_VIEW_VERSION_MAJOR as u32,
                found: version_major as u32,
            });
        }

        let lcd_aspect_ratio = read_i32_le(payload, 8)?;
        let palette_type = read_i32_le(payload, 12)?;
        let palette_data_start = read_offset(payload, 16, "palette_data_start")?;
        let vp_desc_start = read_offset(payload, 20, "vp_desc_start")?;
        let bm_desc_start = read_offset(payload, 24, "bm_desc_start")?;
        let bmo_desc_start = if version_minor >= 1 && payload.len() >= HEADER_SIZE_V21 {
            read_offset(payload, 28, "bmo_desc_start")?
        } else {
            0
        };

        debug!(
            version_major,
            version_minor,
            palette_type,
            vp_desc_start,
            bm_desc_start,
            palette_data_start,
            "Parsed live view header"
        );

        Ok(Self {
            version_major,
            version_minor,
            lcd_aspect_ratio,
            palette_type,
            palette_data_start,
            vp_desc_start,
            bm_desc_start,
            bmo_desc_start,
        })
    }

    /// Protocol version as `major.minor`, e.g. `2.1`.
    pub fn version(&self) -> f32 {
        self.version_major as f32 + self.version_minor as f32 / 10.0
    }

    /// Size in bytes of the palette announced by `palette_type`.
    pub fn palette_size(&self) -> Result<usize> {
        match self.palette_type {
            0 => Ok(0),
            1 | 2 => Ok(16 * 4),
            3..=5 => Ok(256 * 4),
            other => Err(PtpError::framing(
                "Live view palette",
                format!("Unknown palette type {}", other),
            )),
        }
    }
}

/// Description of one framebuffer inside a live view payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramebufferDescriptor {
    pub pixel_format: PixelFormat,
    /// Offset of the first pixel row
    pub data_start: usize,
    /// Row stride in pixels
    pub buffer_width: usize,
    pub visible_width: usize,
    pub visible_height: usize,
    pub margin_left: i32,
    pub margin_top: i32,
    pub margin_right: i32,
    pub margin_bottom: i32,
}

impl FramebufferDescriptor {
    /// Parse a descriptor located at `offset` in `payload`.
    pub fn parse(payload: &[u8], offset: usize) -> Result<Self> {
        let end = offset.checked_add(FRAMEBUFFER_DESC_SIZE).filter(|end| *end <= payload.len());
        if end.is_none() {
            return Err(PtpError::framing(
                "Framebuffer descriptor",
                format!(
                    "Descriptor at offset {} needs {} bytes, payload has {}",
                    offset,
                    FRAMEBUFFER_DESC_SIZE,
                    payload.len()
                ),
            ));
        }

        let raw_type = read_i32_le(payload, offset)?;
        let pixel_format = PixelFormat::from_raw(raw_type).ok_or_else(|| {
            PtpError::framing("Framebuffer descriptor", format!("Unknown pixel format {}", raw_type))
        })?;

        let desc = Self {
            pixel_format,
            data_start: read_offset(payload, offset + 4, "data_start")?,
            buffer_width: read_offset(payload, offset + 8, "buffer_width")?,
            visible_width: read_offset(payload, offset + 12, "visible_width")?,
            visible_height: read_offset(payload, offset + 16, "visible_height")?,
            margin_left: read_i32_le(payload, offset + 20)?,
            margin_top: read_i32_le(payload, offset + 24)?,
            margin_right: read_i32_le(payload, offset + 28)?,
            margin_bottom: read_i32_le(payload, offset + 32)?,
        };

        if desc.visible_width > desc.buffer_width {
            return Err(PtpError::framing(
                "Framebuffer descriptor",
                format!(
                    "Visible width {} exceeds buffer width {}",
                    desc.visible_width, desc.buffer_width
                ),
            ));
        }

        trace!(?desc, offset, "Parsed framebuffer descriptor");
        Ok(desc)
    }

    /// Row stride in bytes.
    pub fn row_bytes(&self) -> usize {
        self.pixel_format.row_bytes(self.buffer_width)
    }

    /// Byte range `[start, end)` spanned by `rows` rows starting at row `first_row`,
    /// checked against `payload_len`.
    pub(crate) fn rows_range(
        &self,
        first_row: usize,
        rows: usize,
        payload_len: usize,
    ) -> Result<std::ops::Range<usize>> {
        let stride = self.row_bytes();
        let start = first_row
            .checked_mul(stride)
            .and_then(|skip| self.data_start.checked_add(skip));
        let end = start.and_then(|s| rows.checked_mul(stride).and_then(|len| s.checked_add(len)));
        match (start, end) {
            (Some(start), Some(end)) if end <= payload_len => Ok(start..end),
            _ => Err(PtpError::framing(
                "Framebuffer data",
                format!(
                    "{} rows of {} bytes from offset {} (row {}) exceed payload of {} bytes",
                    rows, stride, self.data_start, first_row, payload_len
                ),
            )),
        }
    }
}

fn read_offset(payload: &[u8], at: usize, field: &str) -> Result<usize> {
    let value = read_i32_le(payload, at)?;
    usize::try_from(value).map_err(|_| {
        PtpError::framing("Live view layout", format!("Negative {}: {}", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::LiveViewPayload;

    #[test]
    fn parses_header_and_descriptor_with_gaps() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 8, 2).gap(40).build();
        let header = LiveViewHeader::parse(&payload).unwrap();
        assert_eq!(header.version_major, 2);
        assert!(header.vp_desc_start >= HEADER_SIZE_V21 + 40);

        let desc = FramebufferDescriptor::parse(&payload, header.vp_desc_start).unwrap();
        assert_eq!(desc.pixel_format, PixelFormat::Yuv411);
        assert_eq!(desc.visible_width, 8);
        assert_eq!(desc.visible_height, 2);
        assert_eq!(desc.row_bytes(), 12);
    }

    #[test]
    fn version_2_0_header_has_no_opacity_descriptor() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1).minor(0).build();
        let header = LiveViewHeader::parse(&payload).unwrap();
        assert_eq!(header.version_minor, 0);
        assert_eq!(header.vp_desc_start, HEADER_SIZE_V20);
        // bytes 28..32 hold the descriptor's fb_type here, not an offset
        assert_eq!(read_i32_le(&payload, 28).unwrap(), 2);
        assert_eq!(header.bmo_desc_start, 0);

        let desc = FramebufferDescriptor::parse(&payload, header.vp_desc_start).unwrap();
        assert_eq!(desc.pixel_format, PixelFormat::Yuv422);
    }

    #[test]
    fn version_2_0_header_fits_in_28_bytes() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1).minor(0).build();
        let header = LiveViewHeader::parse(&payload[..HEADER_SIZE_V20]).unwrap();
        assert_eq!(header.bmo_desc_start, 0);
        assert!(LiveViewHeader::parse(&payload[..HEADER_SIZE_V20 - 1]).is_err());
    }

    #[test]
    fn rejects_other_major_versions() {
        let mut payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1).build();
        payload[0] = 3;
        assert!(matches!(
            LiveViewHeader::parse(&payload),
            Err(PtpError::VersionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(LiveViewHeader::parse(&[2, 0, 0, 0]), Err(PtpError::Framing { .. })));
    }

    #[test]
    fn descriptor_past_end_is_framing_error() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1).build();
        let err = FramebufferDescriptor::parse(&payload, payload.len() - 10).unwrap_err();
        assert!(err.to_string().contains("Descriptor at offset"));
        assert!(FramebufferDescriptor::parse(&payload, usize::MAX - 4).is_err());
    }

    #[test]
    fn negative_offsets_are_rejected() {
        let mut payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1).build();
        payload[20..24].copy_from_slice(&(-8i32).to_le_bytes());
        let err = LiveViewHeader::parse(&payload).unwrap_err();
        assert!(err.to_string().contains("Negative vp_desc_start"));
    }

    #[test]
    fn row_bytes_per_format() {
        assert_eq!(PixelFormat::Yuv411.row_bytes(720), 1080);
        assert_eq!(PixelFormat::Yuv422.row_bytes(720), 1440);
        assert_eq!(PixelFormat::Palette8.row_bytes(360), 360);
    }

    #[test]
    fn version_as_float() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1).build();
        let header = LiveViewHeader::parse(&payload).unwrap();
        assert!((header.version() - 2.1).abs() < f32::EPSILON);
    }
}
