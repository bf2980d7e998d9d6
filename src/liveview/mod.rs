//! Live view frame decoding.
//!
//! CHDK streams the camera's viewport (and optionally the UI bitmap overlay
//! and its palette) in one payload. [`LiveViewFrame::decode`] parses the
//! header and descriptors and converts the viewport to RGB.
//!
//! ```rust
//! # fn demo(payload: &[u8]) -> chdk_ptp::Result<()> {
//! use chdk_ptp::LiveViewFrame;
//!
//! let frame = LiveViewFrame::decode(payload, false)?;
//! println!("{}x{} live view v{}", frame.width, frame.height, frame.version());
//! assert_eq!(frame.pixels.len(), frame.width * frame.height * 3);
//! # Ok(())
//! # }
//! ```

pub mod format;
pub mod yuv;

pub use format::{FramebufferDescriptor, LiveViewHeader, PixelFormat};

use crate::{PtpError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which sub-buffers to request from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveViewFlags {
    pub viewport: bool,
    pub bitmap: bool,
    pub palette: bool,
}

impl LiveViewFlags {
    pub const VIEWPORT: u32 = 0x01;
    pub const BITMAP: u32 = 0x04;
    pub const PALETTE: u32 = 0x08;

    /// Viewport only.
    pub fn viewport() -> Self {
        Self { viewport: true, bitmap: false, palette: false }
    }

    /// Wire representation for the display data request.
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.viewport {
            bits |= Self::VIEWPORT;
        }
        if self.bitmap {
            bits |= Self::BITMAP;
        }
        if self.palette {
            bits |= Self::PALETTE;
        }
        bits
    }
}

impl Default for LiveViewFlags {
    fn default() -> Self {
        Self::viewport()
    }
}

/// One decoded live view snapshot.
///
/// Everything is copied out of the payload; the frame does not borrow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveViewFrame {
    pub header: LiveViewHeader,
    pub viewport: Option<FramebufferDescriptor>,
    pub bitmap: Option<FramebufferDescriptor>,
    /// Raw palette entries when present
    pub palette: Option<Vec<u8>>,
    /// Raw bitmap overlay rows (palette indices) when present
    pub bitmap_data: Option<Vec<u8>>,
    /// RGB width in pixels, 0 without a viewport
    pub width: usize,
    /// RGB height in pixels, 0 without a viewport
    pub height: usize,
    /// Viewport as RGB, 3 bytes per pixel, row-major, top row first
    pub pixels: Vec<u8>,
}

impl LiveViewFrame {
    /// Decode a live view payload.
    ///
    /// `skip` must match the camera model: some firmwares put an extra row in
    /// front of the viewport that has to be dropped. It is not auto-detected.
    pub fn decode(payload: &[u8], skip: bool) -> Result<Self> {
        let header = LiveViewHeader::parse(payload)?;

        let viewport = match header.vp_desc_start {
            0 => None,
            offset => Some(FramebufferDescriptor::parse(payload, offset)?),
        };
        let bitmap = match header.bm_desc_start {
            0 => None,
            offset => Some(FramebufferDescriptor::parse(payload, offset)?),
        };

        let palette = match (header.palette_data_start, header.palette_type) {
            (0, _) | (_, 0) => None,
            (start, _) => {
                let size = header.palette_size()?;
                Some(copy_range(payload, start, size, "Live view palette")?)
            }
        };

        let bitmap_data = match &bitmap {
            Some(desc) => {
                let range = desc.rows_range(0, desc.visible_height, payload.len())?;
                Some(payload[range].to_vec())
            }
            None => None,
        };

        let (width, height, pixels) = match &viewport {
            Some(desc) => {
                (desc.visible_width, desc.visible_height, yuv::convert(payload, desc, skip)?)
            }
            None => (0, 0, Vec::new()),
        };

        debug!(
            width,
            height,
            bitmap = bitmap.is_some(),
            palette = palette.is_some(),
            skip,
            "Decoded live view frame"
        );

        Ok(Self { header, viewport, bitmap, palette, bitmap_data, width, height, pixels })
    }

    /// Live view protocol version, e.g. `2.1`.
    pub fn version(&self) -> f32 {
        self.header.version()
    }
}

fn copy_range(payload: &[u8], start: usize, len: usize, context: &str) -> Result<Vec<u8>> {
    start
        .checked_add(len)
        .and_then(|end| payload.get(start..end))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            PtpError::framing(
                context,
                format!("{} bytes at offset {} exceed payload of {}", len, start, payload.len()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::LiveViewPayload;

    #[test]
    fn decodes_yuv411_viewport() {
        // One group: U=0, Y0..Y3 = 10, 20, 30, 40, V=0 -> greys
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1)
            .pixels(vec![0, 10, 0, 20, 30, 40])
            .build();
        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!((frame.width, frame.height), (4, 1));
        assert_eq!(frame.pixels, vec![10, 10, 10, 20, 20, 20, 30, 30, 30, 40, 40, 40]);
    }

    #[test]
    fn decodes_yuv422_viewport_with_biased_chroma() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 2)
            .pixels(vec![128, 50, 128, 60, 128, 70, 128, 80])
            .build();
        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!(frame.pixels, vec![50, 50, 50, 60, 60, 60, 70, 70, 70, 80, 80, 80]);
    }

    #[test]
    fn decodes_yuv422_alt_like_yuv422() {
        // U=+40, V=-20 after bias removal
        let raw = vec![168, 100, 108, 150];
        let alt = LiveViewPayload::new(PixelFormat::Yuv422Alt, 2, 1).pixels(raw.clone()).build();
        let plain = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1).pixels(raw).build();

        let frame = LiveViewFrame::decode(&alt, false).unwrap();
        assert_eq!(frame.viewport.map(|d| d.pixel_format), Some(PixelFormat::Yuv422Alt));
        assert_eq!(frame.pixels, LiveViewFrame::decode(&plain, false).unwrap().pixels);
        assert_eq!(&frame.pixels[..3], &yuv::yuv_to_rgb(100, 40, -20));
        assert_eq!(&frame.pixels[3..], &yuv::yuv_to_rgb(150, 40, -20));
    }

    #[test]
    fn decodes_version_2_0_payload() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1)
            .minor(0)
            .pixels(vec![0, 10, 0, 20, 30, 40])
            .build();
        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert!((frame.version() - 2.0).abs() < 1e-6);
        assert_eq!(frame.header.bmo_desc_start, 0);
        assert_eq!(frame.pixels, vec![10, 10, 10, 20, 20, 20, 30, 30, 30, 40, 40, 40]);
    }

    #[test]
    fn palette_viewport_cannot_be_converted() {
        let payload = LiveViewPayload::new(PixelFormat::Palette8, 4, 1).build();
        assert!(matches!(LiveViewFrame::decode(&payload, false), Err(PtpError::Framing { .. })));
    }

    #[test]
    fn skip_drops_the_leading_row() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1)
            .pixels(vec![128, 1, 128, 2, 128, 3, 128, 4])
            .build();
        let frame = LiveViewFrame::decode(&payload, true).unwrap();
        assert_eq!(frame.pixels, vec![3, 3, 3, 4, 4, 4]);

        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!(frame.pixels, vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn skip_without_spare_row_is_framing_error() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 1)
            .pixels(vec![128, 1, 128, 2])
            .build();
        assert!(matches!(LiveViewFrame::decode(&payload, true), Err(PtpError::Framing { .. })));
    }

    #[test]
    fn honours_gaps_between_sections() {
        let tight = LiveViewPayload::new(PixelFormat::Yuv411, 4, 2).build();
        let gapped = LiveViewPayload::new(PixelFormat::Yuv411, 4, 2).gap(64).build();
        let a = LiveViewFrame::decode(&tight, false).unwrap();
        let b = LiveViewFrame::decode(&gapped, false).unwrap();
        assert_eq!(a.pixels, b.pixels);
        assert_ne!(a.header.vp_desc_start, b.header.vp_desc_start);
    }

    #[test]
    fn stride_wider_than_visible_area() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv422, 2, 2)
            .buffer_width(4)
            .pixels(vec![
                128, 1, 128, 2, 128, 99, 128, 99, //
                128, 3, 128, 4, 128, 99, 128, 99,
            ])
            .build();
        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!(frame.pixels, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn copies_palette_and_bitmap() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1)
            .palette(1, vec![7u8; 64])
            .bitmap(3, 2, vec![1, 2, 3, 4, 5, 6])
            .build();
        let frame = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!(frame.palette.as_deref(), Some(&[7u8; 64][..]));
        assert_eq!(frame.bitmap.map(|b| b.pixel_format), Some(PixelFormat::Palette8));
        assert_eq!(frame.bitmap_data, Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn truncated_pixel_data_is_framing_error() {
        let mut payload = LiveViewPayload::new(PixelFormat::Yuv411, 8, 4).build();
        payload.truncate(payload.len() - 1);
        assert!(matches!(LiveViewFrame::decode(&payload, false), Err(PtpError::Framing { .. })));
    }

    #[test]
    fn output_is_fresh_per_call() {
        let payload = LiveViewPayload::new(PixelFormat::Yuv411, 4, 1).build();
        let a = LiveViewFrame::decode(&payload, false).unwrap();
        let b = LiveViewFrame::decode(&payload, false).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.pixels.as_ptr(), b.pixels.as_ptr());
    }

    #[test]
    fn flag_bits() {
        assert_eq!(LiveViewFlags::viewport().bits(), 0x01);
        assert_eq!(LiveViewFlags { viewport: true, bitmap: true, palette: true }.bits(), 0x0D);
    }
}
