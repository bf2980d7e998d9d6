//! YUV to RGB conversion
//!
//! Integer conversion in 12-bit fixed point (BT.601 coefficients):
//!
//! ```text
//! R = Y + 1.402 V          -> (Y << 12) + 5743 V            + 2048 >> 12
//! G = Y - 0.344 U - 0.714 V -> (Y << 12) - 1411 U - 2925 V + 2048 >> 12
//! B = Y + 1.772 U          -> (Y << 12) + 7258 U            + 2048 >> 12
//! ```
//!
//! Each channel is clipped to `[0, 255]` independently.

use super::format::{FramebufferDescriptor, PixelFormat};
use crate::{PtpError, Result};

/// Saturate a channel value to `[0, 255]`.
#[inline]
pub fn clip(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Unclipped RGB channels for one pixel.
#[inline]
pub fn yuv_to_rgb_unclipped(y: u8, u: i32, v: i32) -> [i32; 3] {
    let y = (y as i32) << 12;
    [
        (y + v * 5743 + 2048) >> 12,
        (y - u * 1411 - v * 2925 + 2048) >> 12,
        (y + u * 7258 + 2048) >> 12,
    ]
}

/// Convert one pixel to clipped RGB.
#[inline]
pub fn yuv_to_rgb(y: u8, u: i32, v: i32) -> [u8; 3] {
    let [r, g, b] = yuv_to_rgb_unclipped(y, u, v);
    [clip(r), clip(g), clip(b)]
}

/// Convert the visible area of a YUV framebuffer to packed RGB.
///
/// `skip` drops the first buffer row before conversion, for firmwares that
/// prepend an extra row to the viewport.
pub fn convert(payload: &[u8], desc: &FramebufferDescriptor, skip: bool) -> Result<Vec<u8>> {
    if !desc.pixel_format.is_yuv() {
        return Err(PtpError::framing(
            "Live view conversion",
            format!("Unsupported pixel format {:?} for RGB output", desc.pixel_format),
        ));
    }
    let (pixels_per_group, group_bytes) = match desc.pixel_format {
        PixelFormat::Yuv411 => (4, 6),
        _ => (2, 4),
    };

    let width = desc.visible_width;
    let height = desc.visible_height;
    let stride = desc.row_bytes();
    let first_row = usize::from(skip);
    let region = desc.rows_range(first_row, height, payload.len())?;
    let data = &payload[region];

    let mut out = Vec::with_capacity(width * height * 3);
    for row in data.chunks_exact(stride.max(1)).take(height) {
        let mut remaining = width;
        for group in row.chunks_exact(group_bytes) {
            if remaining == 0 {
                break;
            }
            let emitted = remaining.min(pixels_per_group);
            match desc.pixel_format {
                PixelFormat::Yuv411 => {
                    let (u, v) = (group[0] as i8 as i32, group[2] as i8 as i32);
                    for &y in [group[1], group[3], group[4], group[5]].iter().take(emitted) {
                        out.extend_from_slice(&yuv_to_rgb(y, u, v));
                    }
                }
                _ => {
                    let (u, v) = (group[0] as i32 - 128, group[2] as i32 - 128);
                    for &y in [group[1], group[3]].iter().take(emitted) {
                        out.extend_from_slice(&yuv_to_rgb(y, u, v));
                    }
                }
            }
            remaining -= emitted;
        }
        // Odd widths can leave a partial group at the end of the row
        if remaining > 0 {
            return Err(PtpError::framing(
                "Live view conversion",
                format!("Row of {} bytes too short for {} pixels", stride, width),
            ));
        }
    }

    debug_assert_eq!(out.len(), width * height * 3);
    Ok(out)
}
