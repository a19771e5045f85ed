//! Raw frame to display buffer conversion.

use crate::device::BytePacking;
use crate::errors::CameraError;
use crate::fourcc::FourCc;
use crate::platform::RawFrame;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rgb,
    Gray,
}

impl FromStr for ColorMode {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(ColorMode::Rgb),
            "gray" | "grey" => Ok(ColorMode::Gray),
            other => Err(CameraError::InvalidArgument(format!(
                "unknown color mode: {other} (expected rgb or gray)"
            ))),
        }
    }
}

/// A frame ready for rendering or saving.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Rgb8 {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    Gray8 {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    Gray16 {
        width: u32,
        height: u32,
        data: Vec<u16>,
    },
}

impl PixelBuffer {
    pub fn width(&self) -> u32 {
        match self {
            PixelBuffer::Rgb8 { width, .. }
            | PixelBuffer::Gray8 { width, .. }
            | PixelBuffer::Gray16 { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelBuffer::Rgb8 { height, .. }
            | PixelBuffer::Gray8 { height, .. }
            | PixelBuffer::Gray16 { height, .. } => *height,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            PixelBuffer::Rgb8 { .. } => 3,
            PixelBuffer::Gray8 { .. } | PixelBuffer::Gray16 { .. } => 1,
        }
    }

    /// Interleaved RGB8, expanding gray and narrowing 13-bit samples.
    pub fn to_rgb8(&self) -> Vec<u8> {
        match self {
            PixelBuffer::Rgb8 { data, .. } => data.clone(),
            PixelBuffer::Gray8 { data, .. } => data.iter().flat_map(|&v| [v, v, v]).collect(),
            PixelBuffer::Gray16 { data, .. } => data
                .iter()
                .map(|&v| (v.min(0x1FFF) >> 5) as u8)
                .flat_map(|v| [v, v, v])
                .collect(),
        }
    }
}

/// Apply the colour policy for a device family.
pub fn to_display(frame: &RawFrame, packing: BytePacking, mode: ColorMode) -> Result<PixelBuffer, CameraError> {
    match packing {
        BytePacking::Packed13Bit => {
            expect_len(frame, 2)?;
            let pixels = frame.width as usize * frame.height as usize;
            Ok(PixelBuffer::Gray16 {
                width: frame.width,
                height: frame.height,
                data: unpack_13bit(&frame.data[..pixels * 2]),
            })
        }
        BytePacking::ForceRgb => decode(frame, ColorMode::Rgb),
        BytePacking::Native => decode(frame, mode),
    }
}

/// Two bytes per pixel, high byte first: widen both to 16 bits, shift the
/// high byte left by 8, OR in the low byte, then shift right by 3 to bring
/// the 13-bit sample into display range.
pub fn unpack_13bit(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|px| {
            let high = px[0] as u16;
            let low = px[1] as u16;
            ((high << 8) | low) >> 3
        })
        .collect()
}

fn expect_len(frame: &RawFrame, bytes_per_pixel: usize) -> Result<(), CameraError> {
    let expected = frame.width as usize * frame.height as usize * bytes_per_pixel;
    if frame.data.len() < expected {
        return Err(CameraError::InvalidArgument(format!(
            "{} frame {}x{} needs {} bytes, got {}",
            frame.fourcc,
            frame.width,
            frame.height,
            expected,
            frame.data.len()
        )));
    }
    Ok(())
}

fn decode(frame: &RawFrame, mode: ColorMode) -> Result<PixelBuffer, CameraError> {
    let (width, height) = (frame.width, frame.height);
    let pixels = width as usize * height as usize;

    let rgb = match frame.fourcc {
        FourCc::YUYV => {
            expect_len(frame, 2)?;
            if mode == ColorMode::Gray {
                let data = frame.data[..pixels * 2].iter().step_by(2).copied().collect();
                return Ok(PixelBuffer::Gray8 { width, height, data });
            }
            yuyv_to_rgb(&frame.data[..pixels * 2])
        }
        FourCc::MJPG => {
            let image = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)?;
            if mode == ColorMode::Gray {
                return Ok(PixelBuffer::Gray8 {
                    width: image.width(),
                    height: image.height(),
                    data: image.to_luma8().into_raw(),
                });
            }
            return Ok(PixelBuffer::Rgb8 {
                width: image.width(),
                height: image.height(),
                data: image.to_rgb8().into_raw(),
            });
        }
        FourCc::RGB3 => {
            expect_len(frame, 3)?;
            frame.data[..pixels * 3].to_vec()
        }
        FourCc::BGR3 => {
            expect_len(frame, 3)?;
            frame.data[..pixels * 3]
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect()
        }
        FourCc::GREY => {
            expect_len(frame, 1)?;
            let gray = PixelBuffer::Gray8 {
                width,
                height,
                data: frame.data[..pixels].to_vec(),
            };
            if mode == ColorMode::Gray {
                return Ok(gray);
            }
            gray.to_rgb8()
        }
        other => {
            return Err(CameraError::Unsupported(format!(
                "pixel format {other} cannot be displayed"
            )))
        }
    };

    match mode {
        ColorMode::Rgb => Ok(PixelBuffer::Rgb8 { width, height, data: rgb }),
        ColorMode::Gray => Ok(PixelBuffer::Gray8 {
            width,
            height,
            data: rgb_to_gray(&rgb),
        }),
    }
}

/// BT.601 luma.
fn rgb_to_gray(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| ((77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8) as u8)
        .collect()
}

/// YUYV 4:2:2 to interleaved RGB, BT.601 studio range.
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for chunk in yuyv.chunks_exact(4) {
        let u = chunk[1] as i32 - 128;
        let v = chunk[3] as i32 - 128;
        for y in [chunk[0], chunk[2]] {
            let c = (y as i32 - 16) * 298;
            let r = (c + 409 * v + 128) >> 8;
            let g = (c - 100 * u - 208 * v + 128) >> 8;
            let b = (c + 516 * u + 128) >> 8;
            rgb.extend_from_slice(&[r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8]);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fourcc: FourCc, width: u32, height: u32, data: Vec<u8>) -> RawFrame {
        RawFrame {
            fourcc,
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_unpack_13bit_pattern() {
        let data = [0xFF, 0xF8, 0x00, 0x08, 0x12, 0x34, 0x80, 0x00];
        assert_eq!(
            unpack_13bit(&data),
            vec![0x1FFF, 0x0001, 0x0246, 0x1000]
        );
    }

    #[test]
    fn test_packed_frame_to_gray16() {
        let frame = raw(FourCc::YUYV, 2, 1, vec![0x01, 0x00, 0x00, 0x10]);
        let out = to_display(&frame, BytePacking::Packed13Bit, ColorMode::Rgb).unwrap();
        assert_eq!(
            out,
            PixelBuffer::Gray16 {
                width: 2,
                height: 1,
                data: vec![0x0020, 0x0002]
            }
        );
    }

    #[test]
    fn test_packed_frame_ignores_trailing_padding() {
        let frame = raw(FourCc::YUYV, 1, 1, vec![0x01, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]);
        let out = to_display(&frame, BytePacking::Packed13Bit, ColorMode::Gray).unwrap();
        assert_eq!(
            out,
            PixelBuffer::Gray16 {
                width: 1,
                height: 1,
                data: vec![0x0020]
            }
        );
    }

    #[test]
    fn test_bgr_reordered() {
        let frame = raw(FourCc::BGR3, 1, 1, vec![1, 2, 3]);
        let out = to_display(&frame, BytePacking::Native, ColorMode::Rgb).unwrap();
        assert_eq!(out.to_rgb8(), vec![3, 2, 1]);
    }

    #[test]
    fn test_yuyv_gray_takes_luma() {
        let frame = raw(FourCc::YUYV, 2, 1, vec![50, 128, 200, 128]);
        let out = to_display(&frame, BytePacking::Native, ColorMode::Gray).unwrap();
        assert_eq!(
            out,
            PixelBuffer::Gray8 {
                width: 2,
                height: 1,
                data: vec![50, 200]
            }
        );
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        let frame = raw(FourCc::YUYV, 2, 1, vec![235, 128, 16, 128]);
        let out = to_display(&frame, BytePacking::ForceRgb, ColorMode::Gray).unwrap();
        assert_eq!(out.to_rgb8(), vec![255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_short_frame_rejected() {
        let frame = raw(FourCc::RGB3, 4, 4, vec![0; 10]);
        let err = to_display(&frame, BytePacking::Native, ColorMode::Rgb).unwrap_err();
        assert!(matches!(err, CameraError::InvalidArgument(_)));
    }
}
