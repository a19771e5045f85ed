//! Synthetic raw frames
//!
//! Gradients that change with the frame number, so consecutive frames are
//! distinguishable after conversion.

use crate::formats::FormatEntry;
use crate::fourcc::FourCc;
use crate::platform::RawFrame;

/// RGB3 gradient varying by position and frame
pub fn synthetic_rgb_frame(frame_number: u64, width: u32, height: u32) -> RawFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    RawFrame {
        fourcc: FourCc::RGB3,
        width,
        height,
        data,
    }
}

/// YUYV frame with a horizontal luma ramp and neutral chroma
pub fn synthetic_yuyv_frame(frame_number: u64, width: u32, height: u32) -> RawFrame {
    let base = (frame_number % 256) as u8;
    let mut data = Vec::with_capacity((width * height * 2) as usize);
    for _ in 0..height {
        for x in 0..width {
            data.push(base.wrapping_add((x % 256) as u8));
            data.push(128);
        }
    }

    RawFrame {
        fourcc: FourCc::YUYV,
        width,
        height,
        data,
    }
}

/// A frame in whatever layout `format` names. Unknown codes get YUYV-sized
/// bytes tagged with the requested code.
pub fn synthetic_frame(frame_number: u64, format: &FormatEntry) -> RawFrame {
    match format.fourcc {
        FourCc::RGB3 | FourCc::BGR3 => RawFrame {
            fourcc: format.fourcc,
            ..synthetic_rgb_frame(frame_number, format.width, format.height)
        },
        FourCc::GREY => RawFrame {
            fourcc: FourCc::GREY,
            width: format.width,
            height: format.height,
            data: vec![(frame_number % 256) as u8; (format.width * format.height) as usize],
        },
        other => RawFrame {
            fourcc: other,
            ..synthetic_yuyv_frame(frame_number, format.width, format.height)
        },
    }
}
