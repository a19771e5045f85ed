//! Still image saving
//!
//! Every saved image gets a sibling `.csv` file with one `name,value` line
//! per active control, so the settings a frame was taken with travel with it.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageEncoder, ImageFormat, Luma, RgbImage};
use serde::Serialize;

use crate::controls::ParameterRegistry;
use crate::convert::PixelBuffer;
use crate::errors::CameraError;
use crate::naming::ImageExtension;

/// Paths written by [`save_with_params`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedSnapshot {
    pub image: PathBuf,
    pub params: PathBuf,
}

/// Encode `buffer` by the extension of `path`.
pub fn save_frame(buffer: &PixelBuffer, path: &Path) -> Result<(), CameraError> {
    let extension = ImageExtension::of_path(path).ok_or_else(|| {
        CameraError::InvalidArgument(format!(
            "cannot tell image format from {}",
            path.display()
        ))
    })?;

    match extension {
        ImageExtension::Png => to_image(buffer)?.save_with_format(path, ImageFormat::Png)?,
        ImageExtension::Tiff => to_image(buffer)?.save_with_format(path, ImageFormat::Tiff)?,
        ImageExtension::Jpg => to_image_8bit(buffer)?.save_with_format(path, ImageFormat::Jpeg)?,
        ImageExtension::Pgm => {
            let gray = to_image_8bit(buffer)?.to_luma8();
            let writer = BufWriter::new(fs::File::create(path)?);
            PnmEncoder::new(writer)
                .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
                .write_image(
                    gray.as_raw(),
                    gray.width(),
                    gray.height(),
                    image::ExtendedColorType::L8,
                )?;
        }
    }
    Ok(())
}

/// `shot.png` -> `shot.csv`
pub fn param_file_path(image: &Path) -> PathBuf {
    image.with_extension("csv")
}

/// One `name,value` line per active control, in activation order. Unknown
/// values leave the field empty.
pub fn write_param_file(path: &Path, registry: &ParameterRegistry) -> Result<(), CameraError> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for control in registry.snapshot() {
        match control.current {
            Some(value) => writeln!(out, "{},{}", control.name, value)?,
            None => writeln!(out, "{},", control.name)?,
        }
    }
    out.flush()?;
    Ok(())
}

/// Save the image and its parameter file, creating the directory first.
pub fn save_with_params(
    buffer: &PixelBuffer,
    path: &Path,
    registry: &ParameterRegistry,
) -> Result<SavedSnapshot, CameraError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    save_frame(buffer, path)?;
    let params = param_file_path(path);
    write_param_file(&params, registry)?;

    log::info!("Saved image {}", path.display());
    log::info!("Saved parameter file {}", params.display());
    Ok(SavedSnapshot {
        image: path.to_path_buf(),
        params,
    })
}

fn size_mismatch(buffer: &PixelBuffer) -> CameraError {
    CameraError::InvalidArgument(format!(
        "pixel data does not fill {}x{}x{}",
        buffer.width(),
        buffer.height(),
        buffer.channels()
    ))
}

fn to_image(buffer: &PixelBuffer) -> Result<DynamicImage, CameraError> {
    let (width, height) = (buffer.width(), buffer.height());
    let image = match buffer {
        PixelBuffer::Rgb8 { data, .. } => {
            RgbImage::from_raw(width, height, data.clone()).map(DynamicImage::ImageRgb8)
        }
        PixelBuffer::Gray8 { data, .. } => {
            GrayImage::from_raw(width, height, data.clone()).map(DynamicImage::ImageLuma8)
        }
        PixelBuffer::Gray16 { data, .. } => {
            ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, data.clone())
                .map(DynamicImage::ImageLuma16)
        }
    };
    image.ok_or_else(|| size_mismatch(buffer))
}

/// 13-bit samples are narrowed the same way the preview narrows them.
fn to_image_8bit(buffer: &PixelBuffer) -> Result<DynamicImage, CameraError> {
    match buffer {
        PixelBuffer::Gray16 { width, height, data } => {
            let narrowed = data.iter().map(|&v| (v.min(0x1FFF) >> 5) as u8).collect();
            GrayImage::from_raw(*width, *height, narrowed)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| size_mismatch(buffer))
        }
        other => to_image(other),
    }
}
