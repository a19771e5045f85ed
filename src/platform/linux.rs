use super::{RawFrame, StreamBackend};
use crate::errors::CameraError;
use crate::formats::FormatEntry;
use crate::fourcc::FourCc;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format};

/// Buffers queued with the driver. Kept small so frames stay fresh.
const BUFFER_COUNT: u32 = 2;

/// Linux V4L2 stream collaborator.
pub struct V4lStream {
    index: u32,
    device: Device,
    stream: Option<MmapStream<'static>>,
    streaming_format: Option<FormatEntry>,
}

impl std::fmt::Debug for V4lStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4lStream")
            .field("index", &self.index)
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}

impl V4lStream {
    /// Open `/dev/video<index>`.
    pub fn open(index: u32) -> Result<Self, CameraError> {
        let device = Device::new(index as usize).map_err(|e| CameraError::DeviceUnavailable {
            device: index,
            reason: format!("{e}. Check that /dev/video{index} exists, then reconnect the camera"),
        })?;
        log::info!("Opened /dev/video{}", index);
        Ok(Self {
            index,
            device,
            stream: None,
            streaming_format: None,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        let format = self.format()?;
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| CameraError::FrameRead(format!("Failed to start stream: {e}")))?;
        self.stream = Some(stream);
        self.streaming_format = Some(format);
        Ok(())
    }
}

impl StreamBackend for V4lStream {
    fn format(&self) -> Result<FormatEntry, CameraError> {
        let format = Capture::format(&self.device)
            .map_err(|e| CameraError::InvalidState(format!("Failed to query format: {e}")))?;
        let params = Capture::params(&self.device)
            .map_err(|e| CameraError::InvalidState(format!("Failed to query frame rate: {e}")))?;

        let interval = params.interval;
        let fps = if interval.numerator == 0 {
            0.0
        } else {
            interval.denominator as f64 / interval.numerator as f64
        };

        Ok(FormatEntry::new(
            FourCc::new(&format.fourcc.repr),
            format.width,
            format.height,
            fps,
        ))
    }

    fn set_format(&mut self, requested: &FormatEntry) -> Result<(), CameraError> {
        // Buffers must be released before the driver accepts a new format.
        self.close();

        let format = Format::new(
            requested.width,
            requested.height,
            v4l::FourCC::new(&requested.fourcc.bytes()),
        );
        Capture::set_format(&self.device, &format)
            .map_err(|e| CameraError::InvalidArgument(format!("Failed to set format {requested}: {e}")))?;

        let params = Parameters::with_fps(requested.fps.round().max(1.0) as u32);
        Capture::set_params(&self.device, &params)
            .map_err(|e| CameraError::InvalidArgument(format!("Failed to set frame rate {}: {e}", requested.fps)))?;
        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        if self.stream.is_none() {
            self.start_stream()?;
        }
        let (Some(stream), Some(format)) = (self.stream.as_mut(), self.streaming_format) else {
            return Err(CameraError::InvalidState("stream not started".to_string()));
        };

        let (buffer, meta) = CaptureStream::next(stream)
            .map_err(|e| CameraError::FrameRead(format!("Cannot read the next frame: {e}")))?;

        let used = meta.bytesused as usize;
        let data = if used == 0 || used > buffer.len() {
            buffer.to_vec()
        } else {
            buffer[..used].to_vec()
        };

        Ok(RawFrame {
            fourcc: format.fourcc,
            width: format.width,
            height: format.height,
            data,
        })
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Released stream buffers of /dev/video{}", self.index);
        }
        self.streaming_format = None;
    }
}

impl Drop for V4lStream {
    fn drop(&mut self) {
        self.close();
    }
}
