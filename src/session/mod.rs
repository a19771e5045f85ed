//! Live capture session
//!
//! [`CaptureSession`] owns one open stream and serializes every operation on
//! it through `&mut self`: format changes, frame reads and recording
//! start/stop cannot overlap. The format is never cached; after every write
//! the applied tuple is re-read from the driver.
//!
//! ```text
//! Closed --open--> Open --reconfigure--> Reconfiguring --> Open
//!                   |                                       |
//!                   +------- close / fatal read ------------+--> Closed
//! ```
//! Recording is a flag on `Open`, not a state of its own.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::controls::ParameterRegistry;
use crate::convert::{to_display, ColorMode, PixelBuffer};
use crate::device::{Capabilities, CameraKind};
use crate::errors::CameraError;
use crate::formats::FormatEntry;
use crate::platform::{ControlBackend, StreamBackend};
use crate::poll::DEFAULT_FPS;
use crate::recording::{
    default_factory, RecordingMode, RecordingSpec, RecordingStats, SinkFactory, VideoCodec,
    VideoSink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Closed,
    Open,
    Reconfiguring,
}

/// How a session interprets its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub kind: CameraKind,
    pub color: ColorMode,
    pub recording_mode: RecordingMode,
}

/// What one `read_frame` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A frame for the renderer (also written to the recording, if any).
    Preview(PixelBuffer),
    /// The frame went to the recording only.
    Recorded,
}

impl FrameOutcome {
    pub fn into_preview(self) -> Option<PixelBuffer> {
        match self {
            FrameOutcome::Preview(buffer) => Some(buffer),
            FrameOutcome::Recorded => None,
        }
    }
}

struct ActiveRecording {
    sink: Box<dyn VideoSink>,
    spec: RecordingSpec,
}

pub struct CaptureSession<S: StreamBackend> {
    stream: S,
    device_index: u32,
    state: SessionState,
    options: SessionOptions,
    read_enabled: bool,
    recording: Option<ActiveRecording>,
    sinks: Box<dyn SinkFactory>,
}

#[cfg(target_os = "linux")]
impl CaptureSession<crate::platform::V4lStream> {
    /// Open `/dev/video{index}`.
    pub fn open(index: u32, options: SessionOptions) -> Result<Self, CameraError> {
        let stream = crate::platform::V4lStream::open(index)?;
        Self::with_backend(stream, index, options)
    }
}

impl<S: StreamBackend> CaptureSession<S> {
    /// Wrap an already opened stream. Device families with a pinned pixel
    /// format have it applied here.
    pub fn with_backend(stream: S, device_index: u32, options: SessionOptions) -> Result<Self, CameraError> {
        let mut session = Self {
            stream,
            device_index,
            state: SessionState::Open,
            options,
            read_enabled: true,
            recording: None,
            sinks: default_factory(),
        };

        if let Some(pinned) = options.kind.pinned_format() {
            let current = session.stream.format().map_err(|e| unavailable(device_index, e))?;
            if current.fourcc != pinned {
                let applied = session.reconfigure(&FormatEntry { fourcc: pinned, ..current })?;
                if applied.fourcc != pinned {
                    log::warn!(
                        "{} camera on device {} refused {}, running with {}",
                        options.kind,
                        device_index,
                        pinned,
                        applied.fourcc
                    );
                }
            }
        }

        let format = session.stream.format().map_err(|e| unavailable(device_index, e))?;
        log::info!(
            "Opened {} camera on device {} at {}",
            options.kind,
            device_index,
            format
        );
        Ok(session)
    }

    /// Replace the writer factory used by [`start_recording`](Self::start_recording).
    pub fn with_sink_factory(mut self, factory: Box<dyn SinkFactory>) -> Self {
        self.sinks = factory;
        self
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn kind(&self) -> CameraKind {
        self.options.kind
    }

    pub fn color_mode(&self) -> ColorMode {
        self.options.color
    }

    pub fn set_color_mode(&mut self, color: ColorMode) {
        self.options.color = color;
    }

    pub fn recording_mode(&self) -> RecordingMode {
        self.options.recording_mode
    }

    pub fn set_recording_mode(&mut self, mode: RecordingMode) {
        self.options.recording_mode = mode;
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_format_probe: self.options.kind.supports_format_probe(),
            supports_recording: self.sinks.available(),
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(CameraError::InvalidState("session is closed".to_string())),
            SessionState::Reconfiguring => Err(CameraError::InvalidState(
                "session is being reconfigured".to_string(),
            )),
        }
    }

    /// The format the driver reports right now.
    pub fn current_format(&self) -> Result<FormatEntry, CameraError> {
        self.ensure_open()?;
        self.stream.format()
    }

    /// Push a new format and return what the driver actually applied, which
    /// may differ from `requested`.
    pub fn reconfigure(&mut self, requested: &FormatEntry) -> Result<FormatEntry, CameraError> {
        self.ensure_open()?;
        if self.recording.is_some() {
            return Err(CameraError::InvalidState(
                "cannot change format while recording".to_string(),
            ));
        }

        self.state = SessionState::Reconfiguring;
        let result = self
            .stream
            .set_format(requested)
            .and_then(|()| self.stream.format());
        self.state = SessionState::Open;

        let applied = result?;
        if applied.matches(requested) {
            log::info!("Device {} reconfigured to {}", self.device_index, applied);
        } else {
            log::info!(
                "Device {} asked for {}, driver applied {}",
                self.device_index,
                requested,
                applied
            );
        }
        Ok(applied)
    }

    /// Write one control through the registry. Refused once the session has
    /// closed.
    pub fn set_control<B: ControlBackend + ?Sized>(
        &mut self,
        registry: &mut ParameterRegistry,
        backend: &B,
        name: &str,
        value: i64,
    ) -> Result<i64, CameraError> {
        self.ensure_open()?;
        registry.set_value(backend, name, value)
    }

    /// Block for one frame. A failed device read closes the session; a
    /// failed recording write stops the recording but keeps the preview.
    pub fn read_frame(&mut self) -> Result<FrameOutcome, CameraError> {
        self.ensure_open()?;

        let raw = match self.stream.read() {
            Ok(raw) => raw,
            Err(e) => {
                let err = match e {
                    CameraError::FrameRead(msg) => CameraError::FrameRead(msg),
                    other => CameraError::FrameRead(other.to_string()),
                };
                log::error!("Device {}: {}; closing session", self.device_index, err);
                self.close();
                return Err(err);
            }
        };

        let buffer = to_display(&raw, self.options.kind.packing(), self.options.color)?;

        let Some(recording) = self.recording.as_mut() else {
            return Ok(FrameOutcome::Preview(buffer));
        };

        if let Err(e) = recording.sink.write(&buffer) {
            log::warn!(
                "Recording to {} failed, stopping: {}",
                recording.spec.path.display(),
                e
            );
            if let Err(finish_err) = self.stop_recording() {
                log::warn!("Failed to finalize recording: {}", finish_err);
            }
            return Err(e);
        }

        match self.options.recording_mode {
            RecordingMode::RecordOnly => Ok(FrameOutcome::Recorded),
            RecordingMode::RecordAndPreview => Ok(FrameOutcome::Preview(buffer)),
        }
    }

    /// Stop the poller from calling [`read_frame`](Self::read_frame). The
    /// session does not enforce this itself.
    pub fn pause(&mut self) {
        self.read_enabled = false;
    }

    pub fn resume(&mut self) {
        self.read_enabled = true;
    }

    pub fn is_read_enabled(&self) -> bool {
        self.read_enabled
    }

    /// Pause polling until the guard drops, e.g. around a blocking dialog.
    /// Reading is re-enabled on every exit path, unless it was already
    /// paused when the guard was taken.
    pub fn suspend(&mut self) -> SuspendGuard<'_, S> {
        let was_enabled = self.read_enabled;
        self.pause();
        SuspendGuard {
            session: self,
            was_enabled,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// The parameters of the running recording.
    pub fn recording(&self) -> Option<&RecordingSpec> {
        self.recording.as_ref().map(|r| &r.spec)
    }

    /// Start writing frames to `path` with the current geometry. `fps`
    /// defaults to the device's reported rate.
    pub fn start_recording(
        &mut self,
        path: impl AsRef<Path>,
        codec: VideoCodec,
        fps: Option<f64>,
    ) -> Result<RecordingSpec, CameraError> {
        self.ensure_open()?;
        if let Some(active) = &self.recording {
            return Err(CameraError::InvalidState(format!(
                "already recording to {}",
                active.spec.path.display()
            )));
        }

        let format = self.current_format()?;
        let fps = match fps {
            Some(f) if f > 0.0 => f,
            Some(f) => {
                return Err(CameraError::InvalidArgument(format!(
                    "recording fps must be positive, got {f}"
                )))
            }
            None if format.fps > 0.0 => format.fps,
            None => DEFAULT_FPS,
        };

        let spec = RecordingSpec {
            path: PathBuf::from(path.as_ref()),
            codec,
            width: format.width,
            height: format.height,
            fps,
        };
        let sink = self.sinks.create(&spec)?;

        log::info!(
            "Recording {}x{} @ {:.1} fps to {}",
            spec.width,
            spec.height,
            spec.fps,
            spec.path.display()
        );
        self.recording = Some(ActiveRecording {
            sink,
            spec: spec.clone(),
        });
        Ok(spec)
    }

    /// Flush and close the writer. Does nothing when not recording.
    pub fn stop_recording(&mut self) -> Result<Option<RecordingStats>, CameraError> {
        let Some(active) = self.recording.take() else {
            return Ok(None);
        };
        let stats = active.sink.finish()?;
        log::info!(
            "Recording stopped: {} frames, {} bytes written to {}",
            stats.video_frames,
            stats.bytes_written,
            stats.output_path.display()
        );
        Ok(Some(stats))
    }

    /// Stop any recording and release the stream. Safe to call twice.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.stop_recording() {
            log::warn!("Failed to finalize recording on close: {}", e);
        }
        self.stream.close();
        self.state = SessionState::Closed;
        log::info!("Closed device {}", self.device_index);
    }
}

impl<S: StreamBackend> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn unavailable(device: u32, e: CameraError) -> CameraError {
    match e {
        CameraError::DeviceUnavailable { .. } => e,
        other => CameraError::DeviceUnavailable {
            device,
            reason: other.to_string(),
        },
    }
}

/// Keeps a session paused while held.
pub struct SuspendGuard<'a, S: StreamBackend> {
    session: &'a mut CaptureSession<S>,
    was_enabled: bool,
}

impl<S: StreamBackend> Deref for SuspendGuard<'_, S> {
    type Target = CaptureSession<S>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<S: StreamBackend> DerefMut for SuspendGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<S: StreamBackend> Drop for SuspendGuard<'_, S> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.session.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::FourCc;
    use crate::testing::ScriptedStream;

    fn session(kind: CameraKind) -> CaptureSession<ScriptedStream> {
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::MJPG, 640, 480, 30.0));
        CaptureSession::with_backend(
            stream,
            0,
            SessionOptions {
                kind,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_raspi_pins_yuyv() {
        let session = session(CameraKind::RaspiCam);
        assert_eq!(session.current_format().unwrap().fourcc, FourCc::YUYV);
        assert_eq!(session.stream().log().matching("set_format").len(), 1);
    }

    #[test]
    fn test_usb_cam_keeps_device_format() {
        let session = session(CameraKind::UsbCam);
        assert_eq!(session.current_format().unwrap().fourcc, FourCc::MJPG);
        assert!(session.stream().log().matching("set_format").is_empty());
    }

    #[test]
    fn test_suspend_guard_resumes() {
        let mut session = session(CameraKind::UsbCam);
        {
            let guard = session.suspend();
            assert!(!guard.is_read_enabled());
        }
        assert!(session.is_read_enabled());
    }

    #[test]
    fn test_suspend_guard_keeps_explicit_pause() {
        let mut session = session(CameraKind::UsbCam);
        session.pause();
        drop(session.suspend());
        assert!(!session.is_read_enabled());
    }

    #[test]
    fn test_suspend_guard_resumes_on_error_path() {
        fn dialog(session: &mut CaptureSession<ScriptedStream>) -> Result<(), CameraError> {
            let _guard = session.suspend();
            Err(CameraError::InvalidArgument("cancelled".into()))
        }
        let mut session = session(CameraKind::UsbCam);
        assert!(dialog(&mut session).is_err());
        assert!(session.is_read_enabled());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = session(CameraKind::UsbCam);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.stream().log().matching("close").len(), 1);
        assert!(matches!(
            session.current_format(),
            Err(CameraError::InvalidState(_))
        ));
    }

    #[test]
    fn test_capabilities_follow_kind() {
        let caps = session(CameraKind::RaspiCam).capabilities();
        assert!(!caps.supports_format_probe);
        assert!(session(CameraKind::UvCam).capabilities().supports_format_probe);
    }
}
