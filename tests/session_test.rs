use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use usbcam::convert::{ColorMode, PixelBuffer};
use usbcam::device::CameraKind;
use usbcam::errors::CameraError;
use usbcam::formats::FormatEntry;
use usbcam::fourcc::FourCc;
use usbcam::recording::{
    RecordingMode, RecordingSpec, RecordingStats, SinkFactory, VideoCodec, VideoSink,
};
use usbcam::session::{CaptureSession, FrameOutcome, SessionOptions, SessionState};
use usbcam::testing::{synthetic_yuyv_frame, ScriptedStream};

/// Records the geometry of every frame it is given.
#[derive(Clone, Default)]
struct MemorySinks {
    frames: Arc<Mutex<Vec<(u32, u32)>>>,
    finished: Arc<Mutex<u32>>,
    fail_writes: bool,
}

struct MemorySink {
    spec: RecordingSpec,
    sinks: MemorySinks,
}

impl VideoSink for MemorySink {
    fn write(&mut self, frame: &PixelBuffer) -> Result<(), CameraError> {
        if self.sinks.fail_writes {
            return Err(CameraError::Encoding("disk full".to_string()));
        }
        self.sinks
            .frames
            .lock()
            .unwrap()
            .push((frame.width(), frame.height()));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError> {
        *self.sinks.finished.lock().unwrap() += 1;
        Ok(RecordingStats {
            video_frames: self.sinks.frames.lock().unwrap().len() as u64,
            output_path: self.spec.path.clone(),
            ..Default::default()
        })
    }
}

impl SinkFactory for MemorySinks {
    fn create(&self, spec: &RecordingSpec) -> Result<Box<dyn VideoSink>, CameraError> {
        Ok(Box::new(MemorySink {
            spec: spec.clone(),
            sinks: self.clone(),
        }))
    }

    fn available(&self) -> bool {
        true
    }
}

fn stream() -> ScriptedStream {
    ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 640, 480, 30.0))
}

fn open(stream: ScriptedStream, options: SessionOptions) -> CaptureSession<ScriptedStream> {
    CaptureSession::with_backend(stream, 0, options).unwrap()
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_reconfigure_returns_clamped_width() {
        let mut session = open(stream().with_max_width(1280), SessionOptions::default());

        let requested = FormatEntry::new(FourCc::MJPG, 1920, 1080, 30.0);
        let applied = session.reconfigure(&requested).unwrap();

        assert_eq!(applied.width, 1280);
        assert_eq!(applied.height, 1080);
        assert_eq!(applied.fourcc, FourCc::MJPG);
        assert_eq!(session.current_format().unwrap(), applied);
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_reconfigure_requeries_device() {
        let mut session = open(stream(), SessionOptions::default());
        let log = session.stream().log();
        log.clear();

        session
            .reconfigure(&FormatEntry::new(FourCc::YUYV, 320, 240, 15.0))
            .unwrap();

        assert_eq!(log.calls(), vec!["set_format YUYV:320x240@15", "format"]);
    }

    #[test]
    fn test_read_frame_rgb_and_gray() {
        let mut session = open(stream(), SessionOptions::default());
        let frame = session.read_frame().unwrap().into_preview().unwrap();
        assert!(matches!(frame, PixelBuffer::Rgb8 { width: 640, height: 480, .. }));

        session.set_color_mode(ColorMode::Gray);
        let frame = session.read_frame().unwrap().into_preview().unwrap();
        assert!(matches!(frame, PixelBuffer::Gray8 { width: 640, height: 480, .. }));
    }

    #[test]
    fn test_uvcam_frames_unpacked() {
        let raw = usbcam::platform::RawFrame {
            fourcc: FourCc::YUYV,
            width: 2,
            height: 1,
            data: vec![0xFF, 0xF8, 0x80, 0x00],
        };
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 2, 1, 30.0)).with_frames([raw]);
        let mut session = open(
            stream,
            SessionOptions {
                kind: CameraKind::UvCam,
                ..Default::default()
            },
        );

        let frame = session.read_frame().unwrap().into_preview().unwrap();

        assert_eq!(
            frame,
            PixelBuffer::Gray16 {
                width: 2,
                height: 1,
                data: vec![0x1FFF, 0x1000],
            }
        );
    }

    #[test]
    fn test_failed_read_is_fatal() {
        let mut session = open(stream().failing_after(2), SessionOptions::default());
        session.read_frame().unwrap();
        session.read_frame().unwrap();

        let err = session.read_frame().unwrap_err();

        assert!(matches!(err, CameraError::FrameRead(_)));
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Closed);
        // No silent retry: the closed session refuses further reads.
        assert!(matches!(
            session.read_frame(),
            Err(CameraError::InvalidState(_))
        ));
        assert_eq!(session.stream().log().matching("read failed").len(), 1);
    }

    #[test]
    fn test_recording_uses_current_geometry() {
        let sinks = MemorySinks::default();
        let mut session = open(stream().with_max_width(800), SessionOptions::default())
            .with_sink_factory(Box::new(sinks.clone()));
        session
            .reconfigure(&FormatEntry::new(FourCc::YUYV, 1024, 600, 20.0))
            .unwrap();

        let spec = session
            .start_recording("clip.mp4", VideoCodec::H264, None)
            .unwrap();

        assert_eq!((spec.width, spec.height), (800, 600));
        assert_eq!(spec.fps, 20.0);
        assert_eq!(spec.path, PathBuf::from("clip.mp4"));
        assert!(session.is_recording());
    }

    #[test]
    fn test_record_only_mode_withholds_preview() {
        let sinks = MemorySinks::default();
        let mut session = open(stream(), SessionOptions::default())
            .with_sink_factory(Box::new(sinks.clone()));
        session
            .start_recording("clip.mp4", VideoCodec::H264, Some(15.0))
            .unwrap();

        for _ in 0..3 {
            assert_eq!(session.read_frame().unwrap(), FrameOutcome::Recorded);
        }
        let stats = session.stop_recording().unwrap().unwrap();

        assert_eq!(stats.video_frames, 3);
        assert_eq!(*sinks.frames.lock().unwrap(), vec![(640, 480); 3]);
        assert!(!session.is_recording());
    }

    #[test]
    fn test_record_and_preview_mode() {
        let sinks = MemorySinks::default();
        let mut session = open(
            stream(),
            SessionOptions {
                recording_mode: RecordingMode::RecordAndPreview,
                ..Default::default()
            },
        )
        .with_sink_factory(Box::new(sinks.clone()));
        session
            .start_recording("clip.mp4", VideoCodec::H264, None)
            .unwrap();

        assert!(session.read_frame().unwrap().into_preview().is_some());
        assert_eq!(sinks.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_recording_idempotent() {
        let sinks = MemorySinks::default();
        let mut session = open(stream(), SessionOptions::default())
            .with_sink_factory(Box::new(sinks.clone()));
        assert!(session.stop_recording().unwrap().is_none());

        session
            .start_recording("clip.mp4", VideoCodec::H264, None)
            .unwrap();
        assert!(session.stop_recording().unwrap().is_some());
        assert!(session.stop_recording().unwrap().is_none());
        assert_eq!(*sinks.finished.lock().unwrap(), 1);
    }

    #[test]
    fn test_second_start_rejected() {
        let mut session = open(stream(), SessionOptions::default())
            .with_sink_factory(Box::new(MemorySinks::default()));
        session
            .start_recording("a.mp4", VideoCodec::H264, None)
            .unwrap();
        assert!(matches!(
            session.start_recording("b.mp4", VideoCodec::H264, None),
            Err(CameraError::InvalidState(_))
        ));
        assert_eq!(session.recording().unwrap().path, PathBuf::from("a.mp4"));
    }

    #[test]
    fn test_reconfigure_refused_while_recording() {
        let mut session = open(stream(), SessionOptions::default())
            .with_sink_factory(Box::new(MemorySinks::default()));
        session
            .start_recording("a.mp4", VideoCodec::H264, None)
            .unwrap();
        assert!(matches!(
            session.reconfigure(&FormatEntry::new(FourCc::YUYV, 320, 240, 30.0)),
            Err(CameraError::InvalidState(_))
        ));
    }

    #[test]
    fn test_sink_failure_stops_recording_but_not_preview() {
        let sinks = MemorySinks {
            fail_writes: true,
            ..Default::default()
        };
        let mut session = open(stream(), SessionOptions::default())
            .with_sink_factory(Box::new(sinks.clone()));
        session
            .start_recording("a.mp4", VideoCodec::H264, None)
            .unwrap();

        let err = session.read_frame().unwrap_err();

        assert!(matches!(err, CameraError::Encoding(_)));
        assert!(!err.is_fatal());
        assert!(!session.is_recording());
        assert_eq!(*sinks.finished.lock().unwrap(), 1);
        assert!(session.read_frame().unwrap().into_preview().is_some());
    }

    #[test]
    fn test_fatal_read_finishes_recording() {
        let sinks = MemorySinks::default();
        let mut session = open(stream().failing_after(1), SessionOptions::default())
            .with_sink_factory(Box::new(sinks.clone()));
        session
            .start_recording("a.mp4", VideoCodec::H264, None)
            .unwrap();
        session.read_frame().unwrap();

        assert!(session.read_frame().is_err());
        assert_eq!(*sinks.finished.lock().unwrap(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_without_encoder_feature_recording_unsupported() {
        if cfg!(feature = "recording") {
            return;
        }
        let mut session = open(stream(), SessionOptions::default());
        assert!(!session.capabilities().supports_recording);
        assert!(matches!(
            session.start_recording("a.mp4", VideoCodec::H264, None),
            Err(CameraError::Unsupported(_))
        ));
    }

    #[test]
    fn test_queued_frames_returned_in_order() {
        let frames = (0..3).map(|i| synthetic_yuyv_frame(i * 40, 4, 2));
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 4, 2, 30.0)).with_frames(frames);
        let mut session = open(
            stream,
            SessionOptions {
                color: ColorMode::Gray,
                ..Default::default()
            },
        );

        let firsts: Vec<u8> = (0..3)
            .map(|_| match session.read_frame().unwrap().into_preview().unwrap() {
                PixelBuffer::Gray8 { data, .. } => data[0],
                other => panic!("unexpected buffer {other:?}"),
            })
            .collect();

        assert_eq!(firsts, vec![0, 40, 80]);
    }
}
