use std::time::Duration;

use usbcam::errors::CameraError;
use usbcam::formats::FormatEntry;
use usbcam::fourcc::FourCc;
use usbcam::poll::CaptureThread;
use usbcam::session::{CaptureSession, SessionOptions, SessionState};
use usbcam::testing::ScriptedStream;

fn session(stream: ScriptedStream) -> CaptureSession<ScriptedStream> {
    CaptureSession::with_backend(stream, 0, SessionOptions::default()).unwrap()
}

#[cfg(test)]
mod capture_thread_tests {
    use super::*;

    #[test]
    fn test_sequences_strictly_increase() {
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 16, 8, 200.0));
        let thread = CaptureThread::spawn(session(stream)).unwrap();

        let mut last = 0;
        let mut received = 0;
        while received < 5 {
            if let Some(frame) = thread.wait(Duration::from_secs(2)).unwrap() {
                assert!(frame.sequence > last);
                last = frame.sequence;
                received += 1;
            }
        }

        let session = thread.stop().unwrap();
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_with_session_reconfigures_between_reads() {
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 16, 8, 100.0));
        let thread = CaptureThread::spawn(session(stream)).unwrap();

        let applied = thread
            .with_session(|s| s.reconfigure(&FormatEntry::new(FourCc::YUYV, 32, 8, 100.0)))
            .unwrap();
        assert_eq!(applied.width, 32);

        // Frames taken after the change carry the new geometry.
        let _ = thread.latest();
        let frame = loop {
            if let Some(frame) = thread.wait(Duration::from_secs(2)).unwrap() {
                if frame.buffer.width() == 32 {
                    break frame;
                }
            }
        };
        assert_eq!(frame.buffer.height(), 8);
        thread.stop().unwrap();
    }

    #[test]
    fn test_paused_session_is_not_read() {
        let stream = ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 16, 8, 200.0));
        let log = stream.log();
        let thread = CaptureThread::spawn(session(stream)).unwrap();

        thread.with_session(|s| s.pause());
        let _ = thread.latest();
        let reads_at_pause = log.matching("read").len();
        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(log.matching("read").len(), reads_at_pause);
        assert!(thread.latest().unwrap().is_none());
        thread.stop().unwrap();
    }

    #[test]
    fn test_fatal_read_reported() {
        let stream =
            ScriptedStream::new(FormatEntry::new(FourCc::YUYV, 16, 8, 200.0)).failing_after(3);
        let thread = CaptureThread::spawn(session(stream)).unwrap();

        let err = loop {
            match thread.wait(Duration::from_secs(2)) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };

        assert!(matches!(err, CameraError::FrameRead(_)));
        let session = thread.stop().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
