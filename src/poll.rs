//! Frame polling
//!
//! A front end either calls [`CaptureSession::read_frame`] from its own
//! timer every [`frame_interval`], or hands the session to a
//! [`CaptureThread`], which reads on a dedicated thread and keeps only the
//! newest frame for the front end to pick up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::convert::PixelBuffer;
use crate::errors::CameraError;
use crate::platform::StreamBackend;
use crate::session::{CaptureSession, FrameOutcome};

/// Rate assumed when a device reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// Time between two reads at `fps`.
pub fn frame_interval(fps: f64) -> Duration {
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { DEFAULT_FPS };
    Duration::from_secs_f64(1.0 / fps)
}

/// A frame delivered by a [`CaptureThread`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Strictly increasing, starting at 1. Gaps are frames replaced before
    /// anyone took them.
    pub sequence: u64,
    pub buffer: PixelBuffer,
    pub captured_at: Instant,
}

struct Slot {
    frame: Option<Frame>,
    dropped: u64,
    failure: Option<String>,
}

/// Single-slot mailbox: a new frame replaces an untaken one.
struct Mailbox {
    slot: Mutex<Slot>,
    cv: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                dropped: 0,
                failure: None,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, frame: Frame) {
        let mut slot = self.lock();
        if slot.frame.replace(frame).is_some() {
            slot.dropped = slot.dropped.saturating_add(1);
        }
        self.cv.notify_all();
    }

    fn fail(&self, reason: String) {
        let mut slot = self.lock();
        slot.failure = Some(reason);
        self.cv.notify_all();
    }

    fn take(slot: &mut Slot) -> Result<Option<Frame>, CameraError> {
        if let Some(frame) = slot.frame.take() {
            return Ok(Some(frame));
        }
        match &slot.failure {
            Some(reason) => Err(CameraError::FrameRead(reason.clone())),
            None => Ok(None),
        }
    }

    fn take_timeout(&self, timeout: Duration) -> Result<Option<Frame>, CameraError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            let taken = Self::take(&mut slot)?;
            if taken.is_some() {
                return Ok(taken);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (next, _) = self
                .cv
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = next;
        }
    }
}

struct Shared<S: StreamBackend> {
    session: Mutex<CaptureSession<S>>,
    mailbox: Mailbox,
    stop_flag: AtomicBool,
    interval_nanos: AtomicU64,
}

impl<S: StreamBackend> Shared<S> {
    fn session(&self) -> std::sync::MutexGuard<'_, CaptureSession<S>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos.load(Ordering::Relaxed))
    }

    fn refresh_interval(&self, session: &CaptureSession<S>) {
        if let Ok(format) = session.current_format() {
            let nanos = frame_interval(format.fps).as_nanos() as u64;
            self.interval_nanos.store(nanos, Ordering::Relaxed);
        }
    }
}

/// Reads a session on its own thread.
///
/// Every session operation goes through [`with_session`](Self::with_session),
/// which holds the same lock as the reader, so format changes, control writes
/// and recording start/stop never overlap a read.
pub struct CaptureThread<S: StreamBackend + Send + 'static> {
    shared: Arc<Shared<S>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: StreamBackend + Send + 'static> CaptureThread<S> {
    pub fn spawn(session: CaptureSession<S>) -> Result<Self, CameraError> {
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            mailbox: Mailbox::new(),
            stop_flag: AtomicBool::new(false),
            interval_nanos: AtomicU64::new(frame_interval(DEFAULT_FPS).as_nanos() as u64),
        });
        shared.refresh_interval(&*shared.session());

        let worker = shared.clone();
        let handle = std::thread::Builder::new()
            .name("usbcam-capture".to_string())
            .spawn(move || capture_loop(worker))
            .map_err(|e| CameraError::InvalidState(format!("spawn failed: {e}")))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Take the newest frame, if one arrived since the last call.
    pub fn latest(&self) -> Result<Option<Frame>, CameraError> {
        Mailbox::take(&mut self.shared.mailbox.lock())
    }

    /// Like [`latest`](Self::latest), waiting up to `timeout` for a frame.
    pub fn wait(&self, timeout: Duration) -> Result<Option<Frame>, CameraError> {
        self.shared.mailbox.take_timeout(timeout)
    }

    /// Frames replaced before they were taken.
    pub fn dropped(&self) -> u64 {
        self.shared.mailbox.lock().dropped
    }

    /// Run `f` with exclusive access to the session, between two reads.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut CaptureSession<S>) -> R) -> R {
        let mut session = self.shared.session();
        let result = f(&mut *session);
        self.shared.refresh_interval(&*session);
        result
    }

    /// Stop reading and hand the session back.
    pub fn stop(mut self) -> Result<CaptureSession<S>, CameraError> {
        self.join()?;
        let shared = self.shared.clone();
        drop(self);
        let shared = Arc::try_unwrap(shared)
            .map_err(|_| CameraError::InvalidState("capture thread still running".to_string()))?;
        Ok(shared
            .session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn join(&mut self) -> Result<(), CameraError> {
        self.shared.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| CameraError::InvalidState("capture thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl<S: StreamBackend + Send + 'static> Drop for CaptureThread<S> {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            log::warn!("Error stopping capture thread: {}", e);
        }
    }
}

fn capture_loop<S: StreamBackend>(shared: Arc<Shared<S>>) {
    let mut sequence = 0u64;
    let mut next_tick = Instant::now();

    while !shared.stop_flag.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now < next_tick {
            std::thread::sleep((next_tick - now).min(Duration::from_millis(20)));
            continue;
        }
        next_tick = now + shared.interval();

        let mut session = shared.session();
        if !session.is_read_enabled() {
            continue;
        }
        match session.read_frame() {
            Ok(FrameOutcome::Preview(buffer)) => {
                sequence += 1;
                shared.mailbox.put(Frame {
                    sequence,
                    buffer,
                    captured_at: Instant::now(),
                });
            }
            Ok(FrameOutcome::Recorded) => {}
            Err(e) if e.is_fatal() => {
                shared.mailbox.fail(e.to_string());
                break;
            }
            Err(e) => log::warn!("Frame skipped: {}", e),
        }
    }

    log::debug!("Capture thread exiting after {} frames", sequence);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(25.0), Duration::from_millis(40));
        assert_eq!(frame_interval(0.0), frame_interval(DEFAULT_FPS));
        assert_eq!(frame_interval(-5.0), frame_interval(DEFAULT_FPS));
        assert_eq!(frame_interval(f64::NAN), frame_interval(DEFAULT_FPS));
    }

    fn frame(sequence: u64) -> Frame {
        Frame {
            sequence,
            buffer: PixelBuffer::Gray8 {
                width: 1,
                height: 1,
                data: vec![0],
            },
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_mailbox_latest_wins() {
        let mailbox = Mailbox::new();
        mailbox.put(frame(1));
        mailbox.put(frame(2));
        let taken = Mailbox::take(&mut mailbox.lock()).unwrap().unwrap();
        assert_eq!(taken.sequence, 2);
        assert_eq!(mailbox.lock().dropped, 1);
        assert!(Mailbox::take(&mut mailbox.lock()).unwrap().is_none());
    }

    #[test]
    fn test_mailbox_reports_failure_after_last_frame() {
        let mailbox = Mailbox::new();
        mailbox.put(frame(1));
        mailbox.fail("gone".to_string());
        assert!(mailbox.take_timeout(Duration::ZERO).unwrap().is_some());
        assert!(matches!(
            mailbox.take_timeout(Duration::from_millis(10)),
            Err(CameraError::FrameRead(_))
        ));
    }
}
