//! MP4 sink combining the H.264 encoder and the muxer

use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec as MuxCodec};

use super::config::{RecordingSpec, RecordingStats, VideoCodec};
use super::encoder::H264Encoder;
use super::{SinkFactory, VideoSink};
use crate::convert::PixelBuffer;
use crate::errors::CameraError;

/// Writes frames as H.264 into an MP4 file
pub struct Mp4Recorder {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    spec: RecordingSpec,
    frame_count: u64,
    dropped_frames: u64,
    start_time: Instant,
    frame_duration_secs: f64,
}

impl Mp4Recorder {
    pub fn new(spec: RecordingSpec) -> Result<Self, CameraError> {
        let VideoCodec::H264 = spec.codec;

        let file = File::create(&spec.path)?;
        let writer = BufWriter::new(file);
        let encoder = H264Encoder::new(spec.width, spec.height)?;

        let muxer = MuxerBuilder::new(writer)
            .video(MuxCodec::H264, spec.width, spec.height, spec.fps)
            .with_fast_start(true)
            .with_metadata(Metadata::new().with_current_time())
            .build()
            .map_err(|e| CameraError::Encoding(format!("Failed to create muxer: {}", e)))?;

        Ok(Self {
            encoder,
            muxer,
            frame_duration_secs: 1.0 / spec.fps,
            spec,
            frame_count: 0,
            dropped_frames: 0,
            start_time: Instant::now(),
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl VideoSink for Mp4Recorder {
    fn write(&mut self, frame: &PixelBuffer) -> Result<(), CameraError> {
        if frame.width() != self.spec.width || frame.height() != self.spec.height {
            return Err(CameraError::Encoding(format!(
                "Frame dimensions {}x{} don't match recording {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }

        let encoded = self.encoder.encode_rgb(&frame.to_rgb8())?;

        // The encoder may hold back data for some frames
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::Encoding(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError> {
        let this = *self;
        let muxer_stats = this
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::Encoding(format!("Failed to finalize recording: {}", e)))?;

        log::debug!(
            "Recording finished after {:.1}s wall time",
            this.start_time.elapsed().as_secs_f64()
        );

        Ok(RecordingStats {
            video_frames: muxer_stats.video_frames,
            duration_secs: muxer_stats.duration_secs,
            bytes_written: muxer_stats.bytes_written,
            dropped_frames: this.dropped_frames,
            output_path: this.spec.path,
        })
    }
}

/// Creates [`Mp4Recorder`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4SinkFactory;

impl SinkFactory for Mp4SinkFactory {
    fn create(&self, spec: &RecordingSpec) -> Result<Box<dyn VideoSink>, CameraError> {
        Ok(Box::new(Mp4Recorder::new(spec.clone())?))
    }

    fn available(&self) -> bool {
        true
    }
}
