pub mod graph;
pub mod nodes;

use log::{debug, info};

use crate::audio::frame::RawFrame;
use crate::error::{GraphBuildError, GraphRuntimeError};
use crate::models::AudioFormat;

pub use graph::{FilterGraph, NodeId, Pull};
pub use nodes::{BufferSourceArgs, FilterArgs, FilterKind, GainArgs};

/// Default linear gain baked into the volume node.
pub const DEFAULT_GAIN: f64 = 0.5;

/// A configured source → volume → sink graph.
#[derive(Debug)]
pub struct FilterGraphHandle {
    graph: FilterGraph,
    source: NodeId,
    sink: NodeId,
    gain: f64,
}

impl FilterGraphHandle {
    /// Build the volume graph for frames in `input` format.
    ///
    /// Every step runs in order and the first failure aborts the build.
    pub fn build(input: AudioFormat, gain: f64) -> Result<Self, GraphBuildError> {
        let mut graph = FilterGraph::new();

        let source = graph.alloc_filter("abuffer", "src")?;
        graph.init_filter(
            source,
            FilterArgs::BufferSource(BufferSourceArgs {
                channel_layout: input.channel_layout,
                sample_format: input.sample_format,
                sample_rate: input.sample_rate,
                time_base: input.time_base(),
            }),
        )?;

        let volume = graph.alloc_filter("volume", "volume")?;
        graph.init_filter(volume, FilterArgs::Gain(GainArgs { volume: gain }))?;

        let sink = graph.alloc_filter("abuffersink", "sink")?;
        graph.init_filter(sink, FilterArgs::BufferSink)?;

        graph.link(source, volume)?;
        graph.link(volume, sink)?;
        graph.configure()?;

        info!(target: "filter", "volume graph ready: gain {} on {}", gain, input);
        Ok(Self {
            graph,
            source,
            sink,
            gain,
        })
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn output_format(&self) -> Option<AudioFormat> {
        self.graph.output_format()
    }

    pub fn push(&mut self, frame: &RawFrame) -> Result<(), GraphRuntimeError> {
        self.graph.push(frame)
    }

    pub fn pull(&mut self, out: &mut RawFrame) -> Result<Pull, GraphRuntimeError> {
        self.graph.pull(out)
    }

    /// Mark end of input so that queued frames can be drained with `pull`.
    pub fn flush(&mut self) {
        debug!(target: "filter", "flushing graph ({:?} -> {:?})", self.source, self.sink);
        self.graph.send_eof();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelLayout, SampleFormat};

    fn stereo_s16() -> AudioFormat {
        AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::STEREO)
    }

    fn frame(format: AudioFormat, value: f32, samples: usize) -> RawFrame {
        let mut frame = RawFrame::default();
        frame.reset(format, samples);
        for ch in 0..format.channels() {
            frame.fill_channel(ch, &vec![value; samples]);
        }
        frame
    }

    #[test]
    fn test_build_default_graph() {
        let handle = FilterGraphHandle::build(stereo_s16(), DEFAULT_GAIN).unwrap();
        assert_eq!(handle.output_format(), Some(stereo_s16()));
        assert_eq!(handle.gain(), 0.5);
    }

    #[test]
    fn test_build_rejects_invalid_gain() {
        let err = FilterGraphHandle::build(stereo_s16(), f64::NAN).unwrap_err();
        assert!(matches!(err, GraphBuildError::InitFailed { ref instance, .. } if instance == "volume"));
    }

    #[test]
    fn test_build_rejects_zero_rate() {
        let format = AudioFormat::new(SampleFormat::F32, 0, ChannelLayout::STEREO);
        let err = FilterGraphHandle::build(format, 0.5).unwrap_err();
        assert!(matches!(err, GraphBuildError::InitFailed { ref instance, .. } if instance == "src"));
    }

    #[test]
    fn test_one_frame_out_per_push() {
        let mut handle = FilterGraphHandle::build(stereo_s16(), 0.5).unwrap();
        let mut out = RawFrame::default();

        assert_eq!(handle.pull(&mut out).unwrap(), Pull::WouldBlock);

        handle.push(&frame(stereo_s16(), 0.5, 64)).unwrap();
        assert_eq!(handle.pull(&mut out).unwrap(), Pull::Ready);
        assert_eq!(out.sample_count(), 64);
        assert!((out.sample(1, 10) - 0.25).abs() < 1.0 / 32768.0);
        assert_eq!(handle.pull(&mut out).unwrap(), Pull::WouldBlock);
    }

    #[test]
    fn test_push_rejects_foreign_format() {
        let mut handle = FilterGraphHandle::build(stereo_s16(), 0.5).unwrap();
        let mono = AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::MONO);
        let err = handle.push(&frame(mono, 0.1, 8)).unwrap_err();
        assert!(matches!(err, GraphRuntimeError::FormatMismatch { .. }));
    }

    #[test]
    fn test_flush_drains_queued_frames() {
        let mut handle = FilterGraphHandle::build(stereo_s16(), 1.0).unwrap();
        handle.push(&frame(stereo_s16(), 0.1, 8)).unwrap();
        handle.push(&frame(stereo_s16(), 0.2, 8)).unwrap();
        handle.flush();

        let mut out = RawFrame::default();
        assert_eq!(handle.pull(&mut out).unwrap(), Pull::Ready);
        assert_eq!(handle.pull(&mut out).unwrap(), Pull::Ready);
        assert_eq!(handle.pull(&mut out).unwrap(), Pull::EndOfStream);
    }
}
