//! Playback orchestration: builds the pipeline stage by stage and runs the
//! packet pump.
//!
//! Each construction stage is its own type that owns exactly the resources
//! acquired so far. Stage fields are declared newest first, so dropping a
//! stage on any exit path releases sink, graph, resampler, decoder and source
//! in that order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::audio::buffer::{OutputBuffer, DEFAULT_OUTPUT_BUFFER_BYTES};
use crate::audio::filter::{FilterGraphHandle, Pull, DEFAULT_GAIN};
use crate::audio::frame::RawFrame;
use crate::audio::output::{OutputSink, OutputSinkFactory};
use crate::audio::resampler::Resampler;
use crate::audio::source::select_audio_stream;
use crate::audio::{AudioDecoder, MediaBackend, MediaSource};
use crate::error::PlaybackError;
use crate::logging::OperationTimer;
use crate::models::{OutputFormat, PlaybackState, StreamDescriptor};

const SLOW_STAGE: Duration = Duration::from_millis(500);

/// Cooperative stop signal, checked before each packet read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the pump avoids running ahead of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Rely on the sink blocking while its queue is full.
    Backpressure,
    /// Sleep a fixed interval after every write.
    FixedDelay(Duration),
}

/// What a decode error does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeErrorPolicy {
    Fatal,
    /// Skip corrupt packets, failing after `max_consecutive` in a row.
    Skip { max_consecutive: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub gain: f64,
    /// `None` keeps the input rate.
    pub output_sample_rate: Option<u32>,
    pub output_buffer_bytes: usize,
    pub pacing: Pacing,
    pub decode_errors: DecodeErrorPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            output_sample_rate: None,
            output_buffer_bytes: DEFAULT_OUTPUT_BUFFER_BYTES,
            pacing: Pacing::Backpressure,
            decode_errors: DecodeErrorPolicy::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpStats {
    pub packets_read: u64,
    /// Packets belonging to other streams, discarded undecoded.
    pub packets_skipped: u64,
    pub packets_decoded: u64,
    /// Decodes that produced no samples.
    pub empty_decodes: u64,
    pub frames_filtered: u64,
    /// Pushes after which the graph had nothing to emit.
    pub would_block: u64,
    pub writes: u64,
    pub bytes_written: u64,
    pub short_writes: u64,
    pub decode_errors_skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Exhausted,
    Cancelled,
}

/// Outcome of one `play` call.
#[derive(Debug)]
pub struct SessionReport {
    pub url: String,
    /// Every state entered, starting with `Idle`.
    pub transitions: Vec<PlaybackState>,
    pub state: PlaybackState,
    pub stats: PumpStats,
    pub end: Result<EndReason, PlaybackError>,
    pub output_format: Option<OutputFormat>,
    pub underruns: u64,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.state == PlaybackState::Closed
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        self.end.as_ref().err()
    }
}

/// Source opened and its audio stream chosen.
struct StreamSelected {
    stream: StreamDescriptor,
    source: Box<dyn MediaSource>,
}

/// Decoder open and resampler configured from its native format.
struct DecoderReady {
    resampler: Resampler,
    decoder: Box<dyn AudioDecoder>,
    stream_index: usize,
    source: Box<dyn MediaSource>,
}

/// Volume graph built for the decoder's native format.
struct GraphReady {
    graph: FilterGraphHandle,
    resampler: Resampler,
    decoder: Box<dyn AudioDecoder>,
    stream_index: usize,
    source: Box<dyn MediaSource>,
}

/// Everything acquired; the pump runs on this stage.
struct Pumping {
    sink: Box<dyn OutputSink>,
    graph: FilterGraphHandle,
    resampler: Resampler,
    decoder: Box<dyn AudioDecoder>,
    source: Box<dyn MediaSource>,
    stream_index: usize,
    buffer: OutputBuffer,
    frame: RawFrame,
    filtered: RawFrame,
}

struct StateLog {
    url: String,
    transitions: Vec<PlaybackState>,
}

impl StateLog {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            transitions: vec![PlaybackState::Idle],
        }
    }

    fn current(&self) -> PlaybackState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PlaybackState::Idle)
    }

    fn enter(&mut self, state: PlaybackState) {
        debug!(target: "pipeline", "{} -> {} ({})", self.current(), state, self.url);
        self.transitions.push(state);
    }
}

/// Runs playback sessions against a media backend and a sink factory.
pub struct PlaybackOrchestrator {
    backend: Box<dyn MediaBackend>,
    sinks: Box<dyn OutputSinkFactory>,
    options: PipelineOptions,
}

impl PlaybackOrchestrator {
    pub fn new(
        backend: Box<dyn MediaBackend>,
        sinks: Box<dyn OutputSinkFactory>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            backend,
            sinks,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Play `url` to completion, cancellation or failure.
    pub fn play(&self, url: &str, cancel: &CancelToken) -> SessionReport {
        let mut states = StateLog::new(url);
        let mut stats = PumpStats::default();

        states.enter(PlaybackState::Opening);
        let mut pumping = match self.construct(url, &mut states) {
            Ok(pumping) => pumping,
            Err(err) => {
                error!(target: "pipeline", "{} failed in {}: {}", url, states.current(), err);
                states.enter(PlaybackState::Failed);
                return SessionReport {
                    url: url.to_string(),
                    state: PlaybackState::Failed,
                    transitions: states.transitions,
                    stats,
                    end: Err(err),
                    output_format: None,
                    underruns: 0,
                };
            }
        };

        let output_format = pumping.resampler.output_format();
        states.enter(PlaybackState::Pumping);
        let outcome = pumping.run(&self.options, cancel, &mut stats);

        states.enter(PlaybackState::Draining);
        let end = match outcome {
            Ok(EndReason::Exhausted) => pumping
                .finish(&self.options, &mut stats)
                .map(|_| EndReason::Exhausted),
            Ok(EndReason::Cancelled) => {
                info!(target: "pipeline", "playback of {} cancelled", url);
                Ok(EndReason::Cancelled)
            }
            Err(err) => {
                error!(target: "pipeline", "playback of {} stopped: {}", url, err);
                Err(err)
            }
        };
        let underruns = pumping.sink.underruns();
        drop(pumping);

        let state = if end.is_ok() {
            PlaybackState::Closed
        } else {
            PlaybackState::Failed
        };
        states.enter(state);
        info!(
            target: "pipeline",
            "session {} {}: {} writes, {} bytes, {} packets skipped",
            url,
            state,
            stats.writes,
            stats.bytes_written,
            stats.packets_skipped
        );

        SessionReport {
            url: url.to_string(),
            transitions: states.transitions,
            state,
            stats,
            end,
            output_format: Some(output_format),
            underruns,
        }
    }

    fn construct(&self, url: &str, states: &mut StateLog) -> Result<Pumping, PlaybackError> {
        let selected = self.open_stream(url)?;
        states.enter(PlaybackState::StreamSelected);
        let ready = self.open_decoder(selected)?;
        states.enter(PlaybackState::DecoderReady);
        let graph_ready = self.build_graph(ready)?;
        states.enter(PlaybackState::GraphReady);
        self.open_sink(graph_ready)
    }

    fn open_stream(&self, url: &str) -> Result<StreamSelected, PlaybackError> {
        let timer = OperationTimer::new(format!("open {}", url));
        let source = self.backend.open(url)?;
        timer.finish_with_threshold(SLOW_STAGE);

        let index = select_audio_stream(url, source.streams())?;
        let stream = source
            .streams()
            .iter()
            .find(|s| s.stream_index == index)
            .cloned()
            .ok_or_else(|| PlaybackError::NoAudioStream {
                url: url.to_string(),
            })?;
        info!(target: "pipeline", "selected stream {}", stream.summary());
        Ok(StreamSelected { stream, source })
    }

    fn open_decoder(&self, selected: StreamSelected) -> Result<DecoderReady, PlaybackError> {
        let timer = OperationTimer::new(format!("open {} decoder", selected.stream.codec));
        let decoder = self.backend.open_decoder(&selected.stream)?;
        timer.finish_with_threshold(SLOW_STAGE);

        let native = decoder.native_format();
        let output_rate = self.options.output_sample_rate.unwrap_or(native.sample_rate);
        let resampler = Resampler::open(native, OutputFormat::s16_stereo(output_rate))?;

        Ok(DecoderReady {
            resampler,
            decoder,
            stream_index: selected.stream.stream_index,
            source: selected.source,
        })
    }

    // The previous stage is moved out field by field only once this stage has
    // succeeded, so a failure drops it whole and in field order.
    fn build_graph(&self, ready: DecoderReady) -> Result<GraphReady, PlaybackError> {
        let timer = OperationTimer::new("build filter graph");
        let graph = FilterGraphHandle::build(ready.decoder.native_format(), self.options.gain)?;
        timer.finish_with_threshold(SLOW_STAGE);

        Ok(GraphReady {
            graph,
            resampler: ready.resampler,
            decoder: ready.decoder,
            stream_index: ready.stream_index,
            source: ready.source,
        })
    }

    fn open_sink(&self, ready: GraphReady) -> Result<Pumping, PlaybackError> {
        let output = ready.resampler.output_format();
        let mut sink = self.sinks.create(output.sample_rate, output.channels())?;
        sink.start()?;

        Ok(Pumping {
            sink,
            graph: ready.graph,
            resampler: ready.resampler,
            decoder: ready.decoder,
            source: ready.source,
            stream_index: ready.stream_index,
            buffer: OutputBuffer::new(self.options.output_buffer_bytes),
            frame: RawFrame::default(),
            filtered: RawFrame::default(),
        })
    }
}

impl Pumping {
    fn run(
        &mut self,
        options: &PipelineOptions,
        cancel: &CancelToken,
        stats: &mut PumpStats,
    ) -> Result<EndReason, PlaybackError> {
        let mut consecutive_errors = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(EndReason::Cancelled);
            }
            let Some(packet) = self.source.next_packet() else {
                return Ok(EndReason::Exhausted);
            };
            stats.packets_read += 1;

            if packet.stream_index != self.stream_index {
                stats.packets_skipped += 1;
                continue;
            }

            match self.decoder.decode(packet, &mut self.frame) {
                Ok(produced) => {
                    consecutive_errors = 0;
                    stats.packets_decoded += 1;
                    if !produced {
                        stats.empty_decodes += 1;
                        continue;
                    }
                }
                Err(err) => match options.decode_errors {
                    DecodeErrorPolicy::Skip { max_consecutive }
                        if err.is_skippable() && consecutive_errors < max_consecutive =>
                    {
                        consecutive_errors += 1;
                        stats.decode_errors_skipped += 1;
                        warn!(target: "pipeline", "skipping packet: {}", err);
                        continue;
                    }
                    _ => return Err(err.into()),
                },
            }

            // a rejected frame is fatal; pulling would only see an empty graph
            self.graph.push(&self.frame)?;
            self.frame.clear();

            if self.pull_and_write(options, stats)? == 0 {
                stats.would_block += 1;
            }
        }
    }

    /// Pull every frame the graph has ready and write each one out.
    fn pull_and_write(&mut self, options: &PipelineOptions, stats: &mut PumpStats) -> Result<usize, PlaybackError> {
        let mut emitted = 0;
        loop {
            match self.graph.pull(&mut self.filtered)? {
                Pull::Ready => {
                    stats.frames_filtered += 1;
                    emitted += 1;
                    self.write_filtered(options, stats)?;
                }
                Pull::WouldBlock | Pull::EndOfStream => return Ok(emitted),
            }
        }
    }

    fn write_filtered(&mut self, options: &PipelineOptions, stats: &mut PumpStats) -> Result<(), PlaybackError> {
        let len = self.resampler.convert(&self.filtered, &mut self.buffer)?;
        self.filtered.clear();
        if len == 0 {
            trace!(target: "pipeline", "frame converted to no output samples");
            return Ok(());
        }

        let written = self.sink.write(self.buffer.as_bytes(), 0, len)?;
        stats.writes += 1;
        stats.bytes_written += written as u64;
        if written < len {
            stats.short_writes += 1;
            warn!(target: "pipeline", "short write: {} of {} bytes accepted", written, len);
        }

        if let Pacing::FixedDelay(delay) = options.pacing {
            thread::sleep(delay);
        }
        Ok(())
    }

    /// Flush the graph, write what it still holds and let the sink play out.
    fn finish(&mut self, options: &PipelineOptions, stats: &mut PumpStats) -> Result<(), PlaybackError> {
        self.graph.flush();
        self.pull_and_write(options, stats)?;
        self.sink.drain()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_default_options() {
        let options = PipelineOptions::default();
        assert_eq!(options.gain, 0.5);
        assert_eq!(options.output_buffer_bytes, 192_000);
        assert_eq!(options.pacing, Pacing::Backpressure);
        assert_eq!(options.decode_errors, DecodeErrorPolicy::Fatal);
    }
}
