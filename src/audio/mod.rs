pub mod buffer;
pub mod decoder;
pub mod device;
pub mod filter;
pub mod frame;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod resampler;
pub mod source;

#[cfg(test)]
pub mod tests;

use crate::error::{DecodeError, PlaybackError};
use crate::models::{AudioFormat, CompressedPacket, StreamDescriptor};

pub use buffer::{OutputBuffer, DEFAULT_OUTPUT_BUFFER_BYTES};
pub use decoder::SymphoniaDecoder;
pub use device::{DeviceInfo, DeviceManager};
pub use filter::{FilterGraphHandle, Pull, DEFAULT_GAIN};
pub use frame::RawFrame;
pub use output::{
    CpalSink, CpalSinkConfig, CpalSinkFactory, NullSink, NullSinkFactory, OutputSink,
    OutputSinkFactory,
};
pub use pipeline::{
    CancelToken, DecodeErrorPolicy, EndReason, Pacing, PipelineOptions, PlaybackOrchestrator,
    PumpStats, SessionReport,
};
pub use resampler::Resampler;
pub use source::{select_audio_stream, SymphoniaBackend};

/// Opens inputs and the decoders for their streams.
pub trait MediaBackend {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, PlaybackError>;

    fn open_decoder(&self, stream: &StreamDescriptor) -> Result<Box<dyn AudioDecoder>, PlaybackError>;
}

/// An opened input: stream metadata plus a finite packet sequence.
pub trait MediaSource: Send {
    /// Descriptors probed at open time, indexed by stream index.
    fn streams(&self) -> &[StreamDescriptor];

    /// Next packet in source order. `None` ends the sequence, whether the
    /// input is exhausted or a read failed.
    fn next_packet(&mut self) -> Option<CompressedPacket>;
}

/// Decoder for one compressed audio stream.
pub trait AudioDecoder: Send {
    /// Format every decoded frame is delivered in.
    fn native_format(&self) -> AudioFormat;

    /// Decode one packet into `frame`. Returns `Ok(false)` when the packet
    /// produced no samples and more input is needed.
    fn decode(&mut self, packet: CompressedPacket, frame: &mut RawFrame) -> Result<bool, DecodeError>;
}
