use serde::{Deserialize, Serialize};
use std::fmt;

use symphonia::core::codecs::CodecParameters;

/// Binary encoding of one audio sample. Frames handed between pipeline stages
/// are planar: one byte plane per channel, native endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "flt",
            SampleFormat::F64 => "dbl",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<symphonia::core::sample::SampleFormat> for SampleFormat {
    fn from(format: symphonia::core::sample::SampleFormat) -> Self {
        use symphonia::core::sample::SampleFormat as Sym;
        match format {
            Sym::U8 => SampleFormat::U8,
            Sym::S8 | Sym::U16 | Sym::S16 => SampleFormat::S16,
            Sym::U24 | Sym::S24 | Sym::U32 | Sym::S32 => SampleFormat::S32,
            Sym::F32 => SampleFormat::F32,
            Sym::F64 => SampleFormat::F64,
        }
    }
}

/// Channel arrangement as a speaker bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelLayout(pub u64);

impl ChannelLayout {
    pub const FRONT_LEFT: u64 = 0x1;
    pub const FRONT_RIGHT: u64 = 0x2;
    pub const FRONT_CENTER: u64 = 0x4;
    pub const LOW_FREQUENCY: u64 = 0x8;
    pub const BACK_LEFT: u64 = 0x10;
    pub const BACK_RIGHT: u64 = 0x20;
    pub const SIDE_LEFT: u64 = 0x200;
    pub const SIDE_RIGHT: u64 = 0x400;

    pub const MONO: ChannelLayout = ChannelLayout(Self::FRONT_CENTER);
    pub const STEREO: ChannelLayout = ChannelLayout(Self::FRONT_LEFT | Self::FRONT_RIGHT);
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout(
        Self::FRONT_LEFT
            | Self::FRONT_RIGHT
            | Self::FRONT_CENTER
            | Self::LOW_FREQUENCY
            | Self::BACK_LEFT
            | Self::BACK_RIGHT,
    );

    pub fn channel_count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Conventional layout for a bare channel count.
    pub fn default_for_count(channels: usize) -> Option<ChannelLayout> {
        match channels {
            0 => None,
            1 => Some(Self::MONO),
            2 => Some(Self::STEREO),
            6 => Some(Self::SURROUND_5_1),
            n if n < 64 => Some(ChannelLayout((1u64 << n) - 1)),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Self::MONO => "mono".to_string(),
            Self::STEREO => "stereo".to_string(),
            Self::SURROUND_5_1 => "5.1".to_string(),
            other => format!("{} channels (0x{:x})", other.channel_count(), other.0),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<symphonia::core::audio::Channels> for ChannelLayout {
    fn from(channels: symphonia::core::audio::Channels) -> Self {
        let layout = ChannelLayout(u64::from(channels.bits()));
        // Symphonia reports mono as a lone front-left channel.
        if layout.0 == Self::FRONT_LEFT {
            Self::MONO
        } else {
            layout
        }
    }
}

/// Exact fraction, used for stream time bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Negotiated PCM format of a decoded or filtered stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
}

impl AudioFormat {
    pub fn new(sample_format: SampleFormat, sample_rate: u32, channel_layout: ChannelLayout) -> Self {
        Self {
            sample_format,
            sample_rate,
            channel_layout,
        }
    }

    pub fn channels(&self) -> usize {
        self.channel_layout.channel_count()
    }

    pub fn time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate)
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "{} Hz, {}, {}",
            self.sample_rate, self.channel_layout, self.sample_format
        )
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_description())
    }
}

/// Fixed format the output device is opened with. Samples are interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
}

impl OutputFormat {
    /// 16-bit stereo at the given rate.
    pub fn s16_stereo(sample_rate: u32) -> Self {
        Self {
            sample_format: SampleFormat::S16,
            sample_rate,
            channel_layout: ChannelLayout::STEREO,
        }
    }

    pub fn channels(&self) -> usize {
        self.channel_layout.channel_count()
    }

    /// Byte size of `samples` interleaved frames in this format.
    pub fn buffer_size(&self, samples: usize) -> usize {
        samples * self.channels() * self.sample_format.bytes_per_sample()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Unknown,
}

/// Stream metadata probed once when the source is opened.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub stream_index: usize,
    pub media_type: MediaType,
    pub codec: String,
    pub sample_format: Option<SampleFormat>,
    pub sample_rate: Option<u32>,
    pub channel_layout: Option<ChannelLayout>,
    /// Backend parameters needed to open a decoder for this stream.
    pub codec_params: CodecParameters,
}

impl StreamDescriptor {
    pub fn is_audio(&self) -> bool {
        self.media_type == MediaType::Audio
    }

    pub fn summary(&self) -> String {
        let rate = self
            .sample_rate
            .map(|r| format!("{} Hz", r))
            .unwrap_or_else(|| "? Hz".to_string());
        let layout = self
            .channel_layout
            .map(|l| l.describe())
            .unwrap_or_else(|| "unknown layout".to_string());
        let format = self
            .sample_format
            .map(|f| f.name())
            .unwrap_or("?");
        format!(
            "#{} {:?} {} ({}, {}, {})",
            self.stream_index, self.media_type, self.codec, rate, layout, format
        )
    }
}

/// Unit of compressed data belonging to one stream.
#[derive(Debug, Clone)]
pub struct CompressedPacket {
    pub stream_index: usize,
    pub timestamp: u64,
    pub duration: u64,
    pub payload: Box<[u8]>,
}

/// Lifecycle state of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Opening,
    StreamSelected,
    DecoderReady,
    GraphReady,
    Pumping,
    Draining,
    Closed,
    Failed,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Closed | PlaybackState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Opening => "OPENING",
            PlaybackState::StreamSelected => "STREAM_SELECTED",
            PlaybackState::DecoderReady => "DECODER_READY",
            PlaybackState::GraphReady => "GRAPH_READY",
            PlaybackState::Pumping => "PUMPING",
            PlaybackState::Draining => "DRAINING",
            PlaybackState::Closed => "CLOSED",
            PlaybackState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_sample() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::S32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::F32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::F64.bytes_per_sample(), 8);
    }

    #[test]
    fn test_channel_layout_counts() {
        assert_eq!(ChannelLayout::MONO.channel_count(), 1);
        assert_eq!(ChannelLayout::STEREO.channel_count(), 2);
        assert_eq!(ChannelLayout::SURROUND_5_1.channel_count(), 6);
        assert_eq!(ChannelLayout::default_for_count(0), None);
        assert_eq!(ChannelLayout::default_for_count(2), Some(ChannelLayout::STEREO));
        assert_eq!(
            ChannelLayout::default_for_count(4).map(|l| l.channel_count()),
            Some(4)
        );
    }

    #[test]
    fn test_symphonia_mono_maps_to_mono() {
        use symphonia::core::audio::Channels;
        assert_eq!(ChannelLayout::from(Channels::FRONT_LEFT), ChannelLayout::MONO);
        assert_eq!(
            ChannelLayout::from(Channels::FRONT_LEFT | Channels::FRONT_RIGHT),
            ChannelLayout::STEREO
        );
    }

    #[test]
    fn test_symphonia_sample_format_mapping() {
        use symphonia::core::sample::SampleFormat as Sym;
        assert_eq!(SampleFormat::from(Sym::S16), SampleFormat::S16);
        assert_eq!(SampleFormat::from(Sym::S24), SampleFormat::S32);
        assert_eq!(SampleFormat::from(Sym::F32), SampleFormat::F32);
        assert_eq!(SampleFormat::from(Sym::U8), SampleFormat::U8);
    }

    #[test]
    fn test_output_buffer_size() {
        let out = OutputFormat::s16_stereo(44_100);
        assert_eq!(out.buffer_size(0), 0);
        assert_eq!(out.buffer_size(1152), 1152 * 2 * 2);
    }

    #[test]
    fn test_audio_format_time_base() {
        let format = AudioFormat::new(SampleFormat::F32, 48_000, ChannelLayout::STEREO);
        assert_eq!(format.time_base(), Rational::new(1, 48_000));
        assert_eq!(format.channels(), 2);
        assert_eq!(format.to_string(), "48000 Hz, stereo, flt");
    }

    #[test]
    fn test_playback_state_terminal() {
        assert!(PlaybackState::Closed.is_terminal());
        assert!(PlaybackState::Failed.is_terminal());
        assert!(!PlaybackState::Pumping.is_terminal());
        assert_eq!(PlaybackState::GraphReady.to_string(), "GRAPH_READY");
    }

    #[test]
    fn test_symphonia_surround_layouts() {
        use symphonia::core::audio::Channels;

        let five_one = Channels::FRONT_LEFT
            | Channels::FRONT_RIGHT
            | Channels::FRONT_CENTRE
            | Channels::LFE1
            | Channels::REAR_LEFT
            | Channels::REAR_RIGHT;
        assert_eq!(ChannelLayout::from(five_one), ChannelLayout::SURROUND_5_1);
        assert_eq!(ChannelLayout::from(five_one).describe(), "5.1");

        let side = Channels::SIDE_LEFT | Channels::SIDE_RIGHT;
        assert_eq!(
            ChannelLayout::from(side).bits(),
            ChannelLayout::SIDE_LEFT | ChannelLayout::SIDE_RIGHT
        );
        assert_eq!(ChannelLayout::from(Channels::FRONT_LEFT), ChannelLayout::MONO);
    }
}
