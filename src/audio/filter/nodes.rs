//! Filter kinds available to the graph and their init arguments.

use crate::audio::frame::RawFrame;
use crate::models::{ChannelLayout, Rational, SampleFormat};

/// Filter primitives known to the graph, looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    BufferSource,
    Gain,
    BufferSink,
}

impl FilterKind {
    pub fn by_name(name: &str) -> Option<FilterKind> {
        match name {
            "abuffer" => Some(FilterKind::BufferSource),
            "volume" => Some(FilterKind::Gain),
            "abuffersink" => Some(FilterKind::BufferSink),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::BufferSource => "abuffer",
            FilterKind::Gain => "volume",
            FilterKind::BufferSink => "abuffersink",
        }
    }

    pub fn has_input(&self) -> bool {
        !matches!(self, FilterKind::BufferSource)
    }

    pub fn has_output(&self) -> bool {
        !matches!(self, FilterKind::BufferSink)
    }
}

/// Init arguments, one variant per filter kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArgs {
    BufferSource(BufferSourceArgs),
    Gain(GainArgs),
    BufferSink,
}

impl FilterArgs {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterArgs::BufferSource(_) => FilterKind::BufferSource,
            FilterArgs::Gain(_) => FilterKind::Gain,
            FilterArgs::BufferSink => FilterKind::BufferSink,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            FilterArgs::BufferSource(args) => args.validate(),
            FilterArgs::Gain(args) => args.validate(),
            FilterArgs::BufferSink => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferSourceArgs {
    pub channel_layout: ChannelLayout,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub time_base: Rational,
}

impl BufferSourceArgs {
    fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be non-zero".to_string());
        }
        if self.channel_layout.channel_count() == 0 {
            return Err("channel layout has no channels".to_string());
        }
        if !self.time_base.is_valid() {
            return Err(format!("invalid time base {}", self.time_base));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainArgs {
    /// Linear amplitude factor.
    pub volume: f64,
}

impl GainArgs {
    fn validate(&self) -> Result<(), String> {
        if !self.volume.is_finite() {
            return Err(format!("volume {} is not finite", self.volume));
        }
        if self.volume < 0.0 {
            return Err(format!("volume {} is negative", self.volume));
        }
        Ok(())
    }
}

/// Scale every sample of `frame` in place, in its native format.
///
/// Integer formats round to nearest and clip; U8 scales about 128.
pub fn apply_gain(frame: &mut RawFrame, volume: f64) {
    if volume == 1.0 {
        return;
    }
    let format = frame.sample_format();
    let width = format.bytes_per_sample();
    for ch in 0..frame.channels() {
        for chunk in frame.plane_mut(ch).chunks_exact_mut(width) {
            scale_sample(format, chunk, volume);
        }
    }
}

fn scale_sample(format: SampleFormat, bytes: &mut [u8], volume: f64) {
    match format {
        SampleFormat::U8 => {
            let centered = bytes[0] as f64 - 128.0;
            bytes[0] = (centered * volume + 128.0).round().clamp(0.0, 255.0) as u8;
        }
        SampleFormat::S16 => {
            let v = i16::from_ne_bytes([bytes[0], bytes[1]]) as f64;
            let scaled = (v * volume).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            bytes.copy_from_slice(&scaled.to_ne_bytes());
        }
        SampleFormat::S32 => {
            let v = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64;
            let scaled = (v * volume).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            bytes.copy_from_slice(&scaled.to_ne_bytes());
        }
        SampleFormat::F32 => {
            let v = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            bytes.copy_from_slice(&((v as f64 * volume) as f32).to_ne_bytes());
        }
        SampleFormat::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            let v = f64::from_ne_bytes(raw);
            bytes.copy_from_slice(&(v * volume).to_ne_bytes());
        }
    }
}
