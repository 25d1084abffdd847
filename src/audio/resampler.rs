/*!
Conversion of filtered frames into the output device format.

- Reads planar frames in any `SampleFormat` and writes interleaved samples in the
  output sample format.
- Maps channels: equal counts pass through, mono is duplicated, stereo is averaged
  down to mono, anything else takes the nearest available input channel.
- When the output rate differs from the input rate, a streaming linear converter
  keeps its phase across frames so chunk boundaries do not click.

The valid byte length is recomputed on every call from the converted sample count.
*/

use log::debug;

use crate::audio::buffer::OutputBuffer;
use crate::audio::frame::{write_normalized, RawFrame};
use crate::error::{PlaybackError, ResampleError};
use crate::models::{AudioFormat, OutputFormat};

/// Streaming linear interpolator over interleaved f32 samples.
#[derive(Debug, Clone)]
pub struct RateConverter {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,

    // source frames consumed per output frame (src/dst)
    step: f64,

    // position relative to the start of `prev_frame`
    pos: f64,
    prev_frame: Vec<f32>,
    work: Vec<f32>,
}

impl RateConverter {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            pos: 0.0,
            prev_frame: Vec::new(),
            work: Vec::new(),
        }
    }

    /// Resample `input` and replace the contents of `out` with the result.
    pub fn process_into(&mut self, input: &[f32], out: &mut Vec<f32>) {
        out.clear();
        if self.channels == 0 || self.dst_rate == 0 || self.src_rate == 0 {
            return;
        }

        let ch = self.channels;
        let in_frames = input.len() / ch;

        // [prev_frame, input...] so interpolation can cross the chunk boundary.
        // The very first chunk starts on its own first frame.
        self.work.clear();
        if self.prev_frame.len() == ch {
            self.work.extend_from_slice(&self.prev_frame);
        } else if in_frames == 0 {
            return;
        }
        self.work.extend_from_slice(&input[..in_frames * ch]);

        let total_frames = self.work.len() / ch;
        let expected = ((in_frames as f64) * (self.dst_rate as f64 / self.src_rate as f64)).ceil()
            as usize
            + 4;
        out.reserve(expected * ch);

        while self.pos < (total_frames - 1) as f64 {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let base0 = i * ch;
            let base1 = (i + 1) * ch;
            for c in 0..ch {
                let s0 = self.work[base0 + c];
                let s1 = self.work[base1 + c];
                out.push(s0 + (s1 - s0) * frac);
            }
            self.pos += self.step;
        }

        // the last frame becomes index 0 of the next call
        let last_base = (total_frames - 1) * ch;
        self.prev_frame.clear();
        self.prev_frame
            .extend_from_slice(&self.work[last_base..last_base + ch]);
        self.pos -= (total_frames - 1) as f64;
    }
}

/// Converts filtered frames into interleaved PCM for the output sink.
#[derive(Debug)]
pub struct Resampler {
    input: AudioFormat,
    output: OutputFormat,
    converter: Option<RateConverter>,
    mixed: Vec<f32>,
    resampled: Vec<f32>,
}

impl Resampler {
    pub fn open(input: AudioFormat, output: OutputFormat) -> Result<Self, PlaybackError> {
        if input.sample_rate == 0 {
            return Err(PlaybackError::ResamplerInit(format!(
                "input sample rate is zero ({})",
                input
            )));
        }
        if input.channels() == 0 {
            return Err(PlaybackError::ResamplerInit(
                "input channel layout is empty".to_string(),
            ));
        }
        if output.sample_rate == 0 || output.channels() == 0 {
            return Err(PlaybackError::ResamplerInit(format!(
                "invalid output format: {} Hz, {} channels",
                output.sample_rate,
                output.channels()
            )));
        }

        let converter = (input.sample_rate != output.sample_rate).then(|| {
            RateConverter::new(input.sample_rate, output.sample_rate, output.channels())
        });
        debug!(
            target: "resampler",
            "{} -> {} Hz, {}, {}{}",
            input,
            output.sample_rate,
            output.channel_layout.describe(),
            output.sample_format,
            if converter.is_some() { " (rate conversion)" } else { "" }
        );

        Ok(Self {
            input,
            output,
            converter,
            mixed: Vec::new(),
            resampled: Vec::new(),
        })
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output
    }

    /// Convert one frame into `out`, returning the number of valid bytes.
    pub fn convert(&mut self, frame: &RawFrame, out: &mut OutputBuffer) -> Result<usize, ResampleError> {
        if frame.format() != self.input || frame.channels() != self.input.channels() {
            return Err(ResampleError::FormatMismatch {
                expected: self.input,
                actual: frame.format(),
            });
        }

        let out_channels = self.output.channels();
        mix_channels(frame, out_channels, &mut self.mixed);

        let samples: &[f32] = match self.converter.as_mut() {
            Some(converter) => {
                converter.process_into(&self.mixed, &mut self.resampled);
                &self.resampled
            }
            None => &self.mixed,
        };

        let width = self.output.sample_format.bytes_per_sample();
        let out_samples = samples.len() / out_channels;
        let needed = self.output.buffer_size(out_samples);
        if needed > out.capacity() {
            return Err(ResampleError::BufferTooSmall {
                needed,
                capacity: out.capacity(),
            });
        }

        let bytes = out.as_mut();
        for (k, &value) in samples.iter().enumerate() {
            write_normalized(self.output.sample_format, value, &mut bytes[k * width..(k + 1) * width]);
        }
        Ok(needed)
    }
}

/// Interleave `frame` into `out` with `out_channels` channels.
fn mix_channels(frame: &RawFrame, out_channels: usize, out: &mut Vec<f32>) {
    let in_channels = frame.channels();
    let n = frame.sample_count();
    out.clear();
    out.reserve(n * out_channels);

    for i in 0..n {
        for oc in 0..out_channels {
            let value = if in_channels == out_channels {
                frame.sample(oc, i)
            } else if in_channels == 1 {
                frame.sample(0, i)
            } else if in_channels == 2 && out_channels == 1 {
                (frame.sample(0, i) + frame.sample(1, i)) * 0.5
            } else {
                frame.sample(oc.min(in_channels - 1), i)
            };
            out.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelLayout, SampleFormat};
    use std::cmp::min;

    fn gen_sine(f_hz: f32, sr: u32, frames: usize, ch: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * ch);
        for n in 0..frames {
            let t = n as f32 / sr as f32;
            let s = (2.0 * std::f32::consts::PI * f_hz * t).sin();
            for _ in 0..ch {
                out.push(s);
            }
        }
        out
    }

    fn read_s16(buf: &OutputBuffer, len: usize) -> Vec<i16> {
        buf.valid(len)
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn rate_converter_length_44k1_to_48k() {
        let input = gen_sine(1000.0, 44_100, 4410, 1);
        let mut rc = RateConverter::new(44_100, 48_000, 1);
        let mut out = Vec::new();
        rc.process_into(&input, &mut out);

        let expected = (4410.0 * (48_000.0 / 44_100.0f64)).round() as isize;
        assert!((out.len() as isize - expected).abs() <= 2, "got {}", out.len());
    }

    #[test]
    fn rate_converter_streaming_matches_one_shot() {
        let ch = 2usize;
        let in_frames = 10_000;
        let input = gen_sine(440.0, 44_100, in_frames, ch);

        let mut one = RateConverter::new(44_100, 48_000, ch);
        let mut out_one = Vec::new();
        one.process_into(&input, &mut out_one);

        let mut two = RateConverter::new(44_100, 48_000, ch);
        let mut out_streamed = Vec::new();
        let mut block = Vec::new();
        let mut idx = 0usize;
        while idx < in_frames {
            let take = min(in_frames - idx, 777);
            two.process_into(&input[idx * ch..(idx + take) * ch], &mut block);
            out_streamed.extend_from_slice(&block);
            idx += take;
        }

        assert!((out_one.len() as isize - out_streamed.len() as isize).abs() <= 4);
        let common = min(out_one.len(), out_streamed.len());
        for k in (0..common).step_by((common / 10).max(1)) {
            assert!((out_one[k] - out_streamed[k]).abs() < 1e-3, "mismatch at {}", k);
        }
    }

    #[test]
    fn mono_f32_to_stereo_s16() {
        let input = AudioFormat::new(SampleFormat::F32, 44_100, ChannelLayout::MONO);
        let mut rs = Resampler::open(input, OutputFormat::s16_stereo(44_100)).unwrap();
        let mut frame = RawFrame::default();
        frame.reset(input, 3);
        frame.fill_channel(0, &[0.5, -0.5, 0.0]);

        let mut buf = OutputBuffer::new(64);
        let len = rs.convert(&frame, &mut buf).unwrap();
        assert_eq!(len, 3 * 2 * 2);
        assert_eq!(read_s16(&buf, len), vec![16384, 16384, -16384, -16384, 0, 0]);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let input = AudioFormat::new(SampleFormat::F32, 8_000, ChannelLayout::STEREO);
        let output = OutputFormat {
            sample_format: SampleFormat::S16,
            sample_rate: 8_000,
            channel_layout: ChannelLayout::MONO,
        };
        let mut rs = Resampler::open(input, output).unwrap();
        let mut frame = RawFrame::default();
        frame.reset(input, 1);
        frame.fill_channel(0, &[0.5]);
        frame.fill_channel(1, &[0.0]);

        let mut buf = OutputBuffer::new(16);
        let len = rs.convert(&frame, &mut buf).unwrap();
        assert_eq!(read_s16(&buf, len), vec![8192]);
    }

    #[test]
    fn valid_length_tracks_frame_size() {
        let input = AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::MONO);
        let mut rs = Resampler::open(input, OutputFormat::s16_stereo(44_100)).unwrap();
        let mut buf = OutputBuffer::default();
        let mut frame = RawFrame::default();

        let mut lengths = Vec::new();
        for samples in [1152usize, 576, 4096] {
            frame.reset(input, samples);
            lengths.push(rs.convert(&frame, &mut buf).unwrap());
        }
        assert_eq!(lengths, vec![1152 * 4, 576 * 4, 4096 * 4]);
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let input = AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::STEREO);
        let mut rs = Resampler::open(input, OutputFormat::s16_stereo(44_100)).unwrap();
        let mut frame = RawFrame::default();
        frame.reset(input, 100);
        let mut buf = OutputBuffer::new(100);
        assert_eq!(
            rs.convert(&frame, &mut buf),
            Err(ResampleError::BufferTooSmall {
                needed: 400,
                capacity: 100
            })
        );
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let input = AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::STEREO);
        let mut rs = Resampler::open(input, OutputFormat::s16_stereo(44_100)).unwrap();
        let mut frame = RawFrame::default();
        frame.reset(AudioFormat::new(SampleFormat::F32, 44_100, ChannelLayout::STEREO), 4);
        let mut buf = OutputBuffer::default();
        assert!(matches!(
            rs.convert(&frame, &mut buf),
            Err(ResampleError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn open_rejects_zero_rate() {
        let input = AudioFormat::new(SampleFormat::S16, 0, ChannelLayout::STEREO);
        assert!(matches!(
            Resampler::open(input, OutputFormat::s16_stereo(44_100)),
            Err(PlaybackError::ResamplerInit(_))
        ));
    }

    #[test]
    fn rate_change_produces_more_samples() {
        let input = AudioFormat::new(SampleFormat::F32, 24_000, ChannelLayout::STEREO);
        let mut rs = Resampler::open(input, OutputFormat::s16_stereo(48_000)).unwrap();
        let mut frame = RawFrame::default();
        frame.reset(input, 1000);
        let mut buf = OutputBuffer::default();
        let len = rs.convert(&frame, &mut buf).unwrap();
        let frames = len / 4;
        assert!((1995..=2000).contains(&frames), "got {} frames", frames);
    }

    #[test]
    fn rate_converter_constant_input_has_no_onset_ramp() {
        let input = vec![0.5f32; 2 * 300];
        let mut rc = RateConverter::new(22_050, 48_000, 2);
        let mut out = Vec::new();
        rc.process_into(&input[..2 * 100], &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6), "first = {:?}", &out[..4]);

        let mut more = Vec::new();
        rc.process_into(&input[2 * 100..], &mut more);
        assert!(more.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn rate_converter_single_frame_first_chunk() {
        let mut rc = RateConverter::new(8_000, 16_000, 1);
        let mut out = Vec::new();
        rc.process_into(&[0.25], &mut out);
        assert!(out.is_empty());
        rc.process_into(&[0.25, 0.25], &mut out);
        assert_eq!(out, vec![0.25; 4]);
    }
}
