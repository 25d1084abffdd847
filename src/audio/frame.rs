//! Planar PCM frame shared by the decoder, filter graph and resampler.
//!
//! A `RawFrame` is a reusable slot: `clear()` drops its contents but keeps the
//! plane allocations, so the pump loop can refill the same frame every packet.

use crate::models::{AudioFormat, ChannelLayout, SampleFormat};

#[derive(Debug, Clone)]
pub struct RawFrame {
    format: AudioFormat,
    sample_count: usize,
    pts: Option<u64>,
    planes: Vec<Vec<u8>>,
}

impl Default for RawFrame {
    fn default() -> Self {
        Self {
            format: AudioFormat::new(SampleFormat::F32, 0, ChannelLayout(0)),
            sample_count: 0,
            pts: None,
            planes: Vec::new(),
        }
    }
}

impl RawFrame {
    /// Prepare the slot for `sample_count` samples per channel in `format`,
    /// zero-filling every plane.
    pub fn reset(&mut self, format: AudioFormat, sample_count: usize) {
        let channels = format.channels();
        let plane_len = sample_count * format.sample_format.bytes_per_sample();
        self.planes.resize_with(channels, Vec::new);
        for plane in &mut self.planes {
            plane.clear();
            plane.resize(plane_len, 0);
        }
        self.format = format;
        self.sample_count = sample_count;
        self.pts = None;
    }

    /// Release the frame contents, keeping allocations.
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.clear();
        }
        self.sample_count = 0;
        self.pts = None;
    }

    /// Copy another frame into this slot, reusing plane allocations.
    pub fn copy_from(&mut self, other: &RawFrame) {
        self.planes.resize_with(other.planes.len(), Vec::new);
        for (dst, src) in self.planes.iter_mut().zip(&other.planes) {
            dst.clear();
            dst.extend_from_slice(src);
        }
        self.format = other.format;
        self.sample_count = other.sample_count;
        self.pts = other.pts;
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format.sample_format
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn pts(&self) -> Option<u64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<u64>) {
        self.pts = pts;
    }

    pub fn plane(&self, channel: usize) -> &[u8] {
        &self.planes[channel]
    }

    pub fn plane_mut(&mut self, channel: usize) -> &mut [u8] {
        &mut self.planes[channel]
    }

    /// Read one sample normalized to [-1.0, 1.0].
    pub fn sample(&self, channel: usize, index: usize) -> f32 {
        let width = self.format.sample_format.bytes_per_sample();
        let at = index * width;
        read_normalized(self.format.sample_format, &self.planes[channel][at..at + width])
    }

    /// Write one normalized sample, clipping integer formats to their range.
    pub fn set_sample(&mut self, channel: usize, index: usize, value: f32) {
        let format = self.format.sample_format;
        let width = format.bytes_per_sample();
        let at = index * width;
        write_normalized(format, value, &mut self.planes[channel][at..at + width]);
    }

    /// Fill one channel from normalized samples, starting at index 0.
    pub fn fill_channel(&mut self, channel: usize, samples: &[f32]) {
        for (i, &s) in samples.iter().enumerate().take(self.sample_count) {
            self.set_sample(channel, i, s);
        }
    }
}

/// Decode one native-endian sample into the [-1.0, 1.0] range.
pub fn read_normalized(format: SampleFormat, bytes: &[u8]) -> f32 {
    match format {
        SampleFormat::U8 => (bytes[0] as f32 - 128.0) / 128.0,
        SampleFormat::S16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
        SampleFormat::S32 => {
            let v = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (v as f64 / 2147483648.0) as f32
        }
        SampleFormat::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleFormat::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            f64::from_ne_bytes(raw) as f32
        }
    }
}

/// Encode one normalized sample in `format`, rounding and clipping integers.
pub fn write_normalized(format: SampleFormat, value: f32, out: &mut [u8]) {
    match format {
        SampleFormat::U8 => {
            out[0] = (value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
        }
        SampleFormat::S16 => {
            let v = (value * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
            out[..2].copy_from_slice(&v.to_ne_bytes());
        }
        SampleFormat::S32 => {
            let v = (value as f64 * 2147483648.0)
                .round()
                .clamp(-2147483648.0, 2147483647.0) as i32;
            out[..4].copy_from_slice(&v.to_ne_bytes());
        }
        SampleFormat::F32 => out[..4].copy_from_slice(&value.to_ne_bytes()),
        SampleFormat::F64 => out[..8].copy_from_slice(&(value as f64).to_ne_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_s16() -> AudioFormat {
        AudioFormat::new(SampleFormat::S16, 44_100, ChannelLayout::MONO)
    }

    #[test]
    fn test_reset_sizes_planes() {
        let mut frame = RawFrame::default();
        frame.reset(
            AudioFormat::new(SampleFormat::F32, 48_000, ChannelLayout::STEREO),
            256,
        );
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.sample_count(), 256);
        assert_eq!(frame.plane(0).len(), 256 * 4);
        assert_eq!(frame.plane(1).len(), 256 * 4);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut frame = RawFrame::default();
        frame.reset(mono_s16(), 1024);
        let capacity = frame.planes[0].capacity();
        frame.clear();
        assert!(frame.is_empty());
        assert_eq!(frame.planes[0].capacity(), capacity);
    }

    #[test]
    fn test_s16_sample_roundtrip_is_exact() {
        let mut frame = RawFrame::default();
        frame.reset(mono_s16(), 3);
        for (i, v) in [-32768i16, 0, 12345].iter().enumerate() {
            frame.plane_mut(0)[i * 2..i * 2 + 2].copy_from_slice(&v.to_ne_bytes());
        }
        let read: Vec<f32> = (0..3).map(|i| frame.sample(0, i)).collect();
        let mut copy = RawFrame::default();
        copy.reset(mono_s16(), 3);
        copy.fill_channel(0, &read);
        assert_eq!(copy.plane(0), frame.plane(0));
    }

    #[test]
    fn test_integer_writes_clip() {
        let mut out = [0u8; 2];
        write_normalized(SampleFormat::S16, 1.5, &mut out);
        assert_eq!(i16::from_ne_bytes(out), i16::MAX);
        write_normalized(SampleFormat::S16, -1.5, &mut out);
        assert_eq!(i16::from_ne_bytes(out), i16::MIN);

        let mut byte = [0u8; 1];
        write_normalized(SampleFormat::U8, 0.0, &mut byte);
        assert_eq!(byte[0], 128);
        write_normalized(SampleFormat::U8, 2.0, &mut byte);
        assert_eq!(byte[0], 255);
    }

    #[test]
    fn test_copy_from_matches_source() {
        let mut src = RawFrame::default();
        src.reset(AudioFormat::new(SampleFormat::F32, 22_050, ChannelLayout::STEREO), 4);
        src.fill_channel(0, &[0.1, 0.2, 0.3, 0.4]);
        src.fill_channel(1, &[-0.1, -0.2, -0.3, -0.4]);
        src.set_pts(Some(900));

        let mut dst = RawFrame::default();
        dst.copy_from(&src);
        assert_eq!(dst.format(), src.format());
        assert_eq!(dst.pts(), Some(900));
        assert_eq!(dst.sample(1, 3), -0.4);
    }
}
