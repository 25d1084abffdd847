use log::{debug, trace};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{
    CodecParameters, CodecType, Decoder, DecoderOptions, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC,
    CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE,
    CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24BE, CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S32BE, CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_S8, CODEC_TYPE_PCM_U8,
    CODEC_TYPE_WAVPACK,
};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

use crate::audio::frame::RawFrame;
use crate::audio::AudioDecoder;
use crate::error::{DecodeError, PlaybackError};
use crate::models::{AudioFormat, CompressedPacket, SampleFormat, StreamDescriptor};

/// Decide the sample format decoded frames are delivered in.
///
/// A codec-declared format wins. Otherwise lossless and integer PCM codecs
/// keep integer samples (S16 up to 16 bits, S32 above) and lossy codecs
/// decode to F32.
pub fn negotiate_sample_format(params: &CodecParameters) -> SampleFormat {
    if let Some(format) = params.sample_format {
        return SampleFormat::from(format);
    }
    match params.codec {
        CODEC_TYPE_PCM_U8 => SampleFormat::U8,
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => SampleFormat::F32,
        CODEC_TYPE_PCM_F64LE | CODEC_TYPE_PCM_F64BE => SampleFormat::F64,
        codec if is_integer_codec(codec) => match params.bits_per_sample {
            Some(bits) if bits > 16 => SampleFormat::S32,
            _ => SampleFormat::S16,
        },
        _ => SampleFormat::F32,
    }
}

fn is_integer_codec(codec: CodecType) -> bool {
    matches!(
        codec,
        CODEC_TYPE_FLAC
            | CODEC_TYPE_ALAC
            | CODEC_TYPE_WAVPACK
            | CODEC_TYPE_PCM_S8
            | CODEC_TYPE_PCM_S16LE
            | CODEC_TYPE_PCM_S16BE
            | CODEC_TYPE_PCM_S24LE
            | CODEC_TYPE_PCM_S24BE
            | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_S32BE
    )
}

/// Sample types a frame plane can be written in.
trait PlaneSample: ConvertibleSample {
    fn put(self, out: &mut [u8]);
}

impl PlaneSample for u8 {
    fn put(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl PlaneSample for i16 {
    fn put(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }
}

impl PlaneSample for i32 {
    fn put(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }
}

impl PlaneSample for f32 {
    fn put(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }
}

impl PlaneSample for f64 {
    fn put(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }
}

/// Symphonia decoder for one stream.
pub struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    format: AudioFormat,
}

impl SymphoniaDecoder {
    pub fn open(stream: &StreamDescriptor) -> Result<Self, PlaybackError> {
        let channel_layout = stream.channel_layout.ok_or_else(|| {
            PlaybackError::OpenDecoderFailed(format!("{}: channel layout unknown", stream.codec))
        })?;
        let sample_rate = stream.sample_rate.ok_or_else(|| {
            PlaybackError::OpenDecoderFailed(format!("{}: sample rate unknown", stream.codec))
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(&stream.codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => PlaybackError::NoDecoderFound {
                    codec: stream.codec.clone(),
                },
                other => PlaybackError::OpenDecoderFailed(format!("{}: {}", stream.codec, other)),
            })?;

        let format = AudioFormat::new(
            negotiate_sample_format(&stream.codec_params),
            sample_rate,
            channel_layout,
        );
        debug!(target: "decoder", "opened {} decoder, native format {}", stream.codec, format);

        Ok(Self {
            decoder,
            format,
        })
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn native_format(&self) -> AudioFormat {
        self.format
    }

    fn decode(&mut self, packet: CompressedPacket, frame: &mut RawFrame) -> Result<bool, DecodeError> {
        let packet = Packet::new_from_boxed_slice(
            packet.stream_index as u32,
            packet.timestamp,
            packet.duration,
            packet.payload,
        );

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => return Err(DecodeError::CorruptPacket(e.to_string())),
            Err(SymphoniaError::ResetRequired) => return Err(DecodeError::ResetRequired),
            Err(e) => return Err(DecodeError::DecodeFailed(e.to_string())),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            trace!(target: "decoder", "packet at {} produced no samples", packet.ts());
            return Ok(false);
        }
        if spec.rate != self.format.sample_rate || spec.channels.count() != self.format.channels() {
            return Err(DecodeError::FormatChanged {
                expected: self.format.format_description(),
                actual: format!("{} Hz, {} channels", spec.rate, spec.channels.count()),
            });
        }

        frame.reset(self.format, frames);
        frame.set_pts(Some(packet.ts()));
        match self.format.sample_format {
            SampleFormat::U8 => copy_planes::<u8>(decoded, frame),
            SampleFormat::S16 => copy_planes::<i16>(decoded, frame),
            SampleFormat::S32 => copy_planes::<i32>(decoded, frame),
            SampleFormat::F32 => copy_planes::<f32>(decoded, frame),
            SampleFormat::F64 => copy_planes::<f64>(decoded, frame),
        }
        Ok(true)
    }
}

/// Convert a decoded buffer into the frame's planes.
fn copy_planes<T: PlaneSample>(decoded: AudioBufferRef<'_>, frame: &mut RawFrame) {
    let spec = *decoded.spec();
    let frames = decoded.frames();
    let mut samples = SampleBuffer::<T>::new(frames as u64, spec);
    samples.copy_planar_ref(decoded);

    let width = frame.sample_format().bytes_per_sample();
    for (ch, channel) in samples.samples().chunks_exact(frames).enumerate() {
        if ch >= frame.channels() {
            break;
        }
        let plane = frame.plane_mut(ch);
        for (i, &sample) in channel.iter().enumerate() {
            sample.put(&mut plane[i * width..(i + 1) * width]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelLayout, MediaType};
    use symphonia::core::codecs::{CODEC_TYPE_MP3, CODEC_TYPE_NULL};

    fn params(codec: CodecType, bits: Option<u32>) -> CodecParameters {
        let mut params = CodecParameters::new();
        params.for_codec(codec);
        if let Some(bits) = bits {
            params.with_bits_per_sample(bits);
        }
        params
    }

    #[test]
    fn test_lossless_negotiation() {
        assert_eq!(negotiate_sample_format(&params(CODEC_TYPE_FLAC, Some(16))), SampleFormat::S16);
        assert_eq!(negotiate_sample_format(&params(CODEC_TYPE_FLAC, Some(24))), SampleFormat::S32);
        assert_eq!(negotiate_sample_format(&params(CODEC_TYPE_ALAC, None)), SampleFormat::S16);
        assert_eq!(negotiate_sample_format(&params(CODEC_TYPE_PCM_U8, Some(8))), SampleFormat::U8);
    }

    #[test]
    fn test_lossy_negotiates_float() {
        assert_eq!(negotiate_sample_format(&params(CODEC_TYPE_MP3, None)), SampleFormat::F32);
    }

    #[test]
    fn test_declared_format_wins() {
        let mut p = params(CODEC_TYPE_MP3, None);
        p.with_sample_format(symphonia::core::sample::SampleFormat::S16);
        assert_eq!(negotiate_sample_format(&p), SampleFormat::S16);
    }

    #[test]
    fn test_unknown_codec_has_no_decoder() {
        let stream = StreamDescriptor {
            stream_index: 0,
            media_type: MediaType::Audio,
            codec: "null".to_string(),
            sample_format: None,
            sample_rate: Some(44_100),
            channel_layout: Some(ChannelLayout::STEREO),
            codec_params: params(CODEC_TYPE_NULL, None),
        };
        assert!(matches!(
            SymphoniaDecoder::open(&stream),
            Err(PlaybackError::NoDecoderFound { .. })
        ));
    }

    #[test]
    fn test_missing_layout_fails_open() {
        let mut codec_params = params(CODEC_TYPE_PCM_S16LE, Some(16));
        codec_params.with_sample_rate(44_100);
        let stream = StreamDescriptor {
            stream_index: 0,
            media_type: MediaType::Audio,
            codec: "pcm_s16le".to_string(),
            sample_format: None,
            sample_rate: Some(44_100),
            channel_layout: None,
            codec_params,
        };
        assert!(matches!(
            SymphoniaDecoder::open(&stream),
            Err(PlaybackError::OpenDecoderFailed(_))
        ));
    }
}
