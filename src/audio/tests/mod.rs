//! Scripted backend used to drive the orchestrator without real media.


use std::collections::VecDeque;
use std::sync::Arc;

use symphonia::core::codecs::CodecParameters;

use crate::audio::frame::RawFrame;
use crate::audio::pipeline::CancelToken;
use crate::audio::{AudioDecoder, MediaBackend, MediaSource};
use crate::error::{DecodeError, PlaybackError};
use crate::models::{
    AudioFormat, ChannelLayout, CompressedPacket, MediaType, SampleFormat, StreamDescriptor,
};
use crate::test_support::DropLog;

/// First payload byte that makes the mock decoder report a corrupt packet.
pub const CORRUPT: u8 = 0xEE;
/// First payload byte that makes the mock decoder fail outright.
pub const BROKEN: u8 = 0xDD;

/// Value every decoded sample is set to.
pub const DECODED_LEVEL: f32 = 0.25;

pub fn audio_stream(index: usize) -> StreamDescriptor {
    StreamDescriptor {
        stream_index: index,
        media_type: MediaType::Audio,
        codec: "pcm_s16le".to_string(),
        sample_format: Some(SampleFormat::S16),
        sample_rate: Some(44_100),
        channel_layout: Some(ChannelLayout::STEREO),
        codec_params: CodecParameters::new(),
    }
}

pub fn other_stream(index: usize) -> StreamDescriptor {
    StreamDescriptor {
        stream_index: index,
        media_type: MediaType::Unknown,
        codec: "mjpeg".to_string(),
        sample_format: None,
        sample_rate: None,
        channel_layout: None,
        codec_params: CodecParameters::new(),
    }
}

/// Packet that decodes to `samples` samples per channel.
pub fn packet(stream_index: usize, samples: usize) -> CompressedPacket {
    CompressedPacket {
        stream_index,
        timestamp: 0,
        duration: samples as u64,
        payload: vec![1u8; samples].into_boxed_slice(),
    }
}

pub fn marked_packet(stream_index: usize, marker: u8) -> CompressedPacket {
    CompressedPacket {
        stream_index,
        timestamp: 0,
        duration: 0,
        payload: vec![marker].into_boxed_slice(),
    }
}

pub fn s16_stereo(rate: u32) -> AudioFormat {
    AudioFormat::new(SampleFormat::S16, rate, ChannelLayout::STEREO)
}

#[derive(Clone)]
pub struct MockBackend {
    pub streams: Vec<StreamDescriptor>,
    pub packets: Vec<CompressedPacket>,
    pub native: AudioFormat,
    pub log: DropLog,
    pub fail_open: bool,
    pub fail_decoder: bool,
    /// Format of decoded frames when it differs from the advertised native format.
    pub decoded_format: Option<AudioFormat>,
    /// Cancel the token once this many packets have been handed out.
    pub cancel_after: Option<(usize, CancelToken)>,
}

impl MockBackend {
    pub fn new(log: DropLog) -> Self {
        Self {
            streams: vec![audio_stream(0)],
            packets: Vec::new(),
            native: s16_stereo(44_100),
            log,
            fail_open: false,
            fail_decoder: false,
            decoded_format: None,
            cancel_after: None,
        }
    }
}

impl MediaBackend for MockBackend {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, PlaybackError> {
        if self.fail_open {
            return Err(PlaybackError::Open {
                url: url.to_string(),
                reason: "no such file".to_string(),
            });
        }
        Ok(Box::new(MockSource {
            streams: self.streams.clone(),
            packets: self.packets.iter().cloned().collect(),
            served: 0,
            cancel_after: self.cancel_after.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    fn open_decoder(&self, stream: &StreamDescriptor) -> Result<Box<dyn AudioDecoder>, PlaybackError> {
        if self.fail_decoder {
            return Err(PlaybackError::NoDecoderFound {
                codec: stream.codec.clone(),
            });
        }
        Ok(Box::new(MockDecoder {
            native: self.native,
            decoded: self.decoded_format.unwrap_or(self.native),
            log: Arc::clone(&self.log),
        }))
    }
}

pub struct MockSource {
    streams: Vec<StreamDescriptor>,
    packets: VecDeque<CompressedPacket>,
    served: usize,
    cancel_after: Option<(usize, CancelToken)>,
    log: DropLog,
}

impl MediaSource for MockSource {
    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn next_packet(&mut self) -> Option<CompressedPacket> {
        let packet = self.packets.pop_front()?;
        self.served += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.served >= *after {
                token.cancel();
            }
        }
        Some(packet)
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.log.lock().unwrap().push("source");
    }
}

pub struct MockDecoder {
    native: AudioFormat,
    decoded: AudioFormat,
    log: DropLog,
}

impl AudioDecoder for MockDecoder {
    fn native_format(&self) -> AudioFormat {
        self.native
    }

    fn decode(&mut self, packet: CompressedPacket, frame: &mut RawFrame) -> Result<bool, DecodeError> {
        match packet.payload.first() {
            None => Ok(false),
            Some(&CORRUPT) => Err(DecodeError::CorruptPacket("bad crc".to_string())),
            Some(&BROKEN) => Err(DecodeError::DecodeFailed("decoder state lost".to_string())),
            Some(_) => {
                let samples = packet.payload.len();
                frame.reset(self.decoded, samples);
                let level = vec![DECODED_LEVEL; samples];
                for channel in 0..self.decoded.channels() {
                    frame.fill_channel(channel, &level);
                }
                frame.set_pts(Some(packet.timestamp));
                Ok(true)
            }
        }
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.log.lock().unwrap().push("decoder");
    }
}
