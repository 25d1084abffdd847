use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::decoder::{negotiate_sample_format, SymphoniaDecoder};
use crate::audio::http::{HttpRangeConfig, HttpRangeReader};
use crate::audio::{AudioDecoder, MediaBackend, MediaSource};
use crate::error::PlaybackError;
use crate::models::{ChannelLayout, CompressedPacket, MediaType, SampleFormat, StreamDescriptor};

/// Where a URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLocation {
    File(PathBuf),
    Http(String),
}

impl InputLocation {
    pub fn parse(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            InputLocation::Http(url.to_string())
        } else if let Some(path) = url.strip_prefix("file://") {
            InputLocation::File(PathBuf::from(path))
        } else {
            InputLocation::File(PathBuf::from(url))
        }
    }

    /// File extension used as a probe hint, ignoring any query string.
    pub fn extension(&self) -> Option<String> {
        let path = match self {
            InputLocation::File(path) => path.clone(),
            InputLocation::Http(url) => {
                let end = url.find(|c| c == '?' || c == '#').unwrap_or(url.len());
                PathBuf::from(&url[..end])
            }
        };
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Pick the first audio stream.
pub fn select_audio_stream(url: &str, streams: &[StreamDescriptor]) -> Result<usize, PlaybackError> {
    streams
        .iter()
        .find(|s| s.is_audio())
        .map(|s| s.stream_index)
        .ok_or_else(|| PlaybackError::NoAudioStream {
            url: url.to_string(),
        })
}

/// Production backend: symphonia for demuxing and decoding.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaBackend {
    http: HttpRangeConfig,
}

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaBackend for SymphoniaBackend {
    fn open(&self, url: &str) -> Result<Box<dyn MediaSource>, PlaybackError> {
        Ok(Box::new(SymphoniaSource::open(url, &self.http)?))
    }

    fn open_decoder(&self, stream: &StreamDescriptor) -> Result<Box<dyn AudioDecoder>, PlaybackError> {
        Ok(Box::new(SymphoniaDecoder::open(stream)?))
    }
}

/// An opened container, yielding packets in file order.
pub struct SymphoniaSource {
    url: String,
    reader: Box<dyn FormatReader>,
    streams: Vec<StreamDescriptor>,
    track_ids: Vec<u32>,
    finished: bool,
}

impl SymphoniaSource {
    pub fn open(url: &str, http: &HttpRangeConfig) -> Result<Self, PlaybackError> {
        let open_error = |reason: String| PlaybackError::Open {
            url: url.to_string(),
            reason,
        };

        let location = InputLocation::parse(url);
        let input: Box<dyn symphonia::core::io::MediaSource> = match &location {
            InputLocation::File(path) => Box::new(open_file(path).map_err(open_error)?),
            InputLocation::Http(url) => Box::new(
                HttpRangeReader::open(url, http.clone()).map_err(|e| open_error(e.to_string()))?,
            ),
        };
        let stream = MediaSourceStream::new(input, MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = location.extension() {
            hint.with_extension(&ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| open_error(format!("probe failed: {}", e)))?;

        let reader = probed.format;
        let streams: Vec<StreamDescriptor> = reader
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, track)| describe_track(index, track))
            .collect();
        let track_ids = reader.tracks().iter().map(|t| t.id).collect();

        info!(target: "source", "opened {} ({} stream(s))", url, streams.len());
        for stream in &streams {
            debug!(target: "source", "  {}", stream.summary());
        }

        Ok(Self {
            url: url.to_string(),
            reader,
            streams,
            track_ids,
            finished: false,
        })
    }
}

impl MediaSource for SymphoniaSource {
    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn next_packet(&mut self) -> Option<CompressedPacket> {
        if self.finished {
            return None;
        }
        match self.reader.next_packet() {
            Ok(packet) => {
                // Unknown track ids get an index no descriptor has.
                let stream_index = self
                    .track_ids
                    .iter()
                    .position(|&id| id == packet.track_id())
                    .unwrap_or(self.track_ids.len());
                Some(CompressedPacket {
                    stream_index,
                    timestamp: packet.ts(),
                    duration: packet.dur(),
                    payload: packet.data,
                })
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(target: "source", "end of stream: {}", self.url);
                self.finished = true;
                None
            }
            Err(e) => {
                warn!(target: "source", "read error on {}, ending stream: {}", self.url, e);
                self.finished = true;
                None
            }
        }
    }
}

fn open_file(path: &Path) -> Result<File, String> {
    File::open(path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn describe_track(index: usize, track: &Track) -> StreamDescriptor {
    let params = &track.codec_params;
    let codec = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|d| d.short_name.to_string())
        .unwrap_or_else(|| format!("{:?}", params.codec));
    let media_type = if params.codec != CODEC_TYPE_NULL {
        MediaType::Audio
    } else {
        MediaType::Unknown
    };

    // Containers such as WAV leave the sample format to the decoder.
    let sample_format = match media_type {
        MediaType::Audio => Some(negotiate_sample_format(params)),
        MediaType::Unknown => params.sample_format.map(SampleFormat::from),
    };

    StreamDescriptor {
        stream_index: index,
        media_type,
        codec,
        sample_format,
        sample_rate: params.sample_rate,
        channel_layout: params.channels.map(ChannelLayout::from),
        codec_params: params.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::Channels;
    use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE};

    fn descriptor(index: usize, media_type: MediaType) -> StreamDescriptor {
        StreamDescriptor {
            stream_index: index,
            media_type,
            codec: "pcm_s16le".to_string(),
            sample_format: None,
            sample_rate: Some(44_100),
            channel_layout: Some(ChannelLayout::STEREO),
            codec_params: CodecParameters::new(),
        }
    }

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            InputLocation::parse("/music/a.flac"),
            InputLocation::File(PathBuf::from("/music/a.flac"))
        );
        assert_eq!(
            InputLocation::parse("file:///music/a.flac"),
            InputLocation::File(PathBuf::from("/music/a.flac"))
        );
        assert_eq!(
            InputLocation::parse("https://host/a.mp3"),
            InputLocation::Http("https://host/a.mp3".to_string())
        );
    }

    #[test]
    fn test_extension_ignores_query() {
        let location = InputLocation::parse("http://host/stream/track.MP3?token=abc");
        assert_eq!(location.extension().as_deref(), Some("mp3"));
        assert_eq!(InputLocation::parse("/tmp/noext").extension(), None);
    }

    #[test]
    fn test_select_first_audio_stream() {
        let streams = vec![
            descriptor(0, MediaType::Unknown),
            descriptor(1, MediaType::Audio),
            descriptor(2, MediaType::Audio),
        ];
        assert_eq!(select_audio_stream("x", &streams).unwrap(), 1);
    }

    #[test]
    fn test_select_without_audio_fails() {
        let streams = vec![descriptor(0, MediaType::Unknown)];
        assert!(matches!(
            select_audio_stream("clip.bin", &streams),
            Err(PlaybackError::NoAudioStream { .. })
        ));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = SymphoniaSource::open("/nonexistent/track.wav", &HttpRangeConfig::default());
        assert!(matches!(result, Err(PlaybackError::Open { .. })));
    }

    #[test]
    fn test_describe_track_fills_pcm_sample_format() {
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(48_000)
            .with_bits_per_sample(16)
            .with_channels(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let stream = describe_track(0, &Track::new(0, params.clone()));
        assert!(stream.is_audio());
        assert_eq!(stream.sample_format, Some(SampleFormat::S16));
        assert_eq!(stream.channel_layout, Some(ChannelLayout::STEREO));

        params.for_codec(CODEC_TYPE_PCM_S24LE).with_bits_per_sample(24);
        let stream = describe_track(1, &Track::new(1, params));
        assert_eq!(stream.sample_format, Some(SampleFormat::S32));
    }

    #[test]
    fn test_describe_null_codec_track() {
        let stream = describe_track(2, &Track::new(7, CodecParameters::new()));
        assert_eq!(stream.media_type, MediaType::Unknown);
        assert_eq!(stream.sample_format, None);
    }
}
