//! Output sinks: the playback device behind a bounded queue, and a sink that
//! discards everything.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};

use crate::audio::device::DeviceManager;
use crate::error::WriteError;

/// Playback device as seen by the pump loop. PCM is interleaved native-endian S16.
pub trait OutputSink {
    fn start(&mut self) -> Result<(), WriteError>;

    /// Queue `buf[offset..offset + len]`, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8], offset: usize, len: usize) -> Result<usize, WriteError>;

    /// Wait until queued audio has been played.
    fn drain(&mut self) -> Result<(), WriteError>;

    fn underruns(&self) -> u64 {
        0
    }
}

/// Creates a sink configured for a sample rate and channel count.
pub trait OutputSinkFactory {
    fn create(&self, sample_rate: u32, channels: usize) -> Result<Box<dyn OutputSink>, WriteError>;
}

/// The slice `write` was asked to send, or `OutOfBounds`.
pub fn checked_slice(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], WriteError> {
    offset
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .map(|end| &buf[offset..end])
        .ok_or(WriteError::OutOfBounds {
            offset,
            len,
            capacity: buf.len(),
        })
}

/// Sink that accepts and drops all audio.
#[derive(Debug, Default)]
pub struct NullSink {
    started: bool,
    bytes: u64,
}

impl OutputSink for NullSink {
    fn start(&mut self) -> Result<(), WriteError> {
        self.started = true;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize, len: usize) -> Result<usize, WriteError> {
        if !self.started {
            return Err(WriteError::StreamError("sink not started".to_string()));
        }
        let data = checked_slice(buf, offset, len)?;
        self.bytes += data.len() as u64;
        Ok(data.len())
    }

    fn drain(&mut self) -> Result<(), WriteError> {
        debug!(target: "output", "null sink discarded {} bytes", self.bytes);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSinkFactory;

impl OutputSinkFactory for NullSinkFactory {
    fn create(&self, sample_rate: u32, channels: usize) -> Result<Box<dyn OutputSink>, WriteError> {
        debug!(target: "output", "null sink at {} Hz, {} channels", sample_rate, channels);
        Ok(Box::new(NullSink::default()))
    }
}

#[derive(Debug, Clone)]
pub struct CpalSinkConfig {
    /// Preferred device name; the default device is used when absent or missing.
    pub device: Option<String>,
    /// Chunks the pump may queue ahead of the device before `write` blocks.
    pub queue_depth: usize,
    pub drain_timeout: Duration,
}

impl Default for CpalSinkConfig {
    fn default() -> Self {
        Self {
            device: None,
            queue_depth: 8,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpalSinkFactory {
    config: CpalSinkConfig,
}

impl CpalSinkFactory {
    pub fn new(config: CpalSinkConfig) -> Self {
        Self { config }
    }
}

impl OutputSinkFactory for CpalSinkFactory {
    fn create(&self, sample_rate: u32, channels: usize) -> Result<Box<dyn OutputSink>, WriteError> {
        Ok(Box::new(CpalSink::open(&self.config, sample_rate, channels)?))
    }
}

/// How long a blocked `write` waits before rechecking the stream state.
const SEND_POLL: Duration = Duration::from_millis(50);

/// State shared with the device callback.
#[derive(Debug, Default)]
struct SinkShared {
    queued_samples: AtomicUsize,
    underruns: AtomicU64,
    failed: AtomicBool,
}

/// cpal output stream fed through a bounded channel.
///
/// `write` blocks while the queue is full, so the pump never runs ahead of
/// the device by more than `queue_depth` chunks.
pub struct CpalSink {
    tx: Option<Sender<Vec<i16>>>,
    shared: Arc<SinkShared>,
    stream: cpal::Stream,
    drain_timeout: Duration,
    started: bool,
}

impl CpalSink {
    pub fn open(config: &CpalSinkConfig, sample_rate: u32, channels: usize) -> Result<Self, WriteError> {
        let device = DeviceManager::new().select_device_with_fallback(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let sample_format = device
            .default_output_config()
            .map_err(|e| WriteError::UnsupportedConfig(format!("{}: {}", device_name, e)))?
            .sample_format();

        let channel_count = u16::try_from(channels)
            .map_err(|_| WriteError::UnsupportedConfig(format!("{} channels", channels)))?;
        let stream_config = StreamConfig {
            channels: channel_count,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(config.queue_depth.max(1));
        let shared = Arc::new(SinkShared::default());

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, rx, &shared),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, rx, &shared),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, rx, &shared),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, rx, &shared),
            other => Err(WriteError::UnsupportedConfig(format!(
                "sample format {} on {}",
                other, device_name
            ))),
        }?;

        info!(
            target: "output",
            "opened '{}' at {} Hz, {} channels ({} device samples)",
            device_name, sample_rate, channels, sample_format
        );
        Ok(Self {
            tx: Some(tx),
            shared,
            stream,
            drain_timeout: config.drain_timeout,
            started: false,
        })
    }
}

impl OutputSink for CpalSink {
    fn start(&mut self) -> Result<(), WriteError> {
        self.stream
            .play()
            .map_err(|e| WriteError::StreamError(format!("Failed to start stream: {}", e)))?;
        self.started = true;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize, len: usize) -> Result<usize, WriteError> {
        if self.shared.failed.load(Ordering::Acquire) {
            return Err(WriteError::StreamError("output stream failed".to_string()));
        }
        let data = checked_slice(buf, offset, len)?;
        let chunk: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();
        let accepted = chunk.len() * 2;

        let tx = self.tx.as_ref().ok_or(WriteError::Closed)?;
        queue_chunk(tx, chunk, &self.shared)?;
        Ok(accepted)
    }

    fn drain(&mut self) -> Result<(), WriteError> {
        // Closing the channel lets the callback play out what is queued.
        self.tx.take();
        if !self.started {
            return Ok(());
        }
        let began = Instant::now();
        while self.shared.queued_samples.load(Ordering::Acquire) > 0 {
            if self.shared.failed.load(Ordering::Acquire) {
                return Err(WriteError::StreamError("output stream failed while draining".to_string()));
            }
            if began.elapsed() >= self.drain_timeout {
                warn!(
                    target: "output",
                    "drain timed out with {} samples queued",
                    self.shared.queued_samples.load(Ordering::Acquire)
                );
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        // let the device play out its own buffer
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }

    fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            debug!(target: "output", "pause on close failed: {}", e);
        }
        debug!(target: "output", "output stream closed");
    }
}

/// Blocks until the callback has room for `chunk`. Gives up once the stream
/// reports an error or the receiving side is gone.
fn queue_chunk(tx: &Sender<Vec<i16>>, chunk: Vec<i16>, shared: &SinkShared) -> Result<(), WriteError> {
    let samples = chunk.len();
    shared.queued_samples.fetch_add(samples, Ordering::AcqRel);

    let mut pending = chunk;
    loop {
        match tx.send_timeout(pending, SEND_POLL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(chunk)) => {
                if shared.failed.load(Ordering::Acquire) {
                    shared.queued_samples.fetch_sub(samples, Ordering::AcqRel);
                    return Err(WriteError::StreamError(
                        "output stream failed while queueing".to_string(),
                    ));
                }
                pending = chunk;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                shared.queued_samples.fetch_sub(samples, Ordering::AcqRel);
                return Err(WriteError::Closed);
            }
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    rx: Receiver<Vec<i16>>,
    shared: &Arc<SinkShared>,
) -> Result<cpal::Stream, WriteError>
where
    T: SizedSample + FromSample<i16> + Send + 'static,
{
    let callback_shared = Arc::clone(shared);
    let error_shared = Arc::clone(shared);
    let mut pending: Vec<i16> = Vec::new();
    let mut cursor = 0usize;
    let mut received_any = false;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut consumed = 0usize;
                let mut starved = false;
                for out in data.iter_mut() {
                    if cursor >= pending.len() {
                        match rx.try_recv() {
                            Ok(chunk) => {
                                pending = chunk;
                                cursor = 0;
                                received_any = true;
                            }
                            Err(TryRecvError::Empty) => starved = received_any,
                            Err(TryRecvError::Disconnected) => {}
                        }
                    }
                    if cursor < pending.len() {
                        *out = T::from_sample(pending[cursor]);
                        cursor += 1;
                        consumed += 1;
                    } else {
                        *out = T::EQUILIBRIUM;
                    }
                }
                if consumed > 0 {
                    callback_shared
                        .queued_samples
                        .fetch_sub(consumed, Ordering::AcqRel);
                }
                if starved {
                    callback_shared.underruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            move |err| {
                error!(target: "output", "output stream error: {}", err);
                error_shared.failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| WriteError::StreamError(format!("Failed to build output stream: {}", e)))
}
