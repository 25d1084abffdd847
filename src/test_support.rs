//! Fixtures shared by the scenario and end-to-end tests.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::audio::output::{checked_slice, OutputSink, OutputSinkFactory};
use crate::error::WriteError;

/// Names appended as pipeline components are dropped.
pub type DropLog = Arc<Mutex<Vec<&'static str>>>;

pub fn drop_log() -> DropLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Write a canonical 16-bit PCM WAV file with interleaved `samples`.
pub fn write_wav_s16(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> io::Result<()> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    fs::write(path, out)
}

/// What a `RecordingSink` saw.
#[derive(Debug, Default)]
pub struct SinkRecord {
    pub opened_with: Option<(u32, usize)>,
    pub started: bool,
    pub drained: bool,
    pub write_lengths: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl SinkRecord {
    /// Recorded output decoded as native-endian S16.
    pub fn samples(&self) -> Vec<i16> {
        self.bytes
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }
}

/// Sink that keeps everything written to it.
pub struct RecordingSink {
    record: Arc<Mutex<SinkRecord>>,
    log: DropLog,
    /// Accept at most this many bytes per write.
    accept_limit: Option<usize>,
    /// Fail every write after this many have succeeded.
    fail_after: Option<usize>,
}

impl OutputSink for RecordingSink {
    fn start(&mut self) -> Result<(), WriteError> {
        self.record.lock().unwrap().started = true;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize, len: usize) -> Result<usize, WriteError> {
        let data = checked_slice(buf, offset, len)?;
        let mut record = self.record.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if record.write_lengths.len() >= limit {
                return Err(WriteError::StreamError("device unplugged".to_string()));
            }
        }
        let accepted = self.accept_limit.map_or(data.len(), |limit| data.len().min(limit));
        record.write_lengths.push(len);
        record.bytes.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn drain(&mut self) -> Result<(), WriteError> {
        self.record.lock().unwrap().drained = true;
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.log.lock().unwrap().push("sink");
    }
}

#[derive(Clone, Default)]
pub struct RecordingSinkFactory {
    pub record: Arc<Mutex<SinkRecord>>,
    pub log: DropLog,
    pub accept_limit: Option<usize>,
    pub fail_after: Option<usize>,
    pub fail_open: bool,
}

impl RecordingSinkFactory {
    pub fn new(log: DropLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }
}

impl OutputSinkFactory for RecordingSinkFactory {
    fn create(&self, sample_rate: u32, channels: usize) -> Result<Box<dyn OutputSink>, WriteError> {
        if self.fail_open {
            return Err(WriteError::DeviceNotFound {
                device: "test device".to_string(),
            });
        }
        self.record.lock().unwrap().opened_with = Some((sample_rate, channels));
        Ok(Box::new(RecordingSink {
            record: Arc::clone(&self.record),
            log: Arc::clone(&self.log),
            accept_limit: self.accept_limit,
            fail_after: self.fail_after,
        }))
    }
}
