//! Seekable HTTP input backed by range requests.
//!
//! Bytes are fetched one block at a time and kept in a single cached block;
//! the total length is learned from `Content-Range` (or `Content-Length` when
//! the server ignores ranges).

use std::io::{self, Read, Seek, SeekFrom};
use std::time::{Duration, Instant};

use log::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpRangeConfig {
    pub block_size: usize,
    pub timeout: Duration,
    /// Fetches slower than this are logged at warn.
    pub slow_fetch: Duration,
}

impl Default for HttpRangeConfig {
    fn default() -> Self {
        Self {
            block_size: 256 * 1024,
            timeout: Duration::from_secs(15),
            slow_fetch: Duration::from_millis(500),
        }
    }
}

/// Byte block returned by one range request.
struct Fetched {
    data: Vec<u8>,
    total_len: Option<u64>,
}

pub struct HttpRangeReader {
    url: String,
    config: HttpRangeConfig,
    pos: u64,
    total_len: Option<u64>,
    block: Vec<u8>,
    block_start: u64,
}

impl HttpRangeReader {
    /// Open `url`, fetching the first block so that unreachable inputs fail
    /// at open time rather than on the first read.
    pub fn open(url: &str, config: HttpRangeConfig) -> io::Result<Self> {
        let mut reader = Self {
            url: url.to_string(),
            config,
            pos: 0,
            total_len: None,
            block: Vec::new(),
            block_start: 0,
        };
        reader.fill_block()?;
        debug!(
            target: "source",
            "opened {} ({} bytes total)",
            reader.url,
            reader
                .total_len
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(reader)
    }

    fn block_end(&self) -> u64 {
        self.block_start + self.block.len() as u64
    }

    fn fill_block(&mut self) -> io::Result<()> {
        let start = self.pos;
        let mut end = start + self.config.block_size as u64 - 1;
        if let Some(len) = self.total_len {
            end = end.min(len.saturating_sub(1));
        }

        let fetched = self.fetch(start, end)?;
        if fetched.total_len.is_some() {
            self.total_len = fetched.total_len;
        }
        self.block = fetched.data;
        self.block_start = start;
        Ok(())
    }

    fn fetch(&self, start: u64, end: u64) -> io::Result<Fetched> {
        let range = format!("bytes={}-{}", start, end);
        let began = Instant::now();
        let response = ureq::get(&self.url)
            .config()
            .timeout_per_call(Some(self.config.timeout))
            .build()
            .header("Range", &range)
            .call()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("range request failed: {}", e)))?;

        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_range = header("Content-Range");
        let content_length = header("Content-Length").and_then(|v| v.parse::<u64>().ok());

        let (_, body) = response.into_parts();
        let mut data = Vec::new();
        body.into_reader().read_to_end(&mut data)?;

        let elapsed = began.elapsed();
        if elapsed > self.config.slow_fetch {
            warn!(
                target: "source",
                "slow range fetch {}: {} bytes in {}ms",
                range,
                data.len(),
                elapsed.as_millis()
            );
        }

        let total_len = match status {
            ureq::http::StatusCode::PARTIAL_CONTENT => content_range
                .as_deref()
                .and_then(parse_content_range_total)
                .or(content_length),
            ureq::http::StatusCode::OK => {
                // Server ignored the range and sent the whole body.
                if start > 0 {
                    let skip = (start as usize).min(data.len());
                    data.drain(..skip);
                }
                content_length
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("unexpected HTTP status {}", other),
                ))
            }
        };

        Ok(Fetched { data, total_len })
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if matches!(self.total_len, Some(len) if self.pos >= len) {
            return Ok(0);
        }
        if self.pos < self.block_start || self.pos >= self.block_end() {
            self.fill_block()?;
        }
        if self.pos >= self.block_end() {
            return Ok(0);
        }

        let offset = (self.pos - self.block_start) as usize;
        let n = (self.block.len() - offset).min(out.len());
        out[..n].copy_from_slice(&self.block[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = self.total_len.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "stream length unknown")
                })?;
                len.checked_add_signed(delta)
            }
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        Ok(self.pos)
    }
}

impl symphonia::core::io::MediaSource for HttpRangeReader {
    fn is_seekable(&self) -> bool {
        self.total_len.is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.total_len
    }
}

/// Total length from a `bytes start-end/total` header.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
