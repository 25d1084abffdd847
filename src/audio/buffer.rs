/// Default output buffer capacity: one second of 48 kHz audio at 4 bytes per frame.
pub const DEFAULT_OUTPUT_BUFFER_BYTES: usize = 48_000 * 4;

/// Fixed-capacity byte arena the resampler writes interleaved PCM into.
///
/// The buffer is allocated once per session and never grows; callers track
/// the valid length returned by each conversion.
#[derive(Debug)]
pub struct OutputBuffer {
    data: Box<[u8]>,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The first `len` bytes, clamped to capacity.
    pub fn valid(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_BUFFER_BYTES)
    }
}
