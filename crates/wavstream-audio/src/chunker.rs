use wavstream_core::{Chunk, ConfigError, SampleBuffer};

/// Splits a [`SampleBuffer`] into fixed-size wire chunks.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    samples_per_chunk: usize,
}

impl Chunker {
    pub fn new(samples_per_chunk: usize) -> Result<Self, ConfigError> {
        if samples_per_chunk == 0 {
            return Err(ConfigError::Invalid {
                field: "samples_per_message",
                reason: "chunk size must be greater than zero".to_string(),
            });
        }
        Ok(Self { samples_per_chunk })
    }

    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_chunk
    }

    /// Number of chunks a buffer of `len` samples produces.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.samples_per_chunk)
    }

    /// Lazily walk the buffer in order. Calling this again restarts from the top.
    pub fn chunks<'a>(&self, buffer: &'a SampleBuffer) -> Chunks<'a> {
        Chunks {
            buffer,
            size: self.samples_per_chunk,
            next_start: 0,
            index: 0,
        }
    }
}

pub struct Chunks<'a> {
    buffer: &'a SampleBuffer,
    size: usize,
    next_start: usize,
    index: usize,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let len = self.buffer.len();
        if self.next_start >= len {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.size).min(len);
        let chunk = Chunk {
            index: self.index,
            start,
            end,
            payload: self.buffer.le_bytes(start..end),
        };
        self.next_start = end;
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len().saturating_sub(self.next_start).div_ceil(self.size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
