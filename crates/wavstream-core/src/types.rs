use crate::error::AudioError;
use std::ops::Range;

/// Text frame the client sends once all audio has been sent.
pub const END_OF_INPUT: &str = "Done";

/// Text frame the service sends after its last result.
pub const TERMINAL_SENTINEL: &str = "Done!";

pub const REQUIRED_SAMPLE_RATE: u32 = 16_000;
pub const REQUIRED_CHANNELS: u16 = 1;
pub const REQUIRED_BITS_PER_SAMPLE: u16 = 16;

/// Bytes per sample on the wire (little-endian f32).
pub const WIRE_SAMPLE_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub fn required() -> Self {
        Self {
            sample_rate: REQUIRED_SAMPLE_RATE,
            channels: REQUIRED_CHANNELS,
            bits_per_sample: REQUIRED_BITS_PER_SAMPLE,
        }
    }

    /// Check the format against the 16 kHz / mono / 16-bit precondition.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate != REQUIRED_SAMPLE_RATE {
            return Err(AudioError::UnsupportedFormat {
                field: "sample rate",
                expected: REQUIRED_SAMPLE_RATE,
                actual: self.sample_rate,
            });
        }
        if self.channels != REQUIRED_CHANNELS {
            return Err(AudioError::UnsupportedFormat {
                field: "channel count",
                expected: REQUIRED_CHANNELS as u32,
                actual: self.channels as u32,
            });
        }
        if self.bits_per_sample != REQUIRED_BITS_PER_SAMPLE {
            return Err(AudioError::UnsupportedFormat {
                field: "bit depth",
                expected: REQUIRED_BITS_PER_SAMPLE as u32,
                actual: self.bits_per_sample as u32,
            });
        }
        Ok(())
    }
}

/// Validated mono 16 kHz audio, normalized to `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    format: AudioFormat,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, format: AudioFormat) -> Result<Self, AudioError> {
        format.validate()?;
        Ok(Self { samples, format })
    }

    /// Scale 16-bit PCM samples by 1/32768.
    pub fn from_pcm16(samples: &[i16], format: AudioFormat) -> Result<Self, AudioError> {
        let scaled = samples.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::new(scaled, format)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.format.sample_rate as f64
    }

    /// Raw little-endian `f32` bytes for a sample range.
    pub fn le_bytes(&self, range: Range<usize>) -> Vec<u8> {
        let slice = &self.samples[range];
        let mut out = Vec::with_capacity(slice.len() * WIRE_SAMPLE_BYTES);
        for s in slice {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

/// One contiguous slice of a [`SampleBuffer`], offsets in samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn sample_count(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Result(String),
    TerminalSentinel,
}

impl InboundMessage {
    pub fn classify(text: String) -> Self {
        if text == TERMINAL_SENTINEL {
            Self::TerminalSentinel
        } else {
            Self::Result(text)
        }
    }
}

/// Post-processed recognition text plus the utterance id it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub id: String,
    pub text: String,
}

impl NormalizedResult {
    /// The `"<id> <text>"` line written to the result sink.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.id, self.text)
    }
}
