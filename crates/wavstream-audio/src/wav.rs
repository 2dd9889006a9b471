use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;
use wavstream_core::{AudioError, AudioFormat, SampleBuffer};

/// Decode a mono 16 kHz 16-bit WAV file into a normalized [`SampleBuffer`].
///
/// The header is checked before any sample is read, so a wrong rate, channel
/// count or bit depth is reported without decoding the payload.
pub fn read_wav(path: &Path) -> Result<SampleBuffer, AudioError> {
    let reader = WavReader::open(path)
        .map_err(|e| AudioError::Open(format!("{}: {e}", path.display())))?;
    let buffer = decode(reader)?;
    tracing::debug!(
        path = %path.display(),
        samples = buffer.len(),
        "decoded {:.2}s of audio",
        buffer.duration_secs()
    );
    Ok(buffer)
}

/// Same as [`read_wav`] for an already open reader.
pub fn read_wav_from<R: Read>(source: R) -> Result<SampleBuffer, AudioError> {
    let reader = WavReader::new(source).map_err(|e| AudioError::Open(e.to_string()))?;
    decode(reader)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<SampleBuffer, AudioError> {
    let spec = reader.spec();
    let format = AudioFormat {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    };
    format.validate()?;
    if spec.sample_format != SampleFormat::Int {
        return Err(AudioError::UnsupportedEncoding);
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(|e| AudioError::Read(e.to_string()))?;

    SampleBuffer::from_pcm16(&samples, format)
}

/// Utterance id used in the result file: the file name up to its first `.`.
pub fn utterance_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}
