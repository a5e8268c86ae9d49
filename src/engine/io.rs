//! Audio file I/O
//!
//! Decoding of arbitrary PCM/float WAV data goes through `hound`; writing
//! always goes through the bit-exact encoder in [`crate::engine::wav`].

use std::fs;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::wav::encode_wav;
use crate::engine::AudioBuffer;
use crate::error::{Result, VoxError};

/// Decode WAV bytes into an [`AudioBuffer`]
///
/// Integer formats are normalized by `2^(bits-1)`, float samples are taken
/// as-is.
///
/// # Errors
/// * `Decode` - if the bytes are not a readable WAV stream
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| VoxError::decode(format!("not a WAV stream: {}", e), e))?;
    read_samples(reader)
}

/// Load a WAV file from disk
pub fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let bytes = fs::read(path)?;
    decode_wav(&bytes).map_err(|e| match e {
        VoxError::Decode { reason, source } => VoxError::Decode {
            reason: format!("{}: {}", path.display(), reason),
            source,
        },
        other => other,
    })
}

/// Encode a buffer as 16-bit PCM and write it to disk
pub fn save_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let bytes = encode_wav(buffer)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn read_samples<R: std::io::Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(|e| VoxError::decode("corrupt float sample data", e)))
            .collect::<Result<Vec<f32>>>()?,
        SampleFormat::Int => {
            let max_val = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max_val)
                        .map_err(|e| VoxError::decode("corrupt integer sample data", e))
                })
                .collect::<Result<Vec<f32>>>()?
        }
    };

    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate).map_err(|e| {
        VoxError::Decode {
            reason: e.to_string(),
            source: None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wav_round_trip_16bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let original = AudioBuffer::sine(440.0, 0.8, 22050, 44100);
        save_wav(&original, &path).unwrap();

        let loaded = load_wav(&path).unwrap();
        assert_eq!(loaded.channels(), 1);
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.len(), original.len());
        // 16-bit has less precision, allow larger tolerance
        assert!(original.is_approx_equal(&loaded, 1e-4));
    }

    #[test]
    fn test_decode_float_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25_f32, -0.25, 0.5, -0.5] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let buffer = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.channel(0), &[0.25, 0.5]);
        assert_eq!(buffer.channel(1), &[-0.25, -0.5]);
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode_wav(b"definitely not audio");
        assert!(matches!(result, Err(VoxError::Decode { .. })));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_wav(Path::new("nonexistent_file.wav"));
        assert!(matches!(result, Err(VoxError::Io(_))));
    }
}
