//! Waveform Codec
//!
//! Encodes an [`AudioBuffer`] into the canonical 44-byte-header RIFF/WAVE
//! container with interleaved 16-bit little-endian PCM. The output is
//! bit-exact and is the only artifact the core hands to callers for export.
//!
//! Header layout (all integers little-endian):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | `"RIFF"` |
//! | 4 | 4 | total length - 8 |
//! | 8 | 4 | `"WAVE"` |
//! | 12 | 4 | `"fmt "` |
//! | 16 | 4 | 16 (fmt chunk size) |
//! | 20 | 2 | 1 (linear PCM) |
//! | 22 | 2 | channels |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | byte rate |
//! | 32 | 2 | block align |
//! | 34 | 2 | bits per sample (16) |
//! | 36 | 4 | `"data"` |
//! | 40 | 4 | data size |

use crate::engine::AudioBuffer;
use crate::error::{Result, VoxError};

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

/// Bit depth of every encoded payload
pub const BITS_PER_SAMPLE: u16 = 16;

/// WAVE format tag for integer PCM
pub const FORMAT_PCM: u16 = 1;

const BYTES_PER_SAMPLE: usize = (BITS_PER_SAMPLE / 8) as usize;

/// Header fields of an encoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Value of the RIFF chunk size field (total length - 8)
    pub riff_size: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Header describing `frames` frames of 16-bit PCM
    pub fn for_pcm16(channels: u16, sample_rate: u32, frames: usize) -> Result<Self> {
        let block_align = channels as usize * BYTES_PER_SAMPLE;
        let data_size = frames
            .checked_mul(block_align)
            .filter(|&size| size <= (u32::MAX as usize - (HEADER_LEN - 8)))
            .ok_or_else(|| VoxError::Encode {
                reason: format!("{} frames do not fit in a WAV container", frames),
            })?;
        let byte_rate = (sample_rate as u64) * block_align as u64;
        let byte_rate = u32::try_from(byte_rate).map_err(|_| VoxError::Encode {
            reason: format!("byte rate {} overflows the header field", byte_rate),
        })?;

        Ok(Self {
            riff_size: (HEADER_LEN - 8 + data_size) as u32,
            format_tag: FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate,
            block_align: block_align as u16,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size: data_size as u32,
        })
    }

    /// Serialize into the 44-byte canonical layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.riff_size.to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&self.format_tag.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Parse the canonical header at the start of `bytes`
    ///
    /// Only the fixed 44-byte layout produced by [`encode_wav`] is accepted;
    /// files with extra chunks should go through [`crate::engine::decode_wav`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(VoxError::Decode {
                reason: format!("{} bytes is shorter than a WAV header", bytes.len()),
                source: None,
            });
        }
        let tag = |range: std::ops::Range<usize>, expected: &[u8; 4]| -> Result<()> {
            if &bytes[range.clone()] != expected {
                return Err(VoxError::Decode {
                    reason: format!(
                        "expected {:?} at offset {}",
                        String::from_utf8_lossy(expected),
                        range.start
                    ),
                    source: None,
                });
            }
            Ok(())
        };
        tag(0..4, b"RIFF")?;
        tag(8..12, b"WAVE")?;
        tag(12..16, b"fmt ")?;
        tag(36..40, b"data")?;

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        if u32_at(16) != 16 {
            return Err(VoxError::Decode {
                reason: format!("unexpected fmt chunk size {}", u32_at(16)),
                source: None,
            });
        }

        Ok(Self {
            riff_size: u32_at(4),
            format_tag: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Number of frames described by `data_size`
    pub fn frames(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        self.data_size as usize / self.block_align as usize
    }

    /// Check that the derived fields agree with each other
    pub fn is_consistent(&self) -> bool {
        self.block_align as u32 == self.channels as u32 * (self.bits_per_sample as u32 / 8)
            && self.byte_rate as u64 == self.sample_rate as u64 * self.block_align as u64
            && self.riff_size as u64 == (HEADER_LEN as u64 - 8) + self.data_size as u64
            && (self.block_align == 0 || self.data_size % self.block_align as u32 == 0)
    }
}

/// Convert one float sample to 16-bit PCM
///
/// Clamps to [-1, 1], scales negatives by 32768 and the rest by 32767, then
/// truncates toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled as i16
}

/// Encode a buffer as a 16-bit PCM WAV byte sequence
///
/// # Errors
/// * `Encode` - zero channels, more than 65535 channels, non-finite samples,
///   or a payload too large for the 32-bit size fields. A buffer that came
///   out of the renderer never trips these.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    if buffer.channels() == 0 {
        return Err(VoxError::Encode {
            reason: "cannot encode a buffer with no channels".to_string(),
        });
    }
    let channels = u16::try_from(buffer.channels()).map_err(|_| VoxError::Encode {
        reason: format!("{} channels exceeds the WAV limit", buffer.channels()),
    })?;
    if !buffer.is_finite() {
        return Err(VoxError::Encode {
            reason: "buffer contains NaN or infinite samples".to_string(),
        });
    }

    let frames = buffer.len();
    let header = WavHeader::for_pcm16(channels, buffer.sample_rate(), frames)?;

    let mut out = Vec::with_capacity(HEADER_LEN + header.data_size as usize);
    out.extend_from_slice(&header.to_bytes());
    for sample in buffer.to_interleaved() {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_scaling() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(0.5), 16383);
        assert_eq!(sample_to_i16(-0.5), -16384);
        // Clamped before scaling
        assert_eq!(sample_to_i16(3.0), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        // Truncation toward zero
        assert_eq!(sample_to_i16(-0.00001), 0);
    }

    #[test]
    fn test_header_round_trip() {
        let header = WavHeader::for_pcm16(2, 44100, 1000).unwrap();
        let parsed = WavHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.is_consistent());
        assert_eq!(parsed.frames(), 1000);
        assert_eq!(parsed.byte_rate, 44100 * 4);
    }

    #[test]
    fn test_empty_buffer_encodes_header_only() {
        let bytes = encode_wav(&AudioBuffer::empty(1, 22050)).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.data_size, 0);
        assert_eq!(header.riff_size, 36);
    }

    #[test]
    fn test_rejects_non_finite() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.0, f32::NAN]], 8000).unwrap();
        assert!(matches!(encode_wav(&buffer), Err(VoxError::Encode { .. })));
    }

    #[test]
    fn test_rejects_no_channels() {
        let buffer = AudioBuffer::from_channels(Vec::new(), 8000).unwrap();
        assert!(matches!(encode_wav(&buffer), Err(VoxError::Encode { .. })));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(WavHeader::parse(b"RIFF").is_err());
        let mut bytes = WavHeader::for_pcm16(1, 8000, 1).unwrap().to_bytes();
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(WavHeader::parse(&bytes).is_err());
    }
}
