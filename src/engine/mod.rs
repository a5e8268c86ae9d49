//! Audio Engine Module
//!
//! Core audio data handling:
//! - Audio buffer type shared by decoded captures and rendered output
//! - Bit-exact 16-bit PCM WAV encoding
//! - WAV decoding and file helpers
//! - Objective measurements

pub mod analysis;
pub mod buffer;
pub mod io;
pub mod wav;

pub use analysis::{band_energy, AudioAnalysis};
pub use buffer::{linear_to_db, AudioBuffer};
pub use io::{decode_wav, load_wav, save_wav};
pub use wav::{encode_wav, WavHeader};
