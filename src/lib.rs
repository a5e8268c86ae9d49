//! voxshift - Offline Voice Effect Rendering
//!
//! Records a take, runs it through a fixed-order signal chain described by a
//! declarative effect definition, and exports the result as 16-bit PCM WAV.
//!
//! # Architecture
//!
//! - `effects`: effect definitions and the built-in catalog
//! - `dsp`: the signal chain (pitch, filter, distortion, delay, reverb)
//! - `engine`: audio buffers, the WAV codec and measurements
//! - `session`: capture, metering, rendering and export for one take
//!
//! # Example
//! ```
//! use voxshift::{render, AudioBuffer, EffectCatalog, RenderOptions};
//!
//! let take = AudioBuffer::sine(220.0, 0.5, 44100, 44100);
//! let catalog = EffectCatalog::builtin();
//! let deep = render(&take, catalog.require("deep").unwrap(), &RenderOptions::default()).unwrap();
//! assert_eq!(deep.len(), 73500);
//!
//! let wav = voxshift::encode_wav(&deep).unwrap();
//! assert_eq!(wav.len(), 44 + 73500 * 2);
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod effects;
pub mod engine;
pub mod error;
pub mod session;

pub use config::VoxConfig;
pub use dsp::{render, render_cancellable, CancelToken, RenderOptions};
pub use effects::{list_effects, EffectCatalog, EffectDefinition, EffectSettings, FilterKind};
pub use engine::{encode_wav, AudioBuffer};
pub use error::{Result, VoxError};
pub use session::{RecordingSession, SessionState};
