//! Recording Session Manager
//!
//! Lifecycle of a single take:
//! - Capture through an external `CaptureBackend`, with live level metering
//! - Decode into an `AudioBuffer`
//! - Render effects on a blocking worker
//! - Export original and processed payloads

pub mod capture;
pub mod manager;
pub mod meter;
pub mod payload;
pub mod state;

pub use capture::{
    BlobFormat, CaptureBackend, CaptureConstraints, CaptureStream, LevelTap, WavFileBackend,
};
pub use manager::RecordingSession;
pub use meter::{LevelFrame, SpectrumAnalyzer};
pub use payload::{EncodedAudioPayload, ExportArtifact, PayloadKind};
pub use state::SessionState;
