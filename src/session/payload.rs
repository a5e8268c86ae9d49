//! Encoded payloads and export artifacts
//!
//! A payload is a byte blob plus the container it is in. The original
//! capture keeps the backend's container; processed audio is always WAV.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::capture::BlobFormat;
use crate::error::Result;

/// Which side of the before/after pair a payload is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Original,
    Processed,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Original => "original",
            PayloadKind::Processed => "processed",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes ready for playback or download
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedAudioPayload {
    kind: PayloadKind,
    format: BlobFormat,
    #[serde(skip)]
    bytes: Vec<u8>,
    /// SHA-256 of `bytes`, lowercase hex
    checksum: String,
}

impl EncodedAudioPayload {
    pub fn new(kind: PayloadKind, format: BlobFormat, bytes: Vec<u8>) -> Self {
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        Self {
            kind,
            format,
            bytes,
            checksum,
        }
    }

    /// Processed audio in the PCM WAV container
    pub fn processed(bytes: Vec<u8>) -> Self {
        Self::new(PayloadKind::Processed, BlobFormat::WAV, bytes)
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Recompute the checksum and compare
    pub fn verify(&self) -> bool {
        format!("{:x}", Sha256::digest(&self.bytes)) == self.checksum
    }
}

/// A payload with the filename it should be saved under
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub payload: Arc<EncodedAudioPayload>,
    pub filename: String,
}

impl ExportArtifact {
    /// Name the payload `voice-recording-{kind}-{unix millis}.{ext}`
    pub fn new(payload: Arc<EncodedAudioPayload>, at: DateTime<Utc>) -> Self {
        let filename = format!(
            "voice-recording-{}-{}.{}",
            payload.kind(),
            at.timestamp_millis(),
            payload.extension()
        );
        Self { payload, filename }
    }

    pub fn mime_type(&self) -> &'static str {
        self.payload.mime_type()
    }

    pub fn bytes(&self) -> &[u8] {
        self.payload.bytes()
    }

    /// Write into `dir` under the suggested filename
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.filename);
        fs::write(&path, self.payload.bytes())?;
        Ok(path)
    }
}
