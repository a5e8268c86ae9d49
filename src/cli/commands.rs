//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::config::VoxConfig;
use crate::dsp::{render, RenderOptions};
use crate::effects::EffectCatalog;
use crate::engine::{load_wav, save_wav, AudioAnalysis, WavHeader};
use crate::error::Result;
use crate::session::{PayloadKind, RecordingSession, WavFileBackend};

/// Built-in catalog plus any definitions from `extra`
pub fn load_catalog(extra: Option<&Path>) -> Result<EffectCatalog> {
    let mut catalog = EffectCatalog::builtin();
    if let Some(path) = extra {
        let json = fs::read_to_string(path)?;
        catalog.extend_from_json(&json)?;
        info!("Loaded effects from {}", path.display());
    }
    Ok(catalog)
}

/// List the catalog.
pub fn list_effects(catalog: &EffectCatalog, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }

    println!("{:<10} {:<12} Description", "ID", "Name");
    println!("{:-<60}", "");
    for effect in catalog.list() {
        println!(
            "{:<10} {:<12} {}",
            effect.id(),
            effect.name(),
            effect.description()
        );
    }
    Ok(())
}

/// Render a WAV file through one effect.
pub fn render_file(
    catalog: &EffectCatalog,
    input: &Path,
    effect_id: &str,
    output: &Path,
    options: &RenderOptions,
) -> Result<()> {
    let effect = catalog.require(effect_id)?;
    info!("Rendering {} with '{}'", input.display(), effect.id());

    let source = load_wav(input)?;
    let rendered = render(&source, effect, options)?;
    save_wav(&rendered, output)?;

    println!("Rendered: {}", output.display());
    println!("{}", AudioAnalysis::analyze(&rendered).summary());
    Ok(())
}

/// Print header fields and levels of a WAV file.
pub fn inspect(path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    let header = WavHeader::parse(&bytes)?;

    println!("File: {}", path.display());
    println!("{:-<60}", "");
    println!("Format tag:      {}", header.format_tag);
    println!("Channels:        {}", header.channels);
    println!("Sample rate:     {} Hz", header.sample_rate);
    println!("Byte rate:       {}", header.byte_rate);
    println!("Block align:     {}", header.block_align);
    println!("Bits per sample: {}", header.bits_per_sample);
    println!("Data size:       {} bytes ({} frames)", header.data_size, header.frames());
    println!("RIFF size:       {}", header.riff_size);
    println!(
        "Consistent:      {}",
        if header.is_consistent() { "yes" } else { "NO" }
    );

    let buffer = load_wav(path)?;
    println!("{:-<60}", "");
    println!("{}", AudioAnalysis::analyze(&buffer).summary());
    Ok(())
}

/// Drive a whole session over a WAV file and export both takes.
pub async fn run_session(
    input: &Path,
    effect_id: &str,
    out_dir: &Path,
    realtime: bool,
    catalog: &EffectCatalog,
    config: VoxConfig,
) -> Result<()> {
    let effect = catalog.require(effect_id)?;
    fs::create_dir_all(out_dir)?;

    let session = RecordingSession::new(WavFileBackend::from_path(input), config)?;
    session.start_recording().await?;
    println!("Recording from {}", input.display());

    if realtime {
        let take = load_wav(input)?;
        let mut levels = session.levels();
        let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(take.duration_secs());
        while tokio::time::timeout_at(deadline, levels.changed()).await.is_ok_and(|r| r.is_ok()) {
            let frame = levels.borrow_and_update().clone();
            let loudest = frame.bins.iter().copied().fold(0.0f32, f32::max);
            println!("  {:>5.2}s  {}", frame.elapsed_secs, meter_bar(loudest, 40));
        }
    }

    session.stop_recording().await?;
    println!(
        "Captured {:.2}s (id {})",
        session.recording_duration().as_secs_f64(),
        session
            .recording_id()
            .map(|id| id.to_string())
            .unwrap_or_default()
    );

    let rendered = session.apply_effect(effect).await?;
    println!("Applied '{}': {} frames", effect.name(), rendered.len());

    for kind in [PayloadKind::Original, PayloadKind::Processed] {
        let artifact = session.export(kind)?;
        let path = artifact.write_to(out_dir)?;
        println!(
            "Exported {} ({}, sha256 {})",
            path.display(),
            artifact.mime_type(),
            artifact.payload.checksum()
        );
    }

    session.dispose().await;
    Ok(())
}

fn meter_bar(level: f32, width: usize) -> String {
    let filled = (level.clamp(0.0, 1.0) * width as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}
