//! Build a composition and print it without exporting.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vcompose_common::config::AppConfig;
use vcompose_common::time::MediaTime;
use vcompose_core::memory::{fake_track_set, InMemoryEngine};
use vcompose_core::{BuildOptions, CompositionBuilder};
use vcompose_model::{MediaType, SourceExpression, SourceRef};

/// One source of a track manifest.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    source: SourceRef,
    #[serde(default)]
    tracks: Vec<ManifestTrack>,
}

#[derive(Debug, Deserialize)]
struct ManifestTrack {
    media_type: MediaType,
    duration_secs: f64,
}

pub fn run(
    config: &AppConfig,
    expr: PathBuf,
    json: bool,
    manifest: Option<PathBuf>,
    assets: Vec<String>,
) -> anyhow::Result<()> {
    let expression = SourceExpression::from_json_file(&expr)
        .map_err(|e| anyhow::anyhow!("Failed to load expression: {e}"))?;
    let options = BuildOptions::from(&config.composition);

    let result = match manifest {
        Some(path) => {
            CompositionBuilder::with_options(load_manifest(&path)?, options).build(&expression)
        }
        None => {
            let engine = super::probe_engine(config, super::parse_assets(&assets)?);
            CompositionBuilder::with_options(engine, options).build(&expression)
        }
    }
    .map_err(|e| anyhow::anyhow!("Build failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Plan for: {}", expr.display());
    super::print_result(&result);
    Ok(())
}

fn load_manifest(path: &Path) -> anyhow::Result<InMemoryEngine> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read manifest {}: {e}", path.display()))?;
    parse_manifest(&content)
}

fn parse_manifest(content: &str) -> anyhow::Result<InMemoryEngine> {
    let entries: Vec<ManifestEntry> = serde_json::from_str(content)?;
    let mut engine = InMemoryEngine::new();
    for entry in entries {
        let streams: Vec<(MediaType, MediaTime)> = entry
            .tracks
            .iter()
            .map(|t| (t.media_type, MediaTime::from_secs_f64(t.duration_secs)))
            .collect();
        let set = fake_track_set(&entry.source, &streams);
        engine.register(entry.source, set);
    }
    Ok(engine)
}
