//! Show the tracks a single source resolves to.

use vcompose_common::config::AppConfig;
use vcompose_core::MediaEngine;
use vcompose_model::{AssetId, SourceExpression, SourceRef};

pub fn run(config: &AppConfig, source: String, assets: Vec<String>) -> anyhow::Result<()> {
    let source_ref = parse_source(&source)?;
    let engine = super::probe_engine(config, super::parse_assets(&assets)?);

    println!("Probing: {source_ref}");
    let set = engine
        .open_source(&source_ref)
        .map_err(|e| anyhow::anyhow!("Probe failed: {e}"))?;

    if set.is_empty() {
        println!("  No tracks. This source contributes nothing to a composition.");
        return Ok(());
    }

    println!("  Duration: {}", set.duration());
    println!("  Tracks: {}", set.len());
    for track in &set {
        println!(
            "    {} {:<5} {}",
            track.id,
            track.media_type.to_string(),
            track.time_range()
        );
    }
    Ok(())
}

fn parse_source(raw: &str) -> anyhow::Result<SourceRef> {
    if let Some(id) = raw.strip_prefix("asset:") {
        return Ok(SourceRef::Asset(AssetId::new(id)));
    }
    SourceExpression::from_path(raw)
        .source_ref()
        .ok_or_else(|| anyhow::anyhow!("Not a media source: {raw}"))
}
