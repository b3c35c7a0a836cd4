pub mod check;
pub mod compose;
pub mod init_config;
pub mod plan;
pub mod probe;

use std::path::PathBuf;

use vcompose_common::config::{AppConfig, PresetChoice};
use vcompose_common::time::MediaTime;
use vcompose_engine::{AssetRegistry, FfprobeEngine};
use vcompose_model::{CompositionResult, SourceExpression};

/// Expression from a JSON file or from a flat `--merge`/`--concat` list.
pub fn load_expression(
    expr: Option<PathBuf>,
    merge: Vec<PathBuf>,
    concat: Vec<PathBuf>,
) -> anyhow::Result<SourceExpression> {
    if let Some(path) = expr {
        return SourceExpression::from_json_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load expression: {e}"));
    }
    if !merge.is_empty() {
        return Ok(SourceExpression::merge(
            merge.into_iter().map(SourceExpression::from_path).collect(),
        ));
    }
    if !concat.is_empty() {
        return Ok(SourceExpression::concat(
            concat.into_iter().map(SourceExpression::from_path).collect(),
        ));
    }
    Err(anyhow::anyhow!(
        "Nothing to compose: pass an expression file, --merge or --concat"
    ))
}

pub fn parse_assets(pairs: &[String]) -> anyhow::Result<AssetRegistry> {
    AssetRegistry::from_pairs(pairs.iter().map(String::as_str)).map_err(anyhow::Error::msg)
}

pub fn parse_preset(raw: &str) -> anyhow::Result<PresetChoice> {
    match raw {
        "auto" => Ok(PresetChoice::Auto),
        "passthrough" => Ok(PresetChoice::Passthrough),
        "reencode" => Ok(PresetChoice::Reencode),
        _ => Err(anyhow::anyhow!(
            "Unknown preset: {raw}. Use: auto, passthrough, reencode"
        )),
    }
}

pub fn probe_engine(config: &AppConfig, assets: AssetRegistry) -> FfprobeEngine {
    FfprobeEngine::new(MediaTime::from_secs_f64(
        config.composition.still_image_secs,
    ))
    .with_assets(assets)
}

/// Human-readable dump of a built composition.
pub fn print_result(result: &CompositionResult) {
    let summary = result.summary();
    println!("  Duration: {}", result.duration());
    println!(
        "  Tracks: {} ({} video, {} audio)",
        summary.tracks, summary.video_tracks, summary.audio_tracks
    );
    for track in result.timeline.tracks() {
        println!(
            "    {} {:<5} {}",
            track.id,
            track.media_type.to_string(),
            track.time_range()
        );
        for segment in &track.segments {
            println!(
                "       {} <- {} stream {} {}",
                segment.timeline_range,
                segment.media.source,
                segment.media.stream_index,
                segment.source_range
            );
        }
    }

    match &result.video_composition {
        Some(vc) => {
            println!(
                "  Video composition: {}x{} @ {}fps, {} instruction(s)",
                vc.render_width,
                vc.render_height,
                vc.frame_rate,
                vc.instructions.len()
            );
            for instruction in &vc.instructions {
                match instruction.background_color {
                    Some(color) => println!(
                        "    background {} {}@{:.2}",
                        instruction.time_range,
                        color.to_hex_rgb(),
                        color.alpha()
                    ),
                    None => {
                        let layers: Vec<String> = instruction
                            .layers
                            .iter()
                            .map(|l| l.track_id.to_string())
                            .collect();
                        println!(
                            "    layer      {} {}",
                            instruction.time_range,
                            layers.join(", ")
                        );
                    }
                }
            }
        }
        None => println!("  Video composition: none"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_list_infers_leaf_kinds() {
        let expr = load_expression(
            None,
            vec!["a.jpeg".into(), "b.mov".into()],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(
            expr,
            SourceExpression::merge(vec![
                SourceExpression::image_file("a.jpeg"),
                SourceExpression::video_file("b.mov"),
            ])
        );
    }

    #[test]
    fn test_nothing_to_compose() {
        assert!(load_expression(None, Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!(parse_preset("auto").unwrap(), PresetChoice::Auto);
        assert_eq!(parse_preset("reencode").unwrap(), PresetChoice::Reencode);
        assert!(parse_preset("fast").is_err());
    }

    #[test]
    fn test_parse_assets() {
        let registry = parse_assets(&["intro=/media/intro.mov".to_string()]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(parse_assets(&["intro".to_string()]).is_err());
    }
}
