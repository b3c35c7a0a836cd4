//! Source probing with ffprobe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use vcompose_common::error::{BuildError, BuildResult};
use vcompose_common::time::{MediaTime, TimeRange};
use vcompose_core::engine::MediaEngine;
use vcompose_model::{AssetId, MediaRef, MediaType, SourceRef, Track, TrackId, TrackSet};

/// Maps asset handles to the files backing them.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<AssetId, PathBuf>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: AssetId, path: impl Into<PathBuf>) {
        self.assets.insert(id, path.into());
    }

    pub fn resolve(&self, id: &AssetId) -> Option<&Path> {
        self.assets.get(id).map(PathBuf::as_path)
    }

    /// Path backing any source reference.
    pub fn path_of<'a>(&'a self, source: &'a SourceRef) -> Option<&'a Path> {
        match source {
            SourceRef::Asset(id) => self.resolve(id),
            other => other.path(),
        }
    }

    /// Parse `id=path` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        let mut registry = Self::new();
        for pair in pairs {
            let (id, path) = pair
                .split_once('=')
                .filter(|(id, path)| !id.is_empty() && !path.is_empty())
                .ok_or_else(|| format!("invalid asset mapping '{pair}', expected id=path"))?;
            registry.register(AssetId::new(id), path);
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("file not found")]
    Missing,

    #[error("failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ffprobe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unreadable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Subset of `ffprobe -of json` output we rely on.
#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// A media engine that reads track layouts with ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeEngine {
    binary: String,
    still_duration: MediaTime,
    assets: AssetRegistry,
}

impl FfprobeEngine {
    pub fn new(still_duration: MediaTime) -> Self {
        Self {
            binary: "ffprobe".to_string(),
            still_duration,
            assets: AssetRegistry::new(),
        }
    }

    pub fn with_assets(mut self, assets: AssetRegistry) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    fn run_probe(&self, path: &Path) -> Result<ProbeOutput, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::Missing);
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-show_streams",
                "-show_format",
                "-of",
                "json",
            ])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl MediaEngine for FfprobeEngine {
    fn open_source(&self, source: &SourceRef) -> BuildResult<TrackSet> {
        let path = self.assets.path_of(source).ok_or_else(|| {
            BuildError::source_unavailable(source.to_string(), "asset is not registered")
        })?;

        let probe = self
            .run_probe(path)
            .map_err(|e| BuildError::source_unavailable(source.to_string(), e.to_string()))?;

        Ok(track_set_from_probe(source, &probe, self.still_duration))
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

/// Turn probe output into tracks. Cover art is skipped; still images and
/// streams without any duration get `still_duration`.
fn track_set_from_probe(
    source: &SourceRef,
    probe: &ProbeOutput,
    still_duration: MediaTime,
) -> TrackSet {
    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| parse_secs(f.duration.as_deref()));

    let tracks = probe
        .streams
        .iter()
        .filter(|s| s.disposition.get("attached_pic").copied().unwrap_or(0) == 0)
        .map(|stream| {
            let media_type = match stream.codec_type.as_deref() {
                Some("video") => MediaType::Video,
                Some("audio") => MediaType::Audio,
                _ => MediaType::Other,
            };
            let duration = if source.is_still() {
                still_duration
            } else {
                parse_secs(stream.duration.as_deref())
                    .or(format_duration)
                    .unwrap_or(still_duration)
            };
            Track::from_media(
                TrackId(stream.index),
                media_type,
                MediaRef::new(source.clone(), stream.index),
                TimeRange::from_zero(duration),
            )
        })
        .collect();

    TrackSet::new(tracks)
}

fn parse_secs(raw: Option<&str>) -> Option<MediaTime> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(MediaTime::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "duration": "10.000000", "disposition": {"default": 1, "attached_pic": 0}},
            {"index": 1, "codec_type": "audio", "duration": "9.980000"},
            {"index": 2, "codec_type": "data"},
            {"index": 3, "codec_type": "video", "disposition": {"attached_pic": 1}}
        ],
        "format": {"duration": "10.020000"}
    }"#;

    const IMAGE_PROBE: &str = r#"{
        "streams": [{"index": 0, "codec_type": "video"}],
        "format": {"duration": "0.040000"}
    }"#;

    #[test]
    fn test_video_probe_maps_streams() {
        let probe: ProbeOutput = serde_json::from_str(VIDEO_PROBE).unwrap();
        let source = SourceRef::VideoFile("clip.mov".into());
        let set = track_set_from_probe(&source, &probe, MediaTime::from_secs(3));

        assert_eq!(set.len(), 3);
        assert_eq!(set.tracks[0].media_type, MediaType::Video);
        assert_eq!(set.tracks[1].media_type, MediaType::Audio);
        assert_eq!(set.tracks[2].media_type, MediaType::Other);
        assert_eq!(set.tracks[0].end(), MediaTime::from_secs(10));
        assert_eq!(set.tracks[1].end(), MediaTime::from_millis(9_980));
        // Data stream falls back to the container duration.
        assert_eq!(set.tracks[2].end(), MediaTime::from_millis(10_020));
        assert_eq!(set.tracks[1].segments[0].media.stream_index, 1);
    }

    #[test]
    fn test_image_probe_uses_still_duration() {
        let probe: ProbeOutput = serde_json::from_str(IMAGE_PROBE).unwrap();
        let source = SourceRef::ImageFile("photo.jpeg".into());
        let set = track_set_from_probe(&source, &probe, MediaTime::from_secs(3));

        assert_eq!(set.len(), 1);
        assert_eq!(set.duration(), MediaTime::from_secs(3));
    }

    #[test]
    fn test_streamless_file_is_empty_set() {
        let probe: ProbeOutput = serde_json::from_str(r#"{"format": {}}"#).unwrap();
        let source = SourceRef::VideoFile("empty.mov".into());
        let set = track_set_from_probe(&source, &probe, MediaTime::from_secs(3));
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let engine = FfprobeEngine::new(MediaTime::from_secs(3));
        let err = engine
            .open_source(&SourceRef::VideoFile("/nonexistent/clip.mov".into()))
            .unwrap_err();
        match err {
            BuildError::SourceUnavailable { reason, .. } => assert_eq!(reason, "file not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_asset_is_unavailable() {
        let engine = FfprobeEngine::new(MediaTime::from_secs(3));
        let err = engine
            .open_source(&SourceRef::Asset(AssetId::new("nope")))
            .unwrap_err();
        assert!(matches!(err, BuildError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_asset_registry_pairs() {
        let registry = AssetRegistry::from_pairs(["intro=/media/intro.mov"]).unwrap();
        assert_eq!(
            registry.resolve(&AssetId::new("intro")),
            Some(Path::new("/media/intro.mov"))
        );
        assert!(AssetRegistry::from_pairs(["broken"]).is_err());
        assert!(AssetRegistry::from_pairs(["=x"]).is_err());
    }
}
