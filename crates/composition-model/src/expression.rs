//! Source expressions: the recursive description of what to compose.
//!
//! Leaves name media (files, in-memory images, pre-resolved assets);
//! `merge` overlays its children on a shared time axis and `concat`
//! plays them one after another.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vcompose_common::error::{ComposeError, ComposeResult};

/// File extensions treated as still images by [`SourceExpression::from_path`].
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "gif", "bmp", "tif", "tiff", "webp",
];

/// Opaque identifier of an already-resolved external asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node of the input tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceExpression {
    /// Still image loaded from disk.
    ImageFile { path: PathBuf },

    /// Video file loaded from disk.
    VideoFile { path: PathBuf },

    /// Encoded image bytes held in memory.
    InMemoryImage { data: Vec<u8> },

    /// An asset the media engine already knows about.
    Asset { id: AssetId },

    /// Overlay composition: children share the time axis starting at 0.
    Merge { children: Vec<SourceExpression> },

    /// Sequential composition: children are placed back to back.
    Concat { children: Vec<SourceExpression> },
}

/// The closed set of expression node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    ImageFile,
    VideoFile,
    InMemoryImage,
    Asset,
    Merge,
    Concat,
}

impl ExpressionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionKind::ImageFile => "image_file",
            ExpressionKind::VideoFile => "video_file",
            ExpressionKind::InMemoryImage => "in_memory_image",
            ExpressionKind::Asset => "asset",
            ExpressionKind::Merge => "merge",
            ExpressionKind::Concat => "concat",
        }
    }

    pub fn is_leaf(self) -> bool {
        !matches!(self, ExpressionKind::Merge | ExpressionKind::Concat)
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SourceExpression {
    pub fn image_file(path: impl Into<PathBuf>) -> Self {
        Self::ImageFile { path: path.into() }
    }

    pub fn video_file(path: impl Into<PathBuf>) -> Self {
        Self::VideoFile { path: path.into() }
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Self::Asset {
            id: AssetId::new(id),
        }
    }

    pub fn merge(children: Vec<SourceExpression>) -> Self {
        Self::Merge { children }
    }

    pub fn concat(children: Vec<SourceExpression>) -> Self {
        Self::Concat { children }
    }

    /// File leaf whose kind is inferred from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if is_image_path(&path) {
            Self::ImageFile { path }
        } else {
            Self::VideoFile { path }
        }
    }

    /// Parse an expression tree from a JSON file.
    pub fn from_json_file(path: &Path) -> ComposeResult<Self> {
        if !path.exists() {
            return Err(ComposeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn kind(&self) -> ExpressionKind {
        match self {
            SourceExpression::ImageFile { .. } => ExpressionKind::ImageFile,
            SourceExpression::VideoFile { .. } => ExpressionKind::VideoFile,
            SourceExpression::InMemoryImage { .. } => ExpressionKind::InMemoryImage,
            SourceExpression::Asset { .. } => ExpressionKind::Asset,
            SourceExpression::Merge { .. } => ExpressionKind::Merge,
            SourceExpression::Concat { .. } => ExpressionKind::Concat,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind().is_leaf()
    }

    /// Direct children; empty for leaves.
    pub fn children(&self) -> &[SourceExpression] {
        match self {
            SourceExpression::Merge { children } | SourceExpression::Concat { children } => {
                children
            }
            _ => &[],
        }
    }

    /// What this leaf points at, if it refers to external media.
    pub fn source_ref(&self) -> Option<SourceRef> {
        match self {
            SourceExpression::ImageFile { path } => Some(SourceRef::ImageFile(path.clone())),
            SourceExpression::VideoFile { path } => Some(SourceRef::VideoFile(path.clone())),
            SourceExpression::Asset { id } => Some(SourceRef::Asset(id.clone())),
            _ => None,
        }
    }

    /// Height of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(SourceExpression::depth)
            .max()
            .unwrap_or(0)
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().iter().map(SourceExpression::leaf_count).sum()
        }
    }
}

/// A leaf's reference to external media, kept as provenance on every segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum SourceRef {
    ImageFile(PathBuf),
    VideoFile(PathBuf),
    Asset(AssetId),
}

impl SourceRef {
    /// Whether frames come from a single still picture.
    pub fn is_still(&self) -> bool {
        matches!(self, SourceRef::ImageFile(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceRef::ImageFile(path) | SourceRef::VideoFile(path) => Some(path),
            SourceRef::Asset(_) => None,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::ImageFile(path) => write!(f, "image:{}", path.display()),
            SourceRef::VideoFile(path) => write!(f, "video:{}", path.display()),
            SourceRef::Asset(id) => write!(f, "asset:{id}"),
        }
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_infers_kind() {
        assert_eq!(
            SourceExpression::from_path("IMG_8731.JPEG").kind(),
            ExpressionKind::ImageFile
        );
        assert_eq!(
            SourceExpression::from_path("IMG_8730.MOV").kind(),
            ExpressionKind::VideoFile
        );
        assert_eq!(
            SourceExpression::from_path("no_extension").kind(),
            ExpressionKind::VideoFile
        );
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "type": "merge",
            "children": [
                {"type": "image_file", "path": "a.jpeg"},
                {"type": "concat", "children": [{"type": "asset", "id": "clip-1"}]}
            ]
        }"#;
        let expr: SourceExpression = serde_json::from_str(json).unwrap();
        assert_eq!(expr.kind(), ExpressionKind::Merge);
        assert_eq!(expr.children().len(), 2);
        assert_eq!(expr.depth(), 3);
        assert_eq!(expr.leaf_count(), 2);
        assert_eq!(
            expr.children()[1].children()[0],
            SourceExpression::asset("clip-1")
        );
    }

    #[test]
    fn test_source_ref_only_for_external_leaves() {
        assert!(SourceExpression::image_file("a.png").source_ref().is_some());
        assert!(SourceExpression::InMemoryImage { data: vec![0xff] }
            .source_ref()
            .is_none());
        assert!(SourceExpression::merge(vec![]).source_ref().is_none());
        assert!(SourceRef::ImageFile("a.png".into()).is_still());
        assert!(!SourceRef::Asset(AssetId::new("x")).is_still());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ExpressionKind::InMemoryImage.to_string(), "in_memory_image");
        assert_eq!(ExpressionKind::Concat.to_string(), "concat");
        assert!(!ExpressionKind::Merge.is_leaf());
        assert!(ExpressionKind::Asset.is_leaf());
    }
}
