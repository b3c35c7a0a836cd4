//! Source resolution: leaf expression to track set.

use vcompose_common::error::{BuildError, BuildResult};
use vcompose_model::{SourceExpression, TrackSet};

use crate::engine::MediaEngine;

/// Turns leaf expressions into track sets by asking the engine.
pub struct SourceResolver<'e, E: ?Sized> {
    engine: &'e E,
}

impl<'e, E: MediaEngine + ?Sized> SourceResolver<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Resolve a file or asset leaf.
    ///
    /// In-memory images are not supported yet and fail with
    /// `NotImplemented`; composite nodes are rejected because they have no
    /// tracks of their own.
    pub fn resolve(&self, leaf: &SourceExpression) -> BuildResult<TrackSet> {
        let kind = leaf.kind();
        if !kind.is_leaf() {
            return Err(BuildError::source_unavailable(
                kind.as_str(),
                "composite expressions have no tracks of their own",
            ));
        }

        let Some(source) = leaf.source_ref() else {
            return Err(BuildError::not_implemented(kind));
        };

        let set = self.engine.open_source(&source).map_err(|err| match err {
            BuildError::SourceUnavailable { .. } => err,
            other => BuildError::source_unavailable(source.to_string(), other.to_string()),
        })?;

        tracing::debug!(
            source = %source,
            engine = self.engine.name(),
            tracks = set.len(),
            duration_secs = set.duration().as_secs_f64(),
            "Resolved source"
        );
        if set.is_empty() {
            tracing::warn!(source = %source, "Source has no tracks; it will contribute nothing");
        }

        Ok(set)
    }
}
