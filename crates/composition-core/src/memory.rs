//! In-memory media engine.
//!
//! Serves track sets registered up front instead of reading files. Used by
//! the test suites and by `vcompose plan --manifest`, which only needs the
//! shape of a timeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use vcompose_common::error::{BuildError, BuildResult};
use vcompose_common::time::{MediaTime, TimeRange};
use vcompose_model::{MediaRef, MediaType, SourceRef, Track, TrackId, TrackSet};

use crate::engine::MediaEngine;

/// A media engine backed by a lookup table.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    sources: HashMap<SourceRef, TrackSet>,
    failures: HashMap<SourceRef, String>,
    opened: AtomicUsize,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tracks `source` resolves to.
    pub fn with_source(mut self, source: SourceRef, set: TrackSet) -> Self {
        self.register(source, set);
        self
    }

    /// Make opening `source` fail with `reason`.
    pub fn with_failure(mut self, source: SourceRef, reason: impl Into<String>) -> Self {
        self.failures.insert(source, reason.into());
        self
    }

    pub fn register(&mut self, source: SourceRef, set: TrackSet) {
        self.failures.remove(&source);
        self.sources.insert(source, set);
    }

    /// Number of `open_source` calls served so far.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl MediaEngine for InMemoryEngine {
    fn open_source(&self, source: &SourceRef) -> BuildResult<TrackSet> {
        self.opened.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self.failures.get(source) {
            return Err(BuildError::source_unavailable(source.to_string(), reason));
        }
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| BuildError::source_unavailable(source.to_string(), "not registered"))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Track set for `source` with one stream per `(media type, duration)` pair,
/// numbered by position. Every stream starts at 0.
pub fn fake_track_set(source: &SourceRef, streams: &[(MediaType, MediaTime)]) -> TrackSet {
    let tracks = streams
        .iter()
        .enumerate()
        .map(|(index, (media_type, duration))| {
            Track::from_media(
                TrackId(index as u32),
                *media_type,
                MediaRef::new(source.clone(), index as u32),
                TimeRange::from_zero(*duration),
            )
        })
        .collect();
    TrackSet::new(tracks)
}
