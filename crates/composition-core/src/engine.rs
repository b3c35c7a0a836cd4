//! The capability interface the compiler needs from a media engine.

use vcompose_common::error::BuildResult;
use vcompose_model::{SourceRef, Timeline, TrackSet};

/// Abstract interface over the engine that knows how to open media.
///
/// Implementations may block on storage while reading metadata. They must
/// not retain any state between calls that would make two builds of the
/// same expression diverge.
pub trait MediaEngine {
    /// Query the tracks of a leaf source.
    ///
    /// A readable source with no decodable tracks is an empty set, not an
    /// error; `SourceUnavailable` is reserved for sources the engine cannot
    /// open at all.
    fn open_source(&self, source: &SourceRef) -> BuildResult<TrackSet>;

    /// A fresh destination timeline.
    fn new_timeline(&self) -> Timeline {
        Timeline::new()
    }

    /// Engine name for logs.
    fn name(&self) -> &str {
        "media-engine"
    }
}

impl<E: MediaEngine + ?Sized> MediaEngine for &E {
    fn open_source(&self, source: &SourceRef) -> BuildResult<TrackSet> {
        (**self).open_source(source)
    }

    fn new_timeline(&self) -> Timeline {
        (**self).new_timeline()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn open_source(&self, source: &SourceRef) -> BuildResult<TrackSet> {
        (**self).open_source(source)
    }

    fn new_timeline(&self) -> Timeline {
        (**self).new_timeline()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
