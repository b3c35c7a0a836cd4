//! Track types.
//!
//! A track is a typed media stream placed on a timeline. Its content is a
//! list of segments, each cut from one stream of a leaf source. Copying a
//! track into another timeline copies (and shifts) its segments, so
//! provenance always points at leaf media no matter how deep the tree is.

use std::fmt;

use serde::{Deserialize, Serialize};
use vcompose_common::time::{MediaTime, TimeRange};

use crate::expression::SourceRef;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Other,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Track identity, unique within one timeline or track set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returned by track allocation; names the destination of later insertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle {
    pub id: TrackId,
    pub media_type: MediaType,
}

/// One elementary stream of a leaf source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub source: SourceRef,
    pub stream_index: u32,
}

impl MediaRef {
    pub fn new(source: SourceRef, stream_index: u32) -> Self {
        Self {
            source,
            stream_index,
        }
    }
}

/// A piece of leaf media placed on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSegment {
    /// Where the samples come from.
    pub media: MediaRef,

    /// Span read from the leaf stream.
    pub source_range: TimeRange,

    /// Span occupied on the owning track; same duration as `source_range`.
    pub timeline_range: TimeRange,
}

impl TrackSegment {
    /// The same content placed `offset` later on the timeline.
    pub fn shifted(&self, offset: MediaTime) -> TrackSegment {
        TrackSegment {
            media: self.media.clone(),
            source_range: self.source_range,
            timeline_range: self.timeline_range.shifted(offset),
        }
    }
}

/// A typed media stream with a time range inside its owning timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub media_type: MediaType,
    #[serde(default)]
    pub segments: Vec<TrackSegment>,
}

impl Track {
    /// An empty track.
    pub fn new(id: TrackId, media_type: MediaType) -> Self {
        Self {
            id,
            media_type,
            segments: Vec::new(),
        }
    }

    /// A track holding `range` of one leaf stream, placed where it sits in the source.
    pub fn from_media(id: TrackId, media_type: MediaType, media: MediaRef, range: TimeRange) -> Self {
        Self {
            id,
            media_type,
            segments: vec![TrackSegment {
                media,
                source_range: range,
                timeline_range: range,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.timeline_range.is_empty())
    }

    /// `[earliest start, latest end)` over all segments; `[0, 0)` when empty.
    pub fn time_range(&self) -> TimeRange {
        let mut non_empty = self
            .segments
            .iter()
            .map(|s| s.timeline_range)
            .filter(|r| !r.is_empty());
        let Some(first) = non_empty.next() else {
            return TimeRange::EMPTY;
        };
        let (start, end) = non_empty.fold((first.start, first.end()), |(start, end), r| {
            (start.min(r.start), end.max(r.end()))
        });
        TimeRange::new(start, end.saturating_sub(start))
    }

    pub fn end(&self) -> MediaTime {
        self.time_range().end()
    }
}

/// The tracks a leaf source resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSet {
    pub tracks: Vec<Track>,
}

impl TrackSet {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// Latest end time across tracks.
    pub fn duration(&self) -> MediaTime {
        self.tracks
            .iter()
            .map(Track::end)
            .max()
            .unwrap_or(MediaTime::ZERO)
    }
}

impl<'a> IntoIterator for &'a TrackSet {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}
