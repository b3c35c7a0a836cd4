//! The destination timeline being assembled by a build step.
//!
//! A timeline starts empty, gains tracks through [`Timeline::add_track`],
//! receives content through [`Timeline::insert_segments`], and is never
//! mutated again once it has been handed to an enclosing step.

use serde::{Deserialize, Serialize};
use vcompose_common::error::{BuildError, BuildResult};
use vcompose_common::time::MediaTime;

use crate::track::{MediaRef, MediaType, Track, TrackHandle, TrackId, TrackSegment};

/// Ordered, mutable collection of tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    tracks: Vec<Track>,
    next_track_id: u32,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            next_track_id: 1,
        }
    }

    /// Append an empty track of `media_type`.
    pub fn add_track(&mut self, media_type: MediaType) -> BuildResult<TrackHandle> {
        let raw = self.next_track_id.max(1);
        let next = raw
            .checked_add(1)
            .ok_or_else(|| BuildError::insertion_failed("track identity space exhausted"))?;
        let id = TrackId(raw);
        self.next_track_id = next;
        self.tracks.push(Track::new(id, media_type));
        Ok(TrackHandle { id, media_type })
    }

    /// Place `segments` on the track named by `handle`.
    ///
    /// Fails without modifying the timeline if the handle is stale, its media
    /// type disagrees with the track, a segment's timeline and source spans
    /// differ in length, or the new content overlaps content already on the
    /// track.
    pub fn insert_segments(
        &mut self,
        handle: TrackHandle,
        segments: impl IntoIterator<Item = TrackSegment>,
    ) -> BuildResult<()> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.id == handle.id)
            .ok_or_else(|| {
                BuildError::insertion_failed(format!("no track {} in timeline", handle.id))
            })?;

        if track.media_type != handle.media_type {
            return Err(BuildError::insertion_failed(format!(
                "track {} holds {} but handle expects {}",
                track.id, track.media_type, handle.media_type
            )));
        }

        let incoming: Vec<TrackSegment> = segments.into_iter().collect();
        for (i, segment) in incoming.iter().enumerate() {
            if segment.timeline_range.duration != segment.source_range.duration {
                return Err(BuildError::insertion_failed(format!(
                    "segment spans {} on the timeline but reads {} from the source",
                    segment.timeline_range, segment.source_range
                )));
            }
            if segment.timeline_range.checked_end().is_none() {
                return Err(BuildError::insertion_failed(format!(
                    "segment at {} overflows the timeline",
                    segment.timeline_range.start
                )));
            }
            let clashes = track
                .segments
                .iter()
                .chain(&incoming[..i])
                .any(|existing| overlaps(existing, segment));
            if clashes {
                return Err(BuildError::insertion_failed(format!(
                    "segment {} overlaps existing content on track {}",
                    segment.timeline_range, track.id
                )));
            }
        }

        track.segments.extend(incoming);
        Ok(())
    }

    /// Maximum end time over all tracks.
    pub fn duration(&self) -> MediaTime {
        self.tracks
            .iter()
            .map(Track::end)
            .max()
            .unwrap_or(MediaTime::ZERO)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks_of(&self, media_type: MediaType) -> impl Iterator<Item = &Track> {
        self.tracks
            .iter()
            .filter(move |t| t.media_type == media_type)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks_of(MediaType::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks_of(MediaType::Audio)
    }

    /// Distinct leaf streams referenced by any segment, in first-use order.
    pub fn referenced_media(&self) -> Vec<&MediaRef> {
        let mut seen: Vec<&MediaRef> = Vec::new();
        for segment in self.tracks.iter().flat_map(|t| &t.segments) {
            if !seen.contains(&&segment.media) {
                seen.push(&segment.media);
            }
        }
        seen
    }
}

fn overlaps(a: &TrackSegment, b: &TrackSegment) -> bool {
    let (a, b) = (a.timeline_range, b.timeline_range);
    !a.is_empty() && !b.is_empty() && a.start < b.end() && b.start < a.end()
}
