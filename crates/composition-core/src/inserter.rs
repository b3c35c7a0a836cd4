//! Timeline insertion and offset policy.

use vcompose_common::error::{BuildError, BuildResult};
use vcompose_common::time::MediaTime;
use vcompose_model::{Timeline, Track, TrackHandle};

/// Copy the content of `source` onto the destination track at `at`.
///
/// The source keeps its internal layout: a segment that started at `t` in
/// the source lands at `at + t`. Fails with `InsertionFailed` when the media
/// types differ or the source has nothing to copy.
pub fn insert(
    timeline: &mut Timeline,
    handle: TrackHandle,
    source: &Track,
    at: MediaTime,
) -> BuildResult<()> {
    if source.media_type != handle.media_type {
        return Err(BuildError::insertion_failed(format!(
            "cannot place {} track {} on {} track {}",
            source.media_type, source.id, handle.media_type, handle.id
        )));
    }

    let range = source.time_range();
    if range.is_empty() {
        return Err(BuildError::insertion_failed(format!(
            "source track {} has zero duration",
            source.id
        )));
    }

    let segments = source
        .segments
        .iter()
        .filter(|s| !s.timeline_range.is_empty())
        .map(|s| s.shifted(at));
    timeline.insert_segments(handle, segments)?;

    tracing::debug!(
        source = %source.id,
        track = %handle.id,
        at_secs = at.as_secs_f64(),
        range = %range.shifted(at),
        "Inserted track content"
    );
    Ok(())
}

/// Where the next child of a composite node is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Every child starts at 0.
    Overlay,
    /// Children follow each other; `cursor` is the sum of prior durations.
    Sequential { cursor: MediaTime },
}

impl Placement {
    pub fn overlay() -> Self {
        Placement::Overlay
    }

    pub fn sequential() -> Self {
        Placement::Sequential {
            cursor: MediaTime::ZERO,
        }
    }

    /// Offset for the next child.
    pub fn offset(&self) -> MediaTime {
        match self {
            Placement::Overlay => MediaTime::ZERO,
            Placement::Sequential { cursor } => *cursor,
        }
    }

    /// Account for a child that has just been placed.
    pub fn advance(&mut self, child_duration: MediaTime) -> BuildResult<()> {
        if let Placement::Sequential { cursor } = self {
            *cursor = cursor.checked_add(child_duration).ok_or_else(|| {
                BuildError::insertion_failed("sequential placement overflowed the timeline")
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::allocate;
    use vcompose_common::time::TimeRange;
    use vcompose_model::{MediaRef, MediaType, SourceRef, TrackId};

    fn source_track(media_type: MediaType, secs: u64) -> Track {
        Track::from_media(
            TrackId(0),
            media_type,
            MediaRef::new(SourceRef::VideoFile("clip.mov".into()), 0),
            TimeRange::from_zero(MediaTime::from_secs(secs)),
        )
    }

    #[test]
    fn test_insert_at_offset() {
        let mut timeline = Timeline::new();
        let handle = allocate(&mut timeline, MediaType::Video).unwrap();
        insert(
            &mut timeline,
            handle,
            &source_track(MediaType::Video, 4),
            MediaTime::from_secs(6),
        )
        .unwrap();

        let range = timeline.track(handle.id).unwrap().time_range();
        assert_eq!(range.start, MediaTime::from_secs(6));
        assert_eq!(range.end(), MediaTime::from_secs(10));
        assert_eq!(timeline.duration(), MediaTime::from_secs(10));
    }

    #[test]
    fn test_insert_rejects_media_type_mismatch() {
        let mut timeline = Timeline::new();
        let handle = allocate(&mut timeline, MediaType::Audio).unwrap();
        let err = insert(
            &mut timeline,
            handle,
            &source_track(MediaType::Video, 4),
            MediaTime::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InsertionFailed { .. }));
    }

    #[test]
    fn test_insert_rejects_zero_duration() {
        let mut timeline = Timeline::new();
        let handle = allocate(&mut timeline, MediaType::Video).unwrap();
        let err = insert(
            &mut timeline,
            handle,
            &source_track(MediaType::Video, 0),
            MediaTime::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InsertionFailed { .. }));
        assert_eq!(timeline.duration(), MediaTime::ZERO);
    }

    #[test]
    fn test_overlay_placement_stays_at_zero() {
        let mut placement = Placement::overlay();
        placement.advance(MediaTime::from_secs(5)).unwrap();
        assert_eq!(placement.offset(), MediaTime::ZERO);
    }

    #[test]
    fn test_sequential_placement_accumulates() {
        let mut placement = Placement::sequential();
        assert_eq!(placement.offset(), MediaTime::ZERO);
        placement.advance(MediaTime::from_secs(3)).unwrap();
        placement.advance(MediaTime::ZERO).unwrap();
        placement.advance(MediaTime::from_secs(10)).unwrap();
        assert_eq!(placement.offset(), MediaTime::from_secs(13));
    }

    #[test]
    fn test_sequential_placement_overflow() {
        let mut placement = Placement::Sequential {
            cursor: MediaTime::from_nanos(u64::MAX),
        };
        assert!(placement.advance(MediaTime::from_nanos(1)).is_err());
    }
}
