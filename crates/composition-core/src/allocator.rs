//! Destination track allocation.

use vcompose_common::error::BuildResult;
use vcompose_model::{MediaType, Timeline, TrackHandle};

/// Create an empty track of `media_type` in `timeline`.
pub fn allocate(timeline: &mut Timeline, media_type: MediaType) -> BuildResult<TrackHandle> {
    let handle = timeline.add_track(media_type)?;
    tracing::debug!(track = %handle.id, media_type = %media_type, "Allocated track");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_matching_type_in_order() {
        let mut timeline = Timeline::new();
        let video = allocate(&mut timeline, MediaType::Video).unwrap();
        let audio = allocate(&mut timeline, MediaType::Audio).unwrap();

        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(audio.media_type, MediaType::Audio);
        assert_eq!(timeline.tracks()[0].id, video.id);
        assert_eq!(timeline.tracks()[1].id, audio.id);
        assert!(timeline.tracks().iter().all(|t| t.segments.is_empty()));
    }
}
