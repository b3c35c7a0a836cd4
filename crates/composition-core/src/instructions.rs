//! Overlay instruction generation.

use vcompose_common::time::MediaTime;
use vcompose_model::{MediaType, Rgba, TimelineInstruction, Track};

/// Build the instruction list for an overlay timeline.
///
/// The first entry is a layer-free background spanning `[0, total)` filled
/// with `background`; it only shows where no layer covers a moment. It is
/// followed by one single-layer instruction per video track, in the order
/// the tracks are given. Non-video tracks are ignored.
pub fn generate_overlay_instructions<'a>(
    tracks: impl IntoIterator<Item = &'a Track>,
    total: MediaTime,
    background: Rgba,
) -> Vec<TimelineInstruction> {
    let mut instructions = vec![TimelineInstruction::background(total, background)];

    for track in tracks {
        if track.media_type != MediaType::Video {
            continue;
        }
        let instruction = TimelineInstruction::single_layer(track.id, track.time_range());
        tracing::debug!(
            track = %track.id,
            range = %instruction.time_range,
            "Added layer instruction"
        );
        instructions.push(instruction);
    }

    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcompose_common::time::TimeRange;
    use vcompose_model::{MediaRef, SourceRef, TrackId};

    fn track(id: u32, media_type: MediaType, secs: u64) -> Track {
        Track::from_media(
            TrackId(id),
            media_type,
            MediaRef::new(SourceRef::VideoFile("clip.mov".into()), id),
            TimeRange::from_zero(MediaTime::from_secs(secs)),
        )
    }

    #[test]
    fn test_background_first_then_video_layers() {
        let tracks = [
            track(1, MediaType::Video, 3),
            track(2, MediaType::Video, 10),
            track(3, MediaType::Audio, 10),
        ];
        let color = Rgba::new(1.0, 0.5, 0.0, 0.5);
        let instructions =
            generate_overlay_instructions(&tracks, MediaTime::from_secs(10), color);

        assert_eq!(instructions.len(), 3);
        assert!(instructions[0].is_background());
        assert_eq!(instructions[0].background_color, Some(color));
        assert_eq!(
            instructions[0].time_range,
            TimeRange::from_zero(MediaTime::from_secs(10))
        );

        assert_eq!(instructions[1].layers.len(), 1);
        assert_eq!(instructions[1].layers[0].track_id, TrackId(1));
        assert_eq!(instructions[1].time_range.end(), MediaTime::from_secs(3));
        assert_eq!(instructions[2].layers[0].track_id, TrackId(2));
        assert_eq!(instructions[2].time_range.end(), MediaTime::from_secs(10));
    }

    #[test]
    fn test_no_tracks_still_yields_background() {
        let instructions =
            generate_overlay_instructions(std::iter::empty(), MediaTime::ZERO, Rgba::BLACK);
        assert_eq!(instructions.len(), 1);
        assert!(instructions[0].is_background());
        assert!(instructions[0].time_range.is_empty());
    }
}
