//! The value every build step returns and the exporter consumes.

use serde::{Deserialize, Serialize};
use vcompose_common::time::MediaTime;

use crate::instruction::{AudioMix, TimelineInstruction, VideoComposition};
use crate::timeline::Timeline;

/// Timeline plus optional rendering and mixing descriptors.
///
/// Leaf and concat results carry neither; merge results carry a video
/// composition. Results are immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionResult {
    pub timeline: Timeline,
    pub video_composition: Option<VideoComposition>,
    pub audio_mix: Option<AudioMix>,
}

impl CompositionResult {
    /// A result with no instructions.
    pub fn from_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            video_composition: None,
            audio_mix: None,
        }
    }

    pub fn duration(&self) -> MediaTime {
        self.timeline.duration()
    }

    pub fn instructions(&self) -> Option<&[TimelineInstruction]> {
        self.video_composition
            .as_ref()
            .map(|vc| vc.instructions.as_slice())
    }

    /// Whether rendering needs more than copying samples through.
    pub fn needs_compositing(&self) -> bool {
        self.video_composition.is_some() || self.audio_mix.is_some()
    }

    pub fn summary(&self) -> CompositionSummary {
        let instructions = self.instructions().unwrap_or_default();
        CompositionSummary {
            duration_secs: self.duration().as_secs_f64(),
            tracks: self.timeline.track_count(),
            video_tracks: self.timeline.video_tracks().count(),
            audio_tracks: self.timeline.audio_tracks().count(),
            instructions: instructions.len(),
            background_instructions: instructions.iter().filter(|i| i.is_background()).count(),
            has_audio_mix: self.audio_mix.is_some(),
        }
    }
}

/// Counts used for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSummary {
    pub duration_secs: f64,
    pub tracks: usize,
    pub video_tracks: usize,
    pub audio_tracks: usize,
    pub instructions: usize,
    pub background_instructions: usize,
    pub has_audio_mix: bool,
}
