//! Compositing instructions for overlay timelines.

use serde::{Deserialize, Serialize};
use vcompose_common::time::{MediaTime, TimeRange};

use crate::track::TrackId;

/// RGBA color with components in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB` form with the alpha reported separately.
    pub fn to_hex_rgb(&self) -> String {
        format!(
            "0x{:02X}{:02X}{:02X}",
            channel_byte(self.r),
            channel_byte(self.g),
            channel_byte(self.b)
        )
    }

    pub fn alpha(&self) -> f32 {
        self.a.clamp(0.0, 1.0)
    }
}

impl From<[f32; 4]> for Rgba {
    fn from(c: [f32; 4]) -> Self {
        Rgba::new(c[0], c[1], c[2], c[3])
    }
}

fn channel_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Directs the renderer to composite one video track over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInstruction {
    pub track_id: TrackId,
    pub time_range: TimeRange,
}

/// A time range, its layers (first = topmost), and a fallback fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineInstruction {
    pub time_range: TimeRange,
    #[serde(default)]
    pub layers: Vec<LayerInstruction>,
    #[serde(default)]
    pub background_color: Option<Rgba>,
}

impl TimelineInstruction {
    /// Layer-free fill spanning `[0, duration)`.
    pub fn background(duration: MediaTime, color: Rgba) -> Self {
        Self {
            time_range: TimeRange::from_zero(duration),
            layers: Vec::new(),
            background_color: Some(color),
        }
    }

    /// One layer showing `track_id` over `range`.
    pub fn single_layer(track_id: TrackId, range: TimeRange) -> Self {
        Self {
            time_range: range,
            layers: vec![LayerInstruction {
                track_id,
                time_range: range,
            }],
            background_color: None,
        }
    }

    pub fn is_background(&self) -> bool {
        self.layers.is_empty() && self.background_color.is_some()
    }
}

/// Instructions plus render settings for an overlay composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoComposition {
    pub instructions: Vec<TimelineInstruction>,
    pub render_width: u32,
    pub render_height: u32,
    pub frame_rate: u32,
}

impl VideoComposition {
    pub fn background(&self) -> Option<&TimelineInstruction> {
        self.instructions.iter().find(|i| i.is_background())
    }

    /// Layered instructions in emission order.
    pub fn layers(&self) -> impl Iterator<Item = &TimelineInstruction> {
        self.instructions.iter().filter(|i| !i.is_background())
    }
}

/// Per-track audio levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMix {
    pub inputs: Vec<AudioMixInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMixInput {
    pub track_id: TrackId,
    pub volume: f32,
}
