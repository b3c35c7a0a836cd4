//! The composition builder: recursive dispatch over the expression tree.

use vcompose_common::config::CompositionDefaults;
use vcompose_common::error::{BuildError, BuildResult};
use vcompose_common::time::MediaTime;
use vcompose_model::{
    CompositionResult, ExpressionKind, Rgba, SourceExpression, Timeline, Track, VideoComposition,
};

use crate::allocator::allocate;
use crate::engine::MediaEngine;
use crate::inserter::{insert, Placement};
use crate::instructions::generate_overlay_instructions;
use crate::resolver::SourceResolver;

/// Settings applied to every build step.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Fill shown where no overlay layer covers a moment.
    pub background_color: Rgba,

    /// Render canvas of overlay compositions.
    pub render_width: u32,
    pub render_height: u32,

    /// Frame rate of overlay compositions.
    pub frame_rate: u32,

    /// Place concat children back to back. When off, concat nodes fail
    /// with `NotImplemented`.
    pub sequential_concat: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&CompositionDefaults::default())
    }
}

impl From<&CompositionDefaults> for BuildOptions {
    fn from(defaults: &CompositionDefaults) -> Self {
        Self {
            background_color: Rgba::from(defaults.background_rgba),
            render_width: defaults.render_width,
            render_height: defaults.render_height,
            frame_rate: defaults.frame_rate.max(1),
            sequential_concat: defaults.sequential_concat,
        }
    }
}

/// Compiles source expressions into composition results.
///
/// Each call to [`build`](Self::build) starts from scratch: every step owns
/// a private timeline, child results are only read, and nothing is cached
/// between calls.
pub struct CompositionBuilder<E> {
    engine: E,
    options: BuildOptions,
}

impl<E: MediaEngine> CompositionBuilder<E> {
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, BuildOptions::default())
    }

    pub fn with_options(engine: E, options: BuildOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Compile `expr` into a timeline and, for overlays, its instructions.
    ///
    /// Fails fast: the first error anywhere in the tree aborts the build and
    /// no partial timeline is returned.
    pub fn build(&self, expr: &SourceExpression) -> BuildResult<CompositionResult> {
        tracing::info!(
            kind = %expr.kind(),
            leaves = expr.leaf_count(),
            depth = expr.depth(),
            engine = self.engine.name(),
            "Building composition"
        );

        let result = self.build_node(expr)?;

        tracing::info!(
            tracks = result.timeline.track_count(),
            duration_secs = result.duration().as_secs_f64(),
            instructions = result.instructions().map_or(0, <[_]>::len),
            "Composition built"
        );
        Ok(result)
    }

    fn build_node(&self, expr: &SourceExpression) -> BuildResult<CompositionResult> {
        match expr {
            SourceExpression::ImageFile { .. }
            | SourceExpression::VideoFile { .. }
            | SourceExpression::Asset { .. } => self.build_leaf(expr),
            SourceExpression::InMemoryImage { .. } => {
                Err(BuildError::not_implemented(ExpressionKind::InMemoryImage))
            }
            SourceExpression::Merge { children } => {
                let results = self.build_children(children)?;
                self.build_merge(&results)
            }
            SourceExpression::Concat { children } => {
                if !self.options.sequential_concat {
                    return Err(BuildError::not_implemented(ExpressionKind::Concat));
                }
                let results = self.build_children(children)?;
                self.build_concat(&results)
            }
        }
    }

    fn build_children(&self, children: &[SourceExpression]) -> BuildResult<Vec<CompositionResult>> {
        children.iter().map(|child| self.build_node(child)).collect()
    }

    fn build_leaf(&self, leaf: &SourceExpression) -> BuildResult<CompositionResult> {
        let set = SourceResolver::new(&self.engine).resolve(leaf)?;

        let mut timeline = self.engine.new_timeline();
        place_tracks(&mut timeline, set.iter(), MediaTime::ZERO)?;

        Ok(CompositionResult::from_timeline(timeline))
    }

    fn build_merge(&self, children: &[CompositionResult]) -> BuildResult<CompositionResult> {
        let mut timeline = self.engine.new_timeline();
        let placement = Placement::overlay();

        for child in children {
            place_tracks(&mut timeline, child.timeline.tracks(), placement.offset())?;
        }

        let duration = timeline.duration();
        let instructions = generate_overlay_instructions(
            timeline.video_tracks(),
            duration,
            self.options.background_color,
        );
        tracing::debug!(
            children = children.len(),
            tracks = timeline.track_count(),
            instructions = instructions.len(),
            duration_secs = duration.as_secs_f64(),
            "Merged children"
        );

        Ok(CompositionResult {
            timeline,
            video_composition: Some(VideoComposition {
                instructions,
                render_width: self.options.render_width,
                render_height: self.options.render_height,
                frame_rate: self.options.frame_rate,
            }),
            audio_mix: None,
        })
    }

    fn build_concat(&self, children: &[CompositionResult]) -> BuildResult<CompositionResult> {
        let mut timeline = self.engine.new_timeline();
        let mut placement = Placement::sequential();

        for child in children {
            if child.timeline.is_empty() {
                continue;
            }
            place_tracks(&mut timeline, child.timeline.tracks(), placement.offset())?;
            placement.advance(child.duration())?;
        }

        tracing::debug!(
            children = children.len(),
            tracks = timeline.track_count(),
            duration_secs = timeline.duration().as_secs_f64(),
            "Concatenated children"
        );
        Ok(CompositionResult::from_timeline(timeline))
    }
}

/// Give every source track a destination track and copy its content at `at`.
///
/// Empty source tracks still get a destination track but nothing is inserted.
fn place_tracks<'a>(
    timeline: &mut Timeline,
    tracks: impl IntoIterator<Item = &'a Track>,
    at: MediaTime,
) -> BuildResult<()> {
    for track in tracks {
        let handle = allocate(timeline, track.media_type)?;
        if !track.is_empty() {
            insert(timeline, handle, track, at)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{fake_track_set, InMemoryEngine};
    use vcompose_model::{MediaType, SourceRef, TrackSet};

    fn secs(s: u64) -> MediaTime {
        MediaTime::from_secs(s)
    }

    fn engine() -> InMemoryEngine {
        let image = SourceRef::ImageFile("photo.jpeg".into());
        let video = SourceRef::VideoFile("clip.mov".into());
        InMemoryEngine::new()
            .with_source(
                image.clone(),
                fake_track_set(&image, &[(MediaType::Video, secs(3))]),
            )
            .with_source(
                video.clone(),
                fake_track_set(
                    &video,
                    &[(MediaType::Video, secs(10)), (MediaType::Audio, secs(10))],
                ),
            )
            .with_source(SourceRef::VideoFile("empty.mov".into()), TrackSet::empty())
    }

    #[test]
    fn test_leaf_has_no_instructions() {
        let builder = CompositionBuilder::new(engine());
        let result = builder
            .build(&SourceExpression::video_file("clip.mov"))
            .unwrap();
        assert_eq!(result.duration(), secs(10));
        assert_eq!(result.timeline.track_count(), 2);
        assert!(result.video_composition.is_none());
        assert!(result.audio_mix.is_none());
    }

    #[test]
    fn test_merge_carries_render_settings() {
        let options = BuildOptions {
            render_width: 1280,
            render_height: 720,
            frame_rate: 25,
            ..BuildOptions::default()
        };
        let builder = CompositionBuilder::with_options(engine(), options);
        let result = builder
            .build(&SourceExpression::merge(vec![
                SourceExpression::image_file("photo.jpeg"),
                SourceExpression::video_file("clip.mov"),
            ]))
            .unwrap();
        let vc = result.video_composition.unwrap();
        assert_eq!((vc.render_width, vc.render_height, vc.frame_rate), (1280, 720, 25));
    }

    #[test]
    fn test_concat_rejected_before_resolving_children() {
        let builder = CompositionBuilder::new(engine());
        let err = builder
            .build(&SourceExpression::concat(vec![SourceExpression::video_file(
                "clip.mov",
            )]))
            .unwrap_err();
        assert_eq!(err, BuildError::not_implemented("concat"));
        assert_eq!(builder.engine().open_count(), 0);
    }

    #[test]
    fn test_sequential_concat_places_children_back_to_back() {
        let options = BuildOptions {
            sequential_concat: true,
            ..BuildOptions::default()
        };
        let builder = CompositionBuilder::with_options(engine(), options);
        let result = builder
            .build(&SourceExpression::concat(vec![
                SourceExpression::image_file("photo.jpeg"),
                SourceExpression::video_file("empty.mov"),
                SourceExpression::video_file("clip.mov"),
            ]))
            .unwrap();

        assert_eq!(result.duration(), secs(13));
        assert!(result.video_composition.is_none());
        let starts: Vec<_> = result
            .timeline
            .tracks()
            .iter()
            .map(|t| t.time_range().start)
            .collect();
        assert_eq!(starts, vec![secs(0), secs(3), secs(3)]);
    }

    #[test]
    fn test_failure_in_child_aborts_build() {
        let builder = CompositionBuilder::new(engine());
        let err = builder
            .build(&SourceExpression::merge(vec![
                SourceExpression::video_file("clip.mov"),
                SourceExpression::video_file("missing.mov"),
            ]))
            .unwrap_err();
        assert!(matches!(err, BuildError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_options_from_config_defaults() {
        let options = BuildOptions::default();
        assert_eq!(options.background_color, Rgba::new(1.0, 0.5, 0.0, 0.5));
        assert_eq!((options.render_width, options.render_height), (360, 720));
        assert!(!options.sequential_concat);
    }
}
