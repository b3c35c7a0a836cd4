//! ffmpeg export backend.
//!
//! Every placed segment becomes one ffmpeg input trimmed to the segment's
//! source range. Passthrough exports map those inputs straight to the
//! output with stream copy; re-encoded exports build a filter graph that
//! stacks video layers over a solid background and delays audio to its
//! timeline position.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use vcompose_common::error::{ExportError, ExportResult};
use vcompose_common::time::MediaTime;
use vcompose_model::{CompositionResult, MediaType, Rgba, TrackId, TrackSegment};

use crate::export::{
    CancelHandle, ExportBackend, ExportJob, ExportPreset, ExportProgress, ExportSession,
    ExportStage, ExportStatus, ProgressCallback,
};
use crate::probe::AssetRegistry;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STALL_WARNING_SECS: u64 = 10;

/// Renders compositions by running the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: String,
    assets: AssetRegistry,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            assets: AssetRegistry::new(),
        }
    }

    pub fn with_assets(mut self, assets: AssetRegistry) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportBackend for FfmpegBackend {
    fn create_session(
        &self,
        result: &CompositionResult,
        job: &ExportJob,
    ) -> ExportResult<Box<dyn ExportSession>> {
        let plan = plan_export(result, job, &self.assets)?;
        tracing::debug!(args = ?plan.args, "Planned ffmpeg export");
        Ok(Box::new(FfmpegSession {
            binary: self.binary.clone(),
            plan,
        }))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Arguments for one ffmpeg run.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegPlan {
    pub args: Vec<String>,
    pub expected_duration_secs: f64,
}

/// A segment turned into an ffmpeg input.
#[derive(Debug)]
struct PlannedInput<'a> {
    index: usize,
    track_id: TrackId,
    media_type: MediaType,
    segment: &'a TrackSegment,
}

impl PlannedInput<'_> {
    /// Stream specifier such as `2:1`.
    fn stream(&self) -> String {
        let stream = if self.segment.media.source.is_still() {
            0
        } else {
            self.segment.media.stream_index
        };
        format!("{}:{}", self.index, stream)
    }

    fn offset(&self) -> MediaTime {
        self.segment.timeline_range.start
    }
}

/// Build the ffmpeg invocation for `result`.
pub fn plan_export(
    result: &CompositionResult,
    job: &ExportJob,
    assets: &AssetRegistry,
) -> ExportResult<FfmpegPlan> {
    let total = result.duration();
    if total.is_zero() {
        return Err(ExportError::session_creation(
            "composition is empty; nothing to export",
        ));
    }

    let planned: Vec<PlannedInput<'_>> = result
        .timeline
        .tracks()
        .iter()
        .filter(|t| matches!(t.media_type, MediaType::Video | MediaType::Audio))
        .flat_map(|track| {
            track
                .segments
                .iter()
                .filter(|s| !s.timeline_range.is_empty())
                .map(move |segment| (track.id, track.media_type, segment))
        })
        .enumerate()
        .map(|(index, (track_id, media_type, segment))| PlannedInput {
            index,
            track_id,
            media_type,
            segment,
        })
        .collect();

    let mut args: Vec<String> = vec![
        if job.overwrite { "-y" } else { "-n" }.to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
    ];

    let frame_rate = result
        .video_composition
        .as_ref()
        .map_or(job.frame_rate, |vc| vc.frame_rate)
        .max(1);

    for input in &planned {
        let path: PathBuf = assets
            .path_of(&input.segment.media.source)
            .map(PathBuf::from)
            .ok_or_else(|| {
                ExportError::session_creation(format!(
                    "no file backs {}",
                    input.segment.media.source
                ))
            })?;

        if input.segment.media.source.is_still() {
            args.extend(["-loop".to_string(), "1".to_string()]);
            args.extend(["-framerate".to_string(), frame_rate.to_string()]);
        } else if !input.segment.source_range.start.is_zero() {
            args.extend(["-ss".to_string(), secs(input.segment.source_range.start)]);
        }
        args.extend(["-t".to_string(), secs(input.segment.source_range.duration)]);
        if job.preset.is_passthrough() && !input.offset().is_zero() {
            args.extend(["-itsoffset".to_string(), secs(input.offset())]);
        }
        args.extend(["-i".to_string(), path.display().to_string()]);
    }

    match &job.preset {
        ExportPreset::Passthrough => plan_passthrough(result, &planned, &mut args)?,
        ExportPreset::Reencode { video_codec, crf } => {
            plan_reencode(result, job, &planned, frame_rate, &mut args);
            args.extend([
                "-c:v".to_string(),
                video_codec.clone(),
                "-crf".to_string(),
                crf.to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
            ]);
        }
    }

    args.extend([
        "-t".to_string(),
        secs(total),
        "-f".to_string(),
        job.file_type.clone(),
        job.output_path.display().to_string(),
    ]);

    Ok(FfmpegPlan {
        args,
        expected_duration_secs: total.as_secs_f64(),
    })
}

fn plan_passthrough(
    result: &CompositionResult,
    planned: &[PlannedInput<'_>],
    args: &mut Vec<String>,
) -> ExportResult<()> {
    if let Some(track) = result.timeline.tracks().iter().find(|t| t.segments.len() > 1) {
        return Err(ExportError::session_creation(format!(
            "track {} joins {} segments, which passthrough export cannot do; use the reencode preset",
            track.id,
            track.segments.len()
        )));
    }
    if result.video_composition.is_some() {
        tracing::warn!(
            "Passthrough export copies tracks as-is; overlay instructions are not rendered"
        );
    }

    for input in planned {
        args.extend(["-map".to_string(), input.stream()]);
    }
    args.extend(["-c".to_string(), "copy".to_string()]);
    Ok(())
}

fn plan_reencode(
    result: &CompositionResult,
    job: &ExportJob,
    planned: &[PlannedInput<'_>],
    frame_rate: u32,
    args: &mut Vec<String>,
) {
    let total = result.duration();
    let (width, height, background, layer_order) = match &result.video_composition {
        Some(vc) => (
            vc.render_width,
            vc.render_height,
            vc.background()
                .and_then(|i| i.background_color)
                .unwrap_or(Rgba::BLACK),
            vc.layers()
                .flat_map(|i| i.layers.iter().map(|l| l.track_id))
                .collect::<Vec<_>>(),
        ),
        None => (
            job.render_width,
            job.render_height,
            Rgba::BLACK,
            result.timeline.video_tracks().map(|t| t.id).collect(),
        ),
    };

    let mut graph = String::new();
    let _ = write!(
        graph,
        "color=c={}@{:.3}:s={}x{}:r={}:d={}[base0]",
        background.to_hex_rgb(),
        background.alpha(),
        width,
        height,
        frame_rate,
        secs(total)
    );

    // First layer is topmost, so overlay from the last one up.
    let mut base = 0usize;
    for track_id in layer_order.iter().rev() {
        for input in planned.iter().filter(|p| p.track_id == *track_id) {
            let range = input.segment.timeline_range;
            let _ = write!(
                graph,
                ";[{stream}]scale={width}:{height}:force_original_aspect_ratio=decrease,\
                 setpts=PTS-STARTPTS+{offset}/TB[layer{n}]\
                 ;[base{base}][layer{n}]overlay=(W-w)/2:(H-h)/2:eof_action=pass:\
                 enable='between(t,{start},{end})'[base{next}]",
                stream = input.stream(),
                offset = secs(input.offset()),
                n = input.index,
                start = secs(range.start),
                end = secs(range.end()),
                next = base + 1,
            );
            base += 1;
        }
    }

    let mut audio_labels = Vec::new();
    for input in planned.iter().filter(|p| p.media_type == MediaType::Audio) {
        let delay_ms = input.offset().as_nanos() / 1_000_000;
        let _ = write!(
            graph,
            ";[{}]asetpts=PTS-STARTPTS,adelay={}:all=1[audio{}]",
            input.stream(),
            delay_ms,
            input.index
        );
        audio_labels.push(format!("[audio{}]", input.index));
    }

    args.extend([
        "-filter_complex".to_string(),
        graph,
        "-map".to_string(),
        format!("[base{base}]"),
    ]);
    for label in audio_labels {
        args.extend(["-map".to_string(), label]);
    }
}

fn secs(t: MediaTime) -> String {
    format!("{:.6}", t.as_secs_f64())
}

struct FfmpegSession {
    binary: String,
    plan: FfmpegPlan,
}

#[async_trait::async_trait]
impl ExportSession for FfmpegSession {
    async fn run(
        &mut self,
        cancel: CancelHandle,
        progress: Option<&ProgressCallback>,
    ) -> ExportStatus {
        if cancel.is_cancelled() {
            return ExportStatus::Cancelled;
        }
        match self.drive(&cancel, progress).await {
            Ok(status) => status,
            Err(err) => ExportStatus::Failed(Some(err.to_string())),
        }
    }
}

impl FfmpegSession {
    async fn drive(
        &self,
        cancel: &CancelHandle,
        progress: Option<&ProgressCallback>,
    ) -> std::io::Result<ExportStatus> {
        let mut child = tokio::process::Command::new(&self.binary)
            .args(&self.plan.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(
            pid = child.id(),
            args_len = self.plan.args.len(),
            expected_secs = self.plan.expected_duration_secs,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let start = Instant::now();
        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_advance = (0.0f64, Instant::now());
        let mut ticker = tokio::time::interval(CANCEL_POLL_INTERVAL);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let Some((key, value)) = line.trim().split_once('=') else { continue };
                    state.update(key, value);
                    if key != "progress" {
                        continue;
                    }
                    if state.out_time_secs > last_advance.0 + 0.001 {
                        last_advance = (state.out_time_secs, Instant::now());
                    } else if last_advance.1.elapsed().as_secs() >= STALL_WARNING_SECS {
                        tracing::warn!(
                            out_time_secs = state.out_time_secs,
                            elapsed_secs = start.elapsed().as_secs_f64(),
                            "No ffmpeg progress advancement for 10s"
                        );
                        last_advance.1 = Instant::now();
                    }
                    if let Some(cb) = progress {
                        cb(progress_report(
                            &state,
                            self.plan.expected_duration_secs,
                            start.elapsed().as_secs_f64(),
                        ));
                    }
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        tracing::info!("Cancelling ffmpeg export");
                        child.start_kill()?;
                        let _ = child.wait().await;
                        return Ok(ExportStatus::Cancelled);
                    }
                }
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if cancel.is_cancelled() {
            return Ok(ExportStatus::Cancelled);
        }
        if !status.success() {
            return Ok(ExportStatus::Failed(Some(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr_output.trim()
            ))));
        }
        if !state.complete {
            tracing::warn!("ffmpeg exited without reporting completion");
            return Ok(ExportStatus::Unknown);
        }

        if let Some(cb) = progress {
            cb(ExportProgress {
                progress: 1.0,
                out_time_secs: self.plan.expected_duration_secs,
                total_secs: self.plan.expected_duration_secs,
                eta_secs: 0.0,
                stage: ExportStage::Complete,
            });
        }
        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg export finished"
        );
        Ok(ExportStatus::Completed)
    }
}

/// Whether `binary` can be found on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time_secs: state.out_time_secs,
        total_secs: expected_duration_secs,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Rendering
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcompose_core::memory::{fake_track_set, InMemoryEngine};
    use vcompose_core::{BuildOptions, CompositionBuilder};
    use vcompose_model::{SourceExpression, SourceRef};

    fn engine() -> InMemoryEngine {
        let image = SourceRef::ImageFile("photo.jpeg".into());
        let video = SourceRef::VideoFile("clip.mov".into());
        InMemoryEngine::new()
            .with_source(
                image.clone(),
                fake_track_set(&image, &[(MediaType::Video, MediaTime::from_secs(3))]),
            )
            .with_source(
                video.clone(),
                fake_track_set(
                    &video,
                    &[
                        (MediaType::Video, MediaTime::from_secs(10)),
                        (MediaType::Audio, MediaTime::from_secs(10)),
                    ],
                ),
            )
    }

    fn job(preset: ExportPreset) -> ExportJob {
        ExportJob {
            output_path: PathBuf::from("out/output.mov"),
            file_type: "mov".to_string(),
            preset,
            overwrite: true,
            render_width: 640,
            render_height: 360,
            frame_rate: 30,
        }
    }

    fn reencode() -> ExportPreset {
        ExportPreset::Reencode {
            video_codec: "libx264".to_string(),
            crf: 20,
        }
    }

    fn build(expr: SourceExpression, options: BuildOptions) -> CompositionResult {
        CompositionBuilder::with_options(engine(), options)
            .build(&expr)
            .unwrap()
    }

    fn merge() -> CompositionResult {
        build(
            SourceExpression::merge(vec![
                SourceExpression::image_file("photo.jpeg"),
                SourceExpression::video_file("clip.mov"),
            ]),
            BuildOptions::default(),
        )
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_reencode_merge_stacks_layers_over_background() {
        let plan = plan_export(&merge(), &job(reencode()), &AssetRegistry::new()).unwrap();
        let graph = arg_after(&plan.args, "-filter_complex")[0];

        assert!(graph.starts_with("color=c=0xFF8000@0.500:s=360x720:r=30:d=10.000000[base0]"));
        assert_eq!(graph.matches("overlay=").count(), 2);
        // The image (first layer) is overlaid last, so it ends up on top.
        let video_pos = graph.find("[1:0]scale").unwrap();
        let image_pos = graph.find("[0:0]scale").unwrap();
        assert!(video_pos < image_pos);
        assert!(graph.contains("[2:1]asetpts=PTS-STARTPTS,adelay=0:all=1[audio2]"));

        assert_eq!(arg_after(&plan.args, "-map"), vec!["[base2]", "[audio2]"]);
        assert_eq!(arg_after(&plan.args, "-i"), vec!["photo.jpeg", "clip.mov", "clip.mov"]);
        assert_eq!(plan.args.last().unwrap(), "out/output.mov");
        assert!((plan.expected_duration_secs - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_passthrough_leaf_maps_streams_with_copy() {
        let result = build(
            SourceExpression::video_file("clip.mov"),
            BuildOptions::default(),
        );
        let plan = plan_export(&result, &job(ExportPreset::Passthrough), &AssetRegistry::new())
            .unwrap();

        assert_eq!(arg_after(&plan.args, "-map"), vec!["0:0", "1:1"]);
        assert_eq!(arg_after(&plan.args, "-c"), vec!["copy"]);
        assert!(!plan.args.iter().any(|a| a == "-filter_complex"));
        assert_eq!(arg_after(&plan.args, "-f"), vec!["mov"]);
    }

    #[test]
    fn test_still_inputs_loop() {
        let plan = plan_export(&merge(), &job(reencode()), &AssetRegistry::new()).unwrap();
        let loop_pos = plan.args.iter().position(|a| a == "-loop").unwrap();
        let image_pos = plan.args.iter().position(|a| a == "photo.jpeg").unwrap();
        assert!(loop_pos < image_pos);
        assert_eq!(arg_after(&plan.args, "-framerate"), vec!["30"]);
    }

    #[test]
    fn test_sequential_offsets_delay_later_children() {
        let options = BuildOptions {
            sequential_concat: true,
            ..BuildOptions::default()
        };
        let result = build(
            SourceExpression::concat(vec![
                SourceExpression::image_file("photo.jpeg"),
                SourceExpression::video_file("clip.mov"),
            ]),
            options,
        );

        let reencoded = plan_export(&result, &job(reencode()), &AssetRegistry::new()).unwrap();
        let graph = arg_after(&reencoded.args, "-filter_complex")[0];
        assert!(graph.starts_with("color=c=0x000000@1.000:s=640x360"));
        assert!(graph.contains("setpts=PTS-STARTPTS+3.000000/TB"));
        assert!(graph.contains("adelay=3000:all=1"));

        let copied =
            plan_export(&result, &job(ExportPreset::Passthrough), &AssetRegistry::new()).unwrap();
        assert_eq!(arg_after(&copied.args, "-itsoffset"), vec!["3.000000", "3.000000"]);
    }

    #[test]
    fn test_empty_composition_is_refused() {
        let result = CompositionResult::from_timeline(vcompose_model::Timeline::new());
        let err = plan_export(&result, &job(reencode()), &AssetRegistry::new()).unwrap_err();
        assert!(matches!(err, ExportError::SessionCreationFailed { .. }));
    }

    #[test]
    fn test_unbacked_asset_is_refused() {
        let asset = SourceRef::Asset("intro".into());
        let engine = InMemoryEngine::new().with_source(
            asset.clone(),
            fake_track_set(&asset, &[(MediaType::Video, MediaTime::from_secs(2))]),
        );
        let result = CompositionBuilder::new(engine)
            .build(&SourceExpression::asset("intro"))
            .unwrap();

        let err = plan_export(&result, &job(reencode()), &AssetRegistry::new()).unwrap_err();
        assert!(matches!(err, ExportError::SessionCreationFailed { .. }));

        let registry = AssetRegistry::from_pairs(["intro=/media/intro.mov"]).unwrap();
        let plan = plan_export(&result, &job(reencode()), &registry).unwrap();
        assert_eq!(arg_after(&plan.args, "-i"), vec!["/media/intro.mov"]);
    }

    #[test]
    fn test_progress_state_parsing() {
        let mut state = ProgressState::default();
        state.update("out_time_ms", "2500000");
        assert!((state.out_time_secs - 2.5).abs() < 1e-9);
        state.update("out_time_us", "5000000");
        assert!((state.out_time_secs - 5.0).abs() < 1e-9);
        assert!(!state.complete);
        state.update("progress", "end");
        assert!(state.complete);
    }

    #[test]
    fn test_progress_report_clamps() {
        let state = ProgressState {
            out_time_secs: 12.0,
            complete: false,
        };
        let report = progress_report(&state, 10.0, 4.0);
        assert!((report.progress - 1.0).abs() < 1e-9);
        assert_eq!(report.stage, ExportStage::Rendering);

        let report = progress_report(&ProgressState::default(), 0.0, 1.0);
        assert_eq!(report.progress, 0.0);
        assert_eq!(report.eta_secs, 0.0);
    }
}
