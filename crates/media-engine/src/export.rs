//! Export configuration and session coordination.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vcompose_common::config::{CompositionDefaults, ExportDefaults, PresetChoice};
use vcompose_common::error::{ExportError, ExportResult};
use vcompose_model::CompositionResult;

/// Encode profile for a single export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExportPreset {
    /// Copy samples through without re-encoding. Overlay instructions
    /// cannot be honored in this mode.
    Passthrough,
    /// Render and encode.
    Reencode { video_codec: String, crf: u8 },
}

impl ExportPreset {
    /// Pick the preset for `result` given the configured choice.
    pub fn resolve(defaults: &ExportDefaults, result: &CompositionResult) -> Self {
        let reencode = || ExportPreset::Reencode {
            video_codec: defaults.video_codec.clone(),
            crf: defaults.crf,
        };
        match defaults.preset {
            PresetChoice::Passthrough => ExportPreset::Passthrough,
            PresetChoice::Reencode => reencode(),
            PresetChoice::Auto if result.needs_compositing() => reencode(),
            PresetChoice::Auto => ExportPreset::Passthrough,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, ExportPreset::Passthrough)
    }
}

/// Where and how to write one composition.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Output file path.
    pub output_path: PathBuf,

    /// Container format (e.g. "mov").
    pub file_type: String,

    /// Encode profile.
    pub preset: ExportPreset,

    /// Replace an existing output file.
    pub overwrite: bool,

    /// Canvas used when re-encoding a result that has no video composition.
    pub render_width: u32,
    pub render_height: u32,
    pub frame_rate: u32,
}

impl ExportJob {
    /// Job for `result` using configured defaults.
    pub fn from_config(
        output_path: impl Into<PathBuf>,
        export: &ExportDefaults,
        composition: &CompositionDefaults,
        result: &CompositionResult,
    ) -> Self {
        Self {
            output_path: output_path.into(),
            file_type: export.file_type.clone(),
            preset: ExportPreset::resolve(export, result),
            overwrite: export.overwrite,
            render_width: composition.render_width,
            render_height: composition.render_height,
            frame_rate: composition.frame_rate.max(1),
        }
    }
}

/// Status reported by an export session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Unknown,
    Waiting,
    Exporting,
    Completed,
    Failed(Option<String>),
    Cancelled,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::Unknown => f.write_str("unknown"),
            ExportStatus::Waiting => f.write_str("waiting"),
            ExportStatus::Exporting => f.write_str("exporting"),
            ExportStatus::Completed => f.write_str("completed"),
            ExportStatus::Failed(_) => f.write_str("failed"),
            ExportStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Map a session's final status to the export outcome.
pub fn check_terminal_status(status: ExportStatus) -> ExportResult<()> {
    match status {
        ExportStatus::Completed => Ok(()),
        ExportStatus::Failed(cause) => Err(ExportError::ExportFailed { cause }),
        ExportStatus::Cancelled => Err(ExportError::ExportCanceled),
        other => Err(ExportError::IllegalStatus {
            status: other.to_string(),
        }),
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Output time written so far.
    pub out_time_secs: f64,

    /// Expected output duration.
    pub total_secs: f64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Cloneable request to stop a running export.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A prepared export that runs to a terminal status.
#[async_trait::async_trait]
pub trait ExportSession: Send {
    /// Drive the export until it completes, fails, or is cancelled.
    async fn run(
        &mut self,
        cancel: CancelHandle,
        progress: Option<&ProgressCallback>,
    ) -> ExportStatus;
}

/// Trait for export engines (ffmpeg, test doubles, ...).
pub trait ExportBackend: Send + Sync {
    /// Prepare a session for `result`. Errors are reported as
    /// `SessionCreationFailed`.
    fn create_session(
        &self,
        result: &CompositionResult,
        job: &ExportJob,
    ) -> ExportResult<Box<dyn ExportSession>>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// What a successful export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub backend: String,
    pub preset: ExportPreset,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives an export backend for finished compositions.
///
/// Performs no retries: the engine's terminal status is reported as-is.
pub struct ExportCoordinator {
    backend: Box<dyn ExportBackend>,
    cancel: CancelHandle,
    progress: Option<ProgressCallback>,
}

impl ExportCoordinator {
    pub fn new(backend: Box<dyn ExportBackend>) -> Self {
        Self {
            backend,
            cancel: CancelHandle::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle that cancels the export currently (or next) running.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Export `result` as described by `job`.
    ///
    /// A cancel request applies to one export: the handle is cleared when
    /// the call returns, so the coordinator can be reused.
    pub async fn export(
        &self,
        result: &CompositionResult,
        job: &ExportJob,
    ) -> ExportResult<ExportReport> {
        let outcome = self.run_export(result, job).await;
        self.cancel.reset();
        outcome
    }

    async fn run_export(
        &self,
        result: &CompositionResult,
        job: &ExportJob,
    ) -> ExportResult<ExportReport> {
        let started_at = Utc::now();
        tracing::info!(
            output = %job.output_path.display(),
            backend = self.backend.name(),
            preset = ?job.preset,
            duration_secs = result.duration().as_secs_f64(),
            "Starting export"
        );

        if !self.backend.is_available() {
            return Err(ExportError::session_creation(format!(
                "export backend '{}' is not available",
                self.backend.name()
            )));
        }

        check_output(job)?;

        if let Some(cb) = &self.progress {
            cb(ExportProgress {
                progress: 0.0,
                out_time_secs: 0.0,
                total_secs: result.duration().as_secs_f64(),
                eta_secs: 0.0,
                stage: ExportStage::Preparing,
            });
        }

        let mut session = self
            .backend
            .create_session(result, job)
            .map_err(|err| match err {
                ExportError::SessionCreationFailed { .. } => err,
                other => ExportError::session_creation(other.to_string()),
            })?;
        replace_existing_output(job)?;

        let status = session
            .run(self.cancel.clone(), self.progress.as_ref())
            .await;
        tracing::info!(status = %status, "Export session finished");

        if let Err(err) = check_terminal_status(status) {
            if let Some(cb) = &self.progress {
                cb(ExportProgress {
                    progress: 0.0,
                    out_time_secs: 0.0,
                    total_secs: result.duration().as_secs_f64(),
                    eta_secs: 0.0,
                    stage: ExportStage::Failed,
                });
            }
            return Err(err);
        }

        Ok(ExportReport {
            output: job.output_path.clone(),
            backend: self.backend.name().to_string(),
            preset: job.preset.clone(),
            duration_secs: result.duration().as_secs_f64(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Make sure the output can be written without touching an existing file.
fn check_output(job: &ExportJob) -> ExportResult<()> {
    if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ExportError::session_creation(format!(
                "cannot create output directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    if job.output_path.exists() && !job.overwrite {
        return Err(ExportError::session_creation(format!(
            "{} already exists",
            job.output_path.display()
        )));
    }
    Ok(())
}

/// Remove a previous output once a session is ready to replace it.
fn replace_existing_output(job: &ExportJob) -> ExportResult<()> {
    if job.overwrite && job.output_path.exists() {
        std::fs::remove_file(&job.output_path).map_err(|e| {
            ExportError::session_creation(format!(
                "cannot replace {}: {e}",
                job.output_path.display()
            ))
        })?;
    }
    Ok(())
}
