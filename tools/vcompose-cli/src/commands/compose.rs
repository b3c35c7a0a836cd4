//! Build a composition and export it.

use std::io::Write;
use std::path::PathBuf;

use vcompose_common::config::AppConfig;
use vcompose_common::error::ComposeError;
use vcompose_core::{BuildOptions, CompositionBuilder};
use vcompose_engine::{
    ExportCoordinator, ExportJob, ExportProgress, ExportStage, FfmpegBackend, ProgressCallback,
};
use vcompose_model::SourceExpression;

pub async fn run(
    config: &AppConfig,
    expression: SourceExpression,
    output: PathBuf,
    preset: Option<String>,
    assets: Vec<String>,
) -> anyhow::Result<()> {
    let assets = super::parse_assets(&assets)?;
    let mut export = config.export.clone();
    if let Some(raw) = preset {
        export.preset = super::parse_preset(&raw)?;
    }

    println!(
        "Building {} ({} leaves, depth {})",
        expression.kind(),
        expression.leaf_count(),
        expression.depth()
    );

    let builder = CompositionBuilder::with_options(
        super::probe_engine(config, assets.clone()),
        BuildOptions::from(&config.composition),
    );
    let result = match builder.build(&expression) {
        Ok(result) => result,
        Err(e) => {
            let e = ComposeError::from(e);
            println!("Build failed: {e}");
            return Err(e.into());
        }
    };
    super::print_result(&result);

    let job = ExportJob::from_config(output, &export, &config.composition, &result);
    println!("Exporting to: {}", job.output_path.display());
    println!("  Preset: {:?}", job.preset);
    println!("  Container: {}", job.file_type);

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        if p.stage == ExportStage::Rendering {
            print!(
                "\r  Progress: {:.1}% ({:.1}/{:.1}s, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.out_time_secs,
                p.total_secs,
                p.eta_secs,
            );
            let _ = std::io::stdout().flush();
        }
    });

    let coordinator = ExportCoordinator::new(Box::new(FfmpegBackend::new().with_assets(assets)))
        .with_progress(progress_cb);

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling export");
            cancel.cancel();
        }
    });

    match coordinator.export(&result, &job).await {
        Ok(report) => {
            println!(
                "\nExport complete: {} ({:.3}s of media in {:.1}s)",
                report.output.display(),
                report.duration_secs,
                (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
            );
            Ok(())
        }
        Err(e) => {
            let e = ComposeError::from(e);
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
