//! Check for the external tools export depends on.

use vcompose_common::config::{config_file_path, AppConfig};
use vcompose_engine::ffmpeg::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("vcompose System Check");
    println!("{}", "=".repeat(50));

    let tools = [("ffprobe", "source probing"), ("ffmpeg", "export")];
    let mut all_ok = true;
    for (binary, purpose) in tools {
        if command_exists(binary) {
            println!("[OK] {binary} ({purpose})");
        } else {
            all_ok = false;
            println!("[MISSING] {binary} ({purpose})");
        }
    }

    let path = config_file_path();
    println!();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!(
            "[INFO] Config: defaults (run `vcompose init-config` to create {})",
            path.display()
        );
    }
    println!(
        "     Canvas {}x{} @ {}fps, preset {:?}, container {}",
        config.composition.render_width,
        config.composition.render_height,
        config.composition.frame_rate,
        config.export.preset,
        config.export.file_type
    );

    println!();
    if all_ok {
        println!("All required tools are available. vcompose is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to export.");
    }

    Ok(())
}
