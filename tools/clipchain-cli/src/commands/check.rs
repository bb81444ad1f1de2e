//! Check engine binaries and overlay font.

use clipchain_common::config::{config_file_path, AppConfig};
use clipchain_render_engine::{FfmpegEngine, MediaEngine, OverlayStyle};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Clipchain System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not present)", config_path.display());
    }

    let engine = FfmpegEngine::new(&config.engine);
    let ffmpeg_ok = engine.is_available();
    if ffmpeg_ok {
        println!("[OK] ffmpeg: {}", engine.ffmpeg_path().display());
    } else {
        println!("[FAIL] ffmpeg: {} is not runnable", engine.ffmpeg_path().display());
    }

    if engine.probe_available() {
        println!("[OK] ffprobe: {}", engine.ffprobe_path().display());
    } else {
        println!(
            "[WARN] ffprobe: {} is not runnable (needed for global overlays on clip text)",
            engine.ffprobe_path().display()
        );
    }

    let style = OverlayStyle::from_config(&config.overlay);
    match style.validate_font() {
        Ok(()) => println!("[OK] Overlay font: {}", style.font_file.display()),
        Err(_) => println!(
            "[WARN] Overlay font: {} not found (set overlay.font_file; only needed for captions)",
            style.font_file.display()
        ),
    }

    println!();
    if ffmpeg_ok {
        println!("The media engine is available. Clipchain is ready.");
    } else {
        println!("ffmpeg is missing. Install it or set engine.ffmpeg_path.");
    }

    Ok(())
}
