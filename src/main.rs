mod annotator;
mod api;
mod app;
mod catalog;
mod config;
mod drawing;
mod error;
mod export;
mod geometry;
mod viewport;
mod worker;
mod workflow;

use tracing_subscriber::EnvFilter;

use crate::app::QcApp;
use crate::config::{config_path, AppConfig};

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,qc_annotate=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn usage() -> ! {
    eprintln!("Usage: qc-annotate <photo-id> [--readonly]");
    std::process::exit(1);
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    setup_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let readonly = args.iter().any(|a| a == "--readonly");
    let Some(photo_arg) = args.iter().find(|a| !a.starts_with("--")) else {
        usage();
    };
    let Ok(photo_id) = photo_arg.parse::<i64>() else {
        eprintln!("Invalid photo id: {}", photo_arg);
        usage();
    };

    let config = AppConfig::load_or_default(&config_path());

    let title = format!("qc-annotate — photo #{}", photo_id);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(QcApp::new(cc, &config, photo_id, readonly)))),
    ) {
        tracing::error!("Failed to run eframe: {}", e);
        std::process::exit(1);
    }
}
