mod danmaq_app;
mod overlay;
mod tray;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use danmaq::SettingsStore;
use danmaq_app::DanmaqApp;
use eframe::egui;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "danmaq")]
#[command(version)]
#[command(about = "Shows danmaku from a channel as floating comments on your screen", long_about = None)]
pub struct Cli {
    /// Danmaku server, defaults to the saved one
    #[arg(long)]
    pub server: Option<String>,

    /// Channel to subscribe to
    #[arg(long, default_value = "demo")]
    pub channel: String,

    /// Channel password, sent as the auth key
    #[arg(long, default_value = "")]
    pub password: String,

    /// Subscribe right away instead of waiting for the form
    #[arg(long)]
    pub subscribe: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("danmaq=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.config.clone().map(SettingsStore::at).unwrap_or_default();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Danmaku")
            .with_inner_size([360., 250.])
            .with_min_inner_size([300., 220.])
            .with_maximize_button(false),
        centered: true,
        ..Default::default()
    };

    tracing::info!("Starting DanmaQ ...");

    eframe::run_native(
        "DanmaQ",
        options,
        Box::new(move |cc| Ok(Box::new(DanmaqApp::new(&cc.egui_ctx, settings, &cli)))),
    )
    .map_err(|e| anyhow::anyhow!("Could not start the DanmaQ window: {e}"))
}
