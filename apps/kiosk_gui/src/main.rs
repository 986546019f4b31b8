mod backend_bridge;
mod config;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;

use backend_bridge::commands::BackendCommand;
use controller::events::UiEvent;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the kiosk config file (default: kiosk.toml).
    #[arg(long)]
    config: Option<String>,
    /// Override the configured backend URL.
    #[arg(long)]
    server_url: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref());
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    settings.server_url = match config::normalize_server_url(&settings.server_url) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!("refusing to start: {err:#}");
            std::process::exit(2);
        }
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    backend_bridge::runtime::launch(settings.clone(), cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("FaceGate Kiosk")
            .with_inner_size([1024.0, 720.0])
            .with_min_inner_size([820.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "FaceGate Kiosk",
        options,
        Box::new(move |_cc| Ok(Box::new(ui::app::KioskApp::new(settings, cmd_tx, ui_rx)))),
    )
}
