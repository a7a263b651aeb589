#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod pipeline;
mod sensor;
mod session;
mod types;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gpui::Application;
use gpui_component;

use config::Cli;
use session::SensorSession;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let (surface, display_rx) = pipeline::channel_surface();

    let mut session = SensorSession::new();
    let provider = cli.backend.provider();
    let startup_error = match session.start(
        provider.as_ref(),
        &cli.session_request(),
        Arc::new(surface),
    ) {
        Ok(()) => None,
        Err(err) => {
            log::error!("failed to start sensor session: {err}");
            Some(err.to_string())
        }
    };

    let sample = cli.sample;
    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, sample, session, display_rx, startup_error) {
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
