pub mod camera;
pub mod capture;
pub mod cli;
pub mod events;
pub mod feedback;
pub mod kiosk;
pub mod overlay;
pub mod recognition;
pub mod scanner;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::io::BufReader;

use camera::V4l2Camera;
use cli::Args;
use events::JsonLinesSink;
use kiosk::{run_operator_loop, Kiosk};
use recognition::HttpRecognitionClient;
use settings::KioskSettings;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let settings = args.apply(KioskSettings::load(&args.config)?);
    settings.validate().context("invalid kiosk settings")?;

    info!(
        "Attendance kiosk starting up (camera {}, service {})",
        settings.camera_device, settings.service_url
    );

    // Opening blocks until the first frame arrives or the start timeout passes.
    let device = Arc::new(
        V4l2Camera::new(&settings.camera_device, settings.camera_size)
            .with_start_timeout(settings.camera_start_timeout()),
    );
    let client = Arc::new(HttpRecognitionClient::new(
        &settings.service_url,
        settings.auth_token.clone(),
        settings.request_timeout(),
    )?);

    // Cycles are strictly sequential, so one thread drives everything.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let mut kiosk = Kiosk::new(&settings, device, client, Arc::new(JsonLinesSink));
        kiosk.open().await;
        run_operator_loop(&mut kiosk, BufReader::new(tokio::io::stdin())).await
    })
}
