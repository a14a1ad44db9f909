//! metronomo-gui: Metronome desktop application

mod app;
mod config;
mod panels;

use app::MetronomoApp;
use eframe::NativeOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("metronomo=debug".parse().unwrap())
            .add_directive("wgpu=warn".parse().unwrap())
            .add_directive("eframe=warn".parse().unwrap()))
        .init();

    tracing::info!("Starting Metronomo");

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 360.0])
            .with_min_inner_size([420.0, 260.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Metronomo",
        options,
        Box::new(|cc| Ok(Box::new(MetronomoApp::new(cc)))),
    )
}
