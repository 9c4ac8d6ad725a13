mod app;
mod camera;
mod color;
mod config;
mod data;
mod error;
mod logging;
mod render;
mod scene;
mod selection;

use anyhow::Context as _;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    logging::init_tracing()?;

    let (config, source) = config::AppConfig::discover().context("load configuration")?;
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        None => tracing::info!("no configuration file; using built-in defaults"),
    }

    let store = data::DataStore::load(&config.data).map_err(|err| {
        tracing::error!(error = %err, "cannot start without data");
        err
    })?;
    let range = store.step_range();
    tracing::info!(
        datasets = store.datasets().len(),
        bounds_rows = store.bounds().len(),
        first_step = range.min,
        last_step = range.max,
        steps = range.len(),
        "data store ready"
    );
    let store = Arc::new(store);

    let native_options = eframe::NativeOptions {
        renderer: eframe::Renderer::Wgpu,
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("snapviz")
            .with_inner_size([config.window.width, config.window.height]),
        ..Default::default()
    };

    eframe::run_native(
        "snapviz",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::SnapvizApp::new(cc, config, store)?))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
