//! Vigil: live camera feed with real-time helmet-detection overlays.

use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::info;

use vigil::pipeline::Session;
use vigil::utils;
use vigil::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("vigil=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Vigil launching...");

    // Load configuration
    let mut config = Config::load()?;

    // Auto-detect capture device if none configured
    if config.capture.device.path.is_empty() {
        let device = utils::auto_detect_device().await?;
        info!("Using capture device: {:?}", device);
        config.capture.format = device.format;
        config.capture.device = device;
    }

    vigil::CONFIG.store(Arc::new(config.clone()));

    // Bring up one session: camera, detector channel, sampler
    let mut session = Session::start(&config).await.map_err(|e| match e.hint() {
        Some(hint) => eyre!("{e} ({hint})"),
        None => eyre!("{e}"),
    })?;

    // Render loop owns the main thread until quit
    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut display = vigil::display::Sdl2Display::new(
        &sdl_context,
        config.display.width,
        config.display.height,
        config.detector.reference_width,
    )?;
    let run_result = display.run(&sdl_context, &session);

    // Teardown happens on every exit path, success or not
    session.shutdown();
    run_result?;

    info!("Vigil shutting down");
    Ok(())
}
