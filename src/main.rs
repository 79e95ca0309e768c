// ============================================================================
// main.rs — gpulife
// Entry point. Initializes logging, parses arguments, and runs either the
// windowed event loop or a headless batch.
// ============================================================================

mod app;
mod binding;
mod config;
mod driver;
mod error;
mod geometry;
mod gpu;
mod headless;
mod pacing;
mod pipeline;
mod rules;
mod session;
mod stats;
mod target;
mod world;

use app::App;
use config::AppConfig;
use error::RunError;
use winit::event_loop::EventLoop;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), RunError> {
    let config = AppConfig::from_args(std::env::args().skip(1))?;

    if let Some(generations) = config.headless_generations {
        headless::run_headless(&config, generations)?;
        return Ok(());
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
