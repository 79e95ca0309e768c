// ============================================================================
// headless.rs — gpulife
// Windowless runner: steps a session against an offscreen target as fast as
// the GPU allows and reports progress.
// ============================================================================

use std::time::Instant;

use crate::config::AppConfig;
use crate::driver::FrameDriver;
use crate::error::RunError;
use crate::gpu::GpuContext;
use crate::rules::step_reference;
use crate::stats::PopulationStats;
use crate::target::OffscreenTarget;

const FRAME_SIZE: u32 = 512;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Step `generations` times and return the final population.
pub fn run_headless(config: &AppConfig, generations: u64) -> Result<PopulationStats, RunError> {
    let gpu = GpuContext::headless()?;
    let mut target = OffscreenTarget::new(&gpu.device, FRAME_SIZE, FRAME_SIZE, FORMAT);
    let mut driver = FrameDriver::new(gpu, FORMAT, config.sim.tick_interval());
    driver.initialize(config.grid, config.initial.clone())?;

    log::info!(
        "Headless run started: {} generations on {}x{}",
        generations,
        config.grid.width,
        config.grid.height
    );

    let started = Instant::now();
    let mut last_stats: Option<PopulationStats> = None;
    let interval = config.sim.diag_interval;

    // CPU mirror of the GPU state, kept only when verifying.
    let mut mirror = if config.verify {
        driver.read_cells()?
    } else {
        None
    };

    for _ in 0..generations {
        driver.tick(&mut target)?;
        let generation = driver.generation().unwrap_or(0);

        if let Some(expected) = mirror.as_mut() {
            *expected = step_reference(config.grid, expected);
            let actual = driver.read_cells()?.unwrap_or_default();
            let mismatched = actual
                .iter()
                .zip(expected.iter())
                .filter(|(a, e)| a != e)
                .count()
                + actual.len().abs_diff(expected.len());
            if mismatched > 0 {
                return Err(RunError::Divergence {
                    generation,
                    mismatched,
                });
            }
        }

        if interval > 0 && generation % interval == 0 {
            if let Some(cells) = driver.read_cells()? {
                let stats = PopulationStats::from_cells(config.grid, &cells);
                let rate = generation as f64 / started.elapsed().as_secs_f64().max(1e-6);
                log::info!("Headless progress: {}/{} | {:.0} gen/s", generation, generations, rate);
                stats.log(generation, last_stats.as_ref());
                last_stats = Some(stats);
            }
        }
    }

    let cells = driver.read_cells()?.unwrap_or_default();
    let stats = PopulationStats::from_cells(config.grid, &cells);
    stats.log(driver.generation().unwrap_or(0), last_stats.as_ref());
    log::info!(
        "Headless run finished in {:.2}s",
        started.elapsed().as_secs_f64()
    );

    driver.teardown();
    Ok(stats)
}
