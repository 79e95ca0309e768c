// ============================================================================
// app.rs — gpulife
// Application state and winit event-loop handler: window, surface, frame
// driver, keyboard controls, and tick pacing via ControlFlow::WaitUntil.
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes},
};

use crate::config::{AppConfig, GridConfig};
use crate::driver::{FrameDriver, Phase, SessionHandle, TickOutcome};
use crate::error::{InitError, TickError};
use crate::gpu::GpuContext;
use crate::stats::PopulationStats;
use crate::target::SurfaceTarget;

// ======================== Application ========================

pub struct App {
    state: Option<AppState>,
    config: AppConfig,
}

struct AppState {
    window: Arc<Window>,
    target: SurfaceTarget,
    driver: FrameDriver,
    config: AppConfig,
    last_stats: Option<PopulationStats>,
    init_error: Option<String>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            state: None,
            config,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match create_state(event_loop, self.config.clone()) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Startup failed: {}", err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &self.state else {
            return;
        };

        match state.driver.pacer().deadline() {
            Some(deadline) if Instant::now() >= deadline => {
                state.window.request_redraw();
                event_loop.set_control_flow(ControlFlow::Wait);
            }
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                state.driver.teardown();
                event_loop.exit();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() {
                    handle_key(state, event_loop, &event.logical_key);
                }
            }

            WindowEvent::Resized(new_size) => {
                // A zero-sized (minimized) window has no surface to draw to.
                if new_size.width == 0 || new_size.height == 0 {
                    return;
                }
                state
                    .target
                    .resize(&state.driver.gpu().device, new_size.width, new_size.height);
                if state.driver.phase() == Phase::Halted {
                    log::info!("Surface re-acquired; resuming");
                    state.driver.resume(Instant::now());
                    update_title(state);
                }
                state.window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                redraw(state);
            }

            _ => {}
        }
    }
}

// ======================== Startup ========================

fn create_state(event_loop: &ActiveEventLoop, config: AppConfig) -> Result<AppState, InitError> {
    let window_attrs = WindowAttributes::default()
        .with_title("gpulife")
        .with_inner_size(winit::dpi::LogicalSize::new(768u32, 768u32));

    let window = Arc::new(
        event_loop
            .create_window(window_attrs)
            .map_err(|e| InitError::SurfaceUnavailable(e.to_string()))?,
    );

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let surface = instance
        .create_surface(window.clone())
        .map_err(|e| InitError::SurfaceUnavailable(e.to_string()))?;

    let size = window.inner_size();
    let (gpu, surface_config) = GpuContext::for_surface(&instance, &surface, size.width, size.height)?;
    let format = surface_config.format;
    let target = SurfaceTarget::new(&gpu.device, surface, surface_config);

    let mut driver = FrameDriver::new(gpu, format, config.sim.tick_interval());
    driver.set_paused(config.sim.paused, Instant::now());

    // A failed session leaves the window blank; R retries.
    let init_error = match driver.initialize(config.grid, config.initial.clone()) {
        Ok(_) => None,
        Err(err) => Some(err.to_string()),
    };

    let mut state = AppState {
        window,
        target,
        driver,
        config,
        last_stats: None,
        init_error,
    };
    update_title(&mut state);
    Ok(state)
}

// ======================== Keyboard Handling ========================

fn handle_key(state: &mut AppState, event_loop: &ActiveEventLoop, key: &Key) {
    match key {
        Key::Named(NamedKey::Escape) => {
            state.driver.teardown();
            event_loop.exit();
        }
        Key::Named(NamedKey::Space) => {
            state.config.sim.paused = !state.config.sim.paused;
            state
                .driver
                .set_paused(state.config.sim.paused, Instant::now());
            log::info!(
                "Simulation {}",
                if state.config.sim.paused { "paused" } else { "resumed" }
            );
        }
        Key::Character(c) => match c.as_str() {
            "n" | "N" if state.config.sim.paused => {
                step(state);
            }
            "r" | "R" => {
                let result = state.driver.restart();
                after_reinit(state, result);
            }
            "+" | "=" => {
                let grid = state.config.grid.scaled(2.0);
                resize(state, grid);
            }
            "-" | "_" => {
                let grid = state.config.grid.scaled(0.5);
                resize(state, grid);
            }
            _ => {}
        },
        _ => {}
    }
    update_title(state);
}

fn resize(state: &mut AppState, grid: GridConfig) {
    if grid == state.config.grid {
        return;
    }
    state.config.grid = grid;
    let result = state.driver.resize(grid);
    after_reinit(state, result);
}

fn after_reinit(state: &mut AppState, result: Result<SessionHandle, InitError>) {
    state.last_stats = None;
    state.init_error = match result {
        Ok(handle) => {
            log::info!(
                "Session {} running {}x{}",
                handle.id,
                handle.grid.width,
                handle.grid.height
            );
            None
        }
        Err(err) => Some(err.to_string()),
    };
    state.window.request_redraw();
}

fn update_title(state: &mut AppState) {
    let grid = state.config.grid;
    let title = match (&state.init_error, state.driver.generation()) {
        (Some(err), _) => format!("gpulife | initialization failed: {err}"),
        (None, Some(generation)) => format!(
            "gpulife | {}x{} | generation {}{}",
            grid.width,
            grid.height,
            generation,
            match state.driver.phase() {
                Phase::Halted => " [HALTED]",
                _ if state.config.sim.paused => " [PAUSED]",
                _ => "",
            }
        ),
        (None, None) => "gpulife".to_string(),
    };
    state.window.set_title(&title);
}

// ======================== Frame Rendering ========================

fn redraw(state: &mut AppState) {
    let outcome = state.driver.poll(Instant::now(), &mut state.target);
    handle_outcome(state, outcome);
}

fn step(state: &mut AppState) {
    let outcome = state.driver.tick(&mut state.target);
    handle_outcome(state, outcome);
}

fn handle_outcome(state: &mut AppState, outcome: Result<TickOutcome, TickError>) {
    match outcome {
        Ok(TickOutcome::Stepped(generation)) => {
            update_title(state);
            sample_diagnostics(state, generation);
        }
        Ok(TickOutcome::Skipped | TickOutcome::NotDue | TickOutcome::Dropped) => {}
        Err(TickError::SurfaceUnavailable(msg)) => {
            // The driver stays halted until the window is resized or the
            // session is restarted.
            log::warn!("Surface unavailable ({}); ticking halted", msg);
            state.target.reconfigure(&state.driver.gpu().device);
            update_title(state);
        }
        Err(err) => log::error!("Tick failed: {}", err),
    }
}

fn sample_diagnostics(state: &mut AppState, generation: u64) {
    let interval = state.config.sim.diag_interval;
    if interval == 0 || generation % interval != 0 {
        return;
    }
    match state.driver.read_cells() {
        Ok(Some(cells)) => {
            let stats = PopulationStats::from_cells(state.config.grid, &cells);
            stats.log(generation, state.last_stats.as_ref());
            state.last_stats = Some(stats);
        }
        Ok(None) => {}
        Err(err) => log::warn!("Diagnostics skipped: {}", err),
    }
}
