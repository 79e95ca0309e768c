// ============================================================================
// driver.rs — gpulife
// Frame driver: owns the live session, paces ticks, submits one compute +
// render batch per tick, and replaces the session on re-initialization.
// ============================================================================

use std::time::{Duration, Instant};

use crate::config::{GridConfig, InitialState};
use crate::error::{InitError, TickError};
use crate::gpu::GpuContext;
use crate::pacing::TickPacer;
use crate::pipeline::Programs;
use crate::session::Session;
use crate::target::FrameTarget;

/// Observable lifecycle phase of the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No session; ticks are no-ops.
    Uninitialized,
    /// Session built, no generation stepped yet.
    Ready,
    /// At least one generation stepped.
    Stepping,
    /// A tick failed (surface lost); ticks are no-ops until `resume`.
    Halted,
}

enum DriverState {
    Uninitialized,
    Ready(Session),
    Stepping(Session),
    Halted(Session),
}

impl DriverState {
    fn session(&self) -> Option<&Session> {
        match self {
            DriverState::Uninitialized => None,
            DriverState::Ready(s) | DriverState::Stepping(s) | DriverState::Halted(s) => Some(s),
        }
    }
}

/// Identifies the session produced by `initialize`/`resize`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: u64,
    pub grid: GridConfig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Driver not ready or halted; nothing submitted.
    Skipped,
    /// Pacer says the next tick is not due yet.
    NotDue,
    /// The target had no frame to give; nothing submitted, next tick scheduled.
    Dropped,
    /// One generation submitted; carries the new generation count.
    Stepped(u64),
}

pub struct FrameDriver {
    gpu: GpuContext,
    programs: Programs,
    format: wgpu::TextureFormat,
    grid: GridConfig,
    policy: InitialState,
    state: DriverState,
    pacer: TickPacer,
    paused: bool,
    next_session_id: u64,
}

impl FrameDriver {
    pub fn new(gpu: GpuContext, format: wgpu::TextureFormat, tick_interval: Duration) -> Self {
        Self {
            gpu,
            programs: Programs::default(),
            format,
            grid: GridConfig::default(),
            policy: InitialState::Clear,
            state: DriverState::Uninitialized,
            pacer: TickPacer::new(tick_interval),
            paused: false,
            next_session_id: 1,
        }
    }

    pub fn with_programs(mut self, programs: Programs) -> Self {
        self.programs = programs;
        self
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            DriverState::Uninitialized => Phase::Uninitialized,
            DriverState::Ready(_) => Phase::Ready,
            DriverState::Stepping(_) => Phase::Stepping,
            DriverState::Halted(_) => Phase::Halted,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.state.session()
    }

    pub fn generation(&self) -> Option<u64> {
        self.session().map(Session::generation)
    }

    pub fn pacer(&self) -> &TickPacer {
        &self.pacer
    }

    // ======================== Lifecycle ========================

    /// Replace any live session with a fresh one for `grid`, seeded by
    /// `policy`. The old session is released before the new one is built;
    /// on failure the driver is left uninitialized.
    pub fn initialize(
        &mut self,
        grid: GridConfig,
        policy: InitialState,
    ) -> Result<SessionHandle, InitError> {
        self.teardown();
        self.grid = grid;
        self.policy = policy;

        let id = self.next_session_id;
        self.next_session_id += 1;

        let session = Session::build(&self.gpu, id, grid, &self.policy, &self.programs, self.format)
            .inspect_err(|e| log::error!("Session {} failed to initialize: {}", id, e))?;

        self.state = DriverState::Ready(session);
        if !self.paused {
            self.pacer.start(Instant::now());
        }
        Ok(SessionHandle { id, grid })
    }

    /// Discard the current session and rebuild for `grid` with the last
    /// initial-state policy.
    pub fn resize(&mut self, grid: GridConfig) -> Result<SessionHandle, InitError> {
        log::info!("Resizing grid to {}x{}", grid.width, grid.height);
        let policy = self.policy.clone();
        self.initialize(grid, policy)
    }

    /// Rebuild with the last requested grid and policy, whether or not that
    /// request produced a session.
    pub fn restart(&mut self) -> Result<SessionHandle, InitError> {
        let policy = self.policy.clone();
        self.initialize(self.grid, policy)
    }

    /// Stop scheduling, then release the session.
    pub fn teardown(&mut self) {
        self.pacer.cancel();
        let old = std::mem::replace(&mut self.state, DriverState::Uninitialized);
        if let Some(session) = old.session() {
            log::info!(
                "Session {} superseded at generation {}",
                session.id(),
                session.generation()
            );
        }
        drop(old);
    }

    /// Leave `Halted` after the surface has been re-acquired.
    pub fn resume(&mut self, now: Instant) {
        let state = std::mem::replace(&mut self.state, DriverState::Uninitialized);
        self.state = match state {
            DriverState::Halted(session) if session.generation() == 0 => {
                DriverState::Ready(session)
            }
            DriverState::Halted(session) => DriverState::Stepping(session),
            other => other,
        };
        if !self.paused
            && !matches!(self.state, DriverState::Uninitialized)
            && !self.pacer.is_scheduled()
        {
            self.pacer.start(now);
        }
    }

    /// Pausing only stops the pacer; explicit `tick` calls still step.
    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        self.paused = paused;
        if paused {
            self.pacer.cancel();
        } else if matches!(self.state, DriverState::Ready(_) | DriverState::Stepping(_)) {
            self.pacer.start(now);
        }
    }

    // ======================== Ticking ========================

    /// Tick if the pacer says one is due.
    pub fn poll(
        &mut self,
        now: Instant,
        target: &mut dyn FrameTarget,
    ) -> Result<TickOutcome, TickError> {
        if !self.pacer.is_due(now) {
            return Ok(TickOutcome::NotDue);
        }
        self.tick(target)
    }

    /// Advance one generation and draw it. A no-op unless a session is ready
    /// or stepping. When the target has no frame the tick is dropped and
    /// retried one interval later. On a target failure the driver halts and
    /// the last drawn frame stays on screen.
    pub fn tick(&mut self, target: &mut dyn FrameTarget) -> Result<TickOutcome, TickError> {
        let session = match &self.state {
            DriverState::Ready(s) | DriverState::Stepping(s) => s,
            DriverState::Uninitialized | DriverState::Halted(_) => {
                return Ok(TickOutcome::Skipped)
            }
        };

        debug_assert_eq!(target.format(), self.format);
        let frame = match target.acquire() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                if !self.paused {
                    self.pacer.schedule_after(Instant::now());
                }
                return Ok(TickOutcome::Dropped);
            }
            Err(err) => {
                log::warn!("Tick halted: {}", err);
                self.halt();
                return Err(err);
            }
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tick_encoder"),
            });
        session.encode_step(&mut encoder, &frame.view);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        let state = std::mem::replace(&mut self.state, DriverState::Uninitialized);
        let mut session = match state {
            DriverState::Ready(s) | DriverState::Stepping(s) => s,
            other => {
                self.state = other;
                return Ok(TickOutcome::Skipped);
            }
        };
        session.advance();
        let generation = session.generation();
        self.state = DriverState::Stepping(session);

        if !self.paused {
            self.pacer.schedule_after(Instant::now());
        }
        log::debug!("Generation {} submitted", generation);
        Ok(TickOutcome::Stepped(generation))
    }

    fn halt(&mut self) {
        self.pacer.cancel();
        let state = std::mem::replace(&mut self.state, DriverState::Uninitialized);
        self.state = match state {
            DriverState::Ready(s) | DriverState::Stepping(s) => DriverState::Halted(s),
            other => other,
        };
    }

    /// Read back the current generation's cells.
    pub fn read_cells(&self) -> Result<Option<Vec<u32>>, TickError> {
        self.session()
            .map(|session| session.read_cells(&self.gpu))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::tests::test_gpu;
    use crate::rules::step_reference;
    use crate::target::{Frame, OffscreenTarget};

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
    const INTERVAL: Duration = Duration::from_millis(100);

    /// Counts acquisitions and can be told to fail like a lost surface or
    /// to time out like a busy swapchain.
    struct CountingTarget {
        inner: OffscreenTarget,
        acquired: usize,
        fail: bool,
        timeout: bool,
    }

    impl FrameTarget for CountingTarget {
        fn format(&self) -> wgpu::TextureFormat {
            self.inner.format()
        }

        fn acquire(&mut self) -> Result<Option<Frame>, TickError> {
            if self.fail {
                return Err(TickError::SurfaceUnavailable("lost".into()));
            }
            if self.timeout {
                return Ok(None);
            }
            self.acquired += 1;
            self.inner.acquire()
        }
    }

    fn setup() -> Option<(FrameDriver, CountingTarget)> {
        let gpu = test_gpu()?;
        let target = CountingTarget {
            inner: OffscreenTarget::new(&gpu.device, 64, 64, FORMAT),
            acquired: 0,
            fail: false,
            timeout: false,
        };
        Some((FrameDriver::new(gpu, FORMAT, INTERVAL), target))
    }

    #[test]
    fn test_tick_before_ready_is_noop() {
        let Some((mut driver, mut target)) = setup() else { return };

        assert_eq!(driver.phase(), Phase::Uninitialized);
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Skipped);
        assert_eq!(driver.generation(), None);
        assert_eq!(target.acquired, 0);
        assert!(!driver.pacer().is_scheduled());
    }

    #[test]
    fn test_isolated_cell_dies_after_one_tick() {
        let Some((mut driver, mut target)) = setup() else { return };

        let handle = driver
            .initialize(
                GridConfig::new(4, 4),
                InitialState::Alive { cells: vec![5] },
            )
            .unwrap();
        assert_eq!(handle.grid, GridConfig::new(4, 4));
        assert_eq!(driver.phase(), Phase::Ready);
        assert_eq!(driver.generation(), Some(0));

        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Stepped(1));
        assert_eq!(driver.phase(), Phase::Stepping);
        assert_eq!(driver.generation(), Some(1));
        let cells = driver.read_cells().unwrap().unwrap();
        assert_eq!(cells, vec![0u32; 16]);
    }

    #[test]
    fn test_resize_discards_state() {
        let Some((mut driver, mut target)) = setup() else { return };

        let first = driver
            .initialize(
                GridConfig::new(64, 64),
                InitialState::Random {
                    density: 0.3,
                    seed: Some(11),
                },
            )
            .unwrap();
        for _ in 0..3 {
            driver.tick(&mut target).unwrap();
        }
        assert_eq!(driver.generation(), Some(3));

        let second = driver.resize(GridConfig::new(32, 32)).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(driver.phase(), Phase::Ready);
        assert_eq!(driver.generation(), Some(0));

        let session = driver.session().unwrap();
        assert_eq!(session.id(), second.id);
        assert_eq!(session.state_len(crate::binding::Slot::S0), 1024);
        assert_eq!(session.state_len(crate::binding::Slot::S1), 1024);

        // Same seeded policy, fresh grid: cells come only from the policy.
        let expected = InitialState::Random {
            density: 0.3,
            seed: Some(11),
        }
        .materialize(GridConfig::new(32, 32))
        .unwrap();
        assert_eq!(driver.read_cells().unwrap().unwrap(), expected);
    }

    #[test]
    fn test_failed_initialize_leaves_driver_uninitialized() {
        let Some((mut driver, mut target)) = setup() else { return };

        driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap();
        let err = driver
            .initialize(
                GridConfig::new(8, 8),
                InitialState::Alive { cells: vec![64] },
            )
            .unwrap_err();
        assert!(matches!(err, InitError::InvalidConfig(_)));
        assert_eq!(driver.phase(), Phase::Uninitialized);
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Skipped);
        assert_eq!(target.acquired, 0);
    }

    #[test]
    fn test_surface_loss_halts_until_resume() {
        let Some((mut driver, mut target)) = setup() else { return };

        driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap();
        driver.tick(&mut target).unwrap();

        target.fail = true;
        assert!(matches!(
            driver.tick(&mut target),
            Err(TickError::SurfaceUnavailable(_))
        ));
        assert_eq!(driver.phase(), Phase::Halted);
        assert_eq!(driver.generation(), Some(1));
        assert!(!driver.pacer().is_scheduled());

        target.fail = false;
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Skipped);

        driver.resume(Instant::now());
        assert_eq!(driver.phase(), Phase::Stepping);
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Stepped(2));
    }

    #[test]
    fn test_poll_respects_pacing() {
        let Some((mut driver, mut target)) = setup() else { return };

        driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap();
        let now = Instant::now();
        assert_eq!(driver.poll(now, &mut target).unwrap(), TickOutcome::Stepped(1));
        // Scheduled one interval after the submit, which happened after `now`.
        assert_eq!(driver.poll(now, &mut target).unwrap(), TickOutcome::NotDue);
        let deadline = driver.pacer().deadline().unwrap();
        assert_eq!(
            driver.poll(deadline, &mut target).unwrap(),
            TickOutcome::Stepped(2)
        );

        driver.set_paused(true, deadline);
        assert_eq!(
            driver.poll(deadline + INTERVAL * 10, &mut target).unwrap(),
            TickOutcome::NotDue
        );

        // A manual step while paused does not re-arm the pacer.
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Stepped(3));
        assert!(!driver.pacer().is_scheduled());

        driver.set_paused(false, deadline);
        assert!(driver.pacer().is_due(deadline));
    }

    #[test]
    fn test_independent_runs_are_identical() {
        let Some((mut a, mut target_a)) = setup() else { return };
        let Some((mut b, mut target_b)) = setup() else { return };

        let grid = GridConfig::new(24, 20);
        let policy = InitialState::Random {
            density: 0.35,
            seed: Some(42),
        };
        a.initialize(grid, policy.clone()).unwrap();
        b.initialize(grid, policy.clone()).unwrap();

        let mut expected = policy.materialize(grid).unwrap();
        for _ in 0..8 {
            a.tick(&mut target_a).unwrap();
            b.tick(&mut target_b).unwrap();
            expected = step_reference(grid, &expected);
            let cells_a = a.read_cells().unwrap().unwrap();
            let cells_b = b.read_cells().unwrap().unwrap();
            assert_eq!(cells_a, cells_b);
            assert_eq!(cells_a, expected);
        }
    }

    #[test]
    fn test_malformed_program_never_becomes_ready() {
        let Some(gpu) = test_gpu() else { return };

        let programs = Programs {
            render: "@vertex fn vs_main() -> @builtin(position) vec4<f32> {".into(),
            ..Programs::default()
        };
        let mut driver = FrameDriver::new(gpu, FORMAT, INTERVAL).with_programs(programs);
        let err = driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap_err();
        assert!(matches!(err, InitError::ProgramCompileFailure(_)));
        assert_eq!(driver.phase(), Phase::Uninitialized);
        assert!(!driver.pacer().is_scheduled());
    }

    #[test]
    fn test_restart_reuses_grid_and_policy() {
        let Some((mut driver, mut target)) = setup() else { return };

        let grid = GridConfig::new(6, 6);
        let policy = InitialState::Alive {
            cells: vec![7, 8, 9],
        };
        driver.initialize(grid, policy.clone()).unwrap();
        driver.tick(&mut target).unwrap();
        driver.tick(&mut target).unwrap();

        driver.restart().unwrap();
        assert_eq!(driver.generation(), Some(0));
        assert_eq!(driver.session().unwrap().grid(), grid);
        assert_eq!(
            driver.read_cells().unwrap().unwrap(),
            policy.materialize(grid).unwrap()
        );
    }

    #[test]
    fn test_teardown_cancels_before_release() {
        let Some((mut driver, mut target)) = setup() else { return };

        driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap();
        assert!(driver.pacer().is_scheduled());
        driver.teardown();
        assert!(!driver.pacer().is_scheduled());
        assert_eq!(driver.phase(), Phase::Uninitialized);
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Skipped);
    }

    #[test]
    fn test_timed_out_frame_is_dropped_without_halting() {
        let Some((mut driver, mut target)) = setup() else { return };

        driver
            .initialize(GridConfig::new(8, 8), InitialState::Clear)
            .unwrap();
        driver.tick(&mut target).unwrap();

        target.timeout = true;
        let before = Instant::now();
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Dropped);
        assert_eq!(driver.phase(), Phase::Stepping);
        assert_eq!(driver.generation(), Some(1));
        // Retried on the normal cadence, not immediately.
        assert!(!driver.pacer().is_due(before));
        assert!(driver.pacer().deadline().unwrap() >= before + INTERVAL);

        target.timeout = false;
        assert_eq!(driver.tick(&mut target).unwrap(), TickOutcome::Stepped(2));
    }

    #[test]
    fn test_restart_after_teardown_uses_last_requested_grid() {
        let Some((mut driver, _target)) = setup() else { return };

        let grid = GridConfig::new(12, 5);
        driver.initialize(grid, InitialState::Clear).unwrap();
        driver.teardown();
        assert_eq!(driver.phase(), Phase::Uninitialized);

        let handle = driver.restart().unwrap();
        assert_eq!(handle.grid, grid);
        assert_eq!(driver.session().unwrap().grid(), grid);
        assert_eq!(driver.generation(), Some(0));
    }
}
