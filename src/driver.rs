use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendError, GpuBackend};
use crate::simulation::FluidSimulation;
use crate::splat::Splat;

pub trait Clock {
    fn now(&self) -> f64;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

pub trait RunGate {
    fn should_run(&self) -> bool;
}

impl<F: Fn() -> bool> RunGate for F {
    fn should_run(&self) -> bool {
        self()
    }
}

pub struct AlwaysRun;

impl RunGate for AlwaysRun {
    fn should_run(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Stopped,
    Gated,
    Skipped,
    Advanced { dt: f32, resized: bool },
}

/// Runs one simulation step per display refresh and owns the physics clock.
pub struct FrameDriver<C: Clock = SystemClock> {
    clock: C,
    started: f64,
    last_time: f64,
    stop: StopHandle,
    splash_pending: bool,
    gated: bool,
}

impl<C: Clock> FrameDriver<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            started: now,
            last_time: now,
            stop: StopHandle::default(),
            splash_pending: true,
            gated: false,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn tick<B: GpuBackend, G: RunGate + ?Sized>(
        &mut self,
        sim: &mut FluidSimulation<B>,
        gate: &G,
    ) -> Result<TickOutcome, BackendError> {
        if self.stop.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }
        let now = self.clock.now();
        let splash_due =
            self.splash_pending && now - self.started >= sim.config().initial_splash_delay as f64;

        let open = gate.should_run();
        if open == self.gated {
            self.gated = !open;
            log::info!("fluid {}", if open { "resumed" } else { "paused" });
        }
        if !open {
            if splash_due {
                log::debug!("initial splash dropped while paused");
                self.splash_pending = false;
            }
            self.last_time = now;
            return Ok(TickOutcome::Gated);
        }

        let surface = sim.surface_size();
        if surface.0 == 0 || surface.1 == 0 {
            self.last_time = now;
            return Ok(TickOutcome::Skipped);
        }
        let resized = sim.resize_if_needed()?;

        let dt = ((now - self.last_time).max(0.0) as f32).min(sim.config().max_dt);
        self.last_time = now;
        log::debug!("tick dt={dt:.4}");

        if splash_due {
            self.splash_pending = false;
            sim.splat(&Splat::initial_splash(surface))?;
        }
        sim.step(dt)?;
        sim.render()?;
        sim.present()?;
        Ok(TickOutcome::Advanced { dt, resized })
    }
}
