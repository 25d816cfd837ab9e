//! The core-facing simulation interface.
//!
//! [`ParticleSimulation`] is what the render and UI collaborators talk to:
//! it owns the tunable parameters and the world box, and forwards stepping
//! and state access to the execution path chosen once at construction via
//! [`Backend`]. The frame scheduler calls [`step`](ParticleSimulation::step)
//! once per frame; everything else is sampled state, never awaited.

use crate::error::SimulationError;
use crate::params::{SimulationParameters, WorldBounds};
use crate::stepper::parallel::ParallelStepper;
use crate::stepper::sequential::SequentialStepper;
use crate::stepper::{ParticleStepper, StepContext};
use crate::store::ParticleStore;

/// Which execution path advances the particles. Chosen at initialization,
/// never switched mid-run.
pub enum Backend {
    /// Host-side reference path.
    Sequential,
    /// GPU compute path with transparent sequential fallback.
    Parallel {
        device: wgpu::Device,
        queue: wgpu::Queue,
    },
}

/// Facade over the selected stepper plus the shared tunable state.
pub struct ParticleSimulation {
    params: SimulationParameters,
    bounds: WorldBounds,
    stepper: Box<dyn ParticleStepper>,
}

impl ParticleSimulation {
    pub fn new(backend: Backend) -> Self {
        let stepper: Box<dyn ParticleStepper> = match backend {
            Backend::Sequential => Box::new(SequentialStepper::new()),
            Backend::Parallel { device, queue } => Box::new(ParallelStepper::new(device, queue)),
        };
        Self {
            params: SimulationParameters::new(),
            bounds: WorldBounds::default(),
            stepper,
        }
    }

    /// (Re)allocate `count` randomized particles. Any previously obtained
    /// particle view is invalidated.
    pub fn initialize(&mut self, count: u32) {
        self.stepper.initialize(count);
    }

    /// Read view of current particle memory, or `None` while the parallel
    /// path owns authoritative state. `None` means "do not re-upload".
    pub fn particles(&self) -> Option<&ParticleStore> {
        self.stepper.particles()
    }

    pub fn instance_count(&self) -> u32 {
        self.stepper.instance_count()
    }

    /// Advance the simulation by `dt` seconds. Non-positive or non-finite
    /// dt is treated as a skipped frame.
    pub fn step(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.stepper.step(StepContext {
            dt,
            params: &self.params,
            bounds: self.bounds,
        });
    }

    pub fn set_mouse_target(&mut self, x: f32, y: f32, hover: bool) {
        self.params.set_mouse_target(x, y, hover);
    }

    pub fn set_base_attract(&mut self, value: f32) {
        self.params.set_base_attract(value);
    }

    pub fn set_drag(&mut self, value: f32) {
        self.params.set_drag(value);
    }

    pub fn set_attraction_falloff(&mut self, value: f32) {
        self.params.set_attraction_falloff(value);
    }

    pub fn set_min_drift_speed(&mut self, value: f32) {
        self.params.set_min_drift_speed(value);
    }

    pub fn set_max_drift_speed(&mut self, value: f32) {
        self.params.set_max_drift_speed(value);
    }

    pub fn set_attraction_smoothing(&mut self, seconds: f32) {
        self.params.set_attraction_smoothing(seconds);
    }

    /// Bind the externally-allocated GPU particle buffer. The core never
    /// allocates device memory for particles itself, it only requires
    /// `capacity` to cover the current count.
    pub fn set_parallel_buffer(
        &mut self,
        buffer: wgpu::Buffer,
        capacity: u32,
    ) -> Result<(), SimulationError> {
        self.stepper.bind_storage_buffer(buffer, capacity)
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn world_bounds(&self) -> WorldBounds {
        self.bounds
    }
}
