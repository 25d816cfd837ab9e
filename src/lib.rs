//! # driftfield
//!
//! A pointer-driven 2D particle simulation: a fixed population of
//! particles drifts through a toroidal world and is pulled toward the
//! cursor while it hovers, with distance falloff, linear drag, speed
//! clamping and low-pass-smoothed engagement.
//!
//! The same update rule runs on two paths that stay behaviorally
//! equivalent:
//!
//! - [`stepper::sequential`] — the host-side reference implementation,
//! - [`stepper::parallel`] — a wgpu compute pass consuming a synchronized
//!   copy of the parameters, falling back to the sequential path until its
//!   resources are wired up.
//!
//! ## Quick Start
//!
//! ```ignore
//! use driftfield::prelude::*;
//!
//! let mut sim = ParticleSimulation::new(Backend::Sequential);
//! sim.initialize(2048);
//! sim.set_mouse_target(0.0, 0.0, true);
//!
//! // In your frame loop:
//! sim.step(1.0 / 60.0);
//! if let Some(view) = sim.particles() {
//!     upload(view.as_bytes()); // None would mean: the GPU owns the state
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Parameters
//!
//! All tunables go through clamping setters — out-of-domain values are
//! pulled to the nearest valid bound, never rejected:
//!
//! ```ignore
//! sim.set_base_attract(1.3);
//! sim.set_drag(0.5);
//! sim.set_min_drift_speed(0.2); // keeps min <= max in both directions
//! ```
//!
//! ### The parameter record
//!
//! The compute path reads a versioned, fixed-offset record of 20 floats
//! ([`params::SimUniforms`]); its field order is mirrored by the WGSL
//! `SimUniforms` struct and pinned by tests.
//!
//! ### Ownership handoff
//!
//! Until the compute path dispatches its first update,
//! [`ParticleSimulation::particles`] returns the CPU-side view and the
//! render collaborator uploads it. From the first dispatch on, the
//! storage buffer is authoritative, the view turns `None`, and host
//! memory is never re-uploaded over GPU-produced data.

pub mod app;
pub mod error;
pub mod gpu;
pub mod params;
pub mod resources;
pub mod shaders;
pub mod simulation;
pub mod stepper;
pub mod store;
pub mod time;

pub use bytemuck;
pub use error::{GpuError, SimulationError};
pub use glam::Vec2;
pub use params::{SimUniforms, SimulationParameters, WorldBounds};
pub use resources::ResourceState;
pub use simulation::{Backend, ParticleSimulation};
pub use stepper::parallel::ParallelStepper;
pub use stepper::sequential::SequentialStepper;
pub use stepper::{ParticleStepper, SmoothedInfluence, StepContext};
pub use store::{Particle, ParticleStore};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::params::{SimUniforms, SimulationParameters, WorldBounds};
    pub use crate::resources::ResourceState;
    pub use crate::simulation::{Backend, ParticleSimulation};
    pub use crate::stepper::{ParticleStepper, SmoothedInfluence, StepContext};
    pub use crate::store::{Particle, ParticleStore};
    pub use crate::time::Time;
    pub use crate::Vec2;
}
