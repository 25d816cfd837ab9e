//! The two execution paths of the particle update rule.
//!
//! [`SequentialStepper`](sequential::SequentialStepper) is the reference
//! semantics, running on the host. [`ParallelStepper`](parallel::ParallelStepper)
//! offloads the identical rule to a GPU compute pass and falls back to the
//! sequential path while its resources converge. Both implement
//! [`ParticleStepper`]; which one drives a simulation is chosen once at
//! initialization.

pub mod parallel;
pub mod sequential;

use crate::error::SimulationError;
use crate::params::{SimulationParameters, WorldBounds};
use crate::store::ParticleStore;

/// Per-step inputs, passed explicitly so the update rule stays pure and
/// testable instead of reading hidden instance state.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Frame delta in seconds, already clamped to `>= 0` by the caller.
    pub dt: f32,
    pub params: &'a SimulationParameters,
    pub bounds: WorldBounds,
}

/// A backend able to advance particle state one frame at a time.
///
/// Implementations own their particle memory and their smoothed-influence
/// state; tunable parameters arrive by value through [`StepContext`].
pub trait ParticleStepper {
    /// (Re)allocate particle state. Any previously obtained view is
    /// invalidated and the host side owns truth again.
    fn initialize(&mut self, count: u32);

    /// Read view of current particle memory, or `None` once an offloaded
    /// path owns authoritative state (callers must treat `None` as
    /// "do not re-upload").
    fn particles(&self) -> Option<&ParticleStore>;

    fn instance_count(&self) -> u32;

    /// Advance every particle by `ctx.dt`. A zero dt is a no-op.
    fn step(&mut self, ctx: StepContext<'_>);

    /// Bind the externally-allocated GPU particle buffer. Backends without
    /// an offload path accept and ignore the handle. Fails if `capacity`
    /// cannot hold the current particle count.
    fn bind_storage_buffer(
        &mut self,
        buffer: wgpu::Buffer,
        capacity: u32,
    ) -> Result<(), SimulationError>;
}

/// Low-pass-filtered attraction engagement in `[0, 1]`.
///
/// Chases 1 while the pointer hovers with a target and 0 otherwise, with
/// `alpha = 1 - exp(-dt / tau)`; `tau = 0` snaps. Per-stepper state rather
/// than a parameter: it is derived, time-dependent, and each path runs its
/// own copy of the filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothedInfluence {
    value: f32,
}

impl SmoothedInfluence {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Advance the filter by `dt` toward the engagement target and return
    /// the new value.
    pub fn advance(&mut self, dt: f32, engaged: bool, smoothing: f32) -> f32 {
        let target = if engaged { 1.0 } else { 0.0 };
        let alpha = if smoothing > 0.0 {
            1.0 - (-dt / smoothing).exp()
        } else {
            1.0
        };
        self.value += (target - self.value) * alpha;
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_influence_snaps_with_zero_smoothing() {
        let mut influence = SmoothedInfluence::new();
        assert_eq!(influence.advance(0.016, true, 0.0), 1.0);
        assert_eq!(influence.advance(0.016, false, 0.0), 0.0);
    }

    #[test]
    fn test_influence_is_monotonic_toward_target() {
        let mut influence = SmoothedInfluence::new();
        let mut last = influence.value();
        for _ in 0..200 {
            let value = influence.advance(0.016, true, 0.2);
            assert!(value >= last);
            assert!(value <= 1.0);
            last = value;
        }
        assert!(last > 0.99);

        for _ in 0..200 {
            let value = influence.advance(0.016, false, 0.2);
            assert!(value <= last);
            assert!(value >= 0.0);
            last = value;
        }
        assert!(last < 0.01);
    }

    #[test]
    fn test_influence_filter_matches_closed_form() {
        let mut influence = SmoothedInfluence::new();
        let dt = 0.016;
        let tau = 0.25;
        influence.advance(dt, true, tau);
        let expected = 1.0 - (-dt / tau).exp();
        assert!((influence.value() - expected).abs() < 1e-6);
    }
}
