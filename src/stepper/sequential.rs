//! Host-side reference implementation of the particle update rule.
//!
//! The per-particle rule lives in [`integrate_particle`] as a pure function
//! over an explicit context; the compute shader in `shaders.rs` mirrors it
//! statement for statement, so any change here is a change to both paths.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{ParticleStepper, SmoothedInfluence, StepContext};
use crate::error::SimulationError;
use crate::store::{Particle, ParticleStore};

/// Below this influence the attraction is considered disengaged and drift
/// bounds are enforced.
pub const INFLUENCE_CUTOFF: f32 = 0.05;
/// Minimum separation used in the falloff, so a particle sitting on the
/// target cannot divide by zero.
pub const MIN_ATTRACT_DIST: f32 = 1e-4;
/// Speeds below this count as stopped and get a fresh random heading.
pub const REST_SPEED: f32 = 1e-4;

/// Advance one particle by `dt` under the shared rule.
///
/// `influence` is the smoothed attraction engagement for this step. The
/// update reads only the particle's own prior state plus the context, the
/// precondition the data-parallel path relies on.
pub fn integrate_particle(
    particle: &mut Particle,
    ctx: &StepContext<'_>,
    influence: f32,
    rng: &mut SmallRng,
) {
    let dt = ctx.dt;
    let params = ctx.params;
    let mut velocity = particle.velocity;

    if influence > 0.0 {
        if let Some(target) = params.mouse_target() {
            let diff = target - particle.position;
            let dist = diff.length().max(MIN_ATTRACT_DIST);
            let dir = diff / dist;
            // Bounded near the target, vanishing smoothly at range.
            let falloff = 1.0 / (1.0 + dist * dist * params.attraction_falloff());
            let strength = params.base_attract() * falloff * influence;
            velocity += dir * strength * dt;
        }
    }

    velocity *= (1.0 - params.drag() * dt).max(0.0);

    if influence < INFLUENCE_CUTOFF {
        velocity = enforce_drift_bounds(
            velocity,
            params.min_drift_speed(),
            params.max_drift_speed(),
            rng,
        );
    }

    let position = ctx.bounds.wrap(particle.position + velocity * dt);

    particle.position = position;
    particle.velocity = velocity;
    if velocity != Vec2::ZERO {
        particle.angle = velocity.y.atan2(velocity.x);
    }
}

/// Keep a disengaged particle's speed inside `[min, max]`: stopped
/// particles get a random heading at `min`, slow ones are scaled up to it,
/// fast ones scaled down to `max`.
fn enforce_drift_bounds(velocity: Vec2, min: f32, max: f32, rng: &mut SmallRng) -> Vec2 {
    let speed = velocity.length();
    if speed < REST_SPEED {
        let heading = rng.gen_range(0.0..std::f32::consts::TAU);
        Vec2::new(heading.cos(), heading.sin()) * min
    } else if speed < min {
        velocity * (min / speed)
    } else if speed > max {
        velocity * (max / speed)
    } else {
        velocity
    }
}

/// The reference stepper: advances the store in place on the host.
#[derive(Debug)]
pub struct SequentialStepper {
    store: Option<ParticleStore>,
    influence: SmoothedInfluence,
    rng: SmallRng,
}

impl SequentialStepper {
    pub fn new() -> Self {
        Self {
            store: None,
            influence: SmoothedInfluence::new(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Current influence value, exposed for diagnostics and tests.
    pub fn influence(&self) -> f32 {
        self.influence.value()
    }

    pub(crate) fn store_mut(&mut self) -> Option<&mut ParticleStore> {
        self.store.as_mut()
    }
}

impl Default for SequentialStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleStepper for SequentialStepper {
    fn initialize(&mut self, count: u32) {
        self.store = Some(ParticleStore::create(count));
        self.influence.reset();
    }

    fn particles(&self) -> Option<&ParticleStore> {
        self.store.as_ref()
    }

    fn instance_count(&self) -> u32 {
        self.store.as_ref().map_or(0, |s| s.len() as u32)
    }

    fn step(&mut self, ctx: StepContext<'_>) {
        if ctx.dt <= 0.0 {
            return;
        }
        let influence = self.influence.advance(
            ctx.dt,
            ctx.params.attraction_engaged(),
            ctx.params.attraction_smoothing(),
        );
        let Some(store) = self.store.as_mut() else {
            return;
        };
        for particle in store.particles_mut() {
            integrate_particle(particle, &ctx, influence, &mut self.rng);
        }
    }

    fn bind_storage_buffer(
        &mut self,
        _buffer: wgpu::Buffer,
        _capacity: u32,
    ) -> Result<(), SimulationError> {
        // Nothing to offload to; the handle belongs to the parallel path.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{SimulationParameters, WorldBounds};

    fn context<'a>(dt: f32, params: &'a SimulationParameters) -> StepContext<'a> {
        StepContext {
            dt,
            params,
            bounds: WorldBounds::default(),
        }
    }

    fn single_particle(position: Vec2, velocity: Vec2) -> Particle {
        Particle {
            position,
            velocity,
            size: 2.0,
            angle: 0.0,
            angular_velocity: 0.0,
            _pad: 0.0,
        }
    }

    #[test]
    fn test_attraction_pulls_toward_target() {
        let mut params = SimulationParameters::new();
        params.set_base_attract(1.3);
        params.set_drag(0.5);
        params.set_attraction_falloff(0.1);
        params.set_attraction_smoothing(0.0);
        params.set_mouse_target(0.0, 0.0, true);

        let mut particle = single_particle(Vec2::new(5.0, 0.0), Vec2::ZERO);
        let mut rng = SmallRng::seed_from_u64(1);
        integrate_particle(&mut particle, &context(0.016, &params), 1.0, &mut rng);

        assert!(particle.velocity.x < 0.0);
        assert!(particle.position.x < 5.0);
    }

    #[test]
    fn test_zero_separation_does_not_produce_nan() {
        let mut params = SimulationParameters::new();
        params.set_mouse_target(1.0, 1.0, true);
        let mut particle = single_particle(Vec2::new(1.0, 1.0), Vec2::ZERO);
        let mut rng = SmallRng::seed_from_u64(1);
        integrate_particle(&mut particle, &context(0.016, &params), 1.0, &mut rng);
        assert!(particle.position.is_finite());
        assert!(particle.velocity.is_finite());
    }

    #[test]
    fn test_drift_bounds_apply_once_disengaged() {
        let mut params = SimulationParameters::new();
        params.set_min_drift_speed(0.5);
        params.set_max_drift_speed(1.5);
        let mut rng = SmallRng::seed_from_u64(3);

        // Stopped: re-seeded at the minimum drift speed.
        let mut stopped = single_particle(Vec2::ZERO, Vec2::ZERO);
        integrate_particle(&mut stopped, &context(0.016, &params), 0.0, &mut rng);
        assert!((stopped.velocity.length() - 0.5).abs() < 1e-4);

        // Too slow: rescaled up, heading preserved.
        let mut slow = single_particle(Vec2::ZERO, Vec2::new(0.1, 0.0));
        integrate_particle(&mut slow, &context(0.016, &params), 0.0, &mut rng);
        assert!((slow.velocity.length() - 0.5).abs() < 1e-3);
        assert!(slow.velocity.x > 0.0);

        // Too fast: rescaled down to the maximum.
        let mut fast = single_particle(Vec2::ZERO, Vec2::new(0.0, 40.0));
        integrate_particle(&mut fast, &context(0.016, &params), 0.0, &mut rng);
        assert!((fast.velocity.length() - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_speeds_converge_into_drift_band() {
        let mut params = SimulationParameters::new();
        params.set_drag(0.5);
        params.set_min_drift_speed(0.3);
        params.set_max_drift_speed(2.0);

        let mut stepper = SequentialStepper::new();
        stepper.initialize(64);
        for _ in 0..120 {
            stepper.step(context(0.016, &params));
        }
        let store = stepper.particles().unwrap();
        for i in 0..store.len() {
            let speed = store.velocity(i).length();
            assert!(speed >= 0.3 - 1e-3 && speed <= 2.0 + 1e-3);
        }
    }

    #[test]
    fn test_positions_stay_inside_world_after_stepping() {
        let params = SimulationParameters::new();
        let bounds = WorldBounds::default();
        let mut stepper = SequentialStepper::new();
        stepper.initialize(128);
        // Plant one particle far outside to force a multi-wrap.
        stepper
            .store_mut()
            .unwrap()
            .set_position(0, Vec2::new(57.0, -33.0));
        for _ in 0..10 {
            stepper.step(context(0.05, &params));
        }
        let store = stepper.particles().unwrap();
        for i in 0..store.len() {
            assert!(bounds.contains(store.position(i)), "particle {} escaped", i);
        }
    }

    #[test]
    fn test_wrap_scenario_half_unit_overshoot() {
        let params = SimulationParameters::new();
        let mut particle = single_particle(Vec2::new(10.34, 0.0), Vec2::new(10.0, 0.0));
        let mut rng = SmallRng::seed_from_u64(5);
        // One step at dt=0.016 moves x to ~10.5 before wrapping.
        integrate_particle(&mut particle, &context(0.016, &params), 1.0, &mut rng);
        assert!(particle.position.x < 0.0);
    }

    #[test]
    fn test_zero_dt_is_a_no_op() {
        let params = SimulationParameters::new();
        let mut stepper = SequentialStepper::new();
        stepper.initialize(16);
        let before = stepper.particles().unwrap().particles().to_vec();
        stepper.step(context(0.0, &params));
        assert_eq!(stepper.particles().unwrap().particles(), &before[..]);
    }

    #[test]
    fn test_angle_tracks_velocity_heading() {
        let params = SimulationParameters::new();
        let mut particle = single_particle(Vec2::ZERO, Vec2::new(0.0, 1.0));
        let mut rng = SmallRng::seed_from_u64(9);
        integrate_particle(&mut particle, &context(0.016, &params), 1.0, &mut rng);
        assert!((particle.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }
}
