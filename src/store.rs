//! Particle attribute storage.
//!
//! Particles live in one contiguous allocation with a fixed per-particle
//! layout. The byte image of that allocation is uploaded verbatim to the
//! GPU storage buffer, so [`Particle`]'s field offsets are a compatibility
//! contract with the compute and render shaders: reordering fields requires
//! a coordinated shader update and a version bump.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Layout version shared with the WGSL `Particle` struct.
pub const PARTICLE_LAYOUT_VERSION: u32 = 1;

/// Half-extent of the box new particles spawn in.
pub const SPAWN_HALF_EXTENT: f32 = 5.0;
/// Render radius range assigned at creation.
pub const SIZE_RANGE: (f32, f32) = (1.0, 8.0);

/// One simulated particle, 32 bytes, layout v1.
///
/// | offset | field              |
/// |--------|--------------------|
/// | 0      | `position`         |
/// | 8      | `velocity`         |
/// | 16     | `size`             |
/// | 20     | `angle`            |
/// | 24     | `angular_velocity` |
/// | 28     | padding            |
///
/// `size` is immutable after creation. `angle` is derived from velocity
/// each step. `angular_velocity` predates the attraction dynamics and is
/// kept only for layout stability; nothing updates it anymore.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub angle: f32,
    pub angular_velocity: f32,
    pub _pad: f32,
}

/// Byte stride of one particle in host memory and in the GPU buffer.
pub const PARTICLE_STRIDE: usize = std::mem::size_of::<Particle>();

/// Owns the particle array for one simulation run.
///
/// The count is fixed at creation; resizing the simulation means creating
/// a new store, never growing this one in place.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    /// Allocate `count` particles with randomized position and size.
    ///
    /// Positions are uniform in the spawn box, sizes uniform in
    /// [`SIZE_RANGE`]; velocity, angle and angular velocity start at zero.
    pub fn create(count: u32) -> Self {
        Self::create_with_rng(count, &mut SmallRng::from_entropy())
    }

    /// Like [`create`](Self::create) with a caller-supplied RNG, so spawn
    /// layouts can be reproduced.
    pub fn create_with_rng(count: u32, rng: &mut SmallRng) -> Self {
        let particles = (0..count)
            .map(|_| Particle {
                position: Vec2::new(
                    rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT),
                    rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT),
                ),
                velocity: Vec2::ZERO,
                size: rng.gen_range(SIZE_RANGE.0..SIZE_RANGE.1),
                angle: 0.0,
                angular_velocity: 0.0,
                _pad: 0.0,
            })
            .collect();
        Self { particles }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Position of particle `index`. Panics if `index` is out of range.
    #[inline]
    pub fn position(&self, index: usize) -> Vec2 {
        self.particles[index].position
    }

    #[inline]
    pub fn set_position(&mut self, index: usize, position: Vec2) {
        self.particles[index].position = position;
    }

    /// Velocity of particle `index`. Panics if `index` is out of range.
    #[inline]
    pub fn velocity(&self, index: usize) -> Vec2 {
        self.particles[index].velocity
    }

    #[inline]
    pub fn set_velocity(&mut self, index: usize, velocity: Vec2) {
        self.particles[index].velocity = velocity;
    }

    /// Heading of particle `index`. Panics if `index` is out of range.
    #[inline]
    pub fn angle(&self, index: usize) -> f32 {
        self.particles[index].angle
    }

    #[inline]
    pub fn set_angle(&mut self, index: usize, angle: f32) {
        self.particles[index].angle = angle;
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Byte image of the whole array, suitable for `Queue::write_buffer`.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }
}
