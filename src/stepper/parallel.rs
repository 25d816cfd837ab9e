//! GPU-compute execution of the particle update rule.
//!
//! The stepper owns a [`SequentialStepper`] and keeps producing results
//! through it until the compute resources converge ([`ResourceState::BindingReady`]);
//! the rest of the system never observes the gap. Once the compute path
//! dispatches its first update it owns the authoritative particle state:
//! the CPU copy goes stale, [`ParticleStepper::particles`] turns `None`,
//! and nothing re-uploads host memory over GPU-produced data.

use bytemuck::bytes_of;
use std::sync::mpsc;

use super::sequential::SequentialStepper;
use super::{ParticleStepper, SmoothedInfluence, StepContext};
use crate::error::{GpuError, SimulationError};
use crate::params::SimUniforms;
use crate::resources::{ComputeResources, ResourceState};
use crate::store::{Particle, ParticleStore, PARTICLE_STRIDE};

/// Must match `@workgroup_size` in the compute shader.
pub const WORKGROUP_SIZE: u32 = 256;

fn validate_capacity(capacity: u32, required: u32) -> Result<(), SimulationError> {
    if capacity < required {
        return Err(SimulationError::BufferCapacity { capacity, required });
    }
    Ok(())
}

/// Steps particles with a data-parallel compute pass, falling back to the
/// sequential path while the externally-supplied storage buffer is absent.
pub struct ParallelStepper {
    device: wgpu::Device,
    queue: wgpu::Queue,
    fallback: SequentialStepper,
    resources: ComputeResources,
    influence: SmoothedInfluence,
    elapsed: f32,
    authoritative: bool,
}

impl ParallelStepper {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let mut resources = ComputeResources::new();
        // The program half never waits for the buffer half; binding
        // converges whenever the collaborator supplies the buffer.
        resources.ensure_program(&device);
        Self {
            device,
            queue,
            fallback: SequentialStepper::new(),
            resources,
            influence: SmoothedInfluence::new(),
            elapsed: 0.0,
            authoritative: false,
        }
    }

    pub fn resource_state(&self) -> ResourceState {
        self.resources.state()
    }

    /// True once the compute path owns particle state.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Copy the GPU particle buffer back to host memory through a staging
    /// buffer. Diagnostic/testing path, not part of the frame loop.
    pub fn read_back_particles(&self) -> Result<Vec<Particle>, GpuError> {
        let count = self.fallback.instance_count();
        let Some(particle_buffer) = self.resources.particle_buffer() else {
            return Ok(Vec::new());
        };
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = count as u64 * PARTICLE_STRIDE as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Staging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(particle_buffer, 0, &staging, 0, bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let map_result = rx
            .recv()
            .map_err(|_| GpuError::BufferMapping("map_async callback dropped".into()))?;
        map_result.map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let data = slice.get_mapped_range();
        let particles = bytemuck::cast_slice::<u8, Particle>(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(particles)
    }
}

impl ParticleStepper for ParallelStepper {
    fn initialize(&mut self, count: u32) {
        self.fallback.initialize(count);
        self.influence.reset();
        self.elapsed = 0.0;
        self.authoritative = false;
        // A buffer bound for a smaller run cannot hold the new store; drop
        // it and wait for the collaborator to supply a bigger one.
        if self.resources.particle_buffer().is_some() && self.resources.capacity() < count {
            log::debug!(
                "released storage buffer (capacity {} < count {})",
                self.resources.capacity(),
                count
            );
            self.resources.release_particle_buffer();
        }
    }

    fn particles(&self) -> Option<&ParticleStore> {
        if self.authoritative {
            None
        } else {
            self.fallback.particles()
        }
    }

    fn instance_count(&self) -> u32 {
        self.fallback.instance_count()
    }

    fn step(&mut self, ctx: StepContext<'_>) {
        if ctx.dt <= 0.0 {
            return;
        }
        // Advance this path's filter every step, even while falling back,
        // so a mid-session handoff never jumps the influence value.
        let influence = self.influence.advance(
            ctx.dt,
            ctx.params.attraction_engaged(),
            ctx.params.attraction_smoothing(),
        );
        self.elapsed += ctx.dt;

        if self.resources.state() != ResourceState::BindingReady {
            self.fallback.step(ctx);
            return;
        }

        let count = self.fallback.instance_count();
        if count == 0 {
            return;
        }
        // Validated at bind time; tripping here means the bookkeeping is
        // broken, which must not be papered over.
        assert!(
            self.resources.capacity() >= count,
            "storage buffer capacity {} below particle count {}",
            self.resources.capacity(),
            count
        );

        let record = SimUniforms::pack(ctx.dt, self.elapsed, count, influence, ctx.params, ctx.bounds);
        let (Some(pipeline), Some(bind_group), Some(uniform_buffer), Some(particle_buffer)) = (
            self.resources.pipeline(),
            self.resources.bind_group(),
            self.resources.uniform_buffer(),
            self.resources.particle_buffer(),
        ) else {
            return;
        };

        self.queue.write_buffer(uniform_buffer, 0, bytes_of(&record));

        if !self.authoritative {
            // Seed device memory from the host store exactly once; from
            // here on the buffer is the source of truth.
            if let Some(store) = self.fallback.particles() {
                self.queue.write_buffer(particle_buffer, 0, store.as_bytes());
            }
            self.authoritative = true;
            log::info!("compute path took ownership of {} particles", count);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Update Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Particle Update Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn bind_storage_buffer(
        &mut self,
        buffer: wgpu::Buffer,
        capacity: u32,
    ) -> Result<(), SimulationError> {
        validate_capacity(capacity, self.fallback.instance_count())?;
        self.resources.supply_particle_buffer(&self.device, buffer, capacity);
        // A freshly-bound buffer holds no produced state; the next step
        // re-seeds it from the host store.
        self.authoritative = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{SimulationParameters, WorldBounds};
    use crate::stepper::sequential::integrate_particle;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_capacity_validation() {
        assert!(validate_capacity(8, 8).is_ok());
        assert!(validate_capacity(9, 8).is_ok());
        let err = validate_capacity(4, 8).unwrap_err();
        match err {
            SimulationError::BufferCapacity { capacity, required } => {
                assert_eq!(capacity, 4);
                assert_eq!(required, 8);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    /// Headless device, or `None` when the machine has no adapter (the
    /// GPU-backed tests below silently skip in that case).
    fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok()?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()
    }

    fn storage_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test Particle Buffer"),
            size: capacity as u64 * PARTICLE_STRIDE as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn context<'a>(params: &'a SimulationParameters) -> StepContext<'a> {
        StepContext {
            dt: 0.016,
            params,
            bounds: WorldBounds::default(),
        }
    }

    #[test]
    fn test_view_survives_until_first_authoritative_step() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut stepper = ParallelStepper::new(device.clone(), queue);
        stepper.initialize(16);
        assert_eq!(stepper.resource_state(), ResourceState::ProgramReady);

        let params = SimulationParameters::new();
        stepper.step(context(&params));
        assert!(stepper.particles().is_some(), "fallback view must exist");

        let buffer = storage_buffer(&device, 16);
        stepper.bind_storage_buffer(buffer, 16).unwrap();
        assert_eq!(stepper.resource_state(), ResourceState::BindingReady);
        // Bound but not yet dispatched: the CPU view is still the truth.
        assert!(stepper.particles().is_some());

        stepper.step(context(&params));
        assert!(stepper.is_authoritative());
        assert!(stepper.particles().is_none(), "view must be withheld after handoff");
    }

    #[test]
    fn test_reinitialize_beyond_capacity_releases_buffer() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut stepper = ParallelStepper::new(device.clone(), queue);
        stepper.initialize(16);
        stepper
            .bind_storage_buffer(storage_buffer(&device, 16), 16)
            .unwrap();
        assert_eq!(stepper.resource_state(), ResourceState::BindingReady);

        stepper.initialize(32);
        assert_eq!(stepper.resource_state(), ResourceState::ProgramReady);
        assert!(stepper.particles().is_some());

        let err = stepper
            .bind_storage_buffer(storage_buffer(&device, 16), 16)
            .unwrap_err();
        assert!(matches!(err, SimulationError::BufferCapacity { .. }));

        stepper
            .bind_storage_buffer(storage_buffer(&device, 32), 32)
            .unwrap();
        assert_eq!(stepper.resource_state(), ResourceState::BindingReady);
    }

    #[test]
    fn test_compute_path_matches_reference_rule_within_tolerance() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut params = SimulationParameters::new();
        // Instant influence keeps both paths deterministic: no drift
        // re-seeding RNG is ever hit while influence is 1.
        params.set_attraction_smoothing(0.0);
        params.set_mouse_target(0.0, 0.0, true);

        let mut stepper = ParallelStepper::new(device.clone(), queue);
        stepper.initialize(64);
        let mut expected = stepper.particles().unwrap().clone();
        stepper.bind_storage_buffer(storage_buffer(&device, 64), 64).unwrap();

        let steps = 30;
        for _ in 0..steps {
            stepper.step(context(&params));
        }

        let mut influence = SmoothedInfluence::new();
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..steps {
            let value = influence.advance(0.016, true, 0.0);
            for particle in expected.particles_mut() {
                integrate_particle(particle, &context(&params), value, &mut rng);
            }
        }

        let actual = stepper.read_back_particles().unwrap();
        assert_eq!(actual.len(), expected.len());
        for (gpu, cpu) in actual.iter().zip(expected.particles()) {
            assert!(
                (gpu.position.x - cpu.position.x).abs() < 1e-3
                    && (gpu.position.y - cpu.position.y).abs() < 1e-3,
                "positions diverged: gpu {:?} cpu {:?}",
                gpu.position,
                cpu.position
            );
            assert!(
                (gpu.velocity.x - cpu.velocity.x).abs() < 1e-3
                    && (gpu.velocity.y - cpu.velocity.y).abs() < 1e-3
            );
        }
    }
}
