//! Lifecycle of the compute path's GPU resources.
//!
//! The compute program and the particle storage buffer arrive from
//! different owners in no guaranteed order: the program exists as soon as
//! a device does, while the buffer is allocated by the render collaborator
//! and handed in later (or earlier, after a re-initialization). Binding
//! can only be built once both exist, so the lifecycle is an explicit
//! little state machine instead of a chain of ensure-guards: every supply
//! call is idempotent, and binding construction is re-attempted after each
//! resource becomes available until the machine converges on
//! [`ResourceState::BindingReady`].

use crate::params::SimUniforms;
use crate::shaders::PARTICLE_COMPUTE_SOURCE;

/// Progress of the compute path's resource set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized,
    ProgramReady,
    BufferReady,
    BindingReady,
}

/// Pure bookkeeping half of the lifecycle, separated from the wgpu objects
/// so re-entrancy and call-order independence are plain unit-testable
/// facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLedger {
    program: bool,
    buffers: bool,
    binding: bool,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the compute program (pipeline + layout + record buffer).
    /// Returns `false` when already recorded, in which case the caller
    /// must not create the resources again.
    pub fn mark_program(&mut self) -> bool {
        !std::mem::replace(&mut self.program, true)
    }

    /// Record the particle storage buffer. Always accepted: a re-supplied
    /// buffer replaces the old one, so any existing binding is dropped.
    pub fn mark_buffers(&mut self) {
        self.buffers = true;
        self.binding = false;
    }

    /// True when binding can (and should) be built now.
    pub fn can_bind(&self) -> bool {
        self.program && self.buffers && !self.binding
    }

    pub fn mark_binding(&mut self) {
        self.binding = true;
    }

    /// Forget the buffer-dependent half; the program survives.
    pub fn clear_buffers(&mut self) {
        self.buffers = false;
        self.binding = false;
    }

    pub fn state(&self) -> ResourceState {
        if self.binding {
            ResourceState::BindingReady
        } else if self.buffers {
            ResourceState::BufferReady
        } else if self.program {
            ResourceState::ProgramReady
        } else {
            ResourceState::Uninitialized
        }
    }
}

/// The actual wgpu resource set, kept in lockstep with a [`ResourceLedger`].
pub struct ComputeResources {
    ledger: ResourceLedger,
    pipeline: Option<wgpu::ComputePipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    uniform_buffer: Option<wgpu::Buffer>,
    particle_buffer: Option<wgpu::Buffer>,
    capacity: u32,
    bind_group: Option<wgpu::BindGroup>,
}

impl ComputeResources {
    pub fn new() -> Self {
        Self {
            ledger: ResourceLedger::new(),
            pipeline: None,
            bind_group_layout: None,
            uniform_buffer: None,
            particle_buffer: None,
            capacity: 0,
            bind_group: None,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.ledger.state()
    }

    /// Number of particles the bound storage buffer can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Create the compute pipeline, its bind-group layout and the
    /// parameter-record buffer. Re-entering once created is a no-op.
    pub fn ensure_program(&mut self, device: &wgpu::Device) {
        if !self.ledger.mark_program() {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Update Shader"),
            source: wgpu::ShaderSource::Wgsl(PARTICLE_COMPUTE_SOURCE.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle Update Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Update Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Particle Update Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Sim Uniforms"),
            size: std::mem::size_of::<SimUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.pipeline = Some(pipeline);
        self.bind_group_layout = Some(bind_group_layout);
        self.uniform_buffer = Some(uniform_buffer);
        self.try_build_binding(device);
    }

    /// Adopt the externally-allocated particle storage buffer. Replacing
    /// an already-bound buffer drops the old binding and rebuilds it.
    pub fn supply_particle_buffer(
        &mut self,
        device: &wgpu::Device,
        buffer: wgpu::Buffer,
        capacity: u32,
    ) {
        self.particle_buffer = Some(buffer);
        self.capacity = capacity;
        self.ledger.mark_buffers();
        self.bind_group = None;
        self.try_build_binding(device);
    }

    /// Drop the buffer-dependent resources, e.g. when the simulation was
    /// re-initialized beyond the bound capacity. The program survives.
    pub fn release_particle_buffer(&mut self) {
        self.particle_buffer = None;
        self.capacity = 0;
        self.bind_group = None;
        self.ledger.clear_buffers();
    }

    fn try_build_binding(&mut self, device: &wgpu::Device) {
        if !self.ledger.can_bind() {
            return;
        }
        // can_bind guarantees both halves exist.
        let (Some(layout), Some(particle_buffer), Some(uniform_buffer)) = (
            self.bind_group_layout.as_ref(),
            self.particle_buffer.as_ref(),
            self.uniform_buffer.as_ref(),
        ) else {
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Update Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        self.bind_group = Some(bind_group);
        self.ledger.mark_binding();
    }

    pub fn pipeline(&self) -> Option<&wgpu::ComputePipeline> {
        self.pipeline.as_ref()
    }

    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    pub fn uniform_buffer(&self) -> Option<&wgpu::Buffer> {
        self.uniform_buffer.as_ref()
    }

    pub fn particle_buffer(&self) -> Option<&wgpu::Buffer> {
        self.particle_buffer.as_ref()
    }
}

impl Default for ComputeResources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_starts_uninitialized() {
        let ledger = ResourceLedger::new();
        assert_eq!(ledger.state(), ResourceState::Uninitialized);
        assert!(!ledger.can_bind());
    }

    #[test]
    fn test_program_first_then_buffers_converges() {
        let mut ledger = ResourceLedger::new();
        assert!(ledger.mark_program());
        assert_eq!(ledger.state(), ResourceState::ProgramReady);
        assert!(!ledger.can_bind());

        ledger.mark_buffers();
        assert_eq!(ledger.state(), ResourceState::BufferReady);
        assert!(ledger.can_bind());

        ledger.mark_binding();
        assert_eq!(ledger.state(), ResourceState::BindingReady);
        assert!(!ledger.can_bind());
    }

    #[test]
    fn test_buffers_first_then_program_converges() {
        let mut ledger = ResourceLedger::new();
        ledger.mark_buffers();
        assert_eq!(ledger.state(), ResourceState::BufferReady);
        assert!(!ledger.can_bind());

        assert!(ledger.mark_program());
        assert!(ledger.can_bind());
        ledger.mark_binding();
        assert_eq!(ledger.state(), ResourceState::BindingReady);
    }

    #[test]
    fn test_marking_program_twice_is_rejected_once_set() {
        let mut ledger = ResourceLedger::new();
        assert!(ledger.mark_program());
        assert!(!ledger.mark_program());
        assert_eq!(ledger.state(), ResourceState::ProgramReady);
    }

    #[test]
    fn test_resupplying_buffers_invalidates_binding_only() {
        let mut ledger = ResourceLedger::new();
        ledger.mark_program();
        ledger.mark_buffers();
        ledger.mark_binding();
        assert_eq!(ledger.state(), ResourceState::BindingReady);

        ledger.mark_buffers();
        assert_eq!(ledger.state(), ResourceState::BufferReady);
        assert!(ledger.can_bind());
    }

    #[test]
    fn test_clearing_buffers_keeps_program() {
        let mut ledger = ResourceLedger::new();
        ledger.mark_program();
        ledger.mark_buffers();
        ledger.mark_binding();

        ledger.clear_buffers();
        assert_eq!(ledger.state(), ResourceState::ProgramReady);
        assert!(!ledger.can_bind());

        ledger.mark_buffers();
        assert!(ledger.can_bind());
    }
}
