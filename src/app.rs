//! winit application shell.
//!
//! Owns the window, the GPU context, the renderer and the simulation, and
//! translates platform events into core operations: pointer movement
//! becomes the attraction target, a handful of keys nudge parameters, and
//! every redraw drives one `step(dt)` followed by a draw from whichever
//! side currently owns the particle state.

use std::sync::Arc;

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::gpu::renderer::{PointSpriteRenderer, RenderSettings};
use crate::gpu::GpuContext;
use crate::simulation::{Backend, ParticleSimulation};
use crate::time::Time;

/// Particles per run; re-initialization always reallocates this many.
pub const PARTICLE_COUNT: u32 = 2048;

/// Map a cursor position in physical pixels to world space: the inverse
/// of the sprite vertex transform.
pub fn cursor_to_world(pixel: Vec2, resolution: Vec2, view_center: Vec2, zoom: f32) -> Vec2 {
    let ndc = Vec2::new(
        pixel.x / resolution.x * 2.0 - 1.0,
        1.0 - pixel.y / resolution.y * 2.0,
    );
    let aspect = resolution.y / resolution.x;
    Vec2::new(ndc.x / (zoom * aspect), ndc.y / zoom) + view_center
}

pub struct App {
    window: Option<Arc<Window>>,
    context: Option<GpuContext>,
    renderer: Option<PointSpriteRenderer>,
    simulation: Option<ParticleSimulation>,
    particle_buffer: Option<wgpu::Buffer>,
    settings: RenderSettings,
    time: Time,
    last_world_cursor: Option<Vec2>,
}

impl App {
    pub fn new() -> Self {
        let mut settings = RenderSettings::default();
        settings.set_clear_color_hex("#05060a");
        settings.set_sprite_color_hex("#e8f0ff");
        Self {
            window: None,
            context: None,
            renderer: None,
            simulation: None,
            particle_buffer: None,
            settings,
            time: Time::new(),
            last_world_cursor: None,
        }
    }

    fn nudge_parameter(&mut self, key: KeyCode) {
        let Some(sim) = self.simulation.as_mut() else {
            return;
        };
        match key {
            KeyCode::ArrowUp => {
                let v = sim.params().base_attract() + 0.1;
                sim.set_base_attract(v);
                log::debug!("base_attract = {:.2}", sim.params().base_attract());
            }
            KeyCode::ArrowDown => {
                let v = sim.params().base_attract() - 0.1;
                sim.set_base_attract(v);
                log::debug!("base_attract = {:.2}", sim.params().base_attract());
            }
            KeyCode::ArrowRight => {
                let v = sim.params().drag() + 0.05;
                sim.set_drag(v);
                log::debug!("drag = {:.2}", sim.params().drag());
            }
            KeyCode::ArrowLeft => {
                let v = sim.params().drag() - 0.05;
                sim.set_drag(v);
                log::debug!("drag = {:.2}", sim.params().drag());
            }
            KeyCode::KeyS => {
                let v = sim.params().attraction_smoothing() + 0.05;
                sim.set_attraction_smoothing(v);
                log::debug!("smoothing = {:.2}", sim.params().attraction_smoothing());
            }
            KeyCode::KeyX => {
                let v = sim.params().attraction_smoothing() - 0.05;
                sim.set_attraction_smoothing(v);
                log::debug!("smoothing = {:.2}", sim.params().attraction_smoothing());
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(context), Some(renderer), Some(simulation), Some(particle_buffer)) = (
            self.context.as_mut(),
            self.renderer.as_ref(),
            self.simulation.as_mut(),
            self.particle_buffer.as_ref(),
        ) else {
            return;
        };

        let (_, dt) = self.time.update();
        simulation.step(dt);

        // While the CPU side owns the state, mirror it into the shared
        // buffer; once the compute path is authoritative the view is None
        // and the buffer must not be overwritten.
        if let Some(store) = simulation.particles() {
            context
                .queue()
                .write_buffer(particle_buffer, 0, store.as_bytes());
        }

        match renderer.render(context, particle_buffer, simulation.instance_count(), &self.settings) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost) => {
                let size = winit::dpi::PhysicalSize {
                    width: context.config().width,
                    height: context.config().height,
                };
                context.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
            Err(e) => log::warn!("render error: {:?}", e),
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("driftfield")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());
        self.window = Some(window.clone());

        let context =
            pollster::block_on(GpuContext::new(window)).expect("GPU context initialization failed");
        let renderer = PointSpriteRenderer::new(context.device(), context.config().format);
        let particle_buffer = context.create_particle_buffer(PARTICLE_COUNT);

        let mut simulation = ParticleSimulation::new(Backend::Parallel {
            device: context.device().clone(),
            queue: context.queue().clone(),
        });
        simulation.initialize(PARTICLE_COUNT);
        simulation
            .set_parallel_buffer(particle_buffer.clone(), PARTICLE_COUNT)
            .expect("buffer capacity matches particle count");
        log::info!("simulating {} particles", PARTICLE_COUNT);

        self.context = Some(context);
        self.renderer = Some(renderer);
        self.simulation = Some(simulation);
        self.particle_buffer = Some(particle_buffer);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(context) = &mut self.context {
                    context.resize(physical_size);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (Some(context), Some(simulation)) =
                    (self.context.as_ref(), self.simulation.as_mut())
                {
                    let config = context.config();
                    let world = cursor_to_world(
                        Vec2::new(position.x as f32, position.y as f32),
                        Vec2::new(config.width as f32, config.height as f32),
                        self.settings.view_center,
                        self.settings.zoom,
                    );
                    self.last_world_cursor = Some(world);
                    simulation.set_mouse_target(world.x, world.y, true);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let (Some(simulation), Some(world)) =
                    (self.simulation.as_mut(), self.last_world_cursor)
                {
                    simulation.set_mouse_target(world.x, world.y, false);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.nudge_parameter(key);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_to_world_hits_view_center() {
        let resolution = Vec2::new(1280.0, 720.0);
        let world = cursor_to_world(resolution / 2.0, resolution, Vec2::ZERO, 0.2);
        assert!(world.length() < 1e-4);
    }

    #[test]
    fn test_cursor_to_world_inverts_sprite_transform() {
        let resolution = Vec2::new(1280.0, 720.0);
        let view_center = Vec2::new(1.5, -0.5);
        let zoom = 0.2;
        let world = Vec2::new(3.0, 2.0);

        // Forward transform from the sprite vertex shader.
        let aspect = resolution.y / resolution.x;
        let view = (world - view_center) * zoom;
        let ndc = Vec2::new(view.x * aspect, view.y);
        let pixel = Vec2::new(
            (ndc.x + 1.0) / 2.0 * resolution.x,
            (1.0 - ndc.y) / 2.0 * resolution.y,
        );

        let roundtrip = cursor_to_world(pixel, resolution, view_center, zoom);
        assert!((roundtrip - world).length() < 1e-3);
    }

    #[test]
    fn test_cursor_corners_map_monotonically() {
        let resolution = Vec2::new(800.0, 600.0);
        let tl = cursor_to_world(Vec2::ZERO, resolution, Vec2::ZERO, 0.2);
        let br = cursor_to_world(resolution, resolution, Vec2::ZERO, 0.2);
        assert!(tl.x < br.x);
        assert!(tl.y > br.y);
    }
}
