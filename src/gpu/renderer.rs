//! Point-sprite presentation of the particle buffer.
//!
//! The renderer pulls position and size straight out of the shared
//! storage buffer with instance-stepped vertex attributes, so whichever
//! path produced the data last (CPU upload or compute dispatch) is what
//! gets drawn. Sprite appearance lives in [`RenderSettings`], mirrored
//! into a 12-float uniform block rewritten once per frame.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::GpuContext;
use crate::shaders::POINT_SPRITE_SOURCE;
use crate::store::PARTICLE_STRIDE;

/// Parse `#rgb` or `#rrggbb` (leading `#` optional) into normalized RGB.
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let raw = hex.strip_prefix('#').unwrap_or(hex);
    let expanded: String = if raw.len() == 3 {
        raw.chars().flat_map(|c| [c, c]).collect()
    } else {
        raw.to_string()
    };
    if expanded.len() != 6 {
        return None;
    }
    let v = u32::from_str_radix(&expanded, 16).ok()?;
    Some([
        ((v >> 16) & 255) as f32 / 255.0,
        ((v >> 8) & 255) as f32 / 255.0,
        (v & 255) as f32 / 255.0,
    ])
}

/// UI-controlled presentation settings.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub clear_color: wgpu::Color,
    /// Sprite RGBA; alpha scales the whole sprite.
    pub sprite_color: [f32; 4],
    /// Multiplier on each particle's stored size, in pixels per size unit.
    pub size_scale: f32,
    /// Extra edge softness in UV units; 0 lets fwidth drive the AA.
    pub edge: f32,
    /// World-space camera center.
    pub view_center: Vec2,
    /// World units to NDC scale.
    pub zoom: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            sprite_color: [1.0, 1.0, 1.0, 1.0],
            size_scale: 1.0,
            edge: 0.0,
            view_center: Vec2::ZERO,
            zoom: 0.2,
        }
    }
}

impl RenderSettings {
    /// Set the clear color from a hex string; invalid input is ignored
    /// with a warning, matching the clamp-don't-reject policy of the
    /// simulation setters.
    pub fn set_clear_color_hex(&mut self, hex: &str) {
        match parse_hex_color(hex) {
            Some([r, g, b]) => {
                self.clear_color = wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: 1.0,
                };
            }
            None => log::warn!("ignoring invalid clear color {:?}", hex),
        }
    }

    /// Set the sprite color from a hex string, preserving current alpha.
    pub fn set_sprite_color_hex(&mut self, hex: &str) {
        match parse_hex_color(hex) {
            Some([r, g, b]) => {
                self.sprite_color = [r, g, b, self.sprite_color[3]];
            }
            None => log::warn!("ignoring invalid sprite color {:?}", hex),
        }
    }
}

// Field order matches the WGSL SpriteUniforms struct: resolution,
// size_scale, edge, color, view_center, zoom, pad.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SpriteUniforms {
    resolution: [f32; 2],
    size_scale: f32,
    edge: f32,
    color: [f32; 4],
    view_center: [f32; 2],
    zoom: f32,
    _pad: f32,
}

impl SpriteUniforms {
    fn new(settings: &RenderSettings, width: u32, height: u32) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            size_scale: settings.size_scale,
            edge: settings.edge,
            color: settings.sprite_color,
            view_center: settings.view_center.to_array(),
            zoom: settings.zoom,
            _pad: 0.0,
        }
    }
}

/// Draws every particle as a soft circular sprite.
pub struct PointSpriteRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PointSpriteRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(POINT_SPRITE_SOURCE.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Uniforms"),
            size: std::mem::size_of::<SpriteUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Sprite Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: PARTICLE_STRIDE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2, // position
                        },
                        wgpu::VertexAttribute {
                            offset: 16,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32, // size
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    /// Draw one frame from the particle buffer and present it.
    pub fn render(
        &self,
        context: &GpuContext,
        particle_buffer: &wgpu::Buffer,
        instance_count: u32,
        settings: &RenderSettings,
    ) -> Result<(), wgpu::SurfaceError> {
        let config = context.config();
        let uniforms = SpriteUniforms::new(settings, config.width, config.height);
        context
            .queue()
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let output = context.surface().get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(settings.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, particle_buffer.slice(..));
            render_pass.draw(0..6, 0..instance_count);
        }

        context.queue().submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_uniforms_are_12_floats() {
        assert_eq!(std::mem::size_of::<SpriteUniforms>(), 48);
    }

    #[test]
    fn test_parse_six_digit_hex() {
        let [r, g, b] = parse_hex_color("#ff8000").unwrap();
        assert!((r - 1.0).abs() < 1e-6);
        assert!((g - 128.0 / 255.0).abs() < 1e-6);
        assert!(b.abs() < 1e-6);
    }

    #[test]
    fn test_parse_three_digit_hex_expands() {
        assert_eq!(parse_hex_color("#fff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_hex_color("abc"), parse_hex_color("#aabbcc"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("zzzzzz"), None);
    }

    #[test]
    fn test_invalid_hex_leaves_settings_untouched() {
        let mut settings = RenderSettings::default();
        let before = settings.sprite_color;
        settings.set_sprite_color_hex("not-a-color");
        assert_eq!(settings.sprite_color, before);
    }
}
