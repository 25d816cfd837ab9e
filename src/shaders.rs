//! WGSL sources shared by the compute and render paths.
//!
//! Both shaders hard-code the layout-v1 struct definitions; the matching
//! Rust structs live in `store` and `params` (compute) and
//! `gpu::renderer` (sprites). The tests below run every source through
//! naga so a layout or syntax slip fails in CI instead of at device
//! creation.

/// Data-parallel particle update. Consumes the 20-float parameter record.
pub const PARTICLE_COMPUTE_SOURCE: &str = include_str!("particle_update.wgsl");

/// Instance-stepped point-sprite renderer over the particle buffer.
pub const POINT_SPRITE_SOURCE: &str = include_str!("point_sprite.wgsl");
