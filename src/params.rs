//! Tunable simulation parameters and their GPU-visible record.
//!
//! [`SimulationParameters`] is the UI-facing knob set: every setter clamps
//! its value into the valid domain instead of rejecting it, because these
//! are continuously-adjusted slider values. [`SimUniforms`] is the
//! fixed-offset binary record through which the parameters (plus per-frame
//! state) cross into the compute shader; its field order is pinned by the
//! WGSL `SimUniforms` struct and must only change together with a layout
//! version bump.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Toroidal world box particles live in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl WorldBounds {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Wrap a position back into the box, torus-style.
    ///
    /// Overshoot re-enters from the opposite edge; the overshoot is always
    /// non-negative in the branch it is used, so `rem_euclid` keeps the
    /// result inside the box even when it exceeds one world size.
    pub fn wrap(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            wrap_axis(position.x, self.min.x, self.max.x),
            wrap_axis(position.y, self.min.y, self.max.y),
        )
    }

    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0))
    }
}

fn wrap_axis(value: f32, min: f32, max: f32) -> f32 {
    let size = max - min;
    if value < min {
        max - (min - value).rem_euclid(size)
    } else if value > max {
        min + (value - max).rem_euclid(size)
    } else {
        value
    }
}

/// Attraction / drift tunables, mutated only through clamping setters.
///
/// Created once per simulation run and shared by value with the compute
/// path via [`SimUniforms`]; the steppers never mutate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    base_attract: f32,
    drag: f32,
    attraction_falloff: f32,
    min_drift_speed: f32,
    max_drift_speed: f32,
    attraction_smoothing: f32,
    mouse_target: Option<Vec2>,
    mouse_hover: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            base_attract: 1.3,
            drag: 0.5,
            attraction_falloff: 0.1,
            min_drift_speed: 0.2,
            max_drift_speed: 2.5,
            attraction_smoothing: 0.2,
            mouse_target: None,
            mouse_hover: false,
        }
    }
}

impl SimulationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull strength toward the target, clamped to `>= 0`.
    pub fn set_base_attract(&mut self, value: f32) {
        self.base_attract = value.max(0.0);
    }

    /// Linear velocity damping per second, clamped to `>= 0`.
    pub fn set_drag(&mut self, value: f32) {
        self.drag = value.max(0.0);
    }

    /// Quadratic distance falloff coefficient, clamped to `>= 0`.
    pub fn set_attraction_falloff(&mut self, value: f32) {
        self.attraction_falloff = value.max(0.0);
    }

    /// Lower drift-speed bound; the incoming value is clamped into
    /// `[0, max_drift_speed]` so `min <= max` always holds.
    pub fn set_min_drift_speed(&mut self, value: f32) {
        self.min_drift_speed = value.max(0.0).min(self.max_drift_speed);
    }

    /// Upper drift-speed bound; the incoming value is clamped to at least
    /// `min_drift_speed`.
    pub fn set_max_drift_speed(&mut self, value: f32) {
        self.max_drift_speed = value.max(0.0).max(self.min_drift_speed);
    }

    /// Influence low-pass time constant in seconds, clamped to `>= 0`.
    /// Zero means attraction engages and disengages instantly.
    pub fn set_attraction_smoothing(&mut self, seconds: f32) {
        self.attraction_smoothing = seconds.max(0.0);
    }

    /// Record the pointer position and hover state.
    ///
    /// The target survives `hover = false` so attraction fades toward the
    /// last known position instead of snapping off.
    pub fn set_mouse_target(&mut self, x: f32, y: f32, hover: bool) {
        self.mouse_target = Some(Vec2::new(x, y));
        self.mouse_hover = hover;
    }

    #[inline]
    pub fn base_attract(&self) -> f32 {
        self.base_attract
    }

    #[inline]
    pub fn drag(&self) -> f32 {
        self.drag
    }

    #[inline]
    pub fn attraction_falloff(&self) -> f32 {
        self.attraction_falloff
    }

    #[inline]
    pub fn min_drift_speed(&self) -> f32 {
        self.min_drift_speed
    }

    #[inline]
    pub fn max_drift_speed(&self) -> f32 {
        self.max_drift_speed
    }

    #[inline]
    pub fn attraction_smoothing(&self) -> f32 {
        self.attraction_smoothing
    }

    #[inline]
    pub fn mouse_target(&self) -> Option<Vec2> {
        self.mouse_target
    }

    #[inline]
    pub fn mouse_hover(&self) -> bool {
        self.mouse_hover
    }

    /// True while the pointer is hovering and a target has been set; this
    /// is what the influence filter chases.
    #[inline]
    pub fn attraction_engaged(&self) -> bool {
        self.mouse_hover && self.mouse_target.is_some()
    }
}

/// Layout version shared with the WGSL `SimUniforms` struct.
pub const SIM_UNIFORMS_VERSION: u32 = 1;

/// Number of floats in the parameter record.
pub const SIM_UNIFORM_FLOATS: usize = 20;

/// The parameter record consumed by the compute shader, layout v1.
///
/// 20 floats, 80 bytes. Index order: dt, time, particle_count, pad,
/// base_attract, drag, attraction_falloff, min_drift_speed,
/// max_drift_speed, attraction_smoothing, mouse_influence, pad,
/// world_min, world_max, mouse_target, pad, pad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimUniforms {
    pub dt: f32,
    pub time: f32,
    pub particle_count: f32,
    pub _pad0: f32,
    pub base_attract: f32,
    pub drag: f32,
    pub attraction_falloff: f32,
    pub min_drift_speed: f32,
    pub max_drift_speed: f32,
    pub attraction_smoothing: f32,
    pub mouse_influence: f32,
    pub _pad1: f32,
    pub world_min: [f32; 2],
    pub world_max: [f32; 2],
    pub mouse_target: [f32; 2],
    pub _pad2: [f32; 2],
}

impl SimUniforms {
    /// Assemble the record for one step.
    ///
    /// `influence` is the already-smoothed attraction influence; the
    /// shader consumes it as-is and runs no filter of its own.
    pub fn pack(
        dt: f32,
        time: f32,
        particle_count: u32,
        influence: f32,
        params: &SimulationParameters,
        bounds: WorldBounds,
    ) -> Self {
        let target = params.mouse_target().unwrap_or(Vec2::ZERO);
        Self {
            dt,
            time,
            particle_count: particle_count as f32,
            _pad0: 0.0,
            base_attract: params.base_attract(),
            drag: params.drag(),
            attraction_falloff: params.attraction_falloff(),
            min_drift_speed: params.min_drift_speed(),
            max_drift_speed: params.max_drift_speed(),
            attraction_smoothing: params.attraction_smoothing(),
            mouse_influence: influence,
            _pad1: 0.0,
            world_min: bounds.min.to_array(),
            world_max: bounds.max.to_array(),
            mouse_target: target.to_array(),
            _pad2: [0.0; 2],
        }
    }
}
