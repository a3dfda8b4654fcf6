//! Rust structs with memory layouts that match their same named counterparts
//! in shader code.
//!
//! Three component vectors are stored as `Vec4` with the spare `w` lane either
//! carrying a related scalar or left as padding. For example the point light
//! block encodes its attenuation coefficients in the `w` lanes:
//!
//!   light.position.w = constant
//!   light.ambient.w  = linear
//!   light.diffuse.w  = quadratic
//!   light.specular.w = far plane
//!
//! These structs must exactly match the memory layout whenever their
//! representation is changed in shader code or vice versa. Every field is
//! aligned to 16 bytes as WGSL uniform buffers require. A mismatch does not
//! raise an error, it silently corrupts lighting data, so the layouts are
//! checked by the unit tests at the bottom of this file.
use glam::{Mat4, Vec3, Vec4};

use crate::renderer::lighting::{DirectionalLight, PointLight, MAX_POINT_LIGHTS};

/// Rust struct with the same memory layout as `DirectionalLight` in the
/// lighting shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedDirectionalLight {
    pub direction: Vec4, // .w is unused.
    pub ambient: Vec4,   // .w is unused.
    pub diffuse: Vec4,   // .w is unused.
    pub specular: Vec4,  // .w is unused.
    pub light_space: Mat4,
}

impl From<&DirectionalLight> for PackedDirectionalLight {
    fn from(val: &DirectionalLight) -> Self {
        let color = val.color();

        Self {
            direction: vec3_w(val.direction().normalize(), 0.0),
            ambient: vec3_w(color.ambient, 0.0),
            diffuse: vec3_w(color.diffuse, 0.0),
            specular: vec3_w(color.specular, 0.0),
            light_space: val.light_space(),
        }
    }
}

/// Rust struct with the same memory layout as `PointLight` in the lighting
/// shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedPointLight {
    pub position: Vec4, // .w is the constant attenuation coefficient.
    pub ambient: Vec4,  // .w is the linear attenuation coefficient.
    pub diffuse: Vec4,  // .w is the quadratic attenuation coefficient.
    pub specular: Vec4, // .w is the shadow far plane distance.
    pub light_space: [Mat4; 6],
}

impl From<&PointLight> for PackedPointLight {
    fn from(val: &PointLight) -> Self {
        let color = val.color();
        let attenuation = val.attenuation();

        Self {
            position: vec3_w(val.position(), attenuation.constant),
            ambient: vec3_w(color.ambient, attenuation.linear),
            diffuse: vec3_w(color.diffuse, attenuation.quadratic),
            specular: vec3_w(color.specular, val.far()),
            light_space: *val.light_space(),
        }
    }
}

/// Rust struct with the same memory layout as `Lights` in the lighting
/// shaders. The directional block comes first, followed by a fixed size
/// array of point light blocks where only the first `point_light_count` are
/// valid.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedLights {
    pub directional: PackedDirectionalLight,
    pub point_lights: [PackedPointLight; MAX_POINT_LIGHTS],
    pub point_light_count: u32,
    pub _padding: [u32; 3],
}

impl PackedLights {
    pub fn new(directional: &DirectionalLight, point_lights: &[PointLight]) -> Self {
        assert!(point_lights.len() <= MAX_POINT_LIGHTS);

        let mut packed = Self {
            directional: directional.into(),
            point_lights: [PackedPointLight::default(); MAX_POINT_LIGHTS],
            point_light_count: point_lights.len() as u32,
            _padding: Default::default(),
        };

        for (dst, src) in packed.point_lights.iter_mut().zip(point_lights) {
            *dst = src.into();
        }

        packed
    }
}

/// Per-face values for rendering into a shadow map. Matches `ShadowFace` in
/// `shadow.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedShadowFace {
    pub light_space: Mat4,
    pub light_position: Vec4, // .w is the far plane distance, zero for directional lights.
}

/// Returns a new `Vec4` value that is the combination of a `Vec3` x, y and z
/// and an additional `w` value.
pub fn vec3_w(xyz: Vec3, w: f32) -> Vec4 {
    Vec4::new(xyz.x, xyz.y, xyz.z, w)
}
