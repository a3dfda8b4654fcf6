//! Directional and point lights, their shadow maps and the matrices used to
//! render and sample those shadow maps.
//!
//! Light space matrices are derived state. They are rebuilt from the current
//! light parameters and scene bounds every frame before any shadow map is
//! rendered or sampled.
use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    gpu_buffers::DynamicUniformArray,
    shaders::{
        packed_structs::{PackedLights, PackedShadowFace},
        BindGroupLayouts, Vertex, DIRECTIONAL_SHADOW_BINDING, LIGHTS_UNIFORM_BINDING,
        POINT_SHADOW_BINDING_BASE, SHADOW_SAMPLER_BINDING,
    },
    shadows::{ShadowMap, ShadowShape},
};

/// Maximum number of point lights with a shadow map slot in the lighting
/// shaders.
pub const MAX_POINT_LIGHTS: usize = 4;
/// Width and height in texels of every shadow map face.
pub const SHADOW_RESOLUTION: u32 = 1024;
/// Smallest half extent of the directional shadow frustum on any axis.
pub const MIN_SHADOW_EXTENT: f32 = 7.5;
/// Near plane of the directional shadow frustum.
pub const DIRECTIONAL_SHADOW_NEAR: f32 = 1.0;
/// Directions with both `|x|` and `|z|` below this are treated as parallel to
/// the world up axis.
pub const DIRECTION_EPSILON: f32 = 1e-4;
/// Near plane of the point light shadow frustums.
pub const POINT_SHADOW_NEAR: f32 = 0.1;

/// Number of shadow face uniform slots: one for the directional light and six
/// for each point light.
const SHADOW_FACE_SLOTS: usize = 1 + MAX_POINT_LIGHTS * 6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LightError {
    #[error("light color channels must not be negative but {name} was {value}")]
    NegativeColor { name: &'static str, value: Vec3 },
    #[error("attenuation coefficients must be positive but were constant {constant}, linear {linear} and quadratic {quadratic}")]
    NonPositiveAttenuation {
        constant: f32,
        linear: f32,
        quadratic: f32,
    },
    #[error("point light far plane must be larger than {} but was {}", POINT_SHADOW_NEAR, .0)]
    InvalidFarPlane(f32),
    #[error("light direction must be a finite non-zero vector but was {0}")]
    InvalidDirection(Vec3),
    #[error("at most {} point lights are supported", MAX_POINT_LIGHTS)]
    TooManyPointLights,
}

/// The ambient, diffuse and specular color of a light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightColor {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightColor {
    /// Create a light color. Every channel must be non-negative.
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Result<Self, LightError> {
        for (name, value) in [
            ("ambient", ambient),
            ("diffuse", diffuse),
            ("specular", specular),
        ] {
            if !value.is_finite() || value.min_element() < 0.0 {
                return Err(LightError::NegativeColor { name, value });
            }
        }

        Ok(Self {
            ambient,
            diffuse,
            specular,
        })
    }
}

/// Distance attenuation `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightAttenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl LightAttenuation {
    /// Create attenuation coefficients. Every coefficient must be positive.
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Result<Self, LightError> {
        if constant > 0.0 && linear > 0.0 && quadratic > 0.0 {
            Ok(Self {
                constant,
                linear,
                quadratic,
            })
        } else {
            Err(LightError::NonPositiveAttenuation {
                constant,
                linear,
                quadratic,
            })
        }
    }
}

/// A light infinitely far away shining along `direction`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    direction: Vec3,
    color: LightColor,
    light_space: Mat4,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: LightColor) -> Result<Self, LightError> {
        if !direction.is_finite() || direction.length_squared() <= f32::EPSILON {
            return Err(LightError::InvalidDirection(direction));
        }

        Ok(Self {
            direction,
            color,
            light_space: Mat4::IDENTITY,
        })
    }

    /// The light direction. Once light space matrices have been computed this
    /// is the corrected direction, see `correct_light_direction`.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn color(&self) -> &LightColor {
        &self.color
    }

    /// The view projection matrix of the fitted shadow frustum.
    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    /// Fit the shadow frustum to a scene with per-axis extents `extent`.
    ///
    /// A direction parallel to the up axis is corrected in place, which makes
    /// repeated calls with the same extent return identical matrices.
    pub fn compute_light_space_matrix(&mut self, extent: Vec3) -> Mat4 {
        self.direction = correct_light_direction(self.direction);
        self.light_space = directional_light_space(self.direction, extent);
        self.light_space
    }
}

/// A light radiating from `position` in all directions.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    position: Vec3,
    color: LightColor,
    attenuation: LightAttenuation,
    /// Far plane of the shadow frustums, shadows are not cast past this.
    far: f32,
    light_space: [Mat4; 6],
}

impl PointLight {
    pub fn new(
        position: Vec3,
        color: LightColor,
        attenuation: LightAttenuation,
        far: f32,
    ) -> Result<Self, LightError> {
        if !far.is_finite() || far <= POINT_SHADOW_NEAR {
            return Err(LightError::InvalidFarPlane(far));
        }

        Ok(Self {
            position,
            color,
            attenuation,
            far,
            light_space: point_light_space(position, far),
        })
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn color(&self) -> &LightColor {
        &self.color
    }

    pub fn attenuation(&self) -> &LightAttenuation {
        &self.attenuation
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// View projection matrices of the six cube faces in `CUBE_FACES` order.
    pub fn light_space(&self) -> &[Mat4; 6] {
        &self.light_space
    }

    pub fn compute_light_space_matrices(&mut self) -> &[Mat4; 6] {
        self.light_space = point_light_space(self.position, self.far);
        &self.light_space
    }
}

/// Any light the lighting manager can own.
#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
}

impl Light {
    pub fn color(&self) -> &LightColor {
        match self {
            Light::Directional(light) => light.color(),
            Light::Point(light) => light.color(),
        }
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

/// Look direction and up vector of one cubemap face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubeFace {
    pub direction: Vec3,
    pub up: Vec3,
}

/// Cubemap faces in layer order (+X, -X, +Y, -Y, +Z, -Z). The ±Y faces use a
/// Z axis up vector so that no face looks along its own up vector.
pub const CUBE_FACES: [CubeFace; 6] = [
    CubeFace {
        direction: Vec3::X,
        up: Vec3::NEG_Y,
    },
    CubeFace {
        direction: Vec3::NEG_X,
        up: Vec3::NEG_Y,
    },
    CubeFace {
        direction: Vec3::Y,
        up: Vec3::Z,
    },
    CubeFace {
        direction: Vec3::NEG_Y,
        up: Vec3::NEG_Z,
    },
    CubeFace {
        direction: Vec3::Z,
        up: Vec3::NEG_Y,
    },
    CubeFace {
        direction: Vec3::NEG_Z,
        up: Vec3::NEG_Y,
    },
];

/// Nudge a direction parallel to the world up axis off of it. Such a
/// direction makes the look-at basis degenerate.
///
/// The returned direction is normalized and has `DIRECTION_EPSILON` added to
/// `x` when the input needs correcting, otherwise it is returned unchanged.
pub fn correct_light_direction(direction: Vec3) -> Vec3 {
    if direction.x.abs() < DIRECTION_EPSILON && direction.z.abs() < DIRECTION_EPSILON {
        let mut corrected = direction.normalize();
        corrected.x += DIRECTION_EPSILON;
        corrected
    } else {
        direction
    }
}

/// Half extents of the directional shadow frustum for a scene extent.
pub fn directional_frustum_extents(extent: Vec3) -> Vec3 {
    extent.abs().max(Vec3::splat(MIN_SHADOW_EXTENT))
}

/// Build the view projection matrix of an orthographic shadow frustum looking
/// along `direction` at a scene with per-axis extents `extent`.
///
/// `direction` must not be parallel to +Y, see `correct_light_direction`.
pub fn directional_light_space(direction: Vec3, extent: Vec3) -> Mat4 {
    let sizes = directional_frustum_extents(extent);

    let projection = Mat4::orthographic_rh(
        -sizes.x,
        sizes.x,
        -sizes.y,
        sizes.y,
        DIRECTIONAL_SHADOW_NEAR,
        sizes.z,
    );

    let target = extent * 0.5;
    let position = target - direction * sizes.z * 0.5;
    let view = Mat4::look_at_rh(position, target, Vec3::Y);

    projection * view
}

/// Build the six 90° view projection matrices of a cube centered at `eye`,
/// one per entry in `CUBE_FACES`.
///
/// The projection flips Y so that a face rendered with these matrices has the
/// orientation the GPU uses when sampling a cubemap by direction. This also
/// reverses the triangle winding seen by the rasterizer.
pub fn cube_face_view_projections(eye: Vec3, near: f32, far: f32) -> [Mat4; 6] {
    let projection = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(FRAC_PI_2, 1.0, near, far);

    CUBE_FACES.map(|face| projection * Mat4::look_at_rh(eye, eye + face.direction, face.up))
}

/// Build the six shadow cube face matrices of a point light.
pub fn point_light_space(position: Vec3, far: f32) -> [Mat4; 6] {
    cube_face_view_projections(position, POINT_SHADOW_NEAR, far)
}

/// Get the shadow face uniform slot of point light `light` and `face`. Slot
/// zero belongs to the directional light.
fn point_face_slot(light: usize, face: usize) -> usize {
    1 + light * 6 + face
}

/// Owns the scene lights, one shadow map per light and the uniform data that
/// lighting shaders read them through.
///
/// Exactly one directional light exists at all times. Point lights are
/// appended during scene setup and never removed.
pub struct LightingManager {
    directional: DirectionalLight,
    directional_shadow: ShadowMap,
    point_lights: Vec<PointLight>,
    point_shadows: Vec<ShadowMap>,
    /// Bound to point light slots that have no light.
    placeholder_shadow: ShadowMap,
    shadow_sampler: wgpu::Sampler,
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,
    shadow_faces: DynamicUniformArray<PackedShadowFace>,
    directional_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
}

impl LightingManager {
    const SHADER: &'static str = include_str!("shaders/shadow.wgsl");

    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        directional: DirectionalLight,
    ) -> Self {
        let directional_shadow = ShadowMap::new(
            device,
            ShadowShape::Flat,
            SHADOW_RESOLUTION,
            "directional shadow map",
        );
        let placeholder_shadow =
            ShadowMap::new(device, ShadowShape::Cube, 1, "placeholder point shadow map");

        // Linear filtering of a comparison sampler gives 2x2 percentage closer
        // filtering on most hardware.
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow comparison sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let lights_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lights uniform buffer"),
            size: std::mem::size_of::<PackedLights>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let lights_bind_group = create_lights_bind_group(
            device,
            layouts,
            &lights_buffer,
            &shadow_sampler,
            &directional_shadow,
            &[],
            &placeholder_shadow,
        );

        let shadow_faces = DynamicUniformArray::new(
            device,
            Some("shadow face uniforms"),
            SHADOW_FACE_SLOTS,
            &layouts.shadow_face_layout,
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow shader"),
            source: wgpu::ShaderSource::Wgsl(Self::SHADER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow pipeline layout"),
            bind_group_layouts: &[&layouts.shadow_face_layout, &layouts.per_model_layout],
            push_constant_ranges: &[],
        });

        // Directional shadows only need rasterized depth. Point shadows write
        // their own linear depth and render through the Y flipped cube face
        // matrices, which turn counter clockwise triangles clockwise.
        let directional_pipeline = create_shadow_pipeline(
            device,
            &layout,
            &shader,
            "directional shadow pipeline",
            None,
            wgpu::FrontFace::Ccw,
        );
        let point_pipeline = create_shadow_pipeline(
            device,
            &layout,
            &shader,
            "point shadow pipeline",
            Some("fs_point"),
            wgpu::FrontFace::Cw,
        );

        Self {
            directional,
            directional_shadow,
            point_lights: Vec::new(),
            point_shadows: Vec::new(),
            placeholder_shadow,
            shadow_sampler,
            lights_buffer,
            lights_bind_group,
            shadow_faces,
            directional_pipeline,
            point_pipeline,
        }
    }

    /// Replace the directional light. Its shadow map is reused.
    pub fn set_directional_light(&mut self, light: DirectionalLight) {
        self.directional = light;
    }

    /// Add a point light along with a new shadow cubemap, returning the index
    /// of the light.
    pub fn add_point_light(
        &mut self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        light: PointLight,
    ) -> Result<usize, LightError> {
        if self.point_lights.len() >= MAX_POINT_LIGHTS {
            return Err(LightError::TooManyPointLights);
        }

        let index = self.point_lights.len();

        self.point_shadows.push(ShadowMap::new(
            device,
            ShadowShape::Cube,
            SHADOW_RESOLUTION,
            &format!("point light {index} shadow map"),
        ));
        self.point_lights.push(light);

        // The new shadow map takes over a placeholder slot.
        self.lights_bind_group = create_lights_bind_group(
            device,
            layouts,
            &self.lights_buffer,
            &self.shadow_sampler,
            &self.directional_shadow,
            &self.point_shadows,
            &self.placeholder_shadow,
        );

        info!("added point light {index} at {}", self.point_lights[index].position());
        Ok(index)
    }

    /// Add a light of either kind. A directional light replaces the current
    /// one.
    pub fn add_light(
        &mut self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        light: Light,
    ) -> Result<(), LightError> {
        match light {
            Light::Directional(light) => self.set_directional_light(light),
            Light::Point(light) => {
                self.add_point_light(device, layouts, light)?;
            }
        }

        Ok(())
    }

    /// Rebuild every light space matrix from the current light parameters and
    /// the scene's bounding extent.
    pub fn compute_light_space_matrices(&mut self, extent: Vec3) {
        self.directional.compute_light_space_matrix(extent);

        for light in &mut self.point_lights {
            light.compute_light_space_matrices();
        }
    }

    /// Upload the per-face values used while rendering into the shadow maps.
    pub fn write_shadow_faces(&self, queue: &wgpu::Queue) {
        let mut faces = Vec::with_capacity(1 + self.point_lights.len() * 6);

        faces.push(PackedShadowFace {
            light_space: self.directional.light_space(),
            light_position: glam::Vec4::ZERO,
        });

        for light in &self.point_lights {
            faces.extend(light.light_space().iter().map(|m| PackedShadowFace {
                light_space: *m,
                light_position: light.position().extend(light.far()),
            }));
        }

        self.shadow_faces.write_all(queue, &faces);
    }

    /// Recompute the light space matrices, upload every light into the shared
    /// lights uniform buffer and return the bind group exposing the lights and
    /// shadow maps at their fixed binding slots.
    pub fn bind(&mut self, queue: &wgpu::Queue, extent: Vec3) -> &wgpu::BindGroup {
        self.compute_light_space_matrices(extent);

        let packed = PackedLights::new(&self.directional, &self.point_lights);
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(&packed));

        &self.lights_bind_group
    }

    /// The bind group last prepared by `bind`.
    pub fn lights_bind_group(&self) -> &wgpu::BindGroup {
        &self.lights_bind_group
    }

    /// Begin a depth only pass into the directional shadow map. Drawing must
    /// bind per-model uniforms at group 1. The pass ends when it is dropped.
    pub fn bind_directional_shadow_map<'p>(
        &'p self,
        encoder: &'p mut wgpu::CommandEncoder,
    ) -> wgpu::RenderPass<'p> {
        self.begin_shadow_pass(
            encoder,
            "directional shadow pass",
            self.directional_shadow.sample_view(),
            &self.directional_pipeline,
            0,
        )
    }

    /// Begin a depth only pass into one face of point light `index`'s shadow
    /// cubemap. Returns `None` when the light or face does not exist.
    pub fn bind_point_shadow_map<'p>(
        &'p self,
        encoder: &'p mut wgpu::CommandEncoder,
        index: usize,
        face: usize,
    ) -> Option<wgpu::RenderPass<'p>> {
        let target = self.point_shadows.get(index)?.face_view(face)?;

        Some(self.begin_shadow_pass(
            encoder,
            "point shadow pass",
            target,
            &self.point_pipeline,
            point_face_slot(index, face),
        ))
    }

    fn begin_shadow_pass<'p>(
        &'p self,
        encoder: &'p mut wgpu::CommandEncoder,
        label: &str,
        target: &'p wgpu::TextureView,
        pipeline: &'p wgpu::RenderPipeline,
        slot: usize,
    ) -> wgpu::RenderPass<'p> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let size = SHADOW_RESOLUTION as f32;
        pass.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(
            0,
            self.shadow_faces.bind_group(),
            &[self.shadow_faces.dynamic_offset(slot)],
        );

        pass
    }

    pub fn directional_light(&self) -> &DirectionalLight {
        &self.directional
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn get_point_light(&self, index: usize) -> Option<&PointLight> {
        self.point_lights.get(index)
    }

    /// Get the shadow cubemap view of point light `index`.
    pub fn get_depth_cubemap(&self, index: usize) -> Option<&wgpu::TextureView> {
        self.point_shadows.get(index).map(ShadowMap::sample_view)
    }

    /// Get the shadow map of point light `index`.
    pub fn point_shadow_map(&self, index: usize) -> Option<&ShadowMap> {
        self.point_shadows.get(index)
    }

    /// A 1x1 depth cubemap for visualizations when no point light exists.
    pub fn placeholder_cubemap(&self) -> &wgpu::TextureView {
        self.placeholder_shadow.sample_view()
    }
}

fn create_lights_bind_group(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    lights_buffer: &wgpu::Buffer,
    shadow_sampler: &wgpu::Sampler,
    directional_shadow: &ShadowMap,
    point_shadows: &[ShadowMap],
    placeholder_shadow: &ShadowMap,
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: LIGHTS_UNIFORM_BINDING,
            resource: lights_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: SHADOW_SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(shadow_sampler),
        },
        wgpu::BindGroupEntry {
            binding: DIRECTIONAL_SHADOW_BINDING,
            resource: wgpu::BindingResource::TextureView(directional_shadow.sample_view()),
        },
    ];

    entries.extend((0..MAX_POINT_LIGHTS).map(|i| wgpu::BindGroupEntry {
        binding: POINT_SHADOW_BINDING_BASE + i as u32,
        resource: wgpu::BindingResource::TextureView(
            point_shadows
                .get(i)
                .unwrap_or(placeholder_shadow)
                .sample_view(),
        ),
    }));

    debug!(
        "binding {} point shadow maps and {} placeholders",
        point_shadows.len(),
        MAX_POINT_LIGHTS - point_shadows.len()
    );

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lights bind group"),
        layout: &layouts.lights_layout,
        entries: &entries,
    })
}

fn create_shadow_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    fragment_entry_point: Option<&str>,
    front_face: wgpu::FrontFace,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment: fragment_entry_point.map(|entry_point| wgpu::FragmentState {
            module: shader,
            entry_point,
            targets: &[],
        }),
        // Rendering back faces into the shadow map keeps lit front faces from
        // shadowing themselves.
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face,
            cull_mode: Some(wgpu::Face::Front),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: ShadowMap::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> LightColor {
        LightColor::new(Vec3::splat(0.05), Vec3::splat(0.4), Vec3::splat(0.5)).unwrap()
    }

    fn is_invertible(m: Mat4) -> bool {
        m.is_finite() && m.determinant().abs() > 1e-12
    }

    #[test]
    fn negative_color_is_rejected() {
        let err = LightColor::new(Vec3::ZERO, Vec3::new(0.1, -0.2, 0.3), Vec3::ONE).unwrap_err();
        assert_eq!(
            LightError::NegativeColor {
                name: "diffuse",
                value: Vec3::new(0.1, -0.2, 0.3)
            },
            err
        );
    }

    #[test]
    fn non_positive_attenuation_is_rejected() {
        assert!(LightAttenuation::new(1.0, 0.09, 0.032).is_ok());
        assert!(LightAttenuation::new(0.0, 0.09, 0.032).is_err());
        assert!(LightAttenuation::new(1.0, -0.09, 0.032).is_err());
    }

    #[test]
    fn point_light_far_plane_must_exceed_near_plane() {
        let attenuation = LightAttenuation::new(1.0, 0.09, 0.032).unwrap();

        assert_eq!(
            Err(LightError::InvalidFarPlane(0.05)),
            PointLight::new(Vec3::ZERO, white(), attenuation, 0.05)
        );
        assert!(PointLight::new(Vec3::ZERO, white(), attenuation, f32::NAN).is_err());
        assert!(PointLight::new(Vec3::ZERO, white(), attenuation, 25.0).is_ok());
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert_eq!(
            Err(LightError::InvalidDirection(Vec3::ZERO)),
            DirectionalLight::new(Vec3::ZERO, white())
        );
    }

    #[test]
    fn vertical_direction_is_nudged_off_up_axis() {
        let corrected = correct_light_direction(Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(Vec3::new(DIRECTION_EPSILON, -1.0, 0.0), corrected);

        // A corrected direction is left alone.
        assert_eq!(corrected, correct_light_direction(corrected));
    }

    #[test]
    fn oblique_direction_is_not_corrected() {
        let direction = Vec3::new(-0.2, -1.0, -0.3);
        assert_eq!(direction, correct_light_direction(direction));
    }

    #[test]
    fn small_extents_are_clamped_to_minimum() {
        let sizes = directional_frustum_extents(Vec3::new(0.0, 3.0, 20.0));
        assert_eq!(Vec3::new(MIN_SHADOW_EXTENT, MIN_SHADOW_EXTENT, 20.0), sizes);
    }

    #[test]
    fn clamped_axis_has_minimum_half_extent() {
        // Points at the frustum edge along the clamped axes land on the NDC
        // border, so the half extent equals the minimum rather than the input.
        let direction = Vec3::new(0.0, 0.0, -1.0);
        let extent = Vec3::new(2.0, 1.0, 10.0);
        let light_space = directional_light_space(direction, extent);

        let center = extent * 0.5;
        let right = light_space.project_point3(center + Vec3::X * MIN_SHADOW_EXTENT);
        let top = light_space.project_point3(center + Vec3::Y * MIN_SHADOW_EXTENT);

        assert!((right.x - 1.0).abs() < 1e-4);
        assert!((top.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_scene_produces_invertible_light_space() {
        let mut light = DirectionalLight::new(Vec3::new(0.0, -4.0, 0.0), white()).unwrap();
        let light_space = light.compute_light_space_matrix(Vec3::ZERO);

        assert!(is_invertible(light_space));
        assert_eq!(Vec3::new(DIRECTION_EPSILON, -1.0, 0.0), light.direction());
    }

    #[test]
    fn directional_light_space_is_idempotent() {
        let mut light = DirectionalLight::new(Vec3::new(0.0, -4.0, 0.0), white()).unwrap();
        let extent = Vec3::new(10.0, 0.5, 10.0);

        let first = light.compute_light_space_matrix(extent);
        let second = light.compute_light_space_matrix(extent);

        assert_eq!(first, second);
    }

    #[test]
    fn scene_center_lies_inside_directional_frustum() {
        let mut light = DirectionalLight::new(Vec3::new(-0.3, -1.0, -0.2), white()).unwrap();
        let extent = Vec3::new(10.0, 2.0, 10.0);
        let ndc = light
            .compute_light_space_matrix(extent)
            .project_point3(extent * 0.5);

        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn cube_faces_form_a_right_handed_basis() {
        let mut seen = Vec::new();

        for face in CUBE_FACES {
            let right = face.direction.cross(face.up);

            // Never degenerate, always axis aligned and orthonormal.
            assert_eq!(1.0, right.length());
            assert_eq!(0.0, face.direction.dot(face.up));
            assert_eq!(1.0, right.abs().max_element());

            // look_at_rh builds (right, up, back) so right x up must point
            // back towards the eye.
            assert_eq!(-face.direction, right.cross(face.up));

            assert!(!seen.contains(&face.direction));
            seen.push(face.direction);
        }

        assert_eq!(6, seen.len());
    }

    #[test]
    fn cube_face_matrices_look_down_their_axis() {
        let eye = Vec3::new(-2.0, 4.0, -1.0);
        let matrices = point_light_space(eye, 25.0);

        for (face, m) in CUBE_FACES.iter().zip(matrices) {
            assert!(is_invertible(m));

            let ndc = m.project_point3(eye + face.direction * 5.0);
            assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
            assert!(ndc.z > 0.0 && ndc.z < 1.0);

            // Every other face direction falls outside this face's frustum.
            for other in CUBE_FACES.iter().filter(|f| f.direction != face.direction) {
                let clip = m * (eye + other.direction * 5.0).extend(1.0);
                let ndc = clip.truncate() / clip.w;
                let inside = clip.w > 0.0 && ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0;
                assert!(!inside);
            }
        }
    }

    #[test]
    fn cube_faces_match_sampling_orientation() {
        // The top row of the +X face holds +Y and its left column holds +Z.
        let m = cube_face_view_projections(Vec3::ZERO, 0.1, 10.0)[0];
        let up = m.project_point3(Vec3::new(1.0, 0.5, 0.0));
        let left = m.project_point3(Vec3::new(1.0, 0.0, 0.5));

        // Framebuffer row zero is NDC y = +1.
        assert!(up.y > 0.0);
        assert!(left.x < 0.0);
    }

    #[test]
    fn point_face_slots_follow_directional_slot() {
        assert_eq!(1, point_face_slot(0, 0));
        assert_eq!(6, point_face_slot(0, 5));
        assert_eq!(7, point_face_slot(1, 0));
        assert_eq!(SHADOW_FACE_SLOTS - 1, point_face_slot(MAX_POINT_LIGHTS - 1, 5));
    }

    #[test]
    fn light_enum_exposes_color() {
        let light: Light = DirectionalLight::new(Vec3::NEG_Y, white()).unwrap().into();
        assert_eq!(&white(), light.color());
    }

    fn point_light(position: Vec3) -> PointLight {
        PointLight::new(
            position,
            white(),
            LightAttenuation::new(1.0, 0.09, 0.032).unwrap(),
            25.0,
        )
        .unwrap()
    }

    #[test]
    fn fifth_point_light_is_rejected_without_changes() {
        let Some((device, _queue)) = crate::renderer::test_device() else {
            return;
        };

        let layouts = BindGroupLayouts::new(&device);
        let directional = DirectionalLight::new(Vec3::NEG_Y, white()).unwrap();
        let mut lighting = LightingManager::new(&device, &layouts, directional);

        for i in 0..MAX_POINT_LIGHTS {
            let position = Vec3::new(i as f32, 1.0, 0.0);
            assert_eq!(
                Ok(i),
                lighting.add_point_light(&device, &layouts, point_light(position))
            );
        }

        let bind_group = lighting.lights_bind_group().global_id();
        let lights = lighting.point_lights().to_vec();

        assert_eq!(
            Err(LightError::TooManyPointLights),
            lighting.add_point_light(&device, &layouts, point_light(Vec3::Y * 9.0))
        );
        assert_eq!(
            Err(LightError::TooManyPointLights),
            lighting.add_light(&device, &layouts, point_light(Vec3::Y * 9.0).into())
        );

        assert_eq!(lights, lighting.point_lights());
        assert_eq!(bind_group, lighting.lights_bind_group().global_id());
        assert!(lighting.get_depth_cubemap(MAX_POINT_LIGHTS - 1).is_some());
    }

    #[test]
    fn lookups_past_the_last_light_are_none() {
        let Some((device, _queue)) = crate::renderer::test_device() else {
            return;
        };

        let layouts = BindGroupLayouts::new(&device);
        let directional = DirectionalLight::new(Vec3::NEG_Y, white()).unwrap();
        let mut lighting = LightingManager::new(&device, &layouts, directional);

        assert!(lighting.get_point_light(0).is_none());
        assert!(lighting.get_depth_cubemap(0).is_none());

        lighting
            .add_point_light(&device, &layouts, point_light(Vec3::Y))
            .unwrap();

        assert_eq!(Some(&point_light(Vec3::Y)), lighting.get_point_light(0));
        assert!(lighting.get_depth_cubemap(0).is_some());
        assert!(lighting.point_shadow_map(0).is_some());

        for index in [1, MAX_POINT_LIGHTS, usize::MAX] {
            assert!(lighting.get_point_light(index).is_none());
            assert!(lighting.get_depth_cubemap(index).is_none());
            assert!(lighting.point_shadow_map(index).is_none());
        }
    }

    #[test]
    fn missing_point_shadow_faces_are_not_bound() {
        let Some((device, _queue)) = crate::renderer::test_device() else {
            return;
        };

        let layouts = BindGroupLayouts::new(&device);
        let directional = DirectionalLight::new(Vec3::NEG_Y, white()).unwrap();
        let mut lighting = LightingManager::new(&device, &layouts, directional);
        lighting
            .add_point_light(&device, &layouts, point_light(Vec3::Y))
            .unwrap();

        let mut encoder = device.create_command_encoder(&Default::default());

        assert!(lighting.bind_point_shadow_map(&mut encoder, 1, 0).is_none());
        assert!(lighting
            .bind_point_shadow_map(&mut encoder, 0, CUBE_FACES.len())
            .is_none());
        assert!(lighting.bind_point_shadow_map(&mut encoder, 0, 5).is_some());
    }
}
