pub mod packed_structs;

use glam::{Mat3, Mat4, Vec3, Vec4};

use super::{
    gpu_buffers::{DynamicGpuBuffer, UniformBuffer},
    lighting::MAX_POINT_LIGHTS,
};

/// Binding slots of the lights bind group (group 2). Point light shadow
/// cubemaps occupy `POINT_SHADOW_BINDING_BASE + i` for light `i`.
pub const LIGHTS_UNIFORM_BINDING: u32 = 0;
pub const SHADOW_SAMPLER_BINDING: u32 = 1;
pub const DIRECTIONAL_SHADOW_BINDING: u32 = 2;
pub const POINT_SHADOW_BINDING_BASE: u32 = 3;

/// Per-frame uniform values shared by every scene pass.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerFrameBufferData {
    pub view_projection: Mat4,
    /// View projection without the camera translation, for skybox drawing.
    pub skybox_view_projection: Mat4,
    pub view_pos: Vec4,
}

/// Responsible for storing per-frame shader uniform values and copying them to
/// a GPU backed buffer accessible to shaders.
pub struct PerFrameUniforms {
    pub buffer: UniformBuffer<PerFrameBufferData>,
}

impl PerFrameUniforms {
    /// Create a new per frame uniform buffer. Only one instance is needed per
    /// renderer.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        Self {
            buffer: UniformBuffer::new(
                device,
                Some("per-frame uniforms"),
                Default::default(),
                &layouts.per_frame_layout,
            ),
        }
    }

    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.buffer.values_mut().view_projection = view_projection;
    }

    pub fn set_skybox_view_projection(&mut self, view_projection: Mat4) {
        self.buffer.values_mut().skybox_view_projection = view_projection;
    }

    /// Set the world space position of the camera.
    pub fn set_view_pos(&mut self, view_pos: Vec3) {
        self.buffer.values_mut().view_pos = view_pos.extend(1.0);
    }

    pub fn prepare(&self, queue: &wgpu::Queue) {
        self.buffer.prepare(queue)
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }
}

/// Per-model uniform values used by the geometry, forward and shadow passes.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerModelBufferData {
    pub local_to_world: Mat4,
    /// Inverse transpose of `local_to_world`, stored as a `Mat4` to avoid the
    /// column padding rules of `mat3x3`.
    pub normal_matrix: Mat4,
    pub albedo: Vec4,   // .w is specular intensity.
    pub material: Vec4, // xyzw: (metallic, roughness, ambient occlusion, unused).
}

/// Surface parameters of a drawn item. Deferred shading uses `albedo` and
/// `specular`, forward shading uses the physically based terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub specular: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            specular: 0.5,
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
        }
    }
}

/// Responsible for storing per-model shader uniform values and copying them to
/// a GPU backed buffer accessible to shaders.
#[derive(Debug)]
pub struct PerModelUniforms {
    pub buffer: UniformBuffer<PerModelBufferData>,
}

impl PerModelUniforms {
    /// Create a new PerModelUniforms object. One instance per model.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        Self {
            buffer: UniformBuffer::new(
                device,
                Some("per-model uniforms"),
                PerModelBufferData {
                    local_to_world: Mat4::IDENTITY,
                    normal_matrix: Mat4::IDENTITY,
                    ..Default::default()
                },
                &layouts.per_model_layout,
            ),
        }
    }

    /// Set the local to world transform along with the matching normal matrix.
    pub fn set_local_to_world(&mut self, local_to_world: Mat4) {
        let values = self.buffer.values_mut();
        values.local_to_world = local_to_world;
        values.normal_matrix =
            Mat4::from_mat3(Mat3::from_mat4(local_to_world).inverse().transpose());
    }

    pub fn set_material(&mut self, material: &Material) {
        let values = self.buffer.values_mut();
        values.albedo = material.albedo.extend(material.specular);
        values.material = Vec4::new(material.metallic, material.roughness, material.ao, 0.0);
    }

    pub fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }

    pub fn prepare(&self, queue: &wgpu::Queue) {
        self.buffer.prepare(queue)
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }
}

/// Post-process uniform values, matches `PostProcess` in `post_process.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessBufferData {
    /// Columns of the 3x3 convolution kernel, the `w` lanes are padding.
    pub kernel: [Vec4; 3],
    pub exposure: f32,
    pub gamma: f32,
    /// Non-zero when gamma must be applied by the shader because the output
    /// texture is not sRGB.
    pub apply_gamma: u32,
    pub _padding: u32,
}

impl PostProcessBufferData {
    pub fn new(kernel: Mat3, exposure: f32, gamma: f32, output_is_srgb: bool) -> Self {
        Self {
            kernel: [
                kernel.x_axis.extend(0.0),
                kernel.y_axis.extend(0.0),
                kernel.z_axis.extend(0.0),
            ],
            exposure,
            gamma,
            apply_gamma: u32::from(!output_is_srgb),
            _padding: 0,
        }
    }
}

/// Per-draw values of the image based lighting capture passes. Matches
/// `Capture` in the IBL shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CaptureBufferData {
    pub view_projection: Mat4,
    pub roughness: f32,
    /// Width of mip zero of the sampled environment cubemap.
    pub source_resolution: f32,
    pub sample_count: u32,
    pub _padding: u32,
}

/// Values of the image based lighting bind group. Matches `IblParams` in
/// `pbr.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IblParamsBufferData {
    /// Index of the last prefiltered specular mip, sampled at roughness 1.
    pub prefilter_max_lod: f32,
    pub _padding: [f32; 3],
}

impl IblParamsBufferData {
    pub fn new(prefilter_mips: u32) -> Self {
        Self {
            prefilter_max_lod: prefilter_mips.saturating_sub(1) as f32,
            _padding: [0.0; 3],
        }
    }
}

/// A registry of bind group layouts used by this renderer.
pub struct BindGroupLayouts {
    pub per_frame_layout: wgpu::BindGroupLayout,
    pub per_model_layout: wgpu::BindGroupLayout,
    pub lights_layout: wgpu::BindGroupLayout,
    pub shadow_face_layout: wgpu::BindGroupLayout,
    pub gbuffer_layout: wgpu::BindGroupLayout,
    pub ibl_layout: wgpu::BindGroupLayout,
    pub cube_texture_layout: wgpu::BindGroupLayout,
    pub texture_2d_layout: wgpu::BindGroupLayout,
    pub depth_cube_layout: wgpu::BindGroupLayout,
    pub post_process_layout: wgpu::BindGroupLayout,
    pub capture_layout: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    /// Create a new bind group layout registry.
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            per_frame_layout: device.create_bind_group_layout(&uniform_desc(
                "per-frame bind group layout",
                false,
            )),
            per_model_layout: device.create_bind_group_layout(&uniform_desc(
                "per-model bind group layout",
                false,
            )),
            lights_layout: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lights bind group layout"),
                entries: &Self::lights_entries(),
            }),
            shadow_face_layout: device.create_bind_group_layout(&uniform_desc(
                "shadow face bind group layout",
                true,
            )),
            gbuffer_layout: device.create_bind_group_layout(&Self::gbuffer_desc()),
            ibl_layout: device.create_bind_group_layout(&Self::ibl_desc()),
            cube_texture_layout: device.create_bind_group_layout(&sampled_texture_desc(
                "cube texture bind group layout",
                wgpu::TextureViewDimension::Cube,
            )),
            texture_2d_layout: device.create_bind_group_layout(&sampled_texture_desc(
                "2d texture bind group layout",
                wgpu::TextureViewDimension::D2,
            )),
            depth_cube_layout: device.create_bind_group_layout(&Self::depth_cube_desc()),
            post_process_layout: device.create_bind_group_layout(&Self::post_process_desc()),
            capture_layout: device.create_bind_group_layout(&uniform_desc(
                "capture bind group layout",
                true,
            )),
        }
    }

    /// Entries of the lights bind group.
    ///
    /// Expected bind group inputs:
    ///  0 - lights uniform block (`PackedLights`)
    ///  1 - shadow comparison sampler
    ///  2 - directional shadow map
    ///  3.. - one depth cubemap per point light slot
    pub fn lights_entries() -> [wgpu::BindGroupLayoutEntry; 3 + MAX_POINT_LIGHTS] {
        let point_shadow = |i: u32| wgpu::BindGroupLayoutEntry {
            binding: POINT_SHADOW_BINDING_BASE + i,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            },
            count: None,
        };

        let mut entries = [point_shadow(0); 3 + MAX_POINT_LIGHTS];

        entries[0] = wgpu::BindGroupLayoutEntry {
            binding: LIGHTS_UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        entries[1] = wgpu::BindGroupLayoutEntry {
            binding: SHADOW_SAMPLER_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
            count: None,
        };
        entries[2] = wgpu::BindGroupLayoutEntry {
            binding: DIRECTIONAL_SHADOW_BINDING,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        for (i, entry) in entries[3..].iter_mut().enumerate() {
            *entry = point_shadow(i as u32);
        }

        entries
    }

    /// Gets the layout of the G-buffer as read by the deferred lighting pass.
    /// Attachments are read with `textureLoad` so no sampler is bound.
    ///
    /// Expected bind group inputs:
    ///  0 - world position
    ///  1 - world normal
    ///  2 - albedo (rgb) and specular intensity (a)
    pub fn gbuffer_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("g-buffer bind group layout"),
            entries: &GBUFFER_ENTRIES,
        }
    }

    /// Gets the layout of the image based lighting resources read by the
    /// forward pass.
    ///
    /// Expected bind group inputs:
    ///  0 - irradiance cubemap
    ///  1 - prefiltered specular cubemap
    ///  2 - BRDF integration lookup table
    ///  3 - linear sampler
    ///  4 - image based lighting parameters (`IblParamsBufferData`)
    pub fn ibl_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        }
    }

    /// Gets the layout used to visualize a point light depth cubemap.
    pub fn depth_cube_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("depth cube bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        }
    }

    /// Gets the layout of the post-process pass.
    ///
    /// Expected bind group inputs:
    ///  0 - HDR color target, read with `textureLoad`
    ///  1 - post-process uniforms (`PostProcessBufferData`)
    pub fn post_process_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("post-process bind group layout"),
            entries: &POST_PROCESS_ENTRIES,
        }
    }
}

/// Describes a layout with a single uniform buffer at binding 0.
fn uniform_desc(
    label: &'static str,
    has_dynamic_offset: bool,
) -> wgpu::BindGroupLayoutDescriptor<'static> {
    let entries: &'static [wgpu::BindGroupLayoutEntry] = if has_dynamic_offset {
        &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: None,
            },
            count: None,
        }]
    } else {
        &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }]
    };

    wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    }
}

/// Describes a layout with a filterable texture at binding 0 and a filtering
/// sampler at binding 1.
fn sampled_texture_desc(
    label: &'static str,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutDescriptor<'static> {
    let entries: &'static [wgpu::BindGroupLayoutEntry] = match view_dimension {
        wgpu::TextureViewDimension::Cube => &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::Cube,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        _ => &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    };

    wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    }
}

const GBUFFER_ENTRIES: [wgpu::BindGroupLayoutEntry; 3] = [
    unfilterable_texture_entry(0),
    unfilterable_texture_entry(1),
    unfilterable_texture_entry(2),
];

const POST_PROCESS_ENTRIES: [wgpu::BindGroupLayoutEntry; 2] = [
    unfilterable_texture_entry(0),
    wgpu::BindGroupLayoutEntry {
        binding: 1,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    },
];

const fn unfilterable_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Mesh vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// One end of a vertex normal line drawn by the normal overlay.
///
/// Both ends of a line share the mesh vertex `position` and `normal`. The
/// shader moves the end with `tip` set to 1 along the world space normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NormalLineVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tip: f32,
}

impl NormalLineVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<NormalLineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn per_frame_layout() {
        assert_eq!(144, size_of::<PerFrameBufferData>());
        assert_eq!(128, offset_of!(PerFrameBufferData, view_pos));
    }

    #[test]
    fn per_model_layout() {
        assert_eq!(160, size_of::<PerModelBufferData>());
        assert_eq!(64, offset_of!(PerModelBufferData, normal_matrix));
        assert_eq!(128, offset_of!(PerModelBufferData, albedo));
        assert_eq!(144, offset_of!(PerModelBufferData, material));
    }

    #[test]
    fn post_process_layout() {
        // `mat3x3<f32>` occupies three 16 byte columns in WGSL.
        assert_eq!(64, size_of::<PostProcessBufferData>());
        assert_eq!(48, offset_of!(PostProcessBufferData, exposure));
        assert_eq!(52, offset_of!(PostProcessBufferData, gamma));
        assert_eq!(56, offset_of!(PostProcessBufferData, apply_gamma));
    }

    #[test]
    fn ibl_params_layout() {
        assert_eq!(16, size_of::<IblParamsBufferData>());
        assert_eq!(4.0, IblParamsBufferData::new(5).prefilter_max_lod);
        assert_eq!(0.0, IblParamsBufferData::new(1).prefilter_max_lod);
    }

    #[test]
    fn normal_line_vertex_layout() {
        assert_eq!(28, size_of::<NormalLineVertex>());
        assert_eq!(24, offset_of!(NormalLineVertex, tip));
        assert_eq!(28, NormalLineVertex::desc().array_stride);
    }

    #[test]
    fn capture_layout() {
        assert_eq!(80, size_of::<CaptureBufferData>());
        assert_eq!(64, offset_of!(CaptureBufferData, roughness));
    }

    #[test]
    fn post_process_gamma_only_for_linear_outputs() {
        assert_eq!(1, PostProcessBufferData::new(Mat3::IDENTITY, 1.0, 2.2, false).apply_gamma);
        assert_eq!(0, PostProcessBufferData::new(Mat3::IDENTITY, 1.0, 2.2, true).apply_gamma);
    }

    #[test]
    fn post_process_kernel_columns() {
        let kernel = Mat3::from_cols(Vec3::X, Vec3::Y * 2.0, Vec3::Z * 3.0);
        let data = PostProcessBufferData::new(kernel, 1.0, 2.2, false);

        assert_eq!(Vec4::new(1.0, 0.0, 0.0, 0.0), data.kernel[0]);
        assert_eq!(Vec4::new(0.0, 2.0, 0.0, 0.0), data.kernel[1]);
        assert_eq!(Vec4::new(0.0, 0.0, 3.0, 0.0), data.kernel[2]);
    }

    #[test]
    fn lights_entries_use_consecutive_point_slots() {
        let entries = BindGroupLayouts::lights_entries();
        let bindings: Vec<u32> = entries.iter().map(|e| e.binding).collect();

        assert_eq!(
            (0..3 + MAX_POINT_LIGHTS as u32).collect::<Vec<_>>(),
            bindings
        );
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = Mat3::from_mat4(m).inverse().transpose();

        // A normal of a plane sheared by the scale stays perpendicular.
        let tangent = Mat3::from_mat4(m) * Vec3::new(1.0, 1.0, 0.0);
        let normal = n * Vec3::new(1.0, -1.0, 0.0);
        assert!(tangent.dot(normal).abs() < 1e-6);
    }
}
