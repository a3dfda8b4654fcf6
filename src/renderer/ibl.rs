//! Image based lighting precompute.
//!
//! An equirectangular HDR panorama is converted once at startup into the four
//! resources the physically based forward pass needs:
//!
//!  1. an environment cubemap with a full mip chain,
//!  2. a diffuse irradiance cubemap,
//!  3. a specular cubemap prefiltered by roughness across its mips,
//!  4. a BRDF integration lookup table.
//!
//! Every pass is recorded into one command encoder and submitted once. Nothing
//! waits for the GPU to finish.
use std::{f32::consts::PI, time::Instant};

use glam::{Vec2, Vec3};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use super::{
    gpu_buffers::DynamicUniformArray,
    lighting::cube_face_view_projections,
    meshes::{DrawMesh, Mesh},
    shaders::{BindGroupLayouts, CaptureBufferData, IblParamsBufferData, Vertex},
    textures::{full_mip_count, linear_sampler, Texture},
};

/// Near plane of the capture projection.
pub const CAPTURE_NEAR: f32 = 0.1;
/// Far plane of the capture projection.
pub const CAPTURE_FAR: f32 = 10.0;
pub const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

const NO_OFFSETS: &[wgpu::DynamicOffset] = &[];

/// Resolutions and sample counts of the precomputed resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IblSettings {
    /// Face size of the environment cubemap. It always gets a full mip chain.
    pub environment_size: u32,
    pub irradiance_size: u32,
    /// Face size of mip zero of the prefiltered specular cubemap.
    pub prefilter_size: u32,
    /// Number of roughness levels stored in the prefiltered cubemap mips.
    pub prefilter_mip_levels: u32,
    pub brdf_lut_size: u32,
    /// Importance samples per texel for prefiltering and BRDF integration.
    pub sample_count: u32,
}

impl Default for IblSettings {
    fn default() -> Self {
        Self {
            environment_size: 512,
            irradiance_size: 32,
            prefilter_size: 128,
            prefilter_mip_levels: 5,
            brdf_lut_size: 512,
            sample_count: 1024,
        }
    }
}

impl IblSettings {
    /// The requested prefilter mip count limited to what the prefilter size
    /// allows.
    pub fn prefilter_mips(&self) -> u32 {
        self.prefilter_mip_levels
            .clamp(1, full_mip_count(self.prefilter_size))
    }

    /// Number of capture uniform slots: six faces for the environment and
    /// irradiance captures, then six per prefilter mip.
    fn capture_slot_count(&self) -> usize {
        (1 + self.prefilter_mips() as usize) * 6
    }
}

/// Roughness stored in prefilter mip `mip` of `mip_levels`. Mip zero is a
/// mirror, the last mip is fully rough.
pub fn prefilter_roughness(mip: u32, mip_levels: u32) -> f32 {
    if mip_levels <= 1 {
        0.0
    } else {
        mip as f32 / (mip_levels - 1) as f32
    }
}

/// Texture coordinates of `dir` in an equirectangular panorama. Longitude
/// wraps around +Y starting from -X and `v = 0` is straight up.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let dir = dir.normalize();
    let u = dir.z.atan2(dir.x) / (2.0 * PI) + 0.5;
    let v = 0.5 - dir.y.clamp(-1.0, 1.0).asin() / PI;

    Vec2::new(u, v)
}

/// Capture uniform slot of `face` at prefilter mip `mip`, or of the base
/// captures when `mip` is `None`.
fn capture_slot(mip: Option<u32>, face: usize) -> usize {
    match mip {
        None => face,
        Some(mip) => (1 + mip as usize) * 6 + face,
    }
}

/// Size of mip `level` of a texture with a mip zero of `size`.
fn mip_size(size: u32, level: u32) -> u32 {
    (size >> level).max(1)
}

/// The precomputed image based lighting resources.
pub struct IblMaps {
    environment: Texture,
    irradiance: Texture,
    prefilter: Texture,
    brdf_lut: Texture,
    /// Irradiance, prefiltered specular and BRDF LUT for the forward pass.
    bind_group: wgpu::BindGroup,
    environment_bind_group: wgpu::BindGroup,
    irradiance_bind_group: wgpu::BindGroup,
    brdf_lut_bind_group: wgpu::BindGroup,
}

impl IblMaps {
    /// Convert `panorama` into every image based lighting resource.
    pub fn precompute(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &BindGroupLayouts,
        panorama: &Texture,
        settings: &IblSettings,
    ) -> Self {
        let started = Instant::now();
        let precompute = Precompute::new(device, queue, layouts, settings);

        let environment_mips = full_mip_count(settings.environment_size);
        let prefilter_mips = settings.prefilter_mips();

        let environment = Texture::cubemap(
            device,
            "environment cubemap",
            settings.environment_size,
            environment_mips,
            Texture::HDR_FORMAT,
        );
        let irradiance = Texture::cubemap(
            device,
            "irradiance cubemap",
            settings.irradiance_size,
            1,
            Texture::HDR_FORMAT,
        );
        let prefilter = Texture::cubemap(
            device,
            "prefiltered specular cubemap",
            settings.prefilter_size,
            prefilter_mips,
            Texture::HDR_FORMAT,
        );
        let brdf_lut = Texture::render_target(
            device,
            "brdf lut",
            settings.brdf_lut_size,
            settings.brdf_lut_size,
            BRDF_LUT_FORMAT,
            wgpu::TextureUsages::COPY_SRC,
        );

        let sampler = linear_sampler(device, "ibl sampler");
        let panorama_bind_group =
            texture_bind_group(device, &layouts.texture_2d_layout, &panorama.view, &sampler);
        let environment_bind_group =
            texture_bind_group(device, &layouts.cube_texture_layout, &environment.view, &sampler);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ibl precompute encoder"),
        });
        let mut depth = CaptureDepth::default();

        // Environment mip zero from the panorama.
        for face in 0..6 {
            precompute.capture(
                &mut encoder,
                "equirect to cube pass",
                &environment.face_view(face as u32, 0),
                depth.view(device, settings.environment_size),
                &precompute.equirect_pipeline,
                capture_slot(None, face),
                &panorama_bind_group,
            );
        }

        // Downsample each environment face into the rest of its mips.
        let mip_sources: Vec<(wgpu::TextureView, u32, u32)> = (1..environment_mips)
            .flat_map(|mip| (0..6).map(move |face| (face, mip)))
            .map(|(face, mip)| (environment.face_view(face, mip - 1), face, mip))
            .collect();
        let mip_bind_groups: Vec<wgpu::BindGroup> = mip_sources
            .iter()
            .map(|(source, _, _)| {
                texture_bind_group(device, &layouts.texture_2d_layout, source, &sampler)
            })
            .collect();

        for ((_, face, mip), bind_group) in mip_sources.iter().zip(&mip_bind_groups) {
            precompute.draw_quad(
                &mut encoder,
                "environment mip pass",
                &environment.face_view(*face, *mip),
                &precompute.mipmap_pipeline,
                &[(bind_group, NO_OFFSETS)],
            );
        }

        // Diffuse irradiance from the mipmapped environment.
        for face in 0..6 {
            precompute.capture(
                &mut encoder,
                "irradiance pass",
                &irradiance.face_view(face as u32, 0),
                depth.view(device, settings.irradiance_size),
                &precompute.irradiance_pipeline,
                capture_slot(None, face),
                &environment_bind_group,
            );
        }

        // One roughness level per prefilter mip.
        for mip in 0..prefilter_mips {
            let size = mip_size(settings.prefilter_size, mip);

            for face in 0..6 {
                precompute.capture(
                    &mut encoder,
                    "prefilter pass",
                    &prefilter.face_view(face as u32, mip),
                    depth.view(device, size),
                    &precompute.prefilter_pipeline,
                    capture_slot(Some(mip), face),
                    &environment_bind_group,
                );
            }
        }

        let brdf_offsets = [precompute.captures.dynamic_offset(0)];
        precompute.draw_quad(
            &mut encoder,
            "brdf lut pass",
            &brdf_lut.view,
            &precompute.brdf_pipeline,
            &[(precompute.captures.bind_group(), &brdf_offsets[..])],
        );

        queue.submit(std::iter::once(encoder.finish()));
        depth.retire_all();

        info!(
            "submitted image based lighting precompute ({}² environment, {}² irradiance, {}² prefilter with {} mips, {}² brdf lut) in {:?}",
            settings.environment_size,
            settings.irradiance_size,
            settings.prefilter_size,
            prefilter_mips,
            settings.brdf_lut_size,
            started.elapsed()
        );

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ibl params buffer"),
            contents: bytemuck::bytes_of(&IblParamsBufferData::new(prefilter_mips)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl bind group"),
            layout: &layouts.ibl_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&irradiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&prefilter.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&brdf_lut.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });
        let irradiance_bind_group =
            texture_bind_group(device, &layouts.cube_texture_layout, &irradiance.view, &sampler);
        let brdf_lut_bind_group =
            texture_bind_group(device, &layouts.texture_2d_layout, &brdf_lut.view, &sampler);

        Self {
            environment,
            irradiance,
            prefilter,
            brdf_lut,
            bind_group,
            environment_bind_group,
            irradiance_bind_group,
            brdf_lut_bind_group,
        }
    }

    /// Bind group of the irradiance, prefiltered and BRDF LUT resources.
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// The environment cubemap and a sampler, for skybox drawing.
    pub fn environment_bind_group(&self) -> &wgpu::BindGroup {
        &self.environment_bind_group
    }

    pub fn irradiance_bind_group(&self) -> &wgpu::BindGroup {
        &self.irradiance_bind_group
    }

    pub fn brdf_lut_bind_group(&self) -> &wgpu::BindGroup {
        &self.brdf_lut_bind_group
    }

    pub fn environment(&self) -> &Texture {
        &self.environment
    }

    pub fn irradiance(&self) -> &Texture {
        &self.irradiance
    }

    pub fn prefilter(&self) -> &Texture {
        &self.prefilter
    }

    pub fn brdf_lut(&self) -> &Texture {
        &self.brdf_lut
    }
}

/// Pipelines and per-draw uniforms that only live for one precompute.
struct Precompute {
    cube: Mesh,
    quad: Mesh,
    captures: DynamicUniformArray<CaptureBufferData>,
    equirect_pipeline: wgpu::RenderPipeline,
    irradiance_pipeline: wgpu::RenderPipeline,
    prefilter_pipeline: wgpu::RenderPipeline,
    mipmap_pipeline: wgpu::RenderPipeline,
    brdf_pipeline: wgpu::RenderPipeline,
}

impl Precompute {
    const CAPTURE_SHADER: &'static str = include_str!("shaders/ibl_capture.wgsl");
    const EQUIRECT_SHADER: &'static str = include_str!("shaders/equirect_to_cube.wgsl");
    const IRRADIANCE_SHADER: &'static str = include_str!("shaders/irradiance.wgsl");
    const PREFILTER_SHADER: &'static str = include_str!("shaders/prefilter.wgsl");
    const SAMPLING_SHADER: &'static str = include_str!("shaders/importance_sampling.wgsl");
    const BRDF_SHADER: &'static str = include_str!("shaders/brdf_lut.wgsl");
    const MIPMAP_SHADER: &'static str = include_str!("shaders/mipmap.wgsl");

    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &BindGroupLayouts,
        settings: &IblSettings,
    ) -> Self {
        let captures = DynamicUniformArray::new(
            device,
            Some("ibl capture uniforms"),
            settings.capture_slot_count(),
            &layouts.capture_layout,
        );

        let view_projections = cube_face_view_projections(Vec3::ZERO, CAPTURE_NEAR, CAPTURE_FAR);
        let prefilter_mips = settings.prefilter_mips();

        let values: Vec<CaptureBufferData> = std::iter::once(None)
            .chain((0..prefilter_mips).map(Some))
            .flat_map(|mip| {
                view_projections.iter().map(move |view_projection| CaptureBufferData {
                    view_projection: *view_projection,
                    roughness: mip.map_or(0.0, |mip| prefilter_roughness(mip, prefilter_mips)),
                    source_resolution: settings.environment_size as f32,
                    sample_count: settings.sample_count.max(1),
                    _padding: 0,
                })
            })
            .collect();

        debug_assert_eq!(settings.capture_slot_count(), values.len());
        captures.write_all(queue, &values);

        let cube_source_layout = [&layouts.capture_layout, &layouts.cube_texture_layout];

        Self {
            cube: Mesh::skybox(device),
            quad: Mesh::screen_quad(device),
            equirect_pipeline: create_pipeline(
                device,
                "equirect to cube pipeline",
                &[Self::CAPTURE_SHADER, Self::EQUIRECT_SHADER],
                "vs_capture",
                &[&layouts.capture_layout, &layouts.texture_2d_layout],
                Texture::HDR_FORMAT,
                true,
            ),
            irradiance_pipeline: create_pipeline(
                device,
                "irradiance pipeline",
                &[Self::CAPTURE_SHADER, Self::IRRADIANCE_SHADER],
                "vs_capture",
                &cube_source_layout,
                Texture::HDR_FORMAT,
                true,
            ),
            prefilter_pipeline: create_pipeline(
                device,
                "prefilter pipeline",
                &[
                    Self::CAPTURE_SHADER,
                    Self::SAMPLING_SHADER,
                    Self::PREFILTER_SHADER,
                ],
                "vs_capture",
                &cube_source_layout,
                Texture::HDR_FORMAT,
                true,
            ),
            mipmap_pipeline: create_pipeline(
                device,
                "environment mipmap pipeline",
                &[Self::MIPMAP_SHADER],
                "vs_main",
                &[&layouts.texture_2d_layout],
                Texture::HDR_FORMAT,
                false,
            ),
            brdf_pipeline: create_pipeline(
                device,
                "brdf lut pipeline",
                &[Self::BRDF_SHADER, Self::SAMPLING_SHADER],
                "vs_main",
                &[&layouts.capture_layout],
                BRDF_LUT_FORMAT,
                false,
            ),
            captures,
        }
    }

    /// Render the capture cube into one cubemap face.
    #[allow(clippy::too_many_arguments)]
    fn capture(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        slot: usize,
        source: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(
            0,
            self.captures.bind_group(),
            &[self.captures.dynamic_offset(slot)],
        );
        pass.set_bind_group(1, source, &[]);
        pass.draw_mesh(&self.cube);
    }

    /// Render the screen quad into `target` with no depth attachment.
    fn draw_quad(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        bind_groups: &[(&wgpu::BindGroup, &[wgpu::DynamicOffset])],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        for (index, (bind_group, offsets)) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group, offsets);
        }
        pass.draw_mesh(&self.quad);
    }
}

/// The depth attachment shared by capture passes. It is reallocated whenever
/// a pass needs a different size. Replaced textures are kept until the
/// precompute has been submitted.
#[derive(Default)]
struct CaptureDepth {
    current: Option<Texture>,
    retired: Vec<Texture>,
}

impl CaptureDepth {
    fn view(&mut self, device: &wgpu::Device, size: u32) -> &wgpu::TextureView {
        if self.current.as_ref().map(Texture::width) != Some(size) {
            if let Some(old) = self.current.take() {
                self.retired.push(old);
            }
        }

        let texture = self.current.get_or_insert_with(|| {
            debug!("allocating {size}x{size} capture depth target");
            Texture::depth_target(
                device,
                "ibl capture depth",
                size,
                size,
                wgpu::TextureUsages::empty(),
            )
        });

        &texture.view
    }

    fn retire_all(&mut self) {
        debug!("releasing {} capture depth targets", self.retired.len() + 1);
        self.retired.clear();
        self.current = None;
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ibl texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Create a precompute pipeline from WGSL `sources` joined in order. Capture
/// pipelines draw the cube from its inside so nothing is culled.
fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    sources: &[&str],
    vertex_entry_point: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
    with_depth: bool,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(sources.concat().into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: vertex_entry_point,
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
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
        depth_stencil: with_depth.then(|| wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
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

    #[test]
    fn equirect_uv_of_axes() {
        assert!(equirect_uv(Vec3::X).abs_diff_eq(Vec2::new(0.5, 0.5), 1e-6));
        assert!(equirect_uv(Vec3::Z).abs_diff_eq(Vec2::new(0.75, 0.5), 1e-6));
        assert!(equirect_uv(Vec3::NEG_Z).abs_diff_eq(Vec2::new(0.25, 0.5), 1e-6));
        assert!((equirect_uv(Vec3::Y).y).abs() < 1e-6);
        assert!((equirect_uv(Vec3::NEG_Y).y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equirect_uv_ignores_direction_length() {
        let dir = Vec3::new(0.3, -0.4, 0.8);
        assert!(equirect_uv(dir).abs_diff_eq(equirect_uv(dir * 7.0), 1e-6));
    }

    #[test]
    fn prefilter_roughness_spans_mips() {
        let roughness: Vec<f32> = (0..5).map(|mip| prefilter_roughness(mip, 5)).collect();
        assert_eq!(vec![0.0, 0.25, 0.5, 0.75, 1.0], roughness);
        assert_eq!(0.0, prefilter_roughness(0, 1));
    }

    #[test]
    fn capture_slots_do_not_overlap() {
        let settings = IblSettings::default();
        let mut slots: Vec<usize> = (0..6).map(|face| capture_slot(None, face)).collect();

        for mip in 0..settings.prefilter_mips() {
            slots.extend((0..6).map(|face| capture_slot(Some(mip), face)));
        }

        let count = slots.len();
        slots.sort_unstable();
        slots.dedup();

        assert_eq!(count, slots.len());
        assert_eq!(36, settings.capture_slot_count());
        assert_eq!(settings.capture_slot_count() - 1, *slots.last().unwrap());
    }

    #[test]
    fn prefilter_mips_are_limited_by_size() {
        let settings = IblSettings {
            prefilter_size: 8,
            prefilter_mip_levels: 10,
            ..Default::default()
        };

        assert_eq!(4, settings.prefilter_mips());
    }

    #[test]
    fn mip_sizes_stop_at_one() {
        assert_eq!(128, mip_size(128, 0));
        assert_eq!(8, mip_size(128, 4));
        assert_eq!(1, mip_size(4, 5));
    }
}
