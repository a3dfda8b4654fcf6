use super::{
    color_attachment, color_target, create_pipeline, shader_module, PipelineDesc, SCENE_COMMON,
};
use crate::renderer::{
    meshes::{DrawMesh, Mesh},
    shaders::BindGroupLayouts,
    targets::HdrTarget,
    textures::Texture,
};

/// Visualizes intermediate renderer resources: a point light depth cubemap
/// drawn as the scene background and the BRDF lookup table drawn across the
/// screen.
pub struct DebugViewPass {
    depth_cube_pipeline: wgpu::RenderPipeline,
    brdf_pipeline: wgpu::RenderPipeline,
    /// Depth textures can only be read with a non-filtering sampler.
    depth_sampler: wgpu::Sampler,
    cube: Mesh,
    quad: Mesh,
}

impl DebugViewPass {
    const DEPTH_CUBE_SHADER: &'static str = include_str!("../shaders/debug_depth_cube.wgsl");
    const BRDF_SHADER: &'static str = include_str!("../shaders/debug_brdf.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let depth_cube_shader = shader_module(
            device,
            "debug depth cube shader",
            &[SCENE_COMMON, Self::DEPTH_CUBE_SHADER],
        );

        let depth_cube_pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "debug depth cube pipeline",
                shader: &depth_cube_shader,
                bind_group_layouts: &[&layouts.per_frame_layout, &layouts.depth_cube_layout],
                targets: &[color_target(Texture::HDR_FORMAT)],
                depth_stencil: None,
                cull_mode: None,
            },
        );

        let brdf_shader = shader_module(device, "debug brdf shader", &[Self::BRDF_SHADER]);
        let brdf_pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "debug brdf pipeline",
                shader: &brdf_shader,
                bind_group_layouts: &[&layouts.texture_2d_layout],
                targets: &[color_target(Texture::HDR_FORMAT)],
                depth_stencil: None,
                cull_mode: None,
            },
        );

        let depth_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("debug depth cube sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            depth_cube_pipeline,
            brdf_pipeline,
            depth_sampler,
            cube: Mesh::skybox(device),
            quad: Mesh::screen_quad(device),
        }
    }

    /// Draw the depth cubemap `depth_cube` around the camera. Stored distances
    /// are normalized by the light's far plane and shown as gray levels.
    pub fn draw_depth_cubemap(
        &self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
        depth_cube: &wgpu::TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("debug depth cube bind group"),
            layout: &layouts.depth_cube_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(depth_cube),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.depth_sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("debug depth cube pass"),
            color_attachments: &[color_attachment(
                &target.color.view,
                Some(wgpu::Color::BLACK),
            )],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.depth_cube_pipeline);
        pass.set_bind_group(0, per_frame, &[]);
        pass.set_bind_group(1, &bind_group, &[]);
        pass.draw_mesh(&self.cube);
    }

    /// Draw the BRDF integration lookup table over the whole target.
    pub fn draw_brdf_lut(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        brdf_lut: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("debug brdf pass"),
            color_attachments: &[color_attachment(
                &target.color.view,
                Some(wgpu::Color::BLACK),
            )],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.brdf_pipeline);
        pass.set_bind_group(0, brdf_lut, &[]);
        pass.draw_mesh(&self.quad);
    }
}
