use super::{
    color_attachment, color_target, create_pipeline, depth_attachment, depth_state,
    shader_module, PipelineDesc, SCENE_COMMON,
};
use crate::renderer::{
    meshes::{DrawMesh, Mesh},
    shaders::BindGroupLayouts,
    targets::HdrTarget,
    textures::Texture,
};

/// Draws a cubemap as the background behind everything already rendered.
///
/// The cube is projected onto the far plane and depth tested with
/// `LessEqual` without writing depth, so it only fills pixels that no
/// geometry covered.
pub struct SkyboxPass {
    pipeline: wgpu::RenderPipeline,
    cube: Mesh,
}

impl SkyboxPass {
    const SHADER: &'static str = include_str!("../shaders/skybox.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(device, "skybox shader", &[SCENE_COMMON, Self::SHADER]);

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "skybox pipeline",
                shader: &shader,
                bind_group_layouts: &[&layouts.per_frame_layout, &layouts.cube_texture_layout],
                targets: &[color_target(Texture::HDR_FORMAT)],
                depth_stencil: Some(depth_state(false, wgpu::CompareFunction::LessEqual)),
                cull_mode: None,
            },
        );

        Self {
            pipeline,
            cube: Mesh::skybox(device),
        }
    }

    /// Record the skybox into an already started HDR pass with a depth
    /// attachment.
    pub fn record<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        per_frame: &'a wgpu::BindGroup,
        cubemap: &'a wgpu::BindGroup,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);
        pass.set_bind_group(1, cubemap, &[]);
        pass.draw_mesh(&self.cube);
    }

    /// Clear `target` and draw only `cubemap` into it.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
        cubemap: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("skybox pass"),
            color_attachments: &[color_attachment(
                &target.color.view,
                Some(wgpu::Color::BLACK),
            )],
            depth_stencil_attachment: depth_attachment(&target.depth.view, true),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.record(&mut pass, per_frame, cubemap);
    }
}
