use super::{
    color_attachment, color_target, create_pipeline, shader_module, PipelineDesc, LIGHTS,
    SCENE_COMMON,
};
use crate::renderer::{
    meshes::{DrawMesh, Mesh},
    shaders::BindGroupLayouts,
    targets::{GBuffer, HdrTarget},
    textures::Texture,
};

/// Resolves the G-buffer into lit HDR color with a full screen Blinn-Phong
/// pass over the directional and point lights.
pub struct DeferredLightingPass {
    pipeline: wgpu::RenderPipeline,
    quad: Mesh,
}

impl DeferredLightingPass {
    const SHADER: &'static str = include_str!("../shaders/deferred_lighting.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(
            device,
            "deferred lighting shader",
            &[SCENE_COMMON, LIGHTS, Self::SHADER],
        );

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "deferred lighting pipeline",
                shader: &shader,
                bind_group_layouts: &[
                    &layouts.per_frame_layout,
                    &layouts.gbuffer_layout,
                    &layouts.lights_layout,
                ],
                targets: &[color_target(Texture::HDR_FORMAT)],
                depth_stencil: None,
                cull_mode: None,
            },
        );

        Self {
            pipeline,
            quad: Mesh::screen_quad(device),
        }
    }

    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
        gbuffer: &GBuffer,
        lights: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("deferred lighting pass"),
            color_attachments: &[color_attachment(
                &target.color.view,
                Some(wgpu::Color::BLACK),
            )],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);
        pass.set_bind_group(1, gbuffer.bind_group(), &[]);
        pass.set_bind_group(2, lights, &[]);
        pass.draw_mesh(&self.quad);
    }
}
