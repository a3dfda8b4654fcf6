use super::{
    color_attachment, color_target, create_pipeline, depth_attachment, depth_state,
    shader_module, PipelineDesc, SkyboxPass, LIGHTS, MODEL_VERTEX, SCENE_COMMON,
};
use crate::renderer::{
    ibl::IblMaps, scene::Scene, shaders::BindGroupLayouts, targets::HdrTarget, textures::Texture,
};

/// Shades every scene item with Cook-Torrance PBR lit by the analytic lights
/// and image based lighting, then fills the background with the environment.
pub struct ForwardPass {
    pipeline: wgpu::RenderPipeline,
}

impl ForwardPass {
    const SHADER: &'static str = include_str!("../shaders/pbr.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(
            device,
            "pbr shader",
            &[SCENE_COMMON, MODEL_VERTEX, LIGHTS, Self::SHADER],
        );

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "pbr pipeline",
                shader: &shader,
                bind_group_layouts: &[
                    &layouts.per_frame_layout,
                    &layouts.per_model_layout,
                    &layouts.lights_layout,
                    &layouts.ibl_layout,
                ],
                targets: &[color_target(Texture::HDR_FORMAT)],
                depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                cull_mode: Some(wgpu::Face::Back),
            },
        );

        Self { pipeline }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
        scene: &Scene,
        lights: &wgpu::BindGroup,
        ibl: &IblMaps,
        skybox: &SkyboxPass,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("forward pass"),
            color_attachments: &[color_attachment(
                &target.color.view,
                Some(wgpu::Color::BLACK),
            )],
            depth_stencil_attachment: depth_attachment(&target.depth.view, true),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);
        pass.set_bind_group(2, lights, &[]);
        pass.set_bind_group(3, ibl.bind_group(), &[]);
        scene.draw(&mut pass);

        skybox.record(&mut pass, per_frame, ibl.environment_bind_group());
    }
}
