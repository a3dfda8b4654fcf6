use super::{
    color_attachment, color_target, create_pipeline, depth_attachment, depth_state,
    shader_module, PipelineDesc, MODEL_VERTEX, SCENE_COMMON,
};
use crate::renderer::{scene::Scene, shaders::BindGroupLayouts, targets::GBuffer};

/// Renders world position, normal and albedo of every scene item into the
/// G-buffer.
pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
}

impl GeometryPass {
    const SHADER: &'static str = include_str!("../shaders/geometry.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(
            device,
            "geometry shader",
            &[SCENE_COMMON, MODEL_VERTEX, Self::SHADER],
        );

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "geometry pipeline",
                shader: &shader,
                bind_group_layouts: &[&layouts.per_frame_layout, &layouts.per_model_layout],
                targets: &[
                    color_target(GBuffer::POSITION_FORMAT),
                    color_target(GBuffer::NORMAL_FORMAT),
                    color_target(GBuffer::ALBEDO_SPEC_FORMAT),
                ],
                depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
                cull_mode: Some(wgpu::Face::Back),
            },
        );

        Self { pipeline }
    }

    /// Clear the G-buffer and draw every scene item into it.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer,
        per_frame: &wgpu::BindGroup,
        scene: &Scene,
    ) {
        let clear = Some(wgpu::Color::TRANSPARENT);
        let [position, normal, albedo_spec] = gbuffer.color_views();

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("geometry pass"),
            color_attachments: &[
                color_attachment(position, clear),
                color_attachment(normal, clear),
                color_attachment(albedo_spec, clear),
            ],
            depth_stencil_attachment: depth_attachment(&gbuffer.depth.view, true),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);
        scene.draw(&mut pass);
    }
}
