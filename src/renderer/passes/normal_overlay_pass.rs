use super::{
    color_attachment, color_target, depth_attachment, depth_state, shader_module, SCENE_COMMON,
};
use crate::renderer::{
    meshes::DrawMesh,
    scene::Scene,
    shaders::{BindGroupLayouts, NormalLineVertex},
    targets::HdrTarget,
    textures::Texture,
};

/// Draws the vertex normals of every scene item as yellow lines over the HDR
/// target. Lines are depth tested against the scene but do not write depth.
pub struct NormalOverlayPass {
    pipeline: wgpu::RenderPipeline,
}

impl NormalOverlayPass {
    const SHADER: &'static str = include_str!("../shaders/normal_overlay.wgsl");

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(device, "normal overlay shader", &[SCENE_COMMON, Self::SHADER]);

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("normal overlay pipeline layout"),
            bind_group_layouts: &[&layouts.per_frame_layout, &layouts.per_model_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("normal overlay pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[NormalLineVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[color_target(Texture::HDR_FORMAT)],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(depth_state(false, wgpu::CompareFunction::Less)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline }
    }

    /// Draw the normals of `scene` on top of `target` using the depth already
    /// stored in it.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
        scene: &Scene,
    ) {
        if scene.items().is_empty() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("normal overlay pass"),
            color_attachments: &[color_attachment(&target.color.view, None)],
            depth_stencil_attachment: depth_attachment(&target.depth.view, false),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);

        for item in scene.items() {
            pass.draw_item_normals(item);
        }
    }
}
