use wgpu::util::DeviceExt;

use super::{color_attachment, color_target, create_pipeline, shader_module, PipelineDesc};
use crate::{
    renderer::{
        meshes::{DrawMesh, Mesh},
        shaders::{BindGroupLayouts, PostProcessBufferData},
        targets::HdrTarget,
    },
    settings::FrameSettings,
};

/// Convolves the HDR target with the frame's 3x3 kernel, tone maps it with
/// exposure and writes the result to the output texture. Gamma is applied in
/// the shader only when the output format is not sRGB.
pub struct PostProcessPass {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    /// Reads the current HDR target, recreated whenever the target is.
    bind_group: wgpu::BindGroup,
    quad: Mesh,
    output_is_srgb: bool,
}

impl PostProcessPass {
    const SHADER: &'static str = include_str!("../shaders/post_process.wgsl");

    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        output_format: wgpu::TextureFormat,
        hdr: &HdrTarget,
    ) -> Self {
        let shader = shader_module(device, "post-process shader", &[Self::SHADER]);

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "post-process pipeline",
                shader: &shader,
                bind_group_layouts: &[&layouts.post_process_layout],
                targets: &[color_target(output_format)],
                depth_stencil: None,
                cull_mode: None,
            },
        );

        let output_is_srgb = output_format.is_srgb();
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("post-process uniforms"),
            contents: bytemuck::bytes_of(&PostProcessBufferData::new(
                glam::Mat3::IDENTITY,
                1.0,
                2.2,
                output_is_srgb,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = Self::create_bind_group(device, layouts, &uniforms, hdr);

        Self {
            pipeline,
            uniforms,
            bind_group,
            quad: Mesh::screen_quad(device),
            output_is_srgb,
        }
    }

    /// Point the pass at a newly created HDR target.
    pub fn resize(&mut self, device: &wgpu::Device, layouts: &BindGroupLayouts, hdr: &HdrTarget) {
        self.bind_group = Self::create_bind_group(device, layouts, &self.uniforms, hdr);
    }

    /// Copy this frame's kernel, exposure and gamma to the GPU.
    pub fn prepare(&self, queue: &wgpu::Queue, settings: &FrameSettings) {
        let values = PostProcessBufferData::new(
            settings.kernel,
            settings.exposure(),
            settings.gamma(),
            self.output_is_srgb,
        );

        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&values));
    }

    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("post-process pass"),
            color_attachments: &[color_attachment(output, Some(wgpu::Color::WHITE))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw_mesh(&self.quad);
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        uniforms: &wgpu::Buffer,
        hdr: &HdrTarget,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post-process bind group"),
            layout: &layouts.post_process_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&hdr.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }
}
