use glam::{Mat4, Quat, Vec3};

use super::{
    color_attachment, color_target, create_pipeline, depth_attachment, depth_state,
    shader_module, PipelineDesc, MODEL_VERTEX, SCENE_COMMON,
};
use crate::renderer::{
    lighting::{PointLight, MAX_POINT_LIGHTS},
    meshes::{DrawMesh, Mesh},
    shaders::{BindGroupLayouts, Material, PerModelUniforms},
    targets::HdrTarget,
    textures::Texture,
};

/// Draws a small unlit cube at every point light, colored with the light's
/// diffuse color. Markers are depth tested against the scene but do not
/// write depth.
pub struct LightMarkerPass {
    pipeline: wgpu::RenderPipeline,
    cube: Mesh,
    marker_uniforms: Vec<PerModelUniforms>,
    /// Number of markers updated by the last call to `update`.
    marker_count: usize,
}

impl LightMarkerPass {
    const SHADER: &'static str = include_str!("../shaders/light_marker.wgsl");

    /// Half width of a marker cube in world units.
    pub const MARKER_SCALE: f32 = 0.1;

    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let shader = shader_module(
            device,
            "light marker shader",
            &[SCENE_COMMON, MODEL_VERTEX, Self::SHADER],
        );

        let pipeline = create_pipeline(
            device,
            PipelineDesc {
                label: "light marker pipeline",
                shader: &shader,
                bind_group_layouts: &[&layouts.per_frame_layout, &layouts.per_model_layout],
                targets: &[color_target(Texture::HDR_FORMAT)],
                // Fragments drawn front to back.
                depth_stencil: Some(depth_state(false, wgpu::CompareFunction::Less)),
                cull_mode: Some(wgpu::Face::Back),
            },
        );

        let marker_uniforms = (0..MAX_POINT_LIGHTS)
            .map(|_| PerModelUniforms::new(device, layouts))
            .collect();

        Self {
            pipeline,
            cube: Mesh::cube(device),
            marker_uniforms,
            marker_count: 0,
        }
    }

    /// Move a marker to each of `lights` and copy the changes to the GPU.
    pub fn update(&mut self, queue: &wgpu::Queue, lights: &[PointLight]) {
        self.marker_count = lights.len().min(self.marker_uniforms.len());

        for (uniforms, light) in self.marker_uniforms.iter_mut().zip(lights) {
            uniforms.set_local_to_world(marker_transform(light.position()));
            uniforms.set_material(&Material {
                albedo: light.color().diffuse,
                ..Default::default()
            });
            uniforms.prepare(queue);
        }
    }

    /// Draw the markers on top of `target` using the depth already stored in
    /// it.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &HdrTarget,
        per_frame: &wgpu::BindGroup,
    ) {
        if self.marker_count == 0 {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light marker pass"),
            color_attachments: &[color_attachment(&target.color.view, None)],
            depth_stencil_attachment: depth_attachment(&target.depth.view, false),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, per_frame, &[]);

        for uniforms in &self.marker_uniforms[..self.marker_count] {
            pass.set_bind_group(1, uniforms.bind_group(), &[]);
            pass.draw_mesh(&self.cube);
        }
    }
}

fn marker_transform(position: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::splat(LightMarkerPass::MARKER_SCALE),
        Quat::IDENTITY,
        position,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_centered_on_the_light() {
        let m = marker_transform(Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(Vec3::new(1.0, 2.0, 3.0), m.transform_point3(Vec3::ZERO));
        assert!(m
            .transform_point3(Vec3::ONE)
            .abs_diff_eq(Vec3::new(1.1, 2.1, 3.1), 1e-6));
    }
}
