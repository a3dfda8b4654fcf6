use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use tracing::debug;

use super::{
    lighting::{DirectionalLight, Light, LightError, LightingManager, PointLight, CUBE_FACES},
    meshes::{DrawMesh, Mesh},
    shaders::{BindGroupLayouts, Material, PerModelUniforms},
};

/// A placed instance of a shared mesh. Items are immutable once created.
pub struct SceneItem {
    mesh: Rc<Mesh>,
    position: Vec3,
    scale: Vec3,
    material: Material,
    /// Written once at creation and uploaded by the first `Scene::prepare`.
    uniforms: PerModelUniforms,
}

impl SceneItem {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        mesh: Rc<Mesh>,
        position: Vec3,
        scale: Vec3,
        material: Material,
    ) -> Self {
        let mut uniforms = PerModelUniforms::new(device, layouts);
        uniforms.set_local_to_world(item_transform(position, scale));
        uniforms.set_material(&material);

        Self {
            mesh,
            position,
            scale,
            material,
            uniforms,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn local_to_world(&self) -> Mat4 {
        item_transform(self.position, self.scale)
    }

    /// Extent of the scaled mesh around its own origin.
    pub fn bounding_extent(&self) -> Vec3 {
        self.mesh.bounding_extent(self.scale)
    }

    pub fn uniforms(&self) -> &PerModelUniforms {
        &self.uniforms
    }
}

/// Items are scaled about their origin and then moved to `position`.
pub fn item_transform(position: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, Quat::IDENTITY, position)
}

/// The drawable items and lights of a frame.
///
/// A `Scene` is not a scene graph! Items are drawn in insertion order.
pub struct Scene {
    items: Vec<SceneItem>,
    lighting: LightingManager,
    bounding_extent: Vec3,
}

impl Scene {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        directional: DirectionalLight,
    ) -> Self {
        Self {
            items: Vec::new(),
            lighting: LightingManager::new(device, layouts, directional),
            bounding_extent: Vec3::ZERO,
        }
    }

    pub fn add_item(&mut self, item: SceneItem) {
        debug!(
            "adding {} to scene at {} with scale {}",
            item.mesh().name(),
            item.position(),
            item.scale()
        );

        self.items.push(item);
        self.compute_bounding_box();
    }

    /// Add a light. A directional light replaces the existing one.
    pub fn add_light(
        &mut self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        light: impl Into<Light>,
    ) -> Result<(), LightError> {
        self.lighting.add_light(device, layouts, light.into())
    }

    /// Recompute the per-axis maximum extent across every item and return it.
    pub fn compute_bounding_box(&mut self) -> Vec3 {
        self.bounding_extent = scene_extent(self.items.iter().map(SceneItem::bounding_extent));
        self.bounding_extent
    }

    /// The extent last computed by `compute_bounding_box`.
    pub fn bounding_extent(&self) -> Vec3 {
        self.bounding_extent
    }

    /// Upload any item uniforms changed since the last frame.
    pub fn prepare(&self, queue: &wgpu::Queue) {
        for item in &self.items {
            item.uniforms().prepare(queue);
        }
    }

    /// Render every item into the directional shadow map and all six faces of
    /// every point light shadow cubemap.
    pub fn compute_shadow_maps(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder) {
        self.lighting
            .compute_light_space_matrices(self.bounding_extent);
        self.lighting.write_shadow_faces(queue);

        {
            let mut pass = self.lighting.bind_directional_shadow_map(encoder);
            self.draw(&mut pass);
        }

        for light in 0..self.lighting.point_lights().len() {
            for face in 0..CUBE_FACES.len() {
                if let Some(mut pass) = self.lighting.bind_point_shadow_map(encoder, light, face) {
                    self.draw(&mut pass);
                }
            }
        }
    }

    /// Upload the lights and return the bind group that exposes them along
    /// with their shadow maps.
    pub fn bind_lights_data(&mut self, queue: &wgpu::Queue) -> &wgpu::BindGroup {
        self.lighting.bind(queue, self.bounding_extent)
    }

    /// Draw every item with the pipeline already set on `pass`.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        for item in &self.items {
            pass.draw_item(item);
        }
    }

    pub fn get_depth_cubemap(&self, index: usize) -> Option<&wgpu::TextureView> {
        self.lighting.get_depth_cubemap(index)
    }

    pub fn point_lights(&self) -> &[PointLight] {
        self.lighting.point_lights()
    }

    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    pub fn lighting(&self) -> &LightingManager {
        &self.lighting
    }
}

/// Per-axis maximum of the given item extents.
pub fn scene_extent(extents: impl IntoIterator<Item = Vec3>) -> Vec3 {
    extents.into_iter().fold(Vec3::ZERO, Vec3::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::lighting::{correct_light_direction, directional_light_space, LightColor};

    #[test]
    fn scene_extent_is_per_axis_maximum() {
        let extent = scene_extent([
            Vec3::new(0.2, 0.2, 0.2),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.5, 0.5, 0.4),
        ]);

        assert_eq!(Vec3::new(10.0, 0.5, 10.0), extent);
    }

    #[test]
    fn empty_scene_has_zero_extent() {
        assert_eq!(Vec3::ZERO, scene_extent([]));
    }

    #[test]
    fn item_transform_scales_before_translating() {
        let m = item_transform(Vec3::new(0.0, 0.5, -10.0), Vec3::splat(0.2));

        assert!(m
            .transform_point3(Vec3::ONE)
            .abs_diff_eq(Vec3::new(0.2, 0.7, -9.8), 1e-6));
    }

    #[test]
    fn adding_items_refits_the_directional_frustum() {
        let Some((device, queue)) = crate::renderer::test_device() else {
            return;
        };

        let layouts = BindGroupLayouts::new(&device);
        let color = LightColor::new(Vec3::splat(0.05), Vec3::splat(0.4), Vec3::splat(0.5)).unwrap();
        let direction = Vec3::new(0.0, -4.0, 0.0);
        let mut scene = Scene::new(
            &device,
            &layouts,
            DirectionalLight::new(direction, color).unwrap(),
        );
        let corrected = correct_light_direction(direction);

        scene.bind_lights_data(&queue);
        let empty = scene.lighting().directional_light().light_space();
        assert_eq!(directional_light_space(corrected, Vec3::ZERO), empty);

        scene.add_item(SceneItem::new(
            &device,
            &layouts,
            Rc::new(Mesh::plane(&device)),
            Vec3::new(0.0, -0.05, 0.0),
            Vec3::splat(10.0),
            Material::default(),
        ));
        assert_eq!(Vec3::new(10.0, 0.0, 10.0), scene.bounding_extent());

        scene.bind_lights_data(&queue);
        let floored = scene.lighting().directional_light().light_space();

        assert_ne!(empty, floored);
        assert_eq!(
            directional_light_space(corrected, Vec3::new(10.0, 0.0, 10.0)),
            floored
        );
    }
}
