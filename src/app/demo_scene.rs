use std::rc::Rc;

use glam::Vec3;
use tracing::info;

use crate::{
    content::load_obj_mesh,
    renderer::{
        lighting::{DirectionalLight, LightAttenuation, LightColor, PointLight},
        meshes::Mesh,
        scene::{Scene, SceneItem},
        shaders::Material,
        Renderer,
    },
    settings::RenderSettings,
};

const DIRECTIONAL_LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, -4.0, 0.0);

const POINT_LIGHT_POSITIONS: [Vec3; 3] = [
    Vec3::new(-2.0, 4.0, -1.0),
    Vec3::new(-4.0, 2.0, -12.0),
    Vec3::new(0.0, 0.0, -2.0),
];

const POINT_LIGHT_FAR: f32 = 25.0;

/// Build the demo scene: a small cube, a floor plane, an optional model at the
/// origin, one directional light and three point lights.
pub async fn build_demo_scene(
    renderer: &Renderer,
    settings: &RenderSettings,
) -> anyhow::Result<Scene> {
    let device = renderer.device();
    let layouts = renderer.layouts();

    let directional = DirectionalLight::new(
        DIRECTIONAL_LIGHT_DIRECTION,
        LightColor::new(Vec3::splat(0.05), Vec3::splat(0.4), Vec3::splat(0.5))?,
    )?;

    let mut scene = Scene::new(device, layouts, directional);

    scene.add_item(SceneItem::new(
        device,
        layouts,
        Rc::new(Mesh::cube(device)),
        Vec3::new(0.0, 0.5, -10.0),
        Vec3::splat(0.2),
        Material {
            albedo: Vec3::new(0.8, 0.2, 0.2),
            metallic: 0.8,
            roughness: 0.3,
            ..Default::default()
        },
    ));

    scene.add_item(SceneItem::new(
        device,
        layouts,
        Rc::new(Mesh::plane(device)),
        Vec3::new(0.0, -0.05, 0.0),
        Vec3::splat(10.0),
        Material {
            albedo: Vec3::splat(0.6),
            specular: 0.2,
            roughness: 0.8,
            ..Default::default()
        },
    ));

    if let Some(model_path) = &settings.model_path {
        let mesh = load_obj_mesh(device, model_path).await?;

        scene.add_item(SceneItem::new(
            device,
            layouts,
            Rc::new(mesh),
            Vec3::ZERO,
            Vec3::splat(settings.model_scale),
            Material {
                albedo: Vec3::new(1.0, 0.86, 0.57),
                metallic: 1.0,
                roughness: 0.25,
                ..Default::default()
            },
        ));
    }

    for position in POINT_LIGHT_POSITIONS {
        let light = PointLight::new(
            position,
            LightColor::new(Vec3::splat(0.05), Vec3::splat(0.8), Vec3::splat(1.0))?,
            LightAttenuation::new(1.0, 0.09, 0.032)?,
            POINT_LIGHT_FAR,
        )?;

        scene.add_light(device, layouts, light)?;
    }

    info!(
        "demo scene has {} items and {} point lights, extent {}",
        scene.items().len(),
        scene.point_lights().len(),
        scene.bounding_extent()
    );

    Ok(scene)
}
