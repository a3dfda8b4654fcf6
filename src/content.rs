use std::path::Path;

use anyhow::Context;
use glam::Vec3;
use image::{ImageFormat, Rgba, Rgba32FImage};
use tracing::info;

use crate::platform::load_as_binary;

mod obj_model;

pub use obj_model::{compute_vertex_normals, load_obj_mesh};

/// Load an equirectangular Radiance HDR panorama.
#[tracing::instrument(level = "info")]
pub async fn load_panorama<P>(file_path: P) -> anyhow::Result<Rgba32FImage>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let bytes = load_as_binary(file_path.as_ref()).await?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Hdr)
        .with_context(|| format!("failed to decode HDR panorama {file_path:?}"))?
        .into_rgba32f();

    info!(
        "loaded {}x{} HDR panorama",
        image.width(),
        image.height()
    );

    Ok(image)
}

/// Generate an equirectangular sky used when no panorama is configured: a
/// horizon to zenith gradient over a dim ground with a bright sun.
pub fn procedural_sky(width: u32, height: u32) -> Rgba32FImage {
    const HORIZON: Vec3 = Vec3::new(0.9, 0.85, 0.8);
    const ZENITH: Vec3 = Vec3::new(0.2, 0.4, 0.9);
    const GROUND: Vec3 = Vec3::new(0.15, 0.13, 0.1);
    const SUN: Vec3 = Vec3::new(20.0, 18.0, 15.0);
    const SUN_COS_RADIUS: f32 = 0.9995;

    let sun_direction = Vec3::new(0.3, 0.6, -0.5).normalize();

    Rgba32FImage::from_fn(width, height, |x, y| {
        let direction = panorama_direction(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );

        let color = if direction.y >= 0.0 {
            let sky = HORIZON.lerp(ZENITH, direction.y.sqrt());
            if direction.dot(sun_direction) > SUN_COS_RADIUS {
                SUN
            } else {
                sky
            }
        } else {
            GROUND.lerp(HORIZON * 0.3, (1.0 + direction.y).powi(8))
        };

        Rgba([color.x, color.y, color.z, 1.0])
    })
}

/// Direction at texture coordinate `(u, v)` of an equirectangular panorama,
/// `v = 0` is straight up.
fn panorama_direction(u: f32, v: f32) -> Vec3 {
    let azimuth = (u - 0.5) * std::f32::consts::TAU;
    let elevation = (0.5 - v) * std::f32::consts::PI;

    Vec3::new(
        elevation.cos() * azimuth.cos(),
        elevation.sin(),
        elevation.cos() * azimuth.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panorama_rows_map_to_elevation() {
        assert!(panorama_direction(0.3, 0.0).abs_diff_eq(Vec3::Y, 1e-6));
        assert!(panorama_direction(0.7, 1.0).abs_diff_eq(Vec3::NEG_Y, 1e-6));
        assert!(panorama_direction(0.5, 0.5).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn procedural_sky_is_brighter_above_the_horizon() {
        let sky = procedural_sky(64, 32);
        let luminance = |p: &Rgba<f32>| p.0[0] + p.0[1] + p.0[2];

        let above = luminance(sky.get_pixel(5, 10));
        let below = luminance(sky.get_pixel(5, 28));

        assert!(above > below);
        assert!(sky.pixels().all(|p| p.0.iter().all(|c| *c >= 0.0)));
    }

    #[test]
    fn missing_panorama_is_an_error() {
        assert!(pollster::block_on(load_panorama("/no/such/lumen/sky.hdr")).is_err());
    }
}
