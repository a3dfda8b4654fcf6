//! Rendering tests that need a GPU. Every test is skipped when no adapter is
//! available.

use std::rc::Rc;

use glam::{Vec2, Vec3};
use half::f16;
use image::{Rgba, Rgba32FImage};

use lumen::{
    camera::Camera,
    renderer::{
        ibl::{equirect_uv, IblMaps, IblSettings},
        lighting::{DirectionalLight, LightAttenuation, LightColor, PointLight, CUBE_FACES},
        meshes::Mesh,
        request_device,
        scene::{Scene, SceneItem},
        shaders::{BindGroupLayouts, Material},
        textures::Texture,
        Renderer, RendererError, SUPPORTED_BACKENDS,
    },
    settings::{FrameSettings, RenderMode, UnknownRenderMode},
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const SMALL_IBL: IblSettings = IblSettings {
    environment_size: 64,
    irradiance_size: 8,
    prefilter_size: 16,
    prefilter_mip_levels: 3,
    brdf_lut_size: 32,
    sample_count: 64,
};

fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: SUPPORTED_BACKENDS,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }));

    let Some(adapter) = adapter else {
        eprintln!("no Vulkan, Metal or DX12 adapter available, skipping");
        return None;
    };

    match pollster::block_on(request_device(&adapter)) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("graphics device unavailable ({e}), skipping");
            None
        }
    }
}

/// Smooth test panorama: red follows longitude, green follows latitude.
fn panorama_value(uv: Vec2) -> Vec3 {
    Vec3::new(
        0.5 + 0.5 * (std::f32::consts::TAU * uv.x).cos(),
        uv.y,
        0.25,
    )
}

fn test_panorama() -> Rgba32FImage {
    let (width, height) = (256, 128);

    Rgba32FImage::from_fn(width, height, |x, y| {
        let uv = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );
        let c = panorama_value(uv);
        Rgba([c.x, c.y, c.z, 1.0])
    })
}

/// Direction through the center of texel `(x, y)` of cubemap `face`.
fn cube_texel_direction(face: u32, x: u32, y: u32, size: u32) -> Vec3 {
    let s = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
    let t = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;

    match face {
        0 => Vec3::new(1.0, -t, -s),
        1 => Vec3::new(-1.0, -t, s),
        2 => Vec3::new(s, 1.0, t),
        3 => Vec3::new(s, -1.0, -t),
        4 => Vec3::new(s, -t, 1.0),
        _ => Vec3::new(-s, -t, -1.0),
    }
    .normalize()
}

/// Copy one layer of one mip of `texture` to the CPU. Rows are returned
/// without padding.
fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    layer: u32,
    mip: u32,
) -> Vec<u8> {
    let width = (texture.width() >> mip).max(1);
    let height = (texture.height() >> mip).max(1);
    let texel_size = texture.format().block_size(None).unwrap();

    let row_size = width * texel_size;
    let padded_row_size = row_size.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback buffer"),
        size: (padded_row_size * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: mip,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_size),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
    device.poll(wgpu::Maintain::Wait);

    let padded = slice.get_mapped_range();
    let texels = padded
        .chunks_exact(padded_row_size as usize)
        .flat_map(|row| &row[..row_size as usize])
        .copied()
        .collect();

    texels
}

/// Decode `Rgba16Float` texels.
fn decode_rgba16f(bytes: &[u8]) -> Vec<Vec3> {
    bytes
        .chunks_exact(8)
        .map(|texel| {
            let channel =
                |i: usize| f16::from_le_bytes([texel[i * 2], texel[i * 2 + 1]]).to_f32();
            Vec3::new(channel(0), channel(1), channel(2))
        })
        .collect()
}

fn variance(values: &[f32]) -> f32 {
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32
}

fn precompute_test_maps(device: &wgpu::Device, queue: &wgpu::Queue) -> IblMaps {
    let layouts = BindGroupLayouts::new(device);
    let panorama = Texture::from_hdr_image(device, queue, &test_panorama(), "test panorama");

    IblMaps::precompute(device, queue, &layouts, &panorama, &SMALL_IBL)
}

#[test]
fn environment_cubemap_reproduces_panorama() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let maps = precompute_test_maps(&device, &queue);
    let size = SMALL_IBL.environment_size;

    for face in 0..6 {
        let texels = decode_rgba16f(&read_texture(
            &device,
            &queue,
            &maps.environment().texture,
            face,
            0,
        ));

        for (x, y) in [(size / 2, size / 2), (8, 16), (48, 40)] {
            let actual = texels[(y * size + x) as usize];
            let expected = panorama_value(equirect_uv(cube_texel_direction(face, x, y, size)));

            assert!(
                actual.abs_diff_eq(expected, 0.03),
                "face {face} texel ({x}, {y}): expected {expected} but was {actual}"
            );
        }
    }
}

#[test]
fn irradiance_is_non_negative_and_smoother_than_environment() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let maps = precompute_test_maps(&device, &queue);

    // The environment mip with the same face size as the irradiance map.
    let matching_mip = (SMALL_IBL.environment_size / SMALL_IBL.irradiance_size).trailing_zeros();

    let mut irradiance = Vec::new();
    let mut environment = Vec::new();

    for face in 0..6 {
        irradiance.extend(decode_rgba16f(&read_texture(
            &device,
            &queue,
            &maps.irradiance().texture,
            face,
            0,
        )));
        environment.extend(decode_rgba16f(&read_texture(
            &device,
            &queue,
            &maps.environment().texture,
            face,
            matching_mip,
        )));
    }

    assert_eq!(irradiance.len(), environment.len());

    for texel in &irradiance {
        assert!(texel.is_finite());
        assert!(texel.min_element() >= 0.0, "negative irradiance {texel}");
    }

    let signal = |texels: &[Vec3]| texels.iter().map(|t| t.x + t.y).collect::<Vec<_>>();
    assert!(variance(&signal(&irradiance)) < variance(&signal(&environment)));
}

struct TestRenderer {
    renderer: Renderer,
    output: wgpu::Texture,
    output_view: wgpu::TextureView,
    camera: Camera,
}

impl TestRenderer {
    fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let output = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test output"),
            size: wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

        let renderer = Renderer::new(
            device,
            queue,
            OUTPUT_FORMAT,
            WIDTH,
            HEIGHT,
            &test_panorama(),
            &SMALL_IBL,
        )
        .unwrap();

        let camera = Camera::new(
            Vec3::new(0.0, 3.0, 6.0),
            Vec3::new(0.0, 0.0, -3.0),
            f32::to_radians(45.0),
            0.1,
            100.0,
            WIDTH,
            HEIGHT,
        );

        Self {
            renderer,
            output,
            output_view,
            camera,
        }
    }

    fn empty_scene(&self) -> Scene {
        let light = DirectionalLight::new(
            Vec3::new(0.0, -4.0, 0.0),
            LightColor::new(Vec3::splat(0.05), Vec3::splat(0.4), Vec3::splat(0.5)).unwrap(),
        )
        .unwrap();

        Scene::new(self.renderer.device(), self.renderer.layouts(), light)
    }

    fn demo_scene(&self) -> Scene {
        let device = self.renderer.device();
        let layouts = self.renderer.layouts();
        let mut scene = self.empty_scene();

        scene.add_item(SceneItem::new(
            device,
            layouts,
            Rc::new(Mesh::cube(device)),
            Vec3::new(0.0, 0.5, -2.0),
            Vec3::splat(0.5),
            Material::default(),
        ));
        scene.add_item(SceneItem::new(
            device,
            layouts,
            Rc::new(Mesh::plane(device)),
            Vec3::new(0.0, -0.05, 0.0),
            Vec3::splat(10.0),
            Material::default(),
        ));

        let light = PointLight::new(
            Vec3::new(-2.0, 4.0, -1.0),
            LightColor::new(Vec3::splat(0.05), Vec3::splat(0.8), Vec3::ONE).unwrap(),
            LightAttenuation::new(1.0, 0.09, 0.032).unwrap(),
            25.0,
        )
        .unwrap();
        scene.add_light(device, layouts, light).unwrap();

        scene
    }

    fn render(&mut self, scene: &mut Scene, mode: RenderMode) -> Vec<u8> {
        let mut settings = FrameSettings::default();
        settings.set_mode(mode);

        self.render_with(scene, &settings)
    }

    fn render_with(&mut self, scene: &mut Scene, settings: &FrameSettings) -> Vec<u8> {
        self.renderer
            .render(scene, &self.camera, settings, &self.output_view)
            .unwrap();

        read_texture(
            self.renderer.device(),
            self.renderer.queue(),
            &self.output,
            0,
            0,
        )
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325, |hash, b| {
            (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
        })
}

#[test]
fn switching_modes_overwrites_every_pixel() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let mut test = TestRenderer::new(device, queue);
    let mut scene = test.empty_scene();

    let deferred = test.render(&mut scene, RenderMode::Deferred);
    let forward = test.render(&mut scene, RenderMode::Forward);
    let deferred_again = test.render(&mut scene, RenderMode::Deferred);

    assert_eq!((WIDTH * HEIGHT * 4) as usize, deferred.len());

    // Nothing is lit in an empty deferred frame, while forward draws the sky.
    assert!(deferred
        .chunks_exact(4)
        .all(|texel| texel == [0, 0, 0, 255]));
    assert_ne!(checksum(&deferred), checksum(&forward));
    assert_eq!(checksum(&deferred), checksum(&deferred_again));
}

#[test]
fn every_mode_renders_without_validation_errors() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let mut test = TestRenderer::new(device, queue);
    let mut scene = test.demo_scene();

    for mode in RenderMode::ALL {
        test.renderer
            .device()
            .push_error_scope(wgpu::ErrorFilter::Validation);

        let pixels = test.render(&mut scene, mode);

        let error = pollster::block_on(test.renderer.device().pop_error_scope());
        assert!(error.is_none(), "{mode} raised {error:?}");
        assert!(
            pixels.chunks_exact(4).any(|texel| texel[..3] != [0, 0, 0]),
            "{mode} produced a black frame"
        );
    }
}

#[test]
fn unknown_render_mode_is_reported() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let mut test = TestRenderer::new(device, queue);
    let mut scene = test.empty_scene();

    let mut settings = FrameSettings::default();
    settings.render_mode = 7;

    let result = test
        .renderer
        .render(&mut scene, &test.camera, &settings, &test.output_view);

    assert!(matches!(
        result,
        Err(RendererError::UnknownRenderMode(UnknownRenderMode(7)))
    ));
}

#[test]
fn resize_recreates_targets() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let mut test = TestRenderer::new(device, queue);

    test.renderer.resize(0, 10).unwrap();
    assert_eq!((WIDTH, HEIGHT), test.renderer.size());

    test.renderer.resize(32, 16).unwrap();
    assert_eq!((32, 16), test.renderer.size());
}

#[test]
fn normal_overlay_only_draws_when_enabled() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let mut test = TestRenderer::new(device, queue);
    let mut scene = test.demo_scene();

    for mode in [RenderMode::Deferred, RenderMode::Forward] {
        let mut settings = FrameSettings::default();
        settings.set_mode(mode);

        let hidden = test.render_with(&mut scene, &settings);
        let hidden_again = test.render_with(&mut scene, &settings);

        settings.visualize_normals = true;
        let shown = test.render_with(&mut scene, &settings);

        assert_eq!(checksum(&hidden), checksum(&hidden_again), "{mode}");

        let changed: Vec<_> = hidden
            .chunks_exact(4)
            .zip(shown.chunks_exact(4))
            .filter(|(before, after)| before != after)
            .map(|(_, after)| after)
            .collect();

        assert!(!changed.is_empty(), "no normals drawn in {mode}");

        // Overlay lines are yellow and replace whatever was below them.
        for texel in changed {
            assert!(texel[0] > 200 && texel[1] > 200, "{mode}: {texel:?}");
            assert_eq!(0, texel[2], "{mode}: {texel:?}");
        }
    }
}

#[test]
fn point_shadows_cover_every_cube_face() {
    let Some((device, queue)) = gpu() else {
        return;
    };

    let layouts = BindGroupLayouts::new(&device);
    let color = LightColor::new(Vec3::splat(0.05), Vec3::splat(0.8), Vec3::ONE).unwrap();
    let mut scene = Scene::new(
        &device,
        &layouts,
        DirectionalLight::new(Vec3::new(0.0, -4.0, 0.0), color).unwrap(),
    );

    // One cube 3 units away on each axis around a light at the origin.
    let cube = Rc::new(Mesh::cube(&device));
    for axis in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        scene.add_item(SceneItem::new(
            &device,
            &layouts,
            cube.clone(),
            axis * 3.0,
            Vec3::splat(0.5),
            Material::default(),
        ));
    }

    let far = 25.0;
    let light = PointLight::new(
        Vec3::ZERO,
        color,
        LightAttenuation::new(1.0, 0.09, 0.032).unwrap(),
        far,
    )
    .unwrap();
    scene.add_light(&device, &layouts, light).unwrap();

    scene.prepare(&queue);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("shadow test encoder"),
    });
    scene.compute_shadow_maps(&queue, &mut encoder);
    queue.submit(std::iter::once(encoder.finish()));

    let shadow_map = scene.lighting().point_shadow_map(0).unwrap();
    let size = shadow_map.resolution() as usize;
    assert_eq!(6, CUBE_FACES.len());

    for face in 0..CUBE_FACES.len() as u32 {
        let texels = read_texture(&device, &queue, shadow_map.texture(), face, 0);
        let center = (size / 2) * size + size / 2;
        let depth = f32::from_le_bytes(texels[center * 4..center * 4 + 4].try_into().unwrap());

        // Front faces are culled, so the far side of each cube is stored as
        // linear distance over the far plane.
        assert!(
            (2.5 / far..=3.5 / far + 1e-3).contains(&depth),
            "face {face} depth {depth}"
        );
    }
}
