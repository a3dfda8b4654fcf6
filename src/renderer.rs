pub mod gpu_buffers;
pub mod ibl;
pub mod lighting;
pub mod meshes;
pub mod passes;
pub mod scene;
pub mod shaders;
pub mod shadows;
pub mod targets;
pub mod textures;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    camera::Camera,
    settings::{FrameSettings, RenderMode, UnknownRenderMode},
};

use ibl::{IblMaps, IblSettings};
use lighting::LightError;
use passes::{
    DebugViewPass, DeferredLightingPass, ForwardPass, GeometryPass, LightMarkerPass,
    NormalOverlayPass, PostProcessPass, SkyboxPass,
};
use scene::Scene;
use shaders::{BindGroupLayouts, PerFrameUniforms};
use targets::{blit_depth, GBuffer, HdrTarget};
use textures::Texture;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    UnknownRenderMode(#[from] UnknownRenderMode),
    #[error("render target {label} could not be created: {message}")]
    IncompleteRenderTarget { label: String, message: String },
    #[error("render target width and height must be larger than zero but were {0}x{1}")]
    InvalidSize(u32, u32),
    #[error(transparent)]
    Light(#[from] LightError),
    #[error("the {0:?} graphics backend is not supported, use Vulkan, Metal or DX12")]
    UnsupportedBackend(wgpu::Backend),
    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Backends the renderer can run on. Point shadow lookups compare against
/// depth cubemaps, which the GL backend cannot translate.
pub const SUPPORTED_BACKENDS: wgpu::Backends = wgpu::Backends::PRIMARY;

pub fn is_supported_backend(backend: wgpu::Backend) -> bool {
    matches!(
        backend,
        wgpu::Backend::Vulkan
            | wgpu::Backend::Metal
            | wgpu::Backend::Dx12
            | wgpu::Backend::BrowserWebGpu
    )
}

/// Request a device and queue from `adapter` with the limits the renderer
/// needs. Adapters on a backend outside `SUPPORTED_BACKENDS` are rejected.
pub async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), RendererError> {
    let info = adapter.get_info();
    info!(
        "using adapter {} ({:?}, {:?})",
        info.name, info.device_type, info.backend
    );

    if !is_supported_backend(info.backend) {
        return Err(RendererError::UnsupportedBackend(info.backend));
    }

    let device = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await?;

    Ok(device)
}

/// Device and queue for tests that need a GPU, `None` when no adapter on a
/// supported backend exists.
#[cfg(test)]
pub(crate) fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: SUPPORTED_BACKENDS,
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;

    match pollster::block_on(request_device(&adapter)) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// Draws a `Scene` into an output texture with one of the `RenderMode`
/// strategies.
///
/// Every mode renders into a shared HDR target which the post-process pass
/// then tone maps into the caller's output view. All of a frame's passes are
/// recorded into one command buffer so the ordering between them follows
/// submission order.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: BindGroupLayouts,
    per_frame: PerFrameUniforms,
    gbuffer: GBuffer,
    hdr: HdrTarget,
    geometry_pass: GeometryPass,
    lighting_pass: DeferredLightingPass,
    forward_pass: ForwardPass,
    skybox_pass: SkyboxPass,
    debug_view_pass: DebugViewPass,
    light_marker_pass: LightMarkerPass,
    normal_overlay_pass: NormalOverlayPass,
    post_process_pass: PostProcessPass,
    ibl: IblMaps,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Create every render target and pipeline, then precompute the image
    /// based lighting maps from `panorama`.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        panorama: &image::Rgba32FImage,
        ibl_settings: &IblSettings,
    ) -> Result<Self, RendererError> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidSize(width, height));
        }

        info!("creating renderer with {width}x{height} targets and {output_format:?} output");

        let layouts = BindGroupLayouts::new(&device);
        let per_frame = PerFrameUniforms::new(&device, &layouts);
        let gbuffer = GBuffer::new(&device, &layouts, width, height)?;
        let hdr = HdrTarget::new(&device, width, height)?;

        let panorama = Texture::from_hdr_image(&device, &queue, panorama, "environment panorama");

        let ibl = IblMaps::precompute(&device, &queue, &layouts, &panorama, ibl_settings);

        Ok(Self {
            geometry_pass: GeometryPass::new(&device, &layouts),
            lighting_pass: DeferredLightingPass::new(&device, &layouts),
            forward_pass: ForwardPass::new(&device, &layouts),
            skybox_pass: SkyboxPass::new(&device, &layouts),
            debug_view_pass: DebugViewPass::new(&device, &layouts),
            light_marker_pass: LightMarkerPass::new(&device, &layouts),
            normal_overlay_pass: NormalOverlayPass::new(&device, &layouts),
            post_process_pass: PostProcessPass::new(&device, &layouts, output_format, &hdr),
            device,
            queue,
            layouts,
            per_frame,
            gbuffer,
            hdr,
            ibl,
            width,
            height,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn layouts(&self) -> &BindGroupLayouts {
        &self.layouts
    }

    pub fn ibl(&self) -> &IblMaps {
        &self.ibl
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Recreate the viewport sized targets. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RendererError> {
        if width == 0 || height == 0 {
            warn!("invalid width of {width} or height {height} when resizing");
            return Ok(());
        }

        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        debug!("resizing render targets to {width}x{height}");

        self.gbuffer = GBuffer::new(&self.device, &self.layouts, width, height)?;
        self.hdr = HdrTarget::new(&self.device, width, height)?;
        self.post_process_pass
            .resize(&self.device, &self.layouts, &self.hdr);

        self.width = width;
        self.height = height;

        Ok(())
    }

    /// Render one frame of `scene` seen from `camera` into `output`.
    ///
    /// `output` must have the size of the renderer targets and the format the
    /// renderer was created with. An unknown render mode in `settings` is
    /// returned as an error before anything is recorded.
    pub fn render(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        settings: &FrameSettings,
        output: &wgpu::TextureView,
    ) -> Result<(), RendererError> {
        let mode = settings.mode()?;

        self.per_frame
            .set_view_projection(camera.view_projection_matrix());
        self.per_frame.set_skybox_view_projection(
            camera.projection_matrix() * camera.rotation_only_view_matrix(),
        );
        self.per_frame.set_view_pos(camera.eye());
        self.per_frame.prepare(&self.queue);

        scene.prepare(&self.queue);
        self.post_process_pass.prepare(&self.queue, settings);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let per_frame = self.per_frame.bind_group();

        match mode {
            RenderMode::Deferred => {
                scene.compute_shadow_maps(&self.queue, &mut encoder);
                self.geometry_pass
                    .draw(&mut encoder, &self.gbuffer, per_frame, scene);

                scene.bind_lights_data(&self.queue);
                self.lighting_pass.draw(
                    &mut encoder,
                    &self.hdr,
                    per_frame,
                    &self.gbuffer,
                    scene.lighting().lights_bind_group(),
                );

                blit_depth(&mut encoder, &self.gbuffer, &self.hdr);
                self.special_shaders_draw(&mut encoder, scene, settings.visualize_normals);
            }
            RenderMode::Forward => {
                scene.compute_shadow_maps(&self.queue, &mut encoder);
                scene.bind_lights_data(&self.queue);

                self.forward_pass.draw(
                    &mut encoder,
                    &self.hdr,
                    per_frame,
                    scene,
                    scene.lighting().lights_bind_group(),
                    &self.ibl,
                    &self.skybox_pass,
                );

                self.special_shaders_draw(&mut encoder, scene, settings.visualize_normals);
            }
            RenderMode::DebugDepthCubemap => {
                scene.compute_shadow_maps(&self.queue, &mut encoder);

                let depth_cube = match scene.get_depth_cubemap(0) {
                    Some(view) => view,
                    None => {
                        warn!("scene has no point light, showing an empty depth cubemap");
                        scene.lighting().placeholder_cubemap()
                    }
                };

                self.debug_view_pass.draw_depth_cubemap(
                    &self.device,
                    &self.layouts,
                    &mut encoder,
                    &self.hdr,
                    per_frame,
                    depth_cube,
                );
            }
            RenderMode::DebugIrradiance => {
                self.skybox_pass.draw(
                    &mut encoder,
                    &self.hdr,
                    per_frame,
                    self.ibl.irradiance_bind_group(),
                );
            }
            RenderMode::DebugBrdf => {
                self.debug_view_pass.draw_brdf_lut(
                    &mut encoder,
                    &self.hdr,
                    self.ibl.brdf_lut_bind_group(),
                );
            }
        }

        self.post_process_pass.draw(&mut encoder, output);
        self.queue.submit(std::iter::once(encoder.finish()));

        Ok(())
    }

    /// Forward draws of auxiliary items that do not go through the scene's
    /// lighting: the point light markers and, when enabled, vertex normals.
    fn special_shaders_draw(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        visualize_normals: bool,
    ) {
        self.light_marker_pass
            .update(&self.queue, scene.point_lights());
        self.light_marker_pass
            .draw(encoder, &self.hdr, self.per_frame.bind_group());

        if visualize_normals {
            self.normal_overlay_pass
                .draw(encoder, &self.hdr, self.per_frame.bind_group(), scene);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_backend_is_rejected() {
        assert!(!is_supported_backend(wgpu::Backend::Gl));
        assert!(!is_supported_backend(wgpu::Backend::Empty));

        for backend in [
            wgpu::Backend::Vulkan,
            wgpu::Backend::Metal,
            wgpu::Backend::Dx12,
        ] {
            assert!(is_supported_backend(backend));
            assert!(SUPPORTED_BACKENDS.contains(backend.into()));
        }

        assert!(!SUPPORTED_BACKENDS.contains(wgpu::Backends::GL));
    }

    #[test]
    fn unsupported_backend_error_names_the_backend() {
        assert_eq!(
            "the Gl graphics backend is not supported, use Vulkan, Metal or DX12",
            RendererError::UnsupportedBackend(wgpu::Backend::Gl).to_string()
        );
    }
}
