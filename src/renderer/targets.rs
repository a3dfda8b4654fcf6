//! Viewport sized render targets shared by the render passes.
use tracing::{debug, error};

use super::{shaders::BindGroupLayouts, textures::Texture, RendererError};

/// The G-buffer written by the geometry pass and read by the deferred
/// lighting pass.
pub struct GBuffer {
    /// World space position (rgb).
    pub position: Texture,
    /// World space normal (rgb). Zero where no geometry was drawn.
    pub normal: Texture,
    /// Albedo (rgb) and specular intensity (a).
    pub albedo_spec: Texture,
    /// Depth of the geometry pass. Copied into the HDR target after lighting.
    pub depth: Texture,
    bind_group: wgpu::BindGroup,
}

impl GBuffer {
    pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const ALBEDO_SPEC_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        width: u32,
        height: u32,
    ) -> Result<Self, RendererError> {
        create_checked(device, "g-buffer", || {
            let position = Texture::render_target(
                device,
                "g-buffer position",
                width,
                height,
                Self::POSITION_FORMAT,
                wgpu::TextureUsages::empty(),
            );
            let normal = Texture::render_target(
                device,
                "g-buffer normal",
                width,
                height,
                Self::NORMAL_FORMAT,
                wgpu::TextureUsages::empty(),
            );
            let albedo_spec = Texture::render_target(
                device,
                "g-buffer albedo specular",
                width,
                height,
                Self::ALBEDO_SPEC_FORMAT,
                wgpu::TextureUsages::empty(),
            );
            let depth = Texture::depth_target(
                device,
                "g-buffer depth",
                width,
                height,
                wgpu::TextureUsages::COPY_SRC,
            );

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("g-buffer bind group"),
                layout: &layouts.gbuffer_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&position.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&normal.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&albedo_spec.view),
                    },
                ],
            });

            Self {
                position,
                normal,
                albedo_spec,
                depth,
                bind_group,
            }
        })
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Views of the color attachments in shader output location order.
    pub fn color_views(&self) -> [&wgpu::TextureView; 3] {
        [&self.position.view, &self.normal.view, &self.albedo_spec.view]
    }
}

/// The high dynamic range color target every mode renders into before
/// post-processing.
pub struct HdrTarget {
    pub color: Texture,
    /// Cleared by forward rendering or overwritten by the G-buffer depth blit.
    pub depth: Texture,
}

impl HdrTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, RendererError> {
        create_checked(device, "hdr target", || Self {
            color: Texture::render_target(
                device,
                "hdr color",
                width,
                height,
                Texture::HDR_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            depth: Texture::depth_target(
                device,
                "hdr depth",
                width,
                height,
                wgpu::TextureUsages::COPY_DST,
            ),
        })
    }
}

/// Copy the G-buffer depth into the HDR target so forward draws depth test
/// against the deferred geometry.
pub fn blit_depth(encoder: &mut wgpu::CommandEncoder, from: &GBuffer, to: &HdrTarget) {
    let size = from.depth.texture.size();
    debug_assert_eq!(size, to.depth.texture.size());

    encoder.copy_texture_to_texture(
        from.depth.texture.as_image_copy(),
        to.depth.texture.as_image_copy(),
        size,
    );
}

/// Run `create` inside a validation error scope. Any validation error raised
/// while creating the targets is returned as an incomplete render target.
fn create_checked<T>(
    device: &wgpu::Device,
    label: &str,
    create: impl FnOnce() -> T,
) -> Result<T, RendererError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();

    match pollster::block_on(device.pop_error_scope()) {
        None => {
            debug!("created render target {label}");
            Ok(value)
        }
        Some(err) => {
            error!("render target {label} is incomplete: {err}");
            Err(RendererError::IncompleteRenderTarget {
                label: label.to_string(),
                message: err.to_string(),
            })
        }
    }
}
