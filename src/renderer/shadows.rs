use tracing::debug;

use super::textures::Texture;

/// Shape of the depth texture backing a shadow map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowShape {
    /// A single 2D depth texture, used by directional lights.
    Flat,
    /// A six face depth cubemap, used by point lights.
    Cube,
}

impl ShadowShape {
    pub fn face_count(self) -> u32 {
        match self {
            ShadowShape::Flat => 1,
            ShadowShape::Cube => 6,
        }
    }
}

/// A depth texture owned by exactly one light. Shadow passes render into one
/// of its face views, lighting passes sample the whole texture through
/// `sample_view`.
///
/// The GPU texture is destroyed when the shadow map is dropped.
pub struct ShadowMap {
    shape: ShadowShape,
    resolution: u32,
    texture: wgpu::Texture,
    /// A 2D view for a flat map, a cube view for a cube map.
    sample_view: wgpu::TextureView,
    /// One single layer 2D view per face for use as a depth attachment.
    face_views: Vec<wgpu::TextureView>,
    label: String,
}

impl ShadowMap {
    pub const FORMAT: wgpu::TextureFormat = Texture::DEPTH_FORMAT;

    /// Create a square shadow map of `resolution` texels per side.
    pub fn new(device: &wgpu::Device, shape: ShadowShape, resolution: u32, label: &str) -> Self {
        assert!(resolution > 0);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: shape.face_count(),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(match shape {
                ShadowShape::Flat => wgpu::TextureViewDimension::D2,
                ShadowShape::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });

        let face_views = (0..shape.face_count())
            .map(|face| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        debug!("created {shape:?} shadow map {label} at {resolution}x{resolution}");

        Self {
            shape,
            resolution,
            texture,
            sample_view,
            face_views,
            label: label.to_string(),
        }
    }

    pub fn shape(&self) -> ShadowShape {
        self.shape
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The depth texture, with one array layer per face.
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// The view sampled by lighting shaders. For a flat map this is also its
    /// only face.
    pub fn sample_view(&self) -> &wgpu::TextureView {
        &self.sample_view
    }

    /// The depth attachment view for `face`, or `None` past the last face.
    /// Flat maps only have face zero.
    pub fn face_view(&self, face: usize) -> Option<&wgpu::TextureView> {
        self.face_views.get(face)
    }
}

impl Drop for ShadowMap {
    fn drop(&mut self) {
        debug!("destroying shadow map {}", self.label);
        self.texture.destroy();
    }
}
