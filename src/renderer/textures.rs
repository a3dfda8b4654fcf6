use half::f16;

/// Stores a WGPU texture along with the view covering all of it.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Format of high dynamic range color targets and environment maps.
    pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Create a 2D texture that can be rendered into and sampled.
    pub fn render_target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        extra_usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | extra_usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Create a texture representing a depth buffer.
    pub fn depth_target(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        extra_usage: wgpu::TextureUsages,
    ) -> Self {
        Self::render_target(device, label, width, height, Self::DEPTH_FORMAT, extra_usage)
    }

    /// Create a cubemap with `size` texels per face side and `mip_levels` mips.
    /// `view` samples every face and every mip.
    pub fn cubemap(
        device: &wgpu::Device,
        label: &str,
        size: u32,
        mip_levels: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Self { texture, view }
    }

    /// Create a 2D view of a single face and mip level. Use this to render into
    /// a cubemap or to read one level while writing another.
    pub fn face_view(&self, face: u32, mip_level: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cubemap face view"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// Upload a floating point image as a half float RGBA texture. The texture
    /// is sampleable and filterable without extra device features.
    pub fn from_hdr_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::Rgba32FImage,
        label: &str,
    ) -> Self {
        let (width, height) = image.dimensions();

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::HDR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels = to_f16_bits(image.as_raw());

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * std::mem::size_of::<u16>() as u32 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// Create a clamped, trilinear filtering sampler.
pub fn linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Number of mip levels in a full chain for a square texture of `size`.
pub fn full_mip_count(size: u32) -> u32 {
    u32::BITS - size.max(1).leading_zeros()
}

/// Convert 32 bit floats to the bit patterns of 16 bit floats.
pub fn to_f16_bits(values: &[f32]) -> Vec<u16> {
    values.iter().map(|v| f16::from_f32(*v).to_bits()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_chain_ends_at_one_texel() {
        assert_eq!(1, full_mip_count(1));
        assert_eq!(2, full_mip_count(2));
        assert_eq!(6, full_mip_count(32));
        assert_eq!(10, full_mip_count(512));
        assert_eq!(10, full_mip_count(600));
    }

    #[test]
    fn f16_conversion_keeps_hdr_values() {
        let bits = to_f16_bits(&[0.0, 1.0, 12.5, -2.0]);
        let values: Vec<f32> = bits.iter().map(|b| f16::from_bits(*b).to_f32()).collect();

        assert_eq!(vec![0.0, 1.0, 12.5, -2.0], values);
    }
}
