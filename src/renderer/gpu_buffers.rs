use std::{cell::Cell, marker::PhantomData};

use wgpu::util::DeviceExt;

/// Trait for objects that represent a GPU buffer that can be updated from the
/// CPU.
pub trait DynamicGpuBuffer {
    /// Copy data stored in this buffer to the GPU and clear the dirty flag.
    fn update_gpu(&self, queue: &wgpu::Queue);

    /// Check if this buffer has values that have not yet been copied to the GPU.
    fn is_dirty(&self) -> bool;

    /// Copy values to the GPU only if they changed since the last upload.
    fn prepare(&self, queue: &wgpu::Queue) {
        if self.is_dirty() {
            self.update_gpu(queue);
        }
    }
}

/// Maps a Rust struct of uniform values to a uniform buffer bound at binding
/// zero of its own bind group.
///
/// Values are edited on the CPU with `values_mut()` and copied to the GPU the
/// next time `prepare()` or `update_gpu()` is called.
#[derive(Debug)]
pub struct UniformBuffer<T>
where
    T: Copy + std::fmt::Debug + bytemuck::Pod,
{
    values: T,
    gpu_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// True if `values` changed since the last upload.
    is_dirty: Cell<bool>,
}

impl<T> UniformBuffer<T>
where
    T: Copy + std::fmt::Debug + bytemuck::Pod,
{
    /// Create a uniform buffer holding `values`. `layout` must have a uniform
    /// buffer entry at binding zero and no other entries.
    pub fn new(
        device: &wgpu::Device,
        label: Option<&str>,
        values: T,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let gpu_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::bytes_of(&values),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: gpu_buffer.as_entire_binding(),
            }],
        });

        Self {
            values,
            gpu_buffer,
            bind_group,
            is_dirty: Cell::new(false),
        }
    }

    pub fn values(&self) -> &T {
        &self.values
    }

    /// Access the values with a mutable ref. This marks the buffer dirty even
    /// if nothing is changed.
    pub fn values_mut(&mut self) -> &mut T {
        self.is_dirty.set(true);
        &mut self.values
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

impl<T> DynamicGpuBuffer for UniformBuffer<T>
where
    T: Copy + std::fmt::Debug + bytemuck::Pod,
{
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.is_dirty.set(false);
        queue.write_buffer(&self.gpu_buffer, 0, bytemuck::bytes_of(&self.values));
    }

    fn is_dirty(&self) -> bool {
        self.is_dirty.get()
    }
}

/// A fixed number of uniform blocks stored in one buffer, each at its own
/// aligned slot. A slot is selected when binding with `dynamic_offset(i)`.
///
/// Every slot written before a queue submission stays valid for the commands
/// in that submission, which lets one encoder render several passes with
/// different values.
#[derive(Debug)]
pub struct DynamicUniformArray<T>
where
    T: Copy + std::fmt::Debug + bytemuck::Pod,
{
    gpu_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> DynamicUniformArray<T>
where
    T: Copy + std::fmt::Debug + bytemuck::Pod,
{
    /// Distance in bytes between slots. This is the largest value WebGPU
    /// allows for `min_uniform_buffer_offset_alignment`.
    pub const STRIDE: wgpu::BufferAddress = 256;

    /// Create an array with `len` zeroed slots. `layout` must declare a
    /// dynamic offset uniform buffer at binding zero with no other entries.
    pub fn new(
        device: &wgpu::Device,
        label: Option<&str>,
        len: usize,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        assert!(std::mem::size_of::<T>() as wgpu::BufferAddress <= Self::STRIDE);
        assert!(len > 0);

        let gpu_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: Self::STRIDE * len as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &gpu_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
                }),
            }],
        });

        Self {
            gpu_buffer,
            bind_group,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upload `values` into slots `0..values.len()` with a single write.
    pub fn write_all(&self, queue: &wgpu::Queue, values: &[T]) {
        assert!(values.len() <= self.len);

        if values.is_empty() {
            return;
        }

        queue.write_buffer(&self.gpu_buffer, 0, &pack_slots(values, Self::STRIDE));
    }

    /// Get the dynamic offset that selects slot `index`.
    pub fn dynamic_offset(&self, index: usize) -> wgpu::DynamicOffset {
        assert!(index < self.len);
        (index as wgpu::BufferAddress * Self::STRIDE) as wgpu::DynamicOffset
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Lay out `values` one per `stride` bytes, zero filling the gaps.
fn pack_slots<T: bytemuck::Pod>(values: &[T], stride: wgpu::BufferAddress) -> Vec<u8> {
    let stride = stride as usize;
    let mut bytes = vec![0u8; stride * values.len()];

    for (slot, value) in bytes.chunks_exact_mut(stride).zip(values) {
        let value_bytes = bytemuck::bytes_of(value);
        slot[..value_bytes.len()].copy_from_slice(value_bytes);
    }

    bytes
}
