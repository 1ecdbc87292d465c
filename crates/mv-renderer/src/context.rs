//! Render context that encapsulates GPU resources.
//!
//! The RenderContext hides wgpu plumbing from the rest of the pipeline,
//! providing a compact interface for resource creation and uploads.

use std::sync::Arc;

use wgpu::util::DeviceExt;

/// GPU device context shared by all pipeline components.
pub struct RenderContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
}

impl RenderContext {
    /// Creates a new render context.
    ///
    /// `output_format` is the format of the texture views passed to the
    /// renderer as composite targets (usually the surface format).
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            output_format,
            depth_format: wgpu::TextureFormat::Depth32Float,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    /// Creates a buffer with the given descriptor.
    pub fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> wgpu::Buffer {
        self.device.create_buffer(desc)
    }

    /// Creates a buffer initialized with data.
    pub fn create_buffer_init(&self, desc: &wgpu::util::BufferInitDescriptor) -> wgpu::Buffer {
        self.device.create_buffer_init(desc)
    }

    /// Writes data to a buffer.
    pub fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    /// Creates a texture with the given descriptor.
    pub fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> wgpu::Texture {
        self.device.create_texture(desc)
    }

    /// Creates a shader module from WGSL source.
    pub fn create_shader(&self, source: &str, label: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    /// Creates a shader module, surfacing validation failures as a
    /// structured error instead of the device's uncaptured-error hook.
    pub fn create_shader_checked(
        &self,
        source: &str,
        name: &str,
        stage: crate::error::ShaderStage,
    ) -> Result<wgpu::ShaderModule, crate::error::RendererError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.create_shader(source, name);
        let error = block_on_device(self.device.pop_error_scope(), &self.device);

        match error {
            None => Ok(module),
            Some(error) => Err(crate::error::RendererError::ShaderCompilation {
                name: name.to_string(),
                stage,
                log: error.to_string(),
            }),
        }
    }

    /// Creates a bind group layout.
    pub fn create_bind_group_layout(
        &self,
        desc: &wgpu::BindGroupLayoutDescriptor,
    ) -> wgpu::BindGroupLayout {
        self.device.create_bind_group_layout(desc)
    }

    /// Creates a bind group.
    pub fn create_bind_group(&self, desc: &wgpu::BindGroupDescriptor) -> wgpu::BindGroup {
        self.device.create_bind_group(desc)
    }

    /// Creates a sampler.
    pub fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> wgpu::Sampler {
        self.device.create_sampler(desc)
    }

    /// Submits a command encoder and blocks until the device is idle.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Copies a buffer range into host memory, blocking until the GPU is
    /// done. Debug/readback path only; the hot path never maps buffers.
    pub fn read_buffer_sync(
        &self,
        buffer: &wgpu::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, crate::error::RendererError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, offset, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| crate::error::RendererError::Readback("map callback lost".into()))?
            .map_err(|e| crate::error::RendererError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    /// Alignment-rounded uniform stride for dynamic-offset bindings.
    pub fn uniform_stride(&self, size: u64) -> u64 {
        let align = self
            .device
            .limits()
            .min_uniform_buffer_offset_alignment as u64;
        size.div_ceil(align) * align
    }
}

/// Drives a wgpu future to completion by polling the device.
fn block_on_device<F: Future>(future: F, device: &wgpu::Device) -> F::Output {
    let waker = std::task::Waker::noop();
    let mut cx = std::task::Context::from_waker(waker);
    let mut future = std::pin::pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(value) => return value,
            std::task::Poll::Pending => {
                device.poll(wgpu::Maintain::Poll);
            }
        }
    }
}
