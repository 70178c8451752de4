//! [`GraphicsBackend`] on top of wgpu.
//! wgpu = 26.x
//!
//! wgpu has no vertex array objects or bind points; vertex arrays are kept as
//! a list of (buffer, layout) bindings the render loop turns into pipeline
//! vertex state, and bind points are tracked only to catch deletes of bound
//! objects.

use std::collections::HashMap;

use asset::TextureData;
use corelib::BackendError;
use wgpu::{
    AddressMode, Backends, BufferUsages, Device, DeviceDescriptor, ErrorFilter, Extent3d,
    Instance, InstanceDescriptor, Limits, Origin3d, PowerPreference, Queue,
    RequestAdapterOptions, SamplerDescriptor, TexelCopyBufferLayout, TexelCopyTextureInfo,
    TextureAspect, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureViewDescriptor, VertexBufferLayout, VertexFormat, VertexStepMode,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::backend::{
    BindTarget, BufferId, BufferTarget, FilterMode, GraphicsBackend, SamplerSettings, TextureId,
    VertexArrayId, VertexLayout, WrapMode,
};

/// A vertex buffer slot of a vertex array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexBinding {
    pub buffer: BufferId,
    pub layout: VertexLayout,
}

/// Texture plus the view and sampler a bind group needs.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    next_id: u32,
    vertex_arrays: HashMap<VertexArrayId, Vec<VertexBinding>>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    textures: HashMap<TextureId, GpuTexture>,
    bound: HashMap<BindTarget, u32>,
}

impl WgpuBackend {
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            vertex_arrays: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound: HashMap::new(),
        }
    }

    /// Create a device without a surface, for offline uploads and tools.
    pub async fn headless(backends: Backends) -> Result<Self, BackendError> {
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| BackendError::new("adapter", e.to_string()))?;

        let info = adapter.get_info();
        log::info!("Using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("meshpipe device"),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| BackendError::new("device", e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(&id)
    }

    pub fn vertex_bindings(&self, id: VertexArrayId) -> Option<&[VertexBinding]> {
        self.vertex_arrays.get(&id).map(Vec::as_slice)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn bind(&mut self, target: BindTarget, id: u32) {
        self.bound.insert(target, id);
    }

    fn warn_if_bound(&self, target: BindTarget, id: u32, what: &str) {
        if self.bound.get(&target) == Some(&id) {
            log::warn!("Deleting {} {} while it is still bound to {:?}", what, id, target);
        }
    }

    /// Run `create` inside error scopes so allocation failures come back as
    /// errors instead of going to the uncaptured-error handler.
    fn checked<T>(
        &self,
        object: &'static str,
        create: impl FnOnce() -> T,
    ) -> Result<T, BackendError> {
        self.device.push_error_scope(ErrorFilter::OutOfMemory);
        self.device.push_error_scope(ErrorFilter::Validation);
        let value = create();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match oom.or(validation) {
            Some(err) => Err(BackendError::new(object, err.to_string())),
            None => Ok(value),
        }
    }
}

/// wgpu attributes for a layout; components map to Float32xN.
pub fn wgpu_attributes(layout: &VertexLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: match a.components {
                1 => VertexFormat::Float32,
                2 => VertexFormat::Float32x2,
                3 => VertexFormat::Float32x3,
                _ => VertexFormat::Float32x4,
            },
            offset: a.offset,
            shader_location: a.location,
        })
        .collect()
}

impl VertexBinding {
    /// Pipeline vertex state for this slot; `attributes` comes from
    /// [`wgpu_attributes`].
    pub fn wgpu_layout<'a>(
        &self,
        attributes: &'a [wgpu::VertexAttribute],
    ) -> VertexBufferLayout<'a> {
        VertexBufferLayout {
            array_stride: self.layout.stride,
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }
}

fn address_mode(wrap: WrapMode) -> AddressMode {
    match wrap {
        WrapMode::ClampToEdge => AddressMode::ClampToEdge,
        WrapMode::Repeat => AddressMode::Repeat,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Linear => wgpu::FilterMode::Linear,
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId, BackendError> {
        let id = VertexArrayId(self.next_id());
        self.vertex_arrays.insert(id, Vec::new());
        self.bind(BindTarget::VertexArray, id.0);
        Ok(id)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        label: &str,
        contents: &[u8],
    ) -> Result<BufferId, BackendError> {
        let usage = match target {
            BufferTarget::Vertex => BufferUsages::VERTEX,
            BufferTarget::Index => BufferUsages::INDEX,
        };
        let buffer = self.checked("buffer", || {
            self.device.create_buffer_init(&BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
        })?;

        let id = BufferId(self.next_id());
        self.buffers.insert(id, buffer);
        self.bind(target.bind_target(), id.0);
        log::debug!("Uploaded buffer '{}' ({} bytes) as {}", label, contents.len(), id.0);
        Ok(id)
    }

    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
        layout: VertexLayout,
    ) -> Result<(), BackendError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(BackendError::new("vertex binding", format!("unknown buffer {}", buffer.0)));
        }
        let bindings = self.vertex_arrays.get_mut(&vertex_array).ok_or_else(|| {
            BackendError::new("vertex binding", format!("unknown vertex array {}", vertex_array.0))
        })?;
        bindings.push(VertexBinding { buffer, layout });
        Ok(())
    }

    fn create_texture(
        &mut self,
        label: &str,
        texture: &TextureData,
        sampler: SamplerSettings,
    ) -> Result<TextureId, BackendError> {
        if !texture.is_valid() {
            return Err(BackendError::new("texture", "pixel data does not match its size"));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if texture.width > max || texture.height > max {
            return Err(BackendError::new(
                "texture",
                format!("{}x{} exceeds device limit {}", texture.width, texture.height, max),
            ));
        }

        let size = Extent3d {
            width: texture.width,
            height: texture.height,
            depth_or_array_layers: 1,
        };
        let gpu = self.checked("texture", || {
            let tex = self.device.create_texture(&TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8UnormSrgb,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            });
            self.queue.write_texture(
                TexelCopyTextureInfo {
                    texture: &tex,
                    mip_level: 0,
                    origin: Origin3d::ZERO,
                    aspect: TextureAspect::All,
                },
                &texture.pixels,
                TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(texture.bytes_per_row()),
                    rows_per_image: Some(texture.height),
                },
                size,
            );
            let view = tex.create_view(&TextureViewDescriptor::default());
            let wrap = address_mode(sampler.wrap);
            let filter = filter_mode(sampler.filter);
            let sampler = self.device.create_sampler(&SamplerDescriptor {
                label: Some(label),
                address_mode_u: wrap,
                address_mode_v: wrap,
                address_mode_w: wrap,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            });
            GpuTexture {
                texture: tex,
                view,
                sampler,
            }
        })?;

        let id = TextureId(self.next_id());
        self.textures.insert(id, gpu);
        self.bind(BindTarget::Texture2D, id.0);
        log::debug!(
            "Uploaded texture '{}' {}x{} ({:?}) as {}",
            label,
            texture.width,
            texture.height,
            sampler.wrap,
            id.0
        );
        Ok(id)
    }

    fn unbind(&mut self, target: BindTarget) {
        self.bound.remove(&target);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.warn_if_bound(BindTarget::ArrayBuffer, buffer.0, "buffer");
        self.warn_if_bound(BindTarget::ElementBuffer, buffer.0, "buffer");
        match self.buffers.remove(&buffer) {
            Some(b) => b.destroy(),
            None => log::warn!("Delete of unknown buffer {}", buffer.0),
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.warn_if_bound(BindTarget::Texture2D, texture.0, "texture");
        match self.textures.remove(&texture) {
            Some(t) => t.texture.destroy(),
            None => log::warn!("Delete of unknown texture {}", texture.0),
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.warn_if_bound(BindTarget::VertexArray, vertex_array.0, "vertex array");
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            log::warn!("Delete of unknown vertex array {}", vertex_array.0);
        }
    }
}
