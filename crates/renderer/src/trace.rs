//! Backend that records every call instead of talking to a GPU.
//!
//! Used by tests and by `meshpipe --backend=trace` to show exactly what the
//! assembler asks of the graphics API.

use std::{collections::HashMap, fmt};

use asset::TextureData;
use corelib::BackendError;

use crate::backend::{
    BindTarget, BufferId, BufferTarget, GraphicsBackend, SamplerSettings, TextureId, VertexArrayId,
    VertexLayout,
};

#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    CreateVertexArray(VertexArrayId),
    CreateBuffer {
        id: BufferId,
        target: BufferTarget,
        label: String,
        len: usize,
    },
    AttachVertexBuffer {
        vertex_array: VertexArrayId,
        buffer: BufferId,
        layout: VertexLayout,
    },
    CreateTexture {
        id: TextureId,
        width: u32,
        height: u32,
        sampler: SamplerSettings,
    },
    Unbind(BindTarget),
    DeleteBuffer(BufferId),
    DeleteTexture(TextureId),
    DeleteVertexArray(VertexArrayId),
}

impl fmt::Display for BackendCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendCall::CreateVertexArray(id) => write!(f, "create_vertex_array -> {}", id.0),
            BackendCall::CreateBuffer {
                id,
                target,
                label,
                len,
            } => write!(f, "create_buffer({:?}, '{}', {} bytes) -> {}", target, label, len, id.0),
            BackendCall::AttachVertexBuffer {
                vertex_array,
                buffer,
                layout,
            } => {
                write!(
                    f,
                    "attach_vertex_buffer(vao {}, buffer {}, stride {}",
                    vertex_array.0, buffer.0, layout.stride
                )?;
                for a in layout.attributes {
                    write!(f, ", loc {}: {}f @{}", a.location, a.components, a.offset)?;
                }
                write!(f, ")")
            }
            BackendCall::CreateTexture {
                id,
                width,
                height,
                sampler,
            } => write!(
                f,
                "create_texture({}x{}, wrap {:?}, filter {:?}) -> {}",
                width, height, sampler.wrap, sampler.filter, id.0
            ),
            BackendCall::Unbind(target) => write!(f, "unbind({:?})", target),
            BackendCall::DeleteBuffer(id) => write!(f, "delete_buffer({})", id.0),
            BackendCall::DeleteTexture(id) => write!(f, "delete_texture({})", id.0),
            BackendCall::DeleteVertexArray(id) => write!(f, "delete_vertex_array({})", id.0),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_id: u32,
    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, SamplerSettings>,
    vertex_arrays: HashMap<VertexArrayId, Vec<(BufferId, VertexLayout)>>,
    allocations: usize,
    allocation_limit: Option<usize>,
    invalid_deletes: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every allocation after the first `limit` succeed.
    pub fn with_allocation_limit(limit: usize) -> Self {
        Self {
            allocation_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    pub fn texture_sampler(&self, id: TextureId) -> Option<SamplerSettings> {
        self.textures.get(&id).copied()
    }

    pub fn vertex_bindings(&self, id: VertexArrayId) -> Option<&[(BufferId, VertexLayout)]> {
        self.vertex_arrays.get(&id).map(Vec::as_slice)
    }

    /// Objects created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.vertex_arrays.len()
    }

    /// Deletes of handles that were never created or already deleted.
    pub fn invalid_deletes(&self) -> usize {
        self.invalid_deletes
    }

    fn allocate(&mut self, object: &'static str) -> Result<u32, BackendError> {
        if self.allocation_limit.is_some_and(|limit| self.allocations >= limit) {
            return Err(BackendError::new(object, "allocation limit reached"));
        }
        self.allocations += 1;
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId, BackendError> {
        let id = VertexArrayId(self.allocate("vertex array")?);
        self.vertex_arrays.insert(id, Vec::new());
        self.calls.push(BackendCall::CreateVertexArray(id));
        Ok(id)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        label: &str,
        contents: &[u8],
    ) -> Result<BufferId, BackendError> {
        let id = BufferId(self.allocate("buffer")?);
        self.buffers.insert(id, contents.to_vec());
        self.calls.push(BackendCall::CreateBuffer {
            id,
            target,
            label: label.to_owned(),
            len: contents.len(),
        });
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
        bindings.push((buffer, layout));
        self.calls.push(BackendCall::AttachVertexBuffer {
            vertex_array,
            buffer,
            layout,
        });
        Ok(())
    }

    fn create_texture(
        &mut self,
        _label: &str,
        texture: &TextureData,
        sampler: SamplerSettings,
    ) -> Result<TextureId, BackendError> {
        if !texture.is_valid() {
            return Err(BackendError::new("texture", "pixel data does not match its size"));
        }
        let id = TextureId(self.allocate("texture")?);
        self.textures.insert(id, sampler);
        self.calls.push(BackendCall::CreateTexture {
            id,
            width: texture.width,
            height: texture.height,
            sampler,
        });
        Ok(id)
    }

    fn unbind(&mut self, target: BindTarget) {
        self.calls.push(BackendCall::Unbind(target));
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteBuffer(buffer));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteTexture(texture));
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            self.invalid_deletes += 1;
        }
        self.calls.push(BackendCall::DeleteVertexArray(vertex_array));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_tracks_objects() {
        let mut b = RecordingBackend::new();
        let vao = b.create_vertex_array().unwrap();
        let buf = b.create_buffer(BufferTarget::Vertex, "vb", &[1, 2, 3, 4]).unwrap();
        assert_eq!(b.buffer_contents(buf), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(b.live_objects(), 2);

        b.delete_buffer(buf);
        b.delete_vertex_array(vao);
        assert_eq!(b.live_objects(), 0);
        assert_eq!(b.invalid_deletes(), 0);

        b.delete_buffer(buf);
        assert_eq!(b.invalid_deletes(), 1);
        assert_eq!(b.calls().len(), 5);
    }

    #[test]
    fn allocation_limit_fails_later_allocations() {
        let mut b = RecordingBackend::with_allocation_limit(1);
        assert!(b.create_vertex_array().is_ok());
        let err = b.create_buffer(BufferTarget::Index, "ib", &[]).unwrap_err();
        assert_eq!(err.object, "buffer");
    }

    #[test]
    fn call_display_is_readable() {
        let call = BackendCall::CreateBuffer {
            id: BufferId(3),
            target: BufferTarget::Index,
            label: "tri indices".into(),
            len: 12,
        };
        assert_eq!(call.to_string(), "create_buffer(Index, 'tri indices', 12 bytes) -> 3");
    }
}
