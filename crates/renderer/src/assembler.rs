//! Uploads [`MeshBuffers`] to a backend and owns the resulting handles.

use std::mem::{offset_of, size_of};

use asset::{MeshBuffers, MeshVertex, TextureData};
use corelib::{BackendError, MeshResult};

use crate::backend::{
    BindTarget, BufferId, BufferTarget, GraphicsBackend, GraphicsContext, SamplerSettings,
    TextureId, VertexArrayId, VertexAttribute, VertexLayout,
};

pub const POSITION_LOCATION: u32 = 0;
pub const COLOR_LOCATION: u32 = 1;
pub const NORMAL_LOCATION: u32 = 2;
pub const TEXCOORD_LOCATION: u32 = 3;

/// Interleaved position/normal/texcoord, 32-byte stride.
pub const MESH_VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride: size_of::<MeshVertex>() as u64,
    attributes: &[
        VertexAttribute {
            location: POSITION_LOCATION,
            components: 3,
            offset: offset_of!(MeshVertex, position) as u64,
        },
        VertexAttribute {
            location: NORMAL_LOCATION,
            components: 3,
            offset: offset_of!(MeshVertex, normal) as u64,
        },
        VertexAttribute {
            location: TEXCOORD_LOCATION,
            components: 2,
            offset: offset_of!(MeshVertex, uv) as u64,
        },
    ],
};

/// RGBA color in its own tightly packed buffer.
pub const COLOR_LAYOUT: VertexLayout = VertexLayout {
    stride: size_of::<[f32; 4]>() as u64,
    attributes: &[VertexAttribute {
        location: COLOR_LOCATION,
        components: 4,
        offset: 0,
    }],
};

/// Uploaded mesh: one vertex array, vertex/color/index buffers and an
/// optional texture, all owned exclusively.
///
/// Handles are deleted exactly once, either by [`GpuMesh::release`] or when
/// the descriptor is dropped.
pub struct GpuMesh<B: GraphicsBackend> {
    context: GraphicsContext<B>,
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    color_buffer: BufferId,
    index_buffer: BufferId,
    texture: Option<TextureId>,
    index_count: u32,
    vertex_count: u32,
    released: bool,
}

impl<B: GraphicsBackend> GpuMesh<B> {
    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn color_buffer(&self) -> BufferId {
        self.color_buffer
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete every owned handle. Later calls, and the drop, do nothing.
    ///
    /// If the context's backend is borrowed elsewhere nothing is deleted and
    /// the mesh stays live; a later `release` or the drop retries.
    pub fn release(&mut self) {
        if !self.released && !self.try_release() {
            log::warn!(
                "Graphics context busy; release of mesh (vertex array {}) deferred",
                self.vertex_array.0
            );
        }
    }

    fn try_release(&mut self) -> bool {
        let context = self.context.clone();
        let Ok(mut backend) = context.try_borrow_mut() else {
            return false;
        };
        self.delete_handles(&mut backend);
        true
    }

    fn delete_handles(&mut self, backend: &mut B) {
        // Nothing may stay bound to an object about to be deleted.
        backend.unbind(BindTarget::ArrayBuffer);
        backend.unbind(BindTarget::ElementBuffer);
        if self.texture.is_some() {
            backend.unbind(BindTarget::Texture2D);
        }
        backend.unbind(BindTarget::VertexArray);

        backend.delete_buffer(self.vertex_buffer);
        backend.delete_buffer(self.color_buffer);
        backend.delete_buffer(self.index_buffer);
        if let Some(texture) = self.texture {
            backend.delete_texture(texture);
        }
        backend.delete_vertex_array(self.vertex_array);

        self.released = true;
        log::debug!("Released mesh (vertex array {})", self.vertex_array.0);
    }
}

impl<B: GraphicsBackend> Drop for GpuMesh<B> {
    fn drop(&mut self) {
        if !self.released && !self.try_release() {
            log::warn!(
                "Graphics context busy while dropping mesh (vertex array {}); handles leaked",
                self.vertex_array.0
            );
        }
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for GpuMesh<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuMesh")
            .field("vertex_array", &self.vertex_array)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("color_buffer", &self.color_buffer)
            .field("index_buffer", &self.index_buffer)
            .field("texture", &self.texture)
            .field("index_count", &self.index_count)
            .field("released", &self.released)
            .finish()
    }
}

/// Handles created so far, so a failed upload can be rolled back.
#[derive(Default)]
struct Staged {
    vertex_array: Option<VertexArrayId>,
    buffers: Vec<BufferId>,
    texture: Option<TextureId>,
}

impl Staged {
    fn roll_back<B: GraphicsBackend>(self, backend: &mut B) {
        backend.unbind(BindTarget::ArrayBuffer);
        backend.unbind(BindTarget::ElementBuffer);
        backend.unbind(BindTarget::Texture2D);
        backend.unbind(BindTarget::VertexArray);
        for buffer in self.buffers {
            backend.delete_buffer(buffer);
        }
        if let Some(texture) = self.texture {
            backend.delete_texture(texture);
        }
        if let Some(vertex_array) = self.vertex_array {
            backend.delete_vertex_array(vertex_array);
        }
    }
}

struct Handles {
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    color_buffer: BufferId,
    index_buffer: BufferId,
    texture: Option<TextureId>,
}

fn assemble<B: GraphicsBackend>(
    backend: &mut B,
    staged: &mut Staged,
    label: &str,
    mesh: &MeshBuffers,
    texture: Option<(&TextureData, SamplerSettings)>,
) -> Result<Handles, BackendError> {
    let vertex_array = backend.create_vertex_array()?;
    staged.vertex_array = Some(vertex_array);

    let vertex_buffer = backend.create_buffer(
        BufferTarget::Vertex,
        &format!("{label} vertices"),
        mesh.vertex_bytes(),
    )?;
    staged.buffers.push(vertex_buffer);
    backend.attach_vertex_buffer(vertex_array, vertex_buffer, MESH_VERTEX_LAYOUT)?;
    backend.unbind(BindTarget::ArrayBuffer);

    let color_buffer = backend.create_buffer(
        BufferTarget::Vertex,
        &format!("{label} colors"),
        mesh.color_bytes(),
    )?;
    staged.buffers.push(color_buffer);
    backend.attach_vertex_buffer(vertex_array, color_buffer, COLOR_LAYOUT)?;
    backend.unbind(BindTarget::ArrayBuffer);

    let index_buffer = backend.create_buffer(
        BufferTarget::Index,
        &format!("{label} indices"),
        mesh.index_bytes(),
    )?;
    staged.buffers.push(index_buffer);
    backend.unbind(BindTarget::ElementBuffer);

    let texture = match texture {
        Some((data, sampler)) => {
            let id = backend.create_texture(&format!("{label} texture"), data, sampler)?;
            staged.texture = Some(id);
            backend.unbind(BindTarget::Texture2D);
            Some(id)
        }
        None => None,
    };

    backend.unbind(BindTarget::VertexArray);

    Ok(Handles {
        vertex_array,
        vertex_buffer,
        color_buffer,
        index_buffer,
        texture,
    })
}

/// Upload a mesh (and optionally its texture) in one pass.
///
/// Backend failures are returned as-is after deleting whatever was already
/// created.
pub fn upload_mesh<B: GraphicsBackend>(
    context: &GraphicsContext<B>,
    label: &str,
    mesh: &MeshBuffers,
    texture: Option<(&TextureData, SamplerSettings)>,
) -> MeshResult<GpuMesh<B>> {
    mesh.validate()?;
    let index_count = u32::try_from(mesh.indices.len())
        .map_err(|_| corelib::MeshError::InvalidMesh(format!("{} indices", mesh.indices.len())))?;
    let vertex_count = mesh.vertices.len() as u32;

    let mut backend = context.borrow_mut();
    let mut staged = Staged::default();
    let handles = match assemble(&mut *backend, &mut staged, label, mesh, texture) {
        Ok(handles) => handles,
        Err(e) => {
            log::error!("Upload of '{}' failed: {}", label, e);
            staged.roll_back(&mut *backend);
            return Err(e.into());
        }
    };
    drop(backend);

    log::info!(
        "Uploaded '{}': {} vertices, {} triangles, texture: {}",
        label,
        vertex_count,
        index_count / 3,
        if handles.texture.is_some() { "yes" } else { "no" }
    );

    Ok(GpuMesh {
        context: context.clone(),
        vertex_array: handles.vertex_array,
        vertex_buffer: handles.vertex_buffer,
        color_buffer: handles.color_buffer,
        index_buffer: handles.index_buffer,
        texture: handles.texture,
        index_count,
        vertex_count,
        released: false,
    })
}
