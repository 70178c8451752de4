//! Graphics backend seam: the allocation/upload/delete primitives the
//! assembler drives, plus the single-threaded context handle that owns a
//! backend.

use std::{
    cell::{BorrowMutError, RefCell, RefMut},
    rc::Rc,
};

use asset::TextureData;
use corelib::BackendError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// What a buffer will be bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Binding points that must be cleared before the objects on them are deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindTarget {
    ArrayBuffer,
    ElementBuffer,
    Texture2D,
    VertexArray,
}

impl BufferTarget {
    pub fn bind_target(self) -> BindTarget {
        match self {
            BufferTarget::Vertex => BindTarget::ArrayBuffer,
            BufferTarget::Index => BindTarget::ElementBuffer,
        }
    }
}

/// One float attribute inside a vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerSettings {
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

impl SamplerSettings {
    pub fn with_wrap(wrap: WrapMode) -> Self {
        Self {
            wrap,
            ..Self::default()
        }
    }
}

/// Allocation, upload and release primitives of a graphics API.
///
/// Creating an object leaves it bound on its target, the way GL does;
/// callers unbind explicitly.
pub trait GraphicsBackend {
    fn create_vertex_array(&mut self) -> Result<VertexArrayId, BackendError>;

    /// Allocate a buffer and upload `contents` in one go.
    fn create_buffer(
        &mut self,
        target: BufferTarget,
        label: &str,
        contents: &[u8],
    ) -> Result<BufferId, BackendError>;

    /// Record that `buffer` feeds `vertex_array` with the given layout.
    fn attach_vertex_buffer(
        &mut self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
        layout: VertexLayout,
    ) -> Result<(), BackendError>;

    /// Allocate a 2D RGBA8 texture, upload its pixels and configure sampling.
    fn create_texture(
        &mut self,
        label: &str,
        texture: &TextureData,
        sampler: SamplerSettings,
    ) -> Result<TextureId, BackendError>;

    fn unbind(&mut self, target: BindTarget);

    fn delete_buffer(&mut self, buffer: BufferId);

    fn delete_texture(&mut self, texture: TextureId);

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
}

/// Shared handle to the backend of the graphics thread.
///
/// Not `Send`: every descriptor created through a context lives and dies on
/// the thread that owns the context.
pub struct GraphicsContext<B> {
    backend: Rc<RefCell<B>>,
}

impl<B> GraphicsContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Rc::new(RefCell::new(backend)),
        }
    }

    /// Panics if the backend is already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, B> {
        self.backend.borrow_mut()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, B>, BorrowMutError> {
        self.backend.try_borrow_mut()
    }

    /// Run `f` with the backend borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.backend.borrow_mut())
    }
}

impl<B> Clone for GraphicsContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
        }
    }
}
