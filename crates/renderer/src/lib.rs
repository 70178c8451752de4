//! GPU side of the mesh pipeline: the backend seam, mesh descriptors and
//! the loaders that turn assets into them.

pub mod assembler;
pub mod backend;
pub mod loader;
pub mod trace;
pub mod wgpu_backend;

pub use assembler::{GpuMesh, upload_mesh};
pub use backend::{
    BindTarget, BufferId, BufferTarget, FilterMode, GraphicsBackend, GraphicsContext,
    SamplerSettings, TextureId, VertexArrayId, VertexAttribute, VertexLayout, WrapMode,
};
pub use loader::{
    LoadOptions, create_box, create_from_resource, create_ground_plane, create_sky_box,
};
pub use trace::{BackendCall, RecordingBackend};
pub use wgpu_backend::WgpuBackend;
