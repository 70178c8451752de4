//! Asset loading: resource sources, OBJ/MTL parsing, normal synthesis,
//! CPU mesh buffers, texture decoding and procedural primitives.

pub mod mesh;
pub mod mtl;
pub mod normals;
pub mod obj;
pub mod primitives;
pub mod source;
pub mod texture;

pub use mesh::{DEFAULT_COLOR, MeshBuffers, MeshVertex};
pub use obj::{MaterialBinding, ObjModel};
pub use source::{DirectorySource, MemorySource, ResourceSource};
pub use texture::TextureData;
