//! Entry points for the render loop: OBJ resources and fixed primitives,
//! all ending in [`upload_mesh`].

use asset::{
    DEFAULT_COLOR, MaterialBinding, MeshBuffers, ResourceSource, TextureData, mtl, obj, primitives,
};
use corelib::{MeshError, MeshResult};

use crate::{
    assembler::{GpuMesh, upload_mesh},
    backend::{GraphicsBackend, GraphicsContext, SamplerSettings, WrapMode},
};

/// Ground plane half-size in world units.
pub const GROUND_HALF_SIZE: f32 = 100_000.0;
/// How many times the ground texture repeats across the plane.
pub const GROUND_REPEAT: f32 = 1000.0;

/// Per-load configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadOptions {
    /// Color written for every vertex.
    pub default_color: [f32; 4],
    /// Texture wrap mode; tiling meshes want [`WrapMode::Repeat`].
    pub wrap: WrapMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_COLOR,
            wrap: WrapMode::ClampToEdge,
        }
    }
}

/// Parse an OBJ resource, resolve its diffuse texture, synthesize normals
/// and upload everything.
///
/// A missing material or texture file yields an untextured mesh; every
/// other failure aborts the load.
pub fn create_from_resource<B: GraphicsBackend>(
    context: &GraphicsContext<B>,
    source: &dyn ResourceSource,
    name: &str,
    options: &LoadOptions,
) -> MeshResult<GpuMesh<B>> {
    let model = obj::load_obj(source, name)?;

    let texture = match model.material_binding() {
        Some(binding) => load_material_texture(source, &binding)?,
        None => None,
    };

    let mesh = MeshBuffers::from_model(&model, options.default_color)?;
    let sampler = SamplerSettings::with_wrap(options.wrap);
    upload_mesh(context, name, &mesh, texture.as_ref().map(|t| (t, sampler)))
}

fn load_material_texture(
    source: &dyn ResourceSource,
    binding: &MaterialBinding,
) -> MeshResult<Option<TextureData>> {
    let file = match mtl::resolve_material(source, binding) {
        Ok(file) => file,
        Err(e) if !e.is_fatal() => {
            log::warn!("{}; continuing without texture", e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match TextureData::load(source, &file) {
        Ok(texture) => Ok(Some(texture)),
        Err(MeshError::ResourceNotFound { name }) => {
            log::warn!(
                "Texture '{}' of {:?} not found; continuing without texture",
                name,
                binding.material
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Unit cube with per-face colors, optionally textured.
pub fn create_box<B: GraphicsBackend>(
    context: &GraphicsContext<B>,
    texture: Option<&TextureData>,
) -> MeshResult<GpuMesh<B>> {
    let sampler = SamplerSettings::default();
    upload_mesh(context, "box", &primitives::unit_box(), texture.map(|t| (t, sampler)))
}

/// Large ground square with a repeating texture.
pub fn create_ground_plane<B: GraphicsBackend>(
    context: &GraphicsContext<B>,
    texture: &TextureData,
) -> MeshResult<GpuMesh<B>> {
    let mesh = primitives::ground_plane(GROUND_HALF_SIZE, GROUND_REPEAT);
    let sampler = SamplerSettings::with_wrap(WrapMode::Repeat);
    upload_mesh(context, "ground plane", &mesh, Some((texture, sampler)))
}

/// Inward-facing cube textured with a horizontal-cross atlas.
pub fn create_sky_box<B: GraphicsBackend>(
    context: &GraphicsContext<B>,
    texture: &TextureData,
) -> MeshResult<GpuMesh<B>> {
    let sampler = SamplerSettings::default();
    upload_mesh(context, "sky box", &primitives::sky_box(), Some((texture, sampler)))
}
