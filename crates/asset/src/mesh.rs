//! CPU-side mesh buffers ready for upload.

use bytemuck::{Pod, Zeroable};
use corelib::{MeshError, MeshResult};

use crate::{normals::synthesize_normals, obj::ObjModel};

/// Opaque white, written for every vertex unless the caller overrides it.
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Interleaved vertex: position, normal, uv. Values are in object space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle mesh: interleaved vertices, a parallel RGBA color per
/// vertex, and three indices per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<MeshVertex>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn new(vertices: Vec<MeshVertex>, colors: Vec<[f32; 4]>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            colors,
            indices,
        }
    }

    /// Build one output vertex per OBJ position, in file order.
    ///
    /// A vertex takes the texcoord of the first corner that supplies one.
    pub fn from_model(model: &ObjModel, color: [f32; 4]) -> MeshResult<Self> {
        if u32::try_from(model.positions.len()).is_err() {
            return Err(MeshError::InvalidMesh(format!(
                "too many vertices ({} > {})",
                model.positions.len(),
                u32::MAX
            )));
        }

        let normals = synthesize_normals(model);

        let mut uvs: Vec<Option<usize>> = vec![None; model.positions.len()];
        let mut conflicts = 0usize;
        let mut indices = Vec::with_capacity(model.faces.len() * 3);
        for face in &model.faces {
            for corner in &face.corners {
                match (uvs[corner.vertex], corner.texcoord) {
                    (None, Some(t)) => uvs[corner.vertex] = Some(t),
                    (Some(first), Some(t)) if model.texcoords[first] != model.texcoords[t] => {
                        conflicts += 1;
                    }
                    _ => {}
                }
                indices.push(corner.vertex as u32);
            }
        }
        if conflicts > 0 {
            log::warn!(
                "{} face corners name a different texcoord than their vertex; keeping the first",
                conflicts
            );
        }

        let vertices = model
            .positions
            .iter()
            .zip(&normals)
            .zip(&uvs)
            .map(|((position, normal), uv)| {
                let uv = uv.map(|t| model.texcoords[t]).unwrap_or([0.0, 0.0]);
                MeshVertex::new(*position, *normal, uv)
            })
            .collect::<Vec<_>>();
        let colors = vec![color; vertices.len()];

        Ok(Self::new(vertices, colors, indices))
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.iter().map(|v| v.position)
    }

    /// Check the upload invariants: whole triangles, in-range indices, one
    /// color per vertex.
    pub fn validate(&self) -> MeshResult<()> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if self.colors.len() != self.vertices.len() {
            return Err(MeshError::InvalidMesh(format!(
                "{} colors for {} vertices",
                self.colors.len(),
                self.vertices.len()
            )));
        }
        if let Some(bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(MeshError::InvalidMesh(format!(
                "index {} out of range ({} vertices)",
                bad,
                self.vertices.len()
            )));
        }
        Ok(())
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::load_obj_from_str;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3
f 1/1 3/3 4/4
";

    #[test]
    fn vertex_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
        assert_eq!(std::mem::offset_of!(MeshVertex, normal), 12);
        assert_eq!(std::mem::offset_of!(MeshVertex, uv), 24);
    }

    #[test]
    fn one_vertex_per_position() {
        let model = load_obj_from_str(QUAD).unwrap();
        let mesh = MeshBuffers::from_model(&model, DEFAULT_COLOR).unwrap();
        assert_eq!(mesh.vertices.len(), model.positions.len());
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.indices.len(), 3 * model.faces.len());
        assert_eq!(mesh.triangle_count(), 2);
        mesh.validate().unwrap();
    }

    #[test]
    fn uvs_follow_corners() {
        let model = load_obj_from_str(QUAD).unwrap();
        let mesh = MeshBuffers::from_model(&model, DEFAULT_COLOR).unwrap();
        // v is flipped on ingest.
        assert_eq!(mesh.vertices[1].uv, [1.0, 1.0]);
        assert_eq!(mesh.vertices[3].uv, [0.0, 0.0]);
    }

    #[test]
    fn colors_default_per_vertex() {
        let model = load_obj_from_str(QUAD).unwrap();
        let mesh = MeshBuffers::from_model(&model, DEFAULT_COLOR).unwrap();
        assert_eq!(mesh.colors, vec![DEFAULT_COLOR; 4]);
        assert_eq!(mesh.color_bytes().len(), 4 * 4 * 4);

        let red = [1.0, 0.0, 0.0, 1.0];
        let mesh = MeshBuffers::from_model(&model, red).unwrap();
        assert!(mesh.colors.iter().all(|c| *c == red));
    }

    #[test]
    fn interleaved_bytes_recover_positions() {
        let model = load_obj_from_str(QUAD).unwrap();
        let mesh = MeshBuffers::from_model(&model, DEFAULT_COLOR).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(mesh.vertex_bytes());
        let recovered: Vec<[f32; 3]> = floats
            .chunks_exact(8)
            .map(|v| [v[0], v[1], v[2]])
            .collect();
        assert_eq!(recovered, model.positions);
    }

    #[test]
    fn validate_rejects_broken_buffers() {
        let v = MeshVertex::default();
        let partial = MeshBuffers::new(vec![v; 3], vec![DEFAULT_COLOR; 3], vec![0, 1]);
        assert!(partial.validate().is_err());

        let out_of_range = MeshBuffers::new(vec![v; 3], vec![DEFAULT_COLOR; 3], vec![0, 1, 3]);
        assert!(out_of_range.validate().is_err());

        let colors = MeshBuffers::new(vec![v; 3], vec![DEFAULT_COLOR; 2], vec![0, 1, 2]);
        assert!(colors.validate().is_err());
    }
}
