//! Per-vertex normal synthesis.
//!
//! Vertices whose every referencing corner names a file normal keep that
//! normal. All others get the normalized sum of the unnormalized face normals
//! of adjacent triangles, which weights larger triangles more. Vertices are
//! smoothed per index: coincident positions with different indices are not
//! merged.

use glam::Vec3;

use crate::obj::ObjModel;

/// Running state for one vertex index during synthesis.
#[derive(Clone, Copy, Debug)]
pub struct VertexAccumulator {
    pub position: Vec3,
    pub normal: Vec3,
    pub contributed: bool,
}

impl VertexAccumulator {
    fn new(position: [f32; 3]) -> Self {
        Self {
            position: Vec3::from_array(position),
            normal: Vec3::ZERO,
            contributed: false,
        }
    }

    fn add_face_normal(&mut self, face_normal: Vec3) {
        self.normal += face_normal;
        self.contributed = true;
    }
}

/// What the file says about a vertex's normal, gathered over its corners.
#[derive(Clone, Copy, Debug, Default)]
struct FileNormals {
    corners: u32,
    missing: bool,
    first: Option<usize>,
    disagree: bool,
    sum: Vec3,
}

impl FileNormals {
    fn record(&mut self, normal: Option<usize>, normals: &[[f32; 3]]) {
        self.corners += 1;
        let Some(n) = normal else {
            self.missing = true;
            return;
        };
        match self.first {
            None => self.first = Some(n),
            Some(first) if first != n => self.disagree = true,
            Some(_) => {}
        }
        self.sum += Vec3::from_array(normals[n]);
    }

    fn resolve(&self, normals: &[[f32; 3]]) -> Option<Vec3> {
        if self.corners == 0 || self.missing {
            return None;
        }
        match (self.first, self.disagree) {
            (Some(n), false) => Some(Vec3::from_array(normals[n])),
            (Some(_), true) => Some(self.sum.normalize_or_zero()),
            (None, _) => None,
        }
    }
}

/// One final normal per entry of `model.positions`, in order.
///
/// Face indices must already be in range (the parser guarantees it).
pub fn synthesize_normals(model: &ObjModel) -> Vec<[f32; 3]> {
    let mut accumulators: Vec<VertexAccumulator> = model
        .positions
        .iter()
        .copied()
        .map(VertexAccumulator::new)
        .collect();
    let mut file = vec![FileNormals::default(); model.positions.len()];

    for face in &model.faces {
        let [a, b, c] = face.corners.map(|corner| accumulators[corner.vertex].position);
        let face_normal = (b - a).cross(c - a);
        for corner in &face.corners {
            accumulators[corner.vertex].add_face_normal(face_normal);
            file[corner.vertex].record(corner.normal, &model.normals);
        }
    }

    let mut from_file = 0usize;
    let mut unreferenced = 0usize;
    let normals: Vec<[f32; 3]> = accumulators
        .iter()
        .zip(&file)
        .map(|(acc, file)| {
            if let Some(n) = file.resolve(&model.normals) {
                from_file += 1;
                return n.to_array();
            }
            if !acc.contributed {
                unreferenced += 1;
            }
            acc.normal.normalize_or_zero().to_array()
        })
        .collect();

    log::debug!(
        "Synthesized normals: {} from file, {} computed, {} unreferenced",
        from_file,
        normals.len() - from_file - unreferenced,
        unreferenced
    );
    normals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::load_obj_from_str;

    fn length(n: [f32; 3]) -> f32 {
        Vec3::from_array(n).length()
    }

    #[test]
    fn ccw_triangle_in_xy_plane_faces_plus_z() {
        let model = load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let normals = synthesize_normals(&model);
        assert_eq!(normals, vec![[0.0, 0.0, 1.0]; 3]);
    }

    #[test]
    fn file_normals_are_used_verbatim() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0.1 0.2 0.3
vn 1 0 0
vn 0 -1 0
f 1//1 2//2 3//3
";
        let model = load_obj_from_str(src).unwrap();
        let normals = synthesize_normals(&model);
        assert_eq!(normals, vec![[0.1, 0.2, 0.3], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]]);
    }

    #[test]
    fn partially_specified_vertex_is_computed() {
        // Vertex 1 is referenced once with and once without a file normal.
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
vn 1 0 0
f 1//1 2//1 3//1
f 2 4 3
";
        let model = load_obj_from_str(src).unwrap();
        let normals = synthesize_normals(&model);
        assert_eq!(normals[0], [1.0, 0.0, 0.0]);
        assert_eq!(normals[1], [0.0, 0.0, 1.0]);
        assert_eq!(normals[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn disagreeing_file_normals_are_averaged() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
vn 0 0 1
vn 1 0 0
f 1//1 2//1 3//1
f 1//2 3//2 4//2
";
        let model = load_obj_from_str(src).unwrap();
        let n = synthesize_normals(&model)[0];
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((n[0] - expected).abs() < 1e-6);
        assert!(n[1].abs() < 1e-6);
        assert!((n[2] - expected).abs() < 1e-6);
    }

    #[test]
    fn larger_triangles_weigh_more() {
        // Shared edge 1-2 on the x axis; one small triangle in XY, one large in XZ.
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 -10
f 1 2 3
f 1 2 4
";
        let model = load_obj_from_str(src).unwrap();
        let n = Vec3::from_array(synthesize_normals(&model)[0]);
        // Small face contributes +Z * 1, large face contributes +Y * 10.
        let expected = Vec3::new(0.0, 10.0, 1.0).normalize();
        assert!(n.abs_diff_eq(expected, 1e-6), "got {n:?}");
    }

    #[test]
    fn computed_normals_are_unit_or_zero() {
        let src = "\
v 0 0 0
v 2 0 0
v 0 3 0
v 1 1 4
v 9 9 9
f 1 2 3
f 1 2 4
f 2 3 4
f 3 1 4
";
        let model = load_obj_from_str(src).unwrap();
        let normals = synthesize_normals(&model);
        assert_eq!(normals.len(), model.positions.len());
        for n in &normals[..4] {
            assert!((length(*n) - 1.0).abs() < 1e-5);
        }
        assert_eq!(normals[4], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn coincident_positions_are_not_merged() {
        // Two triangles at right angles; vertices 2 and 4 share a position.
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 0 0
v 0 0 -1
f 1 2 3
f 4 5 1
";
        let model = load_obj_from_str(src).unwrap();
        let normals = synthesize_normals(&model);
        assert_eq!(normals[1], [0.0, 0.0, 1.0]);
        assert_eq!(normals[3], [0.0, 1.0, 0.0]);
    }
}
