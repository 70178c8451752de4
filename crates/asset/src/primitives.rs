//! Procedural meshes that bypass the OBJ parser: box, ground plane, sky box.

use glam::Vec3;

use crate::mesh::{DEFAULT_COLOR, MeshBuffers, MeshVertex};

/// Texture rectangle `[u0, v0, u1, v1]` with `v0` at the top of the image.
type UvRect = [f32; 4];

/// (outward axis, right, up) for each cube face, with `right x up == outward`.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

const FACE_COLORS: [[f32; 4]; 6] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [1.0, 0.0, 1.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
];

/// Append a quad centred on `center` spanning `right` and `up` (half extents).
/// Counter-clockwise when seen from the side `right x up` points to.
fn push_quad(
    mesh: &mut MeshBuffers,
    center: Vec3,
    right: Vec3,
    up: Vec3,
    uv: UvRect,
    color: [f32; 4],
) {
    let base = mesh.vertices.len() as u32;
    let normal = right.cross(up).normalize_or_zero().to_array();
    let [u0, v0, u1, v1] = uv;
    let corners = [
        (center - right - up, [u0, v1]),
        (center + right - up, [u1, v1]),
        (center + right + up, [u1, v0]),
        (center - right + up, [u0, v0]),
    ];
    for (position, uv) in corners {
        mesh.vertices.push(MeshVertex::new(position.to_array(), normal, uv));
        mesh.colors.push(color);
    }
    mesh.indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// Unit cube centred on the origin, 4 vertices per face, one color per face.
pub fn unit_box() -> MeshBuffers {
    let mut mesh = MeshBuffers::default();
    for ((outward, right, up), color) in CUBE_FACES.iter().zip(FACE_COLORS) {
        push_quad(&mut mesh, *outward * 0.5, *right * 0.5, *up * 0.5, [0.0, 0.0, 1.0, 1.0], color);
    }
    mesh
}

/// Square in the XZ plane facing +Y, `2 * half_size` wide, with texcoords
/// running `0..repeat` so a repeating sampler tiles the texture.
pub fn ground_plane(half_size: f32, repeat: f32) -> MeshBuffers {
    let mut mesh = MeshBuffers::default();
    push_quad(
        &mut mesh,
        Vec3::ZERO,
        Vec3::X * half_size,
        Vec3::NEG_Z * half_size,
        [0.0, 0.0, repeat, repeat],
        DEFAULT_COLOR,
    );
    mesh
}

/// Unit cube seen from inside: faces wind counter-clockwise and normals point
/// inward. Texcoords address a horizontal-cross atlas (4 columns, 3 rows).
pub fn sky_box() -> MeshBuffers {
    // (looking direction, screen right, screen up, atlas column/row) for a
    // viewer at the centre.
    let faces = [
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y, (0.0, 1.0)),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y, (1.0, 1.0)),
        (Vec3::X, Vec3::Z, Vec3::Y, (2.0, 1.0)),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y, (3.0, 1.0)),
        (Vec3::Y, Vec3::X, Vec3::Z, (1.0, 0.0)),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z, (1.0, 2.0)),
    ];

    let mut mesh = MeshBuffers::default();
    for (dir, right, up, (col, row)) in faces {
        let uv = [col / 4.0, row / 3.0, (col + 1.0) / 4.0, (row + 1.0) / 3.0];
        push_quad(&mut mesh, dir * 0.5, right * 0.5, up * 0.5, uv, [0.0, 0.0, 0.0, 1.0]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(mesh: &MeshBuffers, tri: usize) -> Vec3 {
        let p = |i: usize| {
            Vec3::from_array(mesh.vertices[mesh.indices[tri * 3 + i] as usize].position)
        };
        (p(1) - p(0)).cross(p(2) - p(0))
    }

    fn centroid(mesh: &MeshBuffers, tri: usize) -> Vec3 {
        (0..3)
            .map(|i| Vec3::from_array(mesh.vertices[mesh.indices[tri * 3 + i] as usize].position))
            .sum::<Vec3>()
            / 3.0
    }

    #[test]
    fn box_faces_point_outward() {
        let mesh = unit_box();
        mesh.validate().unwrap();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        for tri in 0..mesh.triangle_count() {
            let n = face_normal(&mesh, tri);
            assert!(n.dot(centroid(&mesh, tri)) > 0.0, "triangle {tri} faces inward");
            let stored = Vec3::from_array(mesh.vertices[mesh.indices[tri * 3] as usize].normal);
            assert!(stored.abs_diff_eq(n.normalize(), 1e-6));
        }
        for v in &mesh.vertices {
            assert!(v.position.iter().all(|c| c.abs() == 0.5));
        }
    }

    #[test]
    fn sky_box_faces_point_inward() {
        let mesh = sky_box();
        mesh.validate().unwrap();
        assert_eq!(mesh.vertices.len(), 24);
        for tri in 0..mesh.triangle_count() {
            assert!(face_normal(&mesh, tri).dot(centroid(&mesh, tri)) < 0.0);
        }
        assert!(mesh
            .vertices
            .iter()
            .all(|v| (0.0..=1.0).contains(&v.uv[0]) && (0.0..=1.0).contains(&v.uv[1])));
    }

    #[test]
    fn sky_box_uses_distinct_atlas_cells() {
        let mesh = sky_box();
        let mut cells: Vec<(u32, u32)> = mesh
            .vertices
            .chunks_exact(4)
            .map(|quad| {
                let u = quad.iter().map(|v| v.uv[0]).fold(f32::MAX, f32::min);
                let v = quad.iter().map(|v| v.uv[1]).fold(f32::MAX, f32::min);
                ((u * 4.0).round() as u32, (v * 3.0).round() as u32)
            })
            .collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), 6);
    }

    #[test]
    fn ground_plane_faces_up_and_tiles() {
        let mesh = ground_plane(100.0, 10.0);
        mesh.validate().unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        for tri in 0..2 {
            let n = face_normal(&mesh, tri).normalize();
            assert!(n.abs_diff_eq(Vec3::Y, 1e-6));
        }
        let max_u = mesh.vertices.iter().map(|v| v.uv[0]).fold(0.0, f32::max);
        assert_eq!(max_u, 10.0);
        assert!(mesh.vertices.iter().all(|v| v.position[1] == 0.0));
    }
}
