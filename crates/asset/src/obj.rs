//! Triangle-only OBJ parser producing raw geometry plus material references.
//!
//! Lines are classified by their leading token. Face references are resolved
//! only after the whole file is read, so faces may point at entries defined
//! further down.

use std::io::{self, BufRead};

use corelib::{MeshError, MeshResult};

use crate::source::ResourceSource;

/// One vertex reference inside a triangle (0-based indices).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceCorner {
    pub vertex: usize,
    pub texcoord: Option<usize>,
    pub normal: Option<usize>,
}

/// A triangle; the winding is corner 0 -> 1 -> 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub corners: [FaceCorner; 3],
}

/// `mtllib` / `usemtl` pair captured while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialBinding {
    pub library: String,
    pub material: Option<String>,
}

/// Raw geometry exactly as listed in the file.
///
/// Texcoords have already had their `v` flipped (`1 - v`) so that row 0 is the
/// top of the image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjModel {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub faces: Vec<Face>,
    pub material_library: Option<String>,
    pub active_material: Option<String>,
}

impl ObjModel {
    /// The material reference to resolve, if the file named a library.
    pub fn material_binding(&self) -> Option<MaterialBinding> {
        self.material_library.as_ref().map(|library| MaterialBinding {
            library: library.clone(),
            material: self.active_material.clone(),
        })
    }
}

/// Load an OBJ model by resource name.
pub fn load_obj(source: &dyn ResourceSource, name: &str) -> MeshResult<ObjModel> {
    let reader = source.open(name)?;
    parse_obj(name, reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> MeshResult<ObjModel> {
    parse_obj("<inline>", io::Cursor::new(contents))
}

/// Face whose indices are not yet checked against the final list sizes.
struct PendingFace {
    line_no: usize,
    line: String,
    face: Face,
}

#[derive(Clone, Copy)]
struct Counts {
    positions: usize,
    texcoords: usize,
    normals: usize,
}

const BOM: char = '\u{feff}';

pub fn parse_obj<R: BufRead>(name: &str, reader: R) -> MeshResult<ObjModel> {
    let mut model = ObjModel::default();
    let mut pending: Vec<PendingFace> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| MeshError::Io {
            name: name.to_owned(),
            source,
        })?;
        let mut trimmed = line.trim();
        if line_no == 1 {
            trimmed = trimmed.trim_start_matches(BOM).trim_start();
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // A bare tag carries no data.
        let Some((tag, data)) = trimmed.split_once(char::is_whitespace) else {
            continue;
        };
        let data = data.trim();

        match tag {
            "v" => model.positions.push(parse_floats(data, line_no, trimmed)?),
            "vn" => model.normals.push(parse_floats(data, line_no, trimmed)?),
            "vt" => {
                let [u, v] = parse_floats(data, line_no, trimmed)?;
                model.texcoords.push([u, 1.0 - v]);
            }
            "f" => {
                let counts = Counts {
                    positions: model.positions.len(),
                    texcoords: model.texcoords.len(),
                    normals: model.normals.len(),
                };
                let face = parse_face(data, counts, line_no, trimmed)?;
                pending.push(PendingFace {
                    line_no,
                    line: trimmed.to_owned(),
                    face,
                });
            }
            "mtllib" => model.material_library = Some(first_token(data, line_no, trimmed)?),
            "usemtl" => model.active_material = Some(first_token(data, line_no, trimmed)?),
            _ => {
                // o/g/s and friends carry nothing we need.
            }
        }
    }

    let counts = Counts {
        positions: model.positions.len(),
        texcoords: model.texcoords.len(),
        normals: model.normals.len(),
    };
    model.faces.reserve(pending.len());
    for p in pending {
        check_face_bounds(&p, counts)?;
        model.faces.push(p.face);
    }

    log::info!(
        "Parsed OBJ '{}': {} positions, {} normals, {} texcoords, {} faces",
        name,
        model.positions.len(),
        model.normals.len(),
        model.texcoords.len(),
        model.faces.len()
    );
    Ok(model)
}

fn parse_floats<const N: usize>(data: &str, line_no: usize, line: &str) -> MeshResult<[f32; N]> {
    let fields: Vec<&str> = data.split_whitespace().collect();
    if fields.len() != N {
        return Err(MeshError::malformed(
            line_no,
            line,
            format!("expected {} fields, found {}", N, fields.len()),
        ));
    }

    let mut out = [0.0f32; N];
    for (slot, field) in out.iter_mut().zip(&fields) {
        *slot = field.parse::<f32>().map_err(|e| {
            MeshError::malformed(line_no, line, format!("invalid number '{}': {}", field, e))
        })?;
    }
    Ok(out)
}

fn first_token(data: &str, line_no: usize, line: &str) -> MeshResult<String> {
    data.split_whitespace()
        .next()
        .map(str::to_owned)
        .ok_or_else(|| MeshError::malformed(line_no, line, "missing name"))
}

fn parse_face(data: &str, counts: Counts, line_no: usize, line: &str) -> MeshResult<Face> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(MeshError::malformed(
            line_no,
            line,
            format!("faces must be triangles, found {} corners", tokens.len()),
        ));
    }

    let mut corners = [FaceCorner::default(); 3];
    for (corner, token) in corners.iter_mut().zip(&tokens) {
        *corner = parse_corner(token, counts, line_no, line)?;
    }
    Ok(Face { corners })
}

fn parse_corner(token: &str, counts: Counts, line_no: usize, line: &str) -> MeshResult<FaceCorner> {
    let fields: Vec<&str> = token.split('/').collect();
    if fields.len() > 3 {
        return Err(MeshError::malformed(
            line_no,
            line,
            format!("malformed face corner '{}'", token),
        ));
    }

    let vertex = match fields[0] {
        "" => {
            return Err(MeshError::malformed(
                line_no,
                line,
                format!("face corner '{}' has no vertex index", token),
            ));
        }
        value => resolve_index(value, counts.positions, line_no, line)?,
    };
    let texcoord = match fields.get(1) {
        Some(value) if !value.is_empty() => {
            Some(resolve_index(value, counts.texcoords, line_no, line)?)
        }
        _ => None,
    };
    let normal = match fields.get(2) {
        Some(value) if !value.is_empty() => {
            Some(resolve_index(value, counts.normals, line_no, line)?)
        }
        _ => None,
    };

    Ok(FaceCorner {
        vertex,
        texcoord,
        normal,
    })
}

/// 1-based index to 0-based; negative values count back from `seen`, the
/// number of entries parsed before this line.
fn resolve_index(token: &str, seen: usize, line_no: usize, line: &str) -> MeshResult<usize> {
    let raw = token.parse::<i64>().map_err(|_| {
        MeshError::malformed(line_no, line, format!("invalid index '{}'", token))
    })?;

    match raw {
        0 => Err(MeshError::malformed(line_no, line, "indices are 1-based; found 0")),
        r if r > 0 => Ok((r - 1) as usize),
        r => {
            let idx = seen as i64 + r;
            if idx < 0 {
                Err(MeshError::malformed(
                    line_no,
                    line,
                    format!("relative index {} reaches before the first entry", r),
                ))
            } else {
                Ok(idx as usize)
            }
        }
    }
}

fn check_face_bounds(p: &PendingFace, counts: Counts) -> MeshResult<()> {
    let out_of_range = |what: &str, idx: usize, len: usize| {
        MeshError::malformed(
            p.line_no,
            &p.line,
            format!("{} index {} out of range ({} defined)", what, idx + 1, len),
        )
    };

    for corner in &p.face.corners {
        if corner.vertex >= counts.positions {
            return Err(out_of_range("vertex", corner.vertex, counts.positions));
        }
        if let Some(t) = corner.texcoord.filter(|&t| t >= counts.texcoords) {
            return Err(out_of_range("texcoord", t, counts.texcoords));
        }
        if let Some(n) = corner.normal.filter(|&n| n >= counts.normals) {
            return Err(out_of_range("normal", n, counts.normals));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn malformed_line(err: MeshError) -> usize {
        match err {
            MeshError::MalformedModel { line_no, .. } => line_no,
            other => panic!("expected MalformedModel, got {other:?}"),
        }
    }

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let model = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(model.positions.len(), 3);
        assert_eq!(model.normals.len(), 1);
        assert_eq!(model.faces.len(), 1);
        assert_eq!(
            model.faces[0].corners[1],
            FaceCorner {
                vertex: 1,
                texcoord: Some(1),
                normal: Some(0)
            }
        );
    }

    #[test]
    fn texcoords_are_flipped_vertically() {
        let model = load_obj_from_str("vt 0.25 0.1\n").unwrap();
        assert_eq!(model.texcoords[0][0], 0.25);
        assert!((model.texcoords[0][1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn optional_corner_fields() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2 3/\n";
        let model = load_obj_from_str(src).unwrap();
        let [a, b, c] = model.faces[0].corners;
        assert_eq!((a.texcoord, a.normal), (None, Some(0)));
        assert_eq!((b.texcoord, b.normal), (None, None));
        assert_eq!((c.vertex, c.texcoord, c.normal), (2, None, None));
    }

    #[test]
    fn forward_references_resolve() {
        let src = "f 1 2 3\nv 0 0 0\nv 1 0 0\nv 0 1 0\n";
        let model = load_obj_from_str(src).unwrap();
        assert_eq!(model.faces.len(), 1);
    }

    #[test]
    fn negative_indices_are_relative() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let model = load_obj_from_str(src).unwrap();
        let verts: Vec<usize> = model.faces[0].corners.iter().map(|c| c.vertex).collect();
        assert_eq!(verts, vec![0, 1, 2]);
    }

    #[test]
    fn material_directives_are_captured() {
        let src = "mtllib scene.mtl\nusemtl First\nusemtl Foo\n";
        let model = load_obj_from_str(src).unwrap();
        assert_eq!(
            model.material_binding(),
            Some(MaterialBinding {
                library: "scene.mtl".into(),
                material: Some("Foo".into()),
            })
        );

        let bare = load_obj_from_str("usemtl Foo\n").unwrap();
        assert_eq!(bare.material_binding(), None);
    }

    #[test]
    fn comments_unknown_tags_and_bare_tags_are_skipped() {
        let src = "# header\n\no cube\ns off\ng\nv 1 2 3\n";
        let model = load_obj_from_str(src).unwrap();
        assert_eq!(model.positions, vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn leading_byte_order_mark_is_ignored() {
        let src = "\u{feff}v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = load_obj_from_str(src).unwrap();
        assert_eq!(model.positions.len(), 3);
        assert_eq!(model.faces.len(), 1);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = load_obj_from_str("v 1 2 3\nv 1 2\n").unwrap_err();
        assert_eq!(malformed_line(err), 2);

        let err = load_obj_from_str("vt 0.5 0.5 0.5\n").unwrap_err();
        assert_eq!(malformed_line(err), 1);
    }

    #[test]
    fn unparsable_number_reports_line_content() {
        let err = load_obj_from_str("v 1 2 abc\n").unwrap_err();
        match err {
            MeshError::MalformedModel { line, reason, .. } => {
                assert_eq!(line, "v 1 2 abc");
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quads_and_lines_are_rejected() {
        let quad = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        assert_eq!(malformed_line(load_obj_from_str(quad).unwrap_err()), 5);

        let line = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert_eq!(malformed_line(load_obj_from_str(line).unwrap_err()), 3);
    }

    #[test]
    fn out_of_range_reference_names_face_line() {
        let src = "v 0 0 0\nv 1 0 0\nf 1 2 3\nv 0 1 0\nf 1 2 4\n";
        assert_eq!(malformed_line(load_obj_from_str(src).unwrap_err()), 5);

        let normal = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//1 2//1 3//1\n";
        assert_eq!(malformed_line(load_obj_from_str(normal).unwrap_err()), 4);
    }

    #[test]
    fn zero_index_is_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n";
        assert_eq!(malformed_line(load_obj_from_str(src).unwrap_err()), 4);
    }

    #[test]
    fn load_by_resource_name() {
        let src = MemorySource::new().with("tri.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert_eq!(load_obj(&src, "tri.obj").unwrap().faces.len(), 1);
        assert!(matches!(
            load_obj(&src, "missing.obj"),
            Err(MeshError::ResourceNotFound { .. })
        ));
    }
}
