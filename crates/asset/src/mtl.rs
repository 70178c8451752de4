//! Material library lookup: finds the diffuse texture bound to a material.

use std::io::BufRead;

use corelib::{MeshError, MeshResult};

use crate::{obj::MaterialBinding, source::ResourceSource};

/// Scan a material library for the `map_Kd` of `material`.
///
/// With no material requested, the first `map_Kd` in the library wins. With
/// a material requested, only `map_Kd` lines inside a matching `newmtl` block
/// count, and the last one seen wins.
pub fn scan_diffuse_texture<R: BufRead>(
    library: &str,
    reader: R,
    material: Option<&str>,
) -> MeshResult<Option<String>> {
    let mut in_block = false;
    let mut found = None;

    for line in reader.lines() {
        let line = line.map_err(|source| MeshError::Io {
            name: library.to_owned(),
            source,
        })?;
        let trimmed = line.trim_start_matches('\u{feff}').trim();
        let Some((tag, value)) = trimmed.split_once(char::is_whitespace) else {
            continue;
        };
        // Names and filenames may contain spaces.
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match (tag, material) {
            ("newmtl", Some(wanted)) => in_block = value == wanted,
            ("map_Kd", Some(_)) if in_block => found = Some(value.to_owned()),
            ("map_Kd", None) => return Ok(Some(value.to_owned())),
            _ => {}
        }
    }

    Ok(found)
}

/// Resolve a parsed material binding to a texture filename.
///
/// A missing library or a material without `map_Kd` comes back as
/// [`MeshError::MaterialResolutionMiss`], which callers treat as "no texture".
pub fn resolve_material(
    source: &dyn ResourceSource,
    binding: &MaterialBinding,
) -> MeshResult<String> {
    let miss = || MeshError::MaterialResolutionMiss {
        library: binding.library.clone(),
        material: binding.material.clone().unwrap_or_else(|| "<any>".to_owned()),
    };

    let reader = match source.open(&binding.library) {
        Ok(reader) => reader,
        Err(MeshError::ResourceNotFound { .. }) => return Err(miss()),
        Err(e) => return Err(e),
    };

    let texture = scan_diffuse_texture(&binding.library, reader, binding.material.as_deref())?
        .ok_or_else(miss)?;
    log::debug!(
        "Material {:?} in '{}' resolved to texture '{}'",
        binding.material,
        binding.library,
        texture
    );
    Ok(texture)
}
