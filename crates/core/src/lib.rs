//! Core shared types and errors (backend-agnostic).

use thiserror::Error;

/// A graphics backend could not create or upload an object.
///
/// Treated as unrecoverable (out of GPU memory, lost context); never retried.
#[derive(Debug, Error)]
#[error("failed to allocate {object}: {reason}")]
pub struct BackendError {
    pub object: &'static str,
    pub reason: String,
}

impl BackendError {
    pub fn new(object: &'static str, reason: impl Into<String>) -> Self {
        Self {
            object,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("resource not found: {name}")]
    ResourceNotFound { name: String },

    #[error("I/O error reading '{name}'")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model at line {line_no} ('{line}'): {reason}")]
    MalformedModel {
        line_no: usize,
        line: String,
        reason: String,
    },

    #[error("material '{material}' has no diffuse texture in library '{library}'")]
    MaterialResolutionMiss { library: String, material: String },

    #[error("failed to decode image '{name}': {reason}")]
    ImageDecode { name: String, reason: String },

    #[error("invalid mesh buffers: {0}")]
    InvalidMesh(String),

    #[error(transparent)]
    BackendAllocation(#[from] BackendError),
}

impl MeshError {
    pub fn malformed(line_no: usize, line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedModel {
            line_no,
            line: line.to_owned(),
            reason: reason.into(),
        }
    }

    /// A missing material degrades to an untextured mesh; everything else aborts the load.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MaterialResolutionMiss { .. })
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
