//! Named resource lookup (model files, material libraries, images).

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use corelib::{MeshError, MeshResult};

/// Resolves logical resource names to readable streams.
pub trait ResourceSource {
    fn open(&self, name: &str) -> MeshResult<Box<dyn BufRead + '_>>;

    fn read_bytes(&self, name: &str) -> MeshResult<Vec<u8>> {
        let mut reader = self.open(name)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| MeshError::Io {
            name: name.to_owned(),
            source,
        })?;
        Ok(bytes)
    }
}

/// Resources stored as files below a root directory.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSource for DirectorySource {
    fn open(&self, name: &str) -> MeshResult<Box<dyn BufRead + '_>> {
        let path = self.root.join(name);
        match File::open(&path) {
            Ok(file) => {
                log::debug!("Opened resource {:?}", path);
                Ok(Box::new(BufReader::new(file)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MeshError::ResourceNotFound {
                name: name.to_owned(),
            }),
            Err(source) => Err(MeshError::Io {
                name: name.to_owned(),
                source,
            }),
        }
    }
}

/// In-memory resources keyed by name (embedded assets, tests).
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(name.into(), data.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }
}

impl ResourceSource for MemorySource {
    fn open(&self, name: &str) -> MeshResult<Box<dyn BufRead + '_>> {
        self.entries
            .get(name)
            .map(|data| Box::new(io::Cursor::new(data.as_slice())) as Box<dyn BufRead + '_>)
            .ok_or_else(|| MeshError::ResourceNotFound {
                name: name.to_owned(),
            })
    }

    fn read_bytes(&self, name: &str) -> MeshResult<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| MeshError::ResourceNotFound {
                name: name.to_owned(),
            })
    }
}
