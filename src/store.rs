use crate::chat::ChatRegistry;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot access state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state file {path} is not valid marriage data: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot serialize marriage data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durability only. Business rules live in the registry.
pub trait Store {
    fn load(&self) -> Result<ChatRegistry, StoreError>;
    fn save(&self, registry: &ChatRegistry) -> Result<(), StoreError>;
}

/// Whole registry in one JSON file, rewritten in full on every save.
///
/// There is no temp-file/rename or fsync step and no locking: a crash during
/// `save` can leave a truncated file, and two writers racing on the same path
/// resolve as last-writer-wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> Result<ChatRegistry, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ChatRegistry::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, registry: &ChatRegistry) -> Result<(), StoreError> {
        fs::write(&self.path, to_pretty_json(registry)?).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn to_pretty_json(registry: &ChatRegistry) -> Result<Vec<u8>, StoreError> {
    let mut buffer = Vec::with_capacity(512);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    registry.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Keeps the registry in memory; nothing survives the process.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    registry: std::cell::RefCell<ChatRegistry>,
    saves: std::cell::Cell<usize>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn saves(&self) -> usize {
        self.saves.get()
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn load(&self) -> Result<ChatRegistry, StoreError> {
        Ok(self.registry.borrow().clone())
    }

    fn save(&self, registry: &ChatRegistry) -> Result<(), StoreError> {
        *self.registry.borrow_mut() = registry.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
