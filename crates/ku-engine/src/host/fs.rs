use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use super::{Archive, SlotId, SlotStorage};
use crate::error::{ResourceError, StorageError};

/// Save slots as files in one directory: `save<N>.dat` for user slots,
/// `gsave.dat` for the global record and `emergency.dat` for the emergency
/// snapshot. The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FsSlotStorage {
    dir: PathBuf,
}

impl FsSlotStorage {
    /// Store slots under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory slots live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a slot.
    pub fn slot_path(&self, slot: SlotId) -> PathBuf {
        let name = match slot {
            SlotId::GLOBAL => "gsave.dat".to_string(),
            SlotId::EMERGENCY => "emergency.dat".to_string(),
            SlotId(n) => format!("save{n}.dat"),
        };
        self.dir.join(name)
    }
}

impl SlotStorage for FsSlotStorage {
    fn write_slot(&mut self, slot: SlotId, bytes: &[u8]) -> Result<(), StorageError> {
        let wrap = |source| StorageError::Io { slot: slot.0, source };
        fs::create_dir_all(&self.dir).map_err(wrap)?;
        let path = self.slot_path(slot);
        debug!("writing {} bytes to {}", bytes.len(), path.display());
        fs::write(path, bytes).map_err(wrap)
    }

    fn read_slot(&self, slot: SlotId) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.slot_path(slot)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                slot: slot.0,
                source,
            }),
        }
    }
}

/// Assets as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    /// Serve files from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an asset name. Script names use either slash; absolute names
    /// and `..` components are refused.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in name.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => return None,
                part => path.push(part),
            }
        }
        Some(path)
    }
}

impl Archive for DirArchive {
    fn read_file(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| ResourceError::MissingAsset(name.to_string()))?;
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ResourceError::MissingAsset(name.to_string())
            } else {
                ResourceError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_file_names() {
        let storage = FsSlotStorage::new("/saves");
        assert_eq!(storage.slot_path(SlotId(3)), Path::new("/saves/save3.dat"));
        assert_eq!(storage.slot_path(SlotId::GLOBAL), Path::new("/saves/gsave.dat"));
        assert_eq!(
            storage.slot_path(SlotId::EMERGENCY),
            Path::new("/saves/emergency.dat")
        );
    }

    #[test]
    fn write_then_read_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FsSlotStorage::new(dir.path().join("nested"));
        assert_eq!(storage.read_slot(SlotId(1)).unwrap(), None);
        storage.write_slot(SlotId(1), b"abc").unwrap();
        assert_eq!(storage.read_slot(SlotId(1)).unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn archive_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bg")).unwrap();
        fs::write(dir.path().join("bg/room.png"), b"png").unwrap();
        let archive = DirArchive::new(dir.path());
        assert!(archive.file_exists("bg/room.png"));
        assert!(archive.file_exists("bg\\room.png"));
        assert_eq!(archive.read_file("bg/room.png").unwrap(), b"png");
        assert!(!archive.file_exists("bg/none.png"));
        assert!(matches!(
            archive.read_file("bg/none.png"),
            Err(ResourceError::MissingAsset(_))
        ));
    }

    #[test]
    fn archive_refuses_parent_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = DirArchive::new(dir.path());
        assert!(!archive.file_exists("../etc/passwd"));
    }
}
