//! Storage locations for master key material.

use crate::errors::{Error, Result};
use crate::key_provider::MasterKey;
use base64::{Engine, engine::general_purpose::STANDARD};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const KEY_ENTRY: &str = "FORGE_SECRETS_MASTER_KEY";

/// Where a custody-backed provider keeps its key.
pub trait KeyCustody: Send + Sync {
    /// Load the stored key, or `None` when nothing has been provisioned yet.
    fn load(&self) -> Result<Option<MasterKey>>;

    /// Replace the stored key.
    fn store(&self, key: &MasterKey) -> Result<()>;
}

impl<T> KeyCustody for Arc<T>
where
    T: KeyCustody + ?Sized,
{
    fn load(&self) -> Result<Option<MasterKey>> {
        (**self).load()
    }

    fn store(&self, key: &MasterKey) -> Result<()> {
        (**self).store(key)
    }
}

impl<T> KeyCustody for Box<T>
where
    T: KeyCustody + ?Sized,
{
    fn load(&self) -> Result<Option<MasterKey>> {
        (**self).load()
    }

    fn store(&self, key: &MasterKey) -> Result<()> {
        (**self).store(key)
    }
}

/// Key file holding a single `FORGE_SECRETS_MASTER_KEY=<base64>` entry.
///
/// Readers take a shared advisory lock and writers an exclusive one. On unix the file
/// is created with mode `0600`.
#[derive(Debug, Clone)]
pub struct FileCustody {
    path: PathBuf,
}

impl FileCustody {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entry(&self, file: &File) -> Result<Option<MasterKey>> {
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line.map_err(|err| self.retrieval_error(err))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((name, value)) = line.split_once('=')
                && name.trim() == KEY_ENTRY
            {
                let bytes = STANDARD.decode(value.trim()).map_err(|_| {
                    Error::KeyRetrieval(format!(
                        "{} holds a malformed master key entry",
                        self.path.display()
                    ))
                })?;
                return Ok(Some(MasterKey::new(bytes)));
            }
        }
        Ok(None)
    }

    fn retrieval_error(&self, err: std::io::Error) -> Error {
        Error::KeyRetrieval(format!("{}: {err}", self.path.display()))
    }

    fn storage_error(&self, err: std::io::Error) -> Error {
        Error::KeyStorage(format!("{}: {err}", self.path.display()))
    }
}

impl KeyCustody for FileCustody {
    fn load(&self) -> Result<Option<MasterKey>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.retrieval_error(err)),
        };

        FileExt::lock_shared(&file).map_err(|err| self.retrieval_error(err))?;
        let result = self.read_entry(&file);
        let _ = FileExt::unlock(&file);
        result
    }

    fn store(&self, key: &MasterKey) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.storage_error(err))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(&self.path)
            .map_err(|err| self.storage_error(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|err| self.storage_error(err))?;
        }

        FileExt::lock_exclusive(&file).map_err(|err| self.storage_error(err))?;
        let result = (|| -> std::io::Result<()> {
            file.set_len(0)?;
            let mut writer = BufWriter::new(&file);
            writeln!(writer, "# forge-secrets master key; treat as secret")?;
            writeln!(writer, "{KEY_ENTRY}={}", STANDARD.encode(key.as_bytes()))?;
            writer.flush()?;
            drop(writer);
            file.sync_all()
        })();
        let _ = FileExt::unlock(&file);
        result.map_err(|err| self.storage_error(err))
    }
}

/// Process-local custody, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryCustody {
    key: Mutex<Option<MasterKey>>,
}

impl MemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: MasterKey) -> Self {
        Self {
            key: Mutex::new(Some(key)),
        }
    }
}

impl KeyCustody for MemoryCustody {
    fn load(&self) -> Result<Option<MasterKey>> {
        Ok(self.key.lock().clone())
    }

    fn store(&self, key: &MasterKey) -> Result<()> {
        *self.key.lock() = Some(key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_unprovisioned() {
        let dir = tempdir().unwrap();
        let custody = FileCustody::new(dir.path().join("absent.key"));
        assert_eq!(custody.load().unwrap(), None);
    }

    #[test]
    fn file_roundtrip_replaces_previous_key() {
        let dir = tempdir().unwrap();
        let custody = FileCustody::new(dir.path().join("nested").join("master.key"));

        custody.store(&MasterKey::new(vec![1; 32])).unwrap();
        custody.store(&MasterKey::new(vec![2; 16])).unwrap();

        let loaded = custody.load().unwrap().expect("stored key");
        assert_eq!(loaded.as_bytes(), &[2u8; 16]);

        let contents = fs::read_to_string(custody.path()).unwrap();
        assert_eq!(contents.matches(KEY_ENTRY).count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let custody = FileCustody::new(dir.path().join("master.key"));
        custody.store(&MasterKey::new(vec![3; 32])).unwrap();
        let mode = fs::metadata(custody.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn rotation_tightens_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        fs::write(&path, "# provisioned elsewhere\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        FileCustody::new(&path)
            .store(&MasterKey::new(vec![4; 32]))
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn malformed_entry_is_a_retrieval_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        fs::write(&path, format!("{KEY_ENTRY}=***not-base64***\n")).unwrap();

        let err = FileCustody::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::KeyRetrieval(_)));
    }

    #[test]
    fn file_without_entry_is_unprovisioned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        fs::write(&path, "# nothing here\nOTHER=value\n").unwrap();
        assert_eq!(FileCustody::new(&path).load().unwrap(), None);
    }

    #[test]
    fn memory_custody_roundtrip() {
        let custody = MemoryCustody::new();
        assert_eq!(custody.load().unwrap(), None);
        custody.store(&MasterKey::new(vec![9; 24])).unwrap();
        assert_eq!(custody.load().unwrap().unwrap().len(), 24);
    }
}
