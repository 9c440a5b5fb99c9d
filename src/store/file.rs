use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
};

use anyhow::{bail, Context, Result};

use super::BlobStore;

/// Stores each key as `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            bail!("invalid store key '{key}'");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl BlobStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read blob from {}", path.display()))
            }
        }
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write beside the target and rename so a crash never leaves half a blob.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, blob)
            .with_context(|| format!("Failed to write blob to {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("Failed to move blob into {}", path.display()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to remove blob {}", path.display()))
            }
        }
    }
}
