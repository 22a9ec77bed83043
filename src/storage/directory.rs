//! A filesystem backed catalog
//!
//! The [`Directory`] keeps a catalog in a root directory holding a
//! `config.toml` and a `catalog.yaml` snapshot. It is a wrapper around the
//! filesystem agnostic [`Catalog`].

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    domain::{Catalog, Config},
    storage::snapshot::{Snapshot, SnapshotError},
};

/// Name of the configuration file in the root directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the catalog snapshot in the root directory.
pub const CATALOG_FILE: &str = "catalog.yaml";

/// A directory whose catalog has been read into memory.
#[derive(Debug)]
pub struct Loaded {
    catalog: Catalog,
    config: Config,
}

/// A directory that has not been read yet.
#[derive(Debug, PartialEq, Eq)]
pub struct Unloaded;

/// A filesystem backed catalog.
#[derive(Debug)]
pub struct Directory<S> {
    /// The root of the directory the catalog is stored in.
    root: PathBuf,
    state: S,
}

impl<S> Directory<S> {
    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Directory<Unloaded> {
    /// Opens a directory at the given path.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self {
            root,
            state: Unloaded,
        }
    }

    /// Reads the configuration and the catalog snapshot.
    ///
    /// A missing configuration falls back to the defaults and a missing
    /// snapshot is an empty catalog.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot exists but cannot be read, parsed or restored.
    pub fn load(self) -> Result<Directory<Loaded>, LoadError> {
        let config = load_config(&self.root);
        let path = self.root.join(CATALOG_FILE);

        let catalog = match fs::read_to_string(&path) {
            Ok(content) => {
                let snapshot: Snapshot = serde_yaml::from_str(&content)?;
                let catalog = snapshot.restore()?;
                tracing::debug!(
                    subjects = catalog.len(),
                    "Loaded catalog from {}",
                    path.display()
                );
                catalog
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No catalog at {}, starting empty", path.display());
                Catalog::default()
            }
            Err(e) => return Err(LoadError::Io(e)),
        };

        Ok(Directory {
            root: self.root,
            state: Loaded { catalog, config },
        })
    }
}

impl Directory<Loaded> {
    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.state.config
    }

    /// The catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    /// Mutable access to the catalog. Changes are kept in memory until
    /// [`flush`](Self::flush).
    pub const fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.state.catalog
    }

    /// Writes the catalog snapshot back to disk.
    ///
    /// The snapshot is written to a temporary file first and then renamed
    /// over the old one.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be serialized or written.
    pub fn flush(&self) -> Result<(), FlushError> {
        let path = self.root.join(CATALOG_FILE);
        let tmp = path.with_extension("yaml.tmp");

        let content = serde_yaml::to_string(&Snapshot::capture(&self.state.catalog))?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(
            subjects = self.state.catalog.len(),
            "Wrote catalog to {}",
            path.display()
        );
        Ok(())
    }
}

/// Errors that can occur when loading a directory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The snapshot could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] io::Error),
    /// The snapshot is not valid YAML.
    #[error("failed to parse catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The snapshot does not describe a valid catalog.
    #[error("inconsistent catalog: {0}")]
    Inconsistent(#[from] SnapshotError),
}

/// Errors that can occur when writing a directory.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    /// The snapshot could not be written.
    #[error("failed to write catalog: {0}")]
    Io(#[from] io::Error),
    /// The snapshot could not be serialized.
    #[error("failed to serialize catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Reads `config.toml` from the root, falling back to the defaults.
#[must_use]
pub fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}
