//! Key-material sources.
//!
//! Remote distribution is someone else's job; a [`KeySource`] only hands back
//! whatever `(id, seed)` records are available locally right now.

use std::fs;
use std::path::{Path, PathBuf};

use crate::certs::Certificate;
use crate::error::Result;

/// File extension of on-disk certificate records.
pub const CERT_EXTENSION: &str = "cat";

/// Supplier of refreshed certificate records.
pub trait KeySource: Send + Sync {
    /// Return the full current set of records.
    fn fetch(&self) -> Result<Vec<Certificate>>;
}

/// Directory of `<name>.cat` files, each holding `{"id": ..., "seed": ...}`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// Read certificates from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_one(path: &Path) -> Result<Certificate> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeySource for DirectorySource {
    fn fetch(&self) -> Result<Vec<Certificate>> {
        let mut certs = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CERT_EXTENSION) {
                continue;
            }

            match Self::read_one(&path) {
                Ok(cert) => certs.push(cert),
                Err(e) => {
                    tracing::warn!("Skipping certificate {}: {}", path.display(), e);
                }
            }
        }

        Ok(certs)
    }
}

/// Fixed in-memory set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    certs: Vec<Certificate>,
}

impl StaticSource {
    /// Serve `certs` on every fetch.
    pub fn new(certs: Vec<Certificate>) -> Self {
        Self { certs }
    }
}

impl KeySource for StaticSource {
    fn fetch(&self) -> Result<Vec<Certificate>> {
        Ok(self.certs.clone())
    }
}
