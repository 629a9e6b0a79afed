//! Content-addressed materialization of bootstrap artifacts.
//!
//! The hash is a pure function of the container name and the generated
//! text, so equal cache paths always hold identical bytes. Concurrent
//! writers computing the same hash write the same content; the existence
//! check only avoids redundant writes, it is not a lock.

use std::fs;
use std::path::{Path, PathBuf};

use data_encoding::BASE64;
use sha2::{Digest, Sha256};

use crate::container::RuntimePluginRef;
use crate::error::CacheError;
use crate::template::render_bootstrap;

/// Where a materialized bootstrap artifact can be loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Content-addressed file under the temp directory.
    File(PathBuf),
    /// Self-contained `data:` artifact; the content is the location.
    DataUri(String),
}

impl ArtifactLocation {
    pub fn as_file(&self) -> Option<&Path> {
        match self {
            ArtifactLocation::File(path) => Some(path),
            ArtifactLocation::DataUri(_) => None,
        }
    }

    /// The string form handed to the build-integration collaborator.
    pub fn reference(&self) -> String {
        match self {
            ArtifactLocation::File(path) => path.to_string_lossy().into_owned(),
            ArtifactLocation::DataUri(uri) => uri.clone(),
        }
    }
}

/// A generated bootstrap together with its content address.
///
/// Invariant: `hash` is computed over `"{name} {content}"`, so two
/// descriptors with equal hash have byte-identical content.
#[derive(Debug, Clone)]
pub struct BootstrapDescriptor {
    pub hash: String,
    pub content: String,
    pub location: ArtifactLocation,
}

/// Compute the content hash for a bootstrap.
pub fn entry_hash(container_name: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(container_name.as_bytes());
    hasher.update(b" ");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Writes bootstrap artifacts to a content-addressed location, or encodes
/// them inline when no persistent storage is wanted.
#[derive(Debug, Clone)]
pub struct Materializer {
    temp_dir: PathBuf,
}

impl Default for Materializer {
    fn default() -> Self {
        Materializer::new(std::env::temp_dir().join("weft-federation"))
    }
}

impl Materializer {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Materializer {
        Materializer {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Cache path for a given content hash.
    pub fn entry_path(&self, hash: &str) -> PathBuf {
        self.temp_dir.join(format!("entry.{}.js", hash))
    }

    /// Generate and materialize the bootstrap for a container.
    ///
    /// In inline mode the text is encoded as a base64 data artifact and no
    /// storage is touched. Otherwise the file is written only if absent;
    /// the write goes through a temporary file and a rename, so a failure
    /// never leaves a partial cache entry.
    pub fn materialize(
        &self,
        container_name: &str,
        runtime_plugins: &[RuntimePluginRef],
        runtime_impl_path: &str,
        inline: bool,
    ) -> Result<BootstrapDescriptor, CacheError> {
        let content = render_bootstrap(runtime_plugins, runtime_impl_path);
        let hash = entry_hash(container_name, &content);

        if inline {
            let uri = format!(
                "data:text/javascript;charset=utf-8;base64,{}",
                BASE64.encode(content.as_bytes())
            );
            return Ok(BootstrapDescriptor {
                hash,
                content,
                location: ArtifactLocation::DataUri(uri),
            });
        }

        let path = self.entry_path(&hash);
        if !path.exists() {
            fs::create_dir_all(&self.temp_dir)?;
            let staging = self.temp_dir.join(format!(".entry.{}.tmp", hash));
            write_atomic(&staging, &path, &content)?;
        }

        Ok(BootstrapDescriptor {
            hash,
            content,
            location: ArtifactLocation::File(path),
        })
    }
}

/// Write through a staging file and rename into place. On failure the
/// staging file is removed, so the cache directory never accumulates
/// orphaned `.tmp` entries.
fn write_atomic(staging: &Path, path: &Path, content: &str) -> std::io::Result<()> {
    let result = fs::write(staging, content).and_then(|_| fs::rename(staging, path));
    if result.is_err() {
        let _ = fs::remove_file(staging);
    }
    result
}
