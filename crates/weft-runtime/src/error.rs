//! Federation runtime error types.

use std::path::PathBuf;

use weft_script::ScriptError;

/// Errors that can occur while loading and executing a script artifact.
///
/// All four kinds surface through the loader's returned future; nothing is
/// thrown past the public entry point.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Malformed or empty location specifier
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Local file does not exist
    #[error("File {0} does not exist")]
    NotFound(PathBuf),

    /// Network-level failure fetching a remote artifact
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    /// The loaded payload failed during evaluation
    #[error("Script execution error: {0}")]
    ExecutionFailure(#[from] ScriptError),

    /// IO error reading a local artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while materializing a bootstrap artifact.
///
/// A write failure is fatal to that bootstrap-generation attempt but never
/// leaves a partial cache entry behind.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Persistent storage unavailable or denied
    #[error("Cache write failed: {0}")]
    WriteFailure(#[from] std::io::Error),
}

/// Error reported by the build-integration collaborator.
#[derive(Debug, thiserror::Error)]
#[error("Integration error: {0}")]
pub struct IntegrationError(pub String);

/// Errors that can occur while applying the bootstrap injector.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}
