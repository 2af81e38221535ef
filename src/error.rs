//! Error types for schema normalization, registration and bundling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while rewriting the references of a source namespace.
#[derive(Debug, Error)]
pub enum NormalizeError {
    // IO errors (exit code 3)
    #[error("namespace directory not found: {path}")]
    NamespaceNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON in {namespace}/{file}: {source}")]
    InvalidJson {
        namespace: String,
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{namespace}/{file} is not a JSON object")]
    NotAnObject { namespace: String, file: String },

    #[error("cannot rewrite reference \"{reference}\": {message}")]
    InvalidReference { reference: String, message: String },
}

impl NormalizeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NamespaceNotFound { .. } | Self::ReadError { .. } => 3, // IO
            _ => 2, // Parse error
        }
    }
}

/// Errors when storing or looking up registered documents.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("document has no string $id")]
    MissingId,

    #[error("schema not registered: {uri}")]
    NotFound { uri: String },

    #[error("fragment {fragment} not found in {uri}")]
    FragmentNotFound { uri: String, fragment: String },
}

/// Errors while bundling one entry point.
///
/// Each of these aborts only the entry point being bundled.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("root schema not registered: {uri}")]
    UnknownRoot { uri: String },

    #[error("unresolved reference {uri} (referenced from {referrer})")]
    Unresolved { uri: String, referrer: String },

    #[error("bundle for {uri} is not a valid schema: {message}")]
    InvalidSchema { uri: String, message: String },

    #[error("broken reference in {uri} at {pointer}: {message}")]
    BrokenReference {
        uri: String,
        pointer: String,
        message: String,
    },
}

/// Errors loading the build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ReadError { .. } => 3,
            Self::Parse { .. } => 2,
        }
    }
}

/// Fatal errors of a build run.
///
/// Per-file and per-entry-point failures are not fatal; they are recorded in the
/// build report instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove stale bundle {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize bundle {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(e) => e.exit_code(),
            Self::OutputDir { .. } | Self::WriteError { .. } | Self::RemoveStale { .. } => 3,
            Self::Serialize { .. } => 2,
        }
    }
}
