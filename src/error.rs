/// Crate-level error types for fatal migration failures.
///
/// Problems inside a single document are never errors here: they become
/// [`crate::types::Issue`] values and the run continues. This enum covers the
/// conditions that abort the whole run.
use std::path::PathBuf;

/// Every variant names the file or directory involved so the rendered
/// diagnostic is actionable without a debugger.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An explicitly requested config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// The navigation file exists but does not have the expected shape.
    #[error("navigation file corrupt: {}: {reason}", path.display())]
    NavCorrupt {
        /// Path to the navigation file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The source root contains no version directories.
    #[error("no version roots under {}", path.display())]
    NoVersionRoots {
        /// Source root that was searched.
        path: PathBuf,
    },

    /// The output root (target, assets, or staging) cannot be created.
    #[error("cannot create output root {}: {source}", path.display())]
    OutputRootUnwritable {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The source root does not exist or is not a directory.
    #[error("source root not found: {}", path.display())]
    SourceRootNotFound {
        /// Path that was given on the command line.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// A version listed in the config points at a missing directory.
    #[error("version `{label}` not found: {}", path.display())]
    VersionNotFound {
        /// Version label from the config.
        label: String,
        /// Directory that was expected.
        path: PathBuf,
    },
}
