use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all zargo operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ZargoError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed manifest (e.g. zargo.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your zargo.toml for syntax errors"))]
    Manifest { message: String },

    /// A source driver failed to resolve or fetch a dependency.
    #[error("Failed to fetch `{alias}` ({source_name}): {message}")]
    Fetch {
        source_name: &'static str,
        alias: String,
        message: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected: {members}")]
    #[diagnostic(help("zargo cannot fetch mutually dependent packages"))]
    Cycle { members: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The failure was already reported to the user in full; callers must
    /// propagate the abort without printing further diagnostics.
    #[error("aborting due to previous errors")]
    Explained,

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type ZargoResult<T> = miette::Result<T>;
