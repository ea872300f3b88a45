//! Core data types for the zargo package manager.
//!
//! This crate defines the fundamental types that represent a zargo project:
//! manifest parsing, dependency source descriptors, and the edge types of the
//! resolved dependency graph.
//!
//! This crate is intentionally free of network I/O and threading.

/// File name of the project manifest.
pub const MANIFEST_NAME: &str = "zargo.toml";

/// File name of the lockfile written next to the manifest.
pub const LOCKFILE_NAME: &str = "zargo.lock";

/// File name of the generated Zig source exposing the dependency graph.
pub const DEPS_FILE_NAME: &str = "deps.zig";

/// Root path used for an exported package when the manifest leaves it unset.
pub const DEFAULT_EXPORT_ROOT: &str = "src/main.zig";

pub mod dependency;
pub mod graph;
pub mod project;
