//! Dependency source drivers for the zargo package manager.
//!
//! The engine is polymorphic over a closed set of dependency source kinds
//! (registry package, local path, remote archive URL, git repository). This
//! crate defines the capability contract every kind must satisfy
//! ([`driver::SourceDriver`]) and the four concrete drivers. The engine
//! itself never talks to the network or the cache directly; everything goes
//! through a driver.

/// Default package registry queried by the `pkg` driver.
pub const DEFAULT_REGISTRY: &str = "https://packages.zargo.dev";

pub mod archive;
pub mod driver;
pub mod download;
pub mod git;
pub mod local;
pub mod pkg;
pub mod url;
