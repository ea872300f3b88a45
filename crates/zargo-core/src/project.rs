use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dependency::{DepSpec, Dependency};
use crate::{DEFAULT_EXPORT_ROOT, MANIFEST_NAME};
use zargo_util::errors::ZargoError;

/// Walk upward from `start` to the nearest directory holding a `zargo.toml`.
///
/// Commands may run anywhere inside a project tree; the manifest's directory
/// is the root that everything else (lockfile, cache, generated deps file)
/// resolves against.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    while !dir.join(MANIFEST_NAME).is_file() {
        dir = dir.parent()?;
    }
    Some(dir.to_path_buf())
}

/// The parsed representation of a `zargo.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub package: PackageMetadata,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DepSpec>,

    #[serde(default, rename = "build-dependencies")]
    pub build_dependencies: BTreeMap<String, DepSpec>,

    /// Sub-packages this project exposes to its own dependents.
    #[serde(default)]
    pub exports: BTreeMap<String, ExportSpec>,
}

/// Package identity and metadata from the `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Override for the package registry base URL.
    #[serde(default)]
    pub registry: Option<String>,
}

/// An exported sub-package, either a bare root-file path or a detailed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportSpec {
    Path(String),
    Detailed {
        #[serde(default)]
        path: Option<String>,
    },
}

impl ExportSpec {
    /// The export's root source file, defaulting when unspecified.
    pub fn path_or_default(&self) -> &str {
        match self {
            ExportSpec::Path(p) => p,
            ExportSpec::Detailed { path: Some(p) } => p,
            ExportSpec::Detailed { path: None } => DEFAULT_EXPORT_ROOT,
        }
    }
}

impl Project {
    /// Load and parse a `zargo.toml` from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ZargoError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    /// Parse manifest TOML text.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            ZargoError::Manifest {
                message: format!("Failed to parse manifest: {e}"),
            }
            .into()
        })
    }

    /// The direct runtime dependencies, in manifest (alphabetical) order.
    pub fn normal_deps(&self) -> miette::Result<Vec<Dependency>> {
        collect_deps(&self.dependencies)
    }

    /// The direct build-time dependencies, in manifest (alphabetical) order.
    pub fn build_deps(&self) -> miette::Result<Vec<Dependency>> {
        collect_deps(&self.build_dependencies)
    }
}

fn collect_deps(map: &BTreeMap<String, DepSpec>) -> miette::Result<Vec<Dependency>> {
    let mut deps = Vec::with_capacity(map.len());
    for (alias, spec) in map {
        deps.push(Dependency {
            alias: alias.clone(),
            source: spec.clone().into_source()?,
        });
    }
    Ok(deps)
}
