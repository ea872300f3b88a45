use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zargo_util::errors::ZargoError;

/// A dependency specification as written in `zargo.toml`.
///
/// The distinguishing key (`pkg`, `local`, `url`, `git`) selects the source
/// kind; the remaining fields are kind-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepSpec {
    Pkg {
        /// Registry coordinates in `user/name` form.
        pkg: String,
        version: String,
    },
    Local {
        /// Path relative to the project root.
        local: String,
    },
    Url {
        url: String,
        #[serde(default)]
        sha256: Option<String>,
    },
    Git {
        git: String,
        /// Branch, tag, or commit to check out; repository default when unset.
        #[serde(default)]
        rev: Option<String>,
    },
}

impl DepSpec {
    /// Validate the spec and convert it into a runtime source descriptor.
    pub fn into_source(self) -> Result<DepSource, ZargoError> {
        match self {
            DepSpec::Pkg { pkg, version } => {
                let (user, name) = pkg.split_once('/').ok_or_else(|| ZargoError::Manifest {
                    message: format!("Package coordinates `{pkg}` must be `user/name`"),
                })?;
                if user.is_empty() || name.is_empty() || name.contains('/') {
                    return Err(ZargoError::Manifest {
                        message: format!("Package coordinates `{pkg}` must be `user/name`"),
                    });
                }
                let version =
                    semver::Version::parse(&version).map_err(|e| ZargoError::Manifest {
                        message: format!("Invalid version `{version}` for `{pkg}`: {e}"),
                    })?;
                Ok(DepSource::Pkg {
                    user: user.to_string(),
                    name: name.to_string(),
                    version,
                })
            }
            DepSpec::Local { local } => Ok(DepSource::Local {
                path: PathBuf::from(local),
            }),
            DepSpec::Url { url, sha256 } => Ok(DepSource::Url { url, sha256 }),
            DepSpec::Git { git, rev } => Ok(DepSource::Git { url: git, rev }),
        }
    }
}

/// Tag identifying one of the closed set of dependency source kinds.
///
/// The variant names double as the lockfile source tags and as driver names.
/// `ALL` fixes the iteration order used everywhere a run walks the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Pkg,
    Local,
    Url,
    Git,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Pkg,
        SourceKind::Local,
        SourceKind::Url,
        SourceKind::Git,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Pkg => "pkg",
            SourceKind::Local => "local",
            SourceKind::Url => "url",
            SourceKind::Git => "git",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved-at-parse-time dependency source descriptor.
///
/// This is the runtime form stored in the dependency table and handed to
/// source drivers; it never refers back to manifest text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepSource {
    Pkg {
        user: String,
        name: String,
        version: semver::Version,
    },
    Local {
        path: PathBuf,
    },
    Url {
        url: String,
        sha256: Option<String>,
    },
    Git {
        url: String,
        rev: Option<String>,
    },
}

impl DepSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            DepSource::Pkg { .. } => SourceKind::Pkg,
            DepSource::Local { .. } => SourceKind::Local,
            DepSource::Url { .. } => SourceKind::Url,
            DepSource::Git { .. } => SourceKind::Git,
        }
    }
}

impl fmt::Display for DepSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepSource::Pkg {
                user,
                name,
                version,
            } => write!(f, "{user}/{name}@{version}"),
            DepSource::Local { path } => write!(f, "{}", path.display()),
            DepSource::Url { url, .. } => f.write_str(url),
            DepSource::Git { url, rev } => match rev {
                Some(rev) => write!(f, "{url}#{rev}"),
                None => f.write_str(url),
            },
        }
    }
}

/// A declared requirement on another package: the local name a parent uses
/// for it plus where it comes from. Aliases are unique only within a single
/// parent's dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub alias: String,
    pub source: DepSource,
}
