//! Registry package driver.
//!
//! Packages are addressed as `user/name@version` and fetched as zip archives
//! from the configured registry. The archive's SHA-256 is pinned in the
//! lockfile and re-verified whenever the artifact has to be downloaded again.

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::SplitWhitespace;

use thiserror::Error;
use zargo_core::dependency::DepSource;
use zargo_util::hash::{digest_eq, sha256_hex};

use crate::archive::{self, ArchiveError};
use crate::download::{self, DownloadError};
use crate::driver::{
    discover_deps, Entry, FetchContext, FetchError, FetchOutcome, QueueRow, SourceDriver,
};

/// A pinned registry package: exact coordinates plus archive integrity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgResolution {
    pub user: String,
    pub name: String,
    pub version: semver::Version,
    pub sha256: String,
}

impl PkgResolution {
    fn coords(&self) -> String {
        format!("{}/{}@{}", self.user, self.name, self.version)
    }
}

#[derive(Debug, Error)]
pub enum PkgError {
    #[error("lockfile entry is missing fields (expected `pkg <user> <name> <version> <sha256>`)")]
    MalformedEntry,

    #[error("invalid version in lockfile entry: {0}")]
    BadVersion(#[from] semver::Error),

    #[error("package {coords} not found in registry")]
    NotFound { coords: String },

    #[error(transparent)]
    Network(#[from] DownloadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid manifest in {coords}: {message}")]
    Manifest { coords: String, message: String },

    #[error("checksum mismatch for {coords}")]
    ChecksumMismatch { coords: String },

    #[error("offline mode: {coords} is not in the cache")]
    Offline { coords: String },

    #[error("descriptor is not a registry package")]
    SourceMismatch,
}

impl FetchError for PkgError {
    fn already_explained(&self) -> bool {
        // The mismatch site logs both digests before reporting.
        matches!(self, PkgError::ChecksumMismatch { .. })
    }
}

pub struct PkgDriver;

impl PkgDriver {
    fn archive_url(ctx: &FetchContext, user: &str, name: &str, version: &semver::Version) -> String {
        format!("{}/pkg/{user}/{name}/{version}.zip", ctx.registry)
    }

    /// Download, verify, and unpack the archive; fills the row's path and
    /// child deps. Returns the archive's SHA-256.
    fn download_into_cache(
        ctx: &FetchContext,
        user: &str,
        name: &str,
        version: &semver::Version,
        pinned_sha256: Option<&str>,
        row: &mut QueueRow<Self>,
    ) -> Result<String, PkgError> {
        let coords = format!("{user}/{name}@{version}");
        if ctx.offline {
            return Err(PkgError::Offline { coords });
        }

        let url = Self::archive_url(ctx, user, name, version);
        let bytes = download::download_bytes(&ctx.client, &url)?
            .ok_or(PkgError::NotFound { coords: coords.clone() })?;

        let sha256 = sha256_hex(&bytes);
        if let Some(expected) = pinned_sha256 {
            if !digest_eq(expected, &sha256) {
                tracing::error!(
                    "checksum mismatch for {coords}: lockfile pins {expected}, registry served {sha256}; \
                     refusing to unpack"
                );
                return Err(PkgError::ChecksumMismatch { coords });
            }
        }

        // Unpack into a staging directory first: another worker in the same
        // batch may be fetching the same coordinates.
        std::fs::create_dir_all(&ctx.cache_dir)?;
        let staging = tempfile::tempdir_in(&ctx.cache_dir)?;
        let unpacked = staging.path().join("pkg");
        archive::unpack_zip(&bytes, &unpacked)?;

        let dir = ctx.cache_dir.join(format!("{user}-{name}-{version}"));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        if std::fs::rename(&unpacked, &dir).is_err() && !dir.is_dir() {
            return Err(PkgError::Io(io::Error::other(format!(
                "failed to move unpacked archive into {}",
                dir.display()
            ))));
        }

        row.deps = discover_deps(&dir).map_err(|message| PkgError::Manifest {
            coords,
            message,
        })?;
        row.path = Some(dir);
        Ok(sha256)
    }

    fn try_fetch(
        ctx: &FetchContext,
        source: &DepSource,
        entries: &[Entry<PkgResolution>],
        row: &mut QueueRow<Self>,
    ) -> Result<FetchOutcome<Self>, PkgError> {
        let DepSource::Pkg {
            user,
            name,
            version,
        } = source
        else {
            return Err(PkgError::SourceMismatch);
        };

        match Self::find_resolution(source, entries) {
            Some(ri) if entries[ri].is_fresh() => Ok(FetchOutcome::CopyDeps(ri)),
            Some(ri) => {
                let dir = Self::entry_path(ctx, &entries[ri].res);
                if dir.is_dir() {
                    row.deps = discover_deps(&dir).map_err(|message| PkgError::Manifest {
                        coords: entries[ri].res.coords(),
                        message,
                    })?;
                    Ok(FetchOutcome::ReplaceMe(ri))
                } else {
                    Self::download_into_cache(
                        ctx,
                        user,
                        name,
                        version,
                        Some(&entries[ri].res.sha256),
                        row,
                    )?;
                    Ok(FetchOutcome::FillResolution(ri))
                }
            }
            None => {
                let sha256 = Self::download_into_cache(ctx, user, name, version, None, row)?;
                Ok(FetchOutcome::NewEntry(PkgResolution {
                    user: user.clone(),
                    name: name.clone(),
                    version: version.clone(),
                    sha256,
                }))
            }
        }
    }
}

impl SourceDriver for PkgDriver {
    const NAME: &'static str = "pkg";
    type Resolution = PkgResolution;
    type Error = PkgError;

    fn parse_entry(fields: &mut SplitWhitespace<'_>) -> Result<PkgResolution, PkgError> {
        let user = fields.next().ok_or(PkgError::MalformedEntry)?;
        let name = fields.next().ok_or(PkgError::MalformedEntry)?;
        let version = fields.next().ok_or(PkgError::MalformedEntry)?;
        let sha256 = fields.next().ok_or(PkgError::MalformedEntry)?;
        Ok(PkgResolution {
            user: user.to_string(),
            name: name.to_string(),
            version: semver::Version::parse(version)?,
            sha256: sha256.to_string(),
        })
    }

    fn write_entry(res: &PkgResolution, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "pkg {} {} {} {}",
            res.user, res.name, res.version, res.sha256
        )
    }

    fn find_resolution(source: &DepSource, entries: &[Entry<PkgResolution>]) -> Option<usize> {
        let DepSource::Pkg {
            user,
            name,
            version,
        } = source
        else {
            return None;
        };
        entries.iter().position(|e| {
            e.res.user == *user && e.res.name == *name && e.res.version == *version
        })
    }

    fn fetch(
        ctx: &FetchContext,
        dep_table: &[DepSource],
        entries: &[Entry<PkgResolution>],
        row: &mut QueueRow<Self>,
    ) {
        let outcome = match Self::try_fetch(ctx, &dep_table[row.edge.to], entries, row) {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Err(e),
        };
        row.result = Some(outcome);
    }

    fn entry_path(ctx: &FetchContext, res: &PkgResolution) -> PathBuf {
        ctx.cache_dir
            .join(format!("{}-{}-{}", res.user, res.name, res.version))
    }

    fn cache_basename(res: &PkgResolution) -> Option<String> {
        Some(format!("{}-{}-{}", res.user, res.name, res.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<PkgResolution, PkgError> {
        PkgDriver::parse_entry(&mut line.split_whitespace())
    }

    #[test]
    fn entry_line_round_trip() {
        let res = parse("u a 1.0.0 deadbeef").unwrap();
        assert_eq!(res.coords(), "u/a@1.0.0");

        let mut out = Vec::new();
        PkgDriver::write_entry(&res, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "pkg u a 1.0.0 deadbeef\n");
    }

    #[test]
    fn truncated_entry_is_rejected() {
        assert!(matches!(parse("u a"), Err(PkgError::MalformedEntry)));
    }

    #[test]
    fn bad_version_is_rejected() {
        assert!(matches!(parse("u a one deadbeef"), Err(PkgError::BadVersion(_))));
    }

    #[test]
    fn find_matches_exact_coordinates() {
        let entries = vec![Entry::loaded(parse("u a 1.0.0 aa").unwrap())];
        let hit = DepSource::Pkg {
            user: "u".into(),
            name: "a".into(),
            version: semver::Version::new(1, 0, 0),
        };
        let miss = DepSource::Pkg {
            user: "u".into(),
            name: "a".into(),
            version: semver::Version::new(2, 0, 0),
        };
        assert_eq!(PkgDriver::find_resolution(&hit, &entries), Some(0));
        assert_eq!(PkgDriver::find_resolution(&miss, &entries), None);
    }
}
