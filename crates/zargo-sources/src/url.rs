//! Remote archive URL driver.
//!
//! A URL dependency names an archive (or a single file) directly. The first
//! fetch records the content's SHA-256 in the lockfile; later fetches verify
//! against that pin, or against an explicit `sha256` in the manifest.

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

/// A pinned URL dependency: the resolved URL plus content integrity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolution {
    pub url: String,
    pub sha256: String,
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("lockfile entry is missing fields (expected `url <url> <sha256>`)")]
    MalformedEntry,

    #[error("nothing found at {url}")]
    NotFound { url: String },

    #[error(transparent)]
    Network(#[from] DownloadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid manifest in contents of {url}: {message}")]
    Manifest { url: String, message: String },

    #[error("checksum mismatch for {url}")]
    ChecksumMismatch { url: String },

    #[error("offline mode: {url} is not in the cache")]
    Offline { url: String },

    #[error("descriptor is not a URL")]
    SourceMismatch,
}

impl FetchError for UrlError {
    fn already_explained(&self) -> bool {
        // The mismatch site logs both digests before reporting.
        matches!(self, UrlError::ChecksumMismatch { .. })
    }
}

pub struct UrlDriver;

/// Cache basename for a URL: a short digest of the URL itself, so the name
/// stays stable regardless of what the content hashes to.
fn url_basename(url: &str) -> String {
    format!("url-{}", &sha256_hex(url.as_bytes())[..12])
}

/// Last path segment of the URL, for single-file downloads.
fn url_filename(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    match rest.rsplit('/').next() {
        Some(seg) if !seg.is_empty() && seg != rest => seg,
        _ => "download",
    }
}

impl UrlDriver {
    fn download_into_cache(
        ctx: &FetchContext,
        url: &str,
        pinned_sha256: Option<&str>,
        row: &mut QueueRow<Self>,
    ) -> Result<String, UrlError> {
        if ctx.offline {
            return Err(UrlError::Offline {
                url: url.to_string(),
            });
        }

        let bytes = download::download_bytes(&ctx.client, url)?.ok_or(UrlError::NotFound {
            url: url.to_string(),
        })?;

        let sha256 = sha256_hex(&bytes);
        if let Some(expected) = pinned_sha256 {
            if !digest_eq(expected, &sha256) {
                tracing::error!(
                    "checksum mismatch for {url}: expected {expected}, got {sha256}; \
                     refusing to unpack"
                );
                return Err(UrlError::ChecksumMismatch {
                    url: url.to_string(),
                });
            }
        }

        // Unpack into a staging directory first: another worker in the same
        // batch may be fetching the same URL.
        std::fs::create_dir_all(&ctx.cache_dir)?;
        let staging = tempfile::tempdir_in(&ctx.cache_dir)?;
        let unpacked = staging.path().join("pkg");
        if url.ends_with(".zip") {
            archive::unpack_zip(&bytes, &unpacked)?;
        } else {
            std::fs::create_dir_all(&unpacked)?;
            std::fs::write(unpacked.join(url_filename(url)), &bytes)?;
        }

        let dir = ctx.cache_dir.join(url_basename(url));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        if std::fs::rename(&unpacked, &dir).is_err() && !dir.is_dir() {
            return Err(UrlError::Io(io::Error::other(format!(
                "failed to move downloaded contents into {}",
                dir.display()
            ))));
        }

        row.deps = discover_deps(&dir).map_err(|message| UrlError::Manifest {
            url: url.to_string(),
            message,
        })?;
        row.path = Some(dir);
        Ok(sha256)
    }

    fn try_fetch(
        ctx: &FetchContext,
        source: &DepSource,
        entries: &[Entry<UrlResolution>],
        row: &mut QueueRow<Self>,
    ) -> Result<FetchOutcome<Self>, UrlError> {
        let DepSource::Url { url, sha256 } = source else {
            return Err(UrlError::SourceMismatch);
        };

        match Self::find_resolution(source, entries) {
            Some(ri) if entries[ri].is_fresh() => Ok(FetchOutcome::CopyDeps(ri)),
            Some(ri) => {
                let dir = Self::entry_path(ctx, &entries[ri].res);
                if dir.is_dir() {
                    row.deps = discover_deps(&dir).map_err(|message| UrlError::Manifest {
                        url: url.clone(),
                        message,
                    })?;
                    Ok(FetchOutcome::ReplaceMe(ri))
                } else {
                    Self::download_into_cache(ctx, url, Some(&entries[ri].res.sha256), row)?;
                    Ok(FetchOutcome::FillResolution(ri))
                }
            }
            None => {
                let sha256 = Self::download_into_cache(ctx, url, sha256.as_deref(), row)?;
                Ok(FetchOutcome::NewEntry(UrlResolution {
                    url: url.clone(),
                    sha256,
                }))
            }
        }
    }
}

impl SourceDriver for UrlDriver {
    const NAME: &'static str = "url";
    type Resolution = UrlResolution;
    type Error = UrlError;

    fn parse_entry(fields: &mut SplitWhitespace<'_>) -> Result<UrlResolution, UrlError> {
        let url = fields.next().ok_or(UrlError::MalformedEntry)?;
        let sha256 = fields.next().ok_or(UrlError::MalformedEntry)?;
        Ok(UrlResolution {
            url: url.to_string(),
            sha256: sha256.to_string(),
        })
    }

    fn write_entry(res: &UrlResolution, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "url {} {}", res.url, res.sha256)
    }

    fn find_resolution(source: &DepSource, entries: &[Entry<UrlResolution>]) -> Option<usize> {
        let DepSource::Url { url, .. } = source else {
            return None;
        };
        entries.iter().position(|e| e.res.url == *url)
    }

    fn fetch(
        ctx: &FetchContext,
        dep_table: &[DepSource],
        entries: &[Entry<UrlResolution>],
        row: &mut QueueRow<Self>,
    ) {
        let outcome = match Self::try_fetch(ctx, &dep_table[row.edge.to], entries, row) {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Err(e),
        };
        row.result = Some(outcome);
    }

    fn entry_path(ctx: &FetchContext, res: &UrlResolution) -> PathBuf {
        ctx.cache_dir.join(url_basename(&res.url))
    }

    fn cache_basename(res: &UrlResolution) -> Option<String> {
        Some(url_basename(&res.url))
    }
}
