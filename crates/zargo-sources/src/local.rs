//! Local path driver.
//!
//! Local dependencies live inside (or alongside) the project tree and are
//! never copied into the cache; the resolved path is used in place. The
//! lockfile records the declared path so the entry survives across runs.

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::SplitWhitespace;

use thiserror::Error;
use zargo_core::dependency::DepSource;

use crate::driver::{
    discover_deps, Entry, FetchContext, FetchError, FetchOutcome, QueueRow, SourceDriver,
};

/// A validated local dependency, keyed by its declared path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResolution {
    pub path: String,
}

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("lockfile entry is missing its path (expected `local <path>`)")]
    MalformedEntry,

    #[error("local dependency `{path}` does not exist or is not a directory")]
    Missing { path: String },

    #[error("invalid manifest in `{path}`: {message}")]
    Manifest { path: String, message: String },

    #[error("descriptor is not a local path")]
    SourceMismatch,
}

impl FetchError for LocalError {}

pub struct LocalDriver;

impl LocalDriver {
    fn try_fetch(
        ctx: &FetchContext,
        source: &DepSource,
        entries: &[Entry<LocalResolution>],
        row: &mut QueueRow<Self>,
    ) -> Result<FetchOutcome<Self>, LocalError> {
        let DepSource::Local { path } = source else {
            return Err(LocalError::SourceMismatch);
        };
        let declared = path.to_string_lossy().to_string();

        if let Some(ri) = Self::find_resolution(source, entries) {
            if entries[ri].is_fresh() {
                return Ok(FetchOutcome::CopyDeps(ri));
            }
        }

        let dir = ctx.project_root.join(path);
        if !dir.is_dir() {
            return Err(LocalError::Missing { path: declared });
        }
        row.deps = discover_deps(&dir).map_err(|message| LocalError::Manifest {
            path: declared.clone(),
            message,
        })?;
        row.path = Some(dir);

        match Self::find_resolution(source, entries) {
            Some(ri) => Ok(FetchOutcome::ReplaceMe(ri)),
            None => Ok(FetchOutcome::NewEntry(LocalResolution { path: declared })),
        }
    }
}

impl SourceDriver for LocalDriver {
    const NAME: &'static str = "local";
    type Resolution = LocalResolution;
    type Error = LocalError;

    fn parse_entry(fields: &mut SplitWhitespace<'_>) -> Result<LocalResolution, LocalError> {
        let path = fields.next().ok_or(LocalError::MalformedEntry)?;
        Ok(LocalResolution {
            path: path.to_string(),
        })
    }

    fn write_entry(res: &LocalResolution, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "local {}", res.path)
    }

    fn find_resolution(source: &DepSource, entries: &[Entry<LocalResolution>]) -> Option<usize> {
        let DepSource::Local { path } = source else {
            return None;
        };
        let declared = path.to_string_lossy();
        entries.iter().position(|e| e.res.path == declared)
    }

    fn fetch(
        ctx: &FetchContext,
        dep_table: &[DepSource],
        entries: &[Entry<LocalResolution>],
        row: &mut QueueRow<Self>,
    ) {
        let outcome = match Self::try_fetch(ctx, &dep_table[row.edge.to], entries, row) {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Err(e),
        };
        row.result = Some(outcome);
    }

    fn entry_path(ctx: &FetchContext, res: &LocalResolution) -> PathBuf {
        ctx.project_root.join(&res.path)
    }

    fn cache_basename(_res: &LocalResolution) -> Option<String> {
        None
    }
}
