//! Git repository driver.
//!
//! Shells out to the `git` binary: clone into a staging directory under the
//! cache, check out the requested rev if any, pin the resulting commit with
//! `rev-parse`, then move the checkout to its final cache slot named after
//! that commit.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::SplitWhitespace;

use thiserror::Error;
use zargo_core::dependency::DepSource;

use crate::driver::{
    discover_deps, Entry, FetchContext, FetchError, FetchOutcome, QueueRow, SourceDriver,
};

/// A pinned git dependency: repository, requested rev, and exact commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitResolution {
    pub url: String,
    /// The rev as declared in the manifest; `None` means the default branch.
    pub rev: Option<String>,
    pub commit: String,
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("lockfile entry is missing fields (expected `git <url> <rev|-> <commit>`)")]
    MalformedEntry,

    #[error("git {op} failed for {url}: {message}")]
    Command {
        op: &'static str,
        url: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid manifest in {url}: {message}")]
    Manifest { url: String, message: String },

    #[error("offline mode: {url} is not in the cache")]
    Offline { url: String },

    #[error("descriptor is not a git repository")]
    SourceMismatch,
}

impl FetchError for GitError {}

pub struct GitDriver;

/// Repository stem for cache names: `https://host/x/args.git` -> `args`.
fn repo_stem(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    match trimmed.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg,
        _ => "repo",
    }
}

fn commit_basename(url: &str, commit: &str) -> String {
    let short = &commit[..commit.len().min(12)];
    format!("{}-{short}", repo_stem(url))
}

/// Run one git subcommand and capture its trimmed stdout.
///
/// Workers run with no terminal; a credential prompt from git would stall
/// the whole batch, so prompting is disabled and stdin closed — a repo that
/// needs interactive auth fails fast with git's own stderr as the message.
fn run_git(
    op: &'static str,
    url: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().map_err(|e| GitError::Command {
        op,
        url: url.to_string(),
        message: if e.kind() == io::ErrorKind::NotFound {
            "the `git` executable is not on PATH".to_string()
        } else {
            e.to_string()
        },
    })?;
    if !output.status.success() {
        return Err(GitError::Command {
            op,
            url: url.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl GitDriver {
    /// Clone and check out; returns the checkout's pinned commit, with the
    /// row's path and child deps filled in.
    fn clone_into_cache(
        ctx: &FetchContext,
        url: &str,
        checkout: Option<&str>,
        row: &mut QueueRow<Self>,
    ) -> Result<String, GitError> {
        if ctx.offline {
            return Err(GitError::Offline {
                url: url.to_string(),
            });
        }
        std::fs::create_dir_all(&ctx.cache_dir)?;

        let staging = tempfile::tempdir_in(&ctx.cache_dir)?;
        let checkout_dir = staging.path().join("repo");
        let checkout_str = checkout_dir.to_string_lossy().to_string();

        run_git("clone", url, &["clone", "--quiet", url, &checkout_str], None)?;
        if let Some(rev) = checkout {
            run_git(
                "checkout",
                url,
                &["checkout", "--quiet", "--detach", rev],
                Some(&checkout_dir),
            )?;
        }
        let commit = run_git("rev-parse", url, &["rev-parse", "HEAD"], Some(&checkout_dir))?;

        let dest = ctx.cache_dir.join(commit_basename(url, &commit));
        if dest.exists() {
            // Another rev of this repo already resolved to the same commit.
            std::fs::remove_dir_all(&checkout_dir)?;
        } else {
            std::fs::rename(&checkout_dir, &dest)?;
        }

        row.deps = discover_deps(&dest).map_err(|message| GitError::Manifest {
            url: url.to_string(),
            message,
        })?;
        row.path = Some(dest);
        Ok(commit)
    }

    fn try_fetch(
        ctx: &FetchContext,
        source: &DepSource,
        entries: &[Entry<GitResolution>],
        row: &mut QueueRow<Self>,
    ) -> Result<FetchOutcome<Self>, GitError> {
        let DepSource::Git { url, rev } = source else {
            return Err(GitError::SourceMismatch);
        };

        match Self::find_resolution(source, entries) {
            Some(ri) if entries[ri].is_fresh() => Ok(FetchOutcome::CopyDeps(ri)),
            Some(ri) => {
                let dir = Self::entry_path(ctx, &entries[ri].res);
                if dir.is_dir() {
                    row.deps = discover_deps(&dir).map_err(|message| GitError::Manifest {
                        url: url.clone(),
                        message,
                    })?;
                    Ok(FetchOutcome::ReplaceMe(ri))
                } else {
                    // Re-clone at the pinned commit, not the floating rev.
                    Self::clone_into_cache(ctx, url, Some(&entries[ri].res.commit), row)?;
                    Ok(FetchOutcome::FillResolution(ri))
                }
            }
            None => {
                let commit = Self::clone_into_cache(ctx, url, rev.as_deref(), row)?;
                Ok(FetchOutcome::NewEntry(GitResolution {
                    url: url.clone(),
                    rev: rev.clone(),
                    commit,
                }))
            }
        }
    }
}

impl SourceDriver for GitDriver {
    const NAME: &'static str = "git";
    type Resolution = GitResolution;
    type Error = GitError;

    fn parse_entry(fields: &mut SplitWhitespace<'_>) -> Result<GitResolution, GitError> {
        let url = fields.next().ok_or(GitError::MalformedEntry)?;
        let rev = fields.next().ok_or(GitError::MalformedEntry)?;
        let commit = fields.next().ok_or(GitError::MalformedEntry)?;
        Ok(GitResolution {
            url: url.to_string(),
            rev: (rev != "-").then(|| rev.to_string()),
            commit: commit.to_string(),
        })
    }

    fn write_entry(res: &GitResolution, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "git {} {} {}",
            res.url,
            res.rev.as_deref().unwrap_or("-"),
            res.commit
        )
    }

    fn find_resolution(source: &DepSource, entries: &[Entry<GitResolution>]) -> Option<usize> {
        let DepSource::Git { url, rev } = source else {
            return None;
        };
        entries
            .iter()
            .position(|e| e.res.url == *url && e.res.rev == *rev)
    }

    fn fetch(
        ctx: &FetchContext,
        dep_table: &[DepSource],
        entries: &[Entry<GitResolution>],
        row: &mut QueueRow<Self>,
    ) {
        let outcome = match Self::try_fetch(ctx, &dep_table[row.edge.to], entries, row) {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Err(e),
        };
        row.result = Some(outcome);
    }

    fn entry_path(ctx: &FetchContext, res: &GitResolution) -> PathBuf {
        ctx.cache_dir.join(commit_basename(&res.url, &res.commit))
    }

    fn cache_basename(res: &GitResolution) -> Option<String> {
        Some(commit_basename(&res.url, &res.commit))
    }
}
