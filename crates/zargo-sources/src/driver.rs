//! The capability contract every dependency source kind must satisfy.
//!
//! A driver owns everything source-specific: how its lockfile lines parse and
//! print, how a descriptor is matched against existing resolution entries,
//! and how a dependency is actually fetched onto disk. The engine composes
//! drivers without knowing any of those details.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::time::Duration;

use zargo_core::dependency::{DepSource, Dependency};
use zargo_core::graph::Edge;
use zargo_core::MANIFEST_NAME;
use zargo_core::project::Project;

use crate::download;
use crate::DEFAULT_REGISTRY;

/// Shared, read-only state handed to every fetch worker.
///
/// The HTTP client is `Sync` and shared across all workers of a run.
pub struct FetchContext {
    pub project_root: PathBuf,
    /// Cache root: `<project>/.zargo/deps/`, one subdirectory per artifact.
    pub cache_dir: PathBuf,
    /// Base URL of the package registry.
    pub registry: String,
    pub client: reqwest::blocking::Client,
    /// When set, drivers fail instead of touching the network.
    pub offline: bool,
}

impl FetchContext {
    pub fn new(
        project_root: PathBuf,
        registry: Option<String>,
        offline: bool,
    ) -> miette::Result<Self> {
        Ok(Self {
            cache_dir: project_root.join(".zargo").join("deps"),
            registry: registry.unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            client: download::build_client(Duration::from_secs(120))?,
            project_root,
            offline,
        })
    }
}

/// Classification hook for driver error kinds.
///
/// An "already explained" error was reported to the user in full (with
/// context) at the point of failure; callers propagate the abort without
/// printing anything further.
pub trait FetchError {
    fn already_explained(&self) -> bool {
        false
    }
}

/// A resolution entry: the driver-specific payload plus the engine-level
/// bookkeeping shared by every source.
///
/// `dep_idx == None` marks a stale entry: loaded from the lockfile but not
/// yet validated against this run. `deps` caches the child list discovered
/// when the entry was validated, so later encounters of the same dependency
/// can re-expand the subtree without refetching.
#[derive(Debug, Clone)]
pub struct Entry<R> {
    pub res: R,
    pub dep_idx: Option<usize>,
    pub deps: Vec<Dependency>,
}

impl<R> Entry<R> {
    /// An entry as loaded from the lockfile, before any validation.
    pub fn loaded(res: R) -> Self {
        Self {
            res,
            dep_idx: None,
            deps: Vec::new(),
        }
    }

    /// Whether the entry was validated during this run.
    pub fn is_fresh(&self) -> bool {
        self.dep_idx.is_some()
    }
}

/// What a fetch worker concluded about its row.
pub enum FetchOutcome<D: SourceDriver> {
    /// An equivalent live entry exists; point this dep at it.
    ReplaceMe(usize),
    /// A stale entry matched and was refetched; rebind it and mark it fresh.
    FillResolution(usize),
    /// A fresh entry matched; reuse its cached child list verbatim.
    CopyDeps(usize),
    /// No entry matched; a new resolution was produced.
    NewEntry(D::Resolution),
    /// Fetching failed; quarantined here until reconciliation.
    Err(D::Error),
}

/// One in-flight unit of work in the fetch queue.
///
/// During a batch the row is the exclusive writable region of exactly one
/// worker; everything else the worker sees is immutable.
pub struct QueueRow<D: SourceDriver> {
    pub edge: Edge,
    pub result: Option<FetchOutcome<D>>,
    /// Absolute location of the dependency's contents once known.
    pub path: Option<PathBuf>,
    /// Child dependencies discovered by the worker.
    pub deps: Vec<Dependency>,
}

impl<D: SourceDriver> QueueRow<D> {
    pub fn new(edge: Edge) -> Self {
        Self {
            edge,
            result: None,
            path: None,
            deps: Vec::new(),
        }
    }
}

/// The operations every dependency source kind provides.
///
/// Implementations are stateless unit structs; all state flows through the
/// arguments. `fetch` runs on worker threads and must observe the
/// disjointness rules documented on it; every other operation is
/// single-threaded.
pub trait SourceDriver: Sized {
    /// Driver name; doubles as the lockfile source tag.
    const NAME: &'static str;

    /// Source-specific lockfile entry payload.
    type Resolution: Send + Sync;

    /// Source-specific failure kinds, reported in-band through the row.
    type Error: std::error::Error + FetchError + Send;

    /// Consume one whitespace-tokenized lockfile line tail.
    ///
    /// On failure the caller drops the line and continues with the rest of
    /// the file.
    fn parse_entry(fields: &mut SplitWhitespace<'_>) -> Result<Self::Resolution, Self::Error>;

    /// Emit one entry as a single lockfile line, including the driver name
    /// prefix and the trailing newline.
    fn write_entry(res: &Self::Resolution, out: &mut dyn Write) -> io::Result<()>;

    /// Locate an entry equivalent to the given descriptor.
    fn find_resolution(source: &DepSource, entries: &[Entry<Self::Resolution>]) -> Option<usize>;

    /// Worker body: dedupe against `entries`, resolve, and fetch.
    ///
    /// Safe to call from many workers concurrently across different rows:
    /// reads `dep_table` and `entries` only, writes only `row`, never blocks
    /// on another row, and never panics — all failures land in
    /// `row.result = Err(..)`.
    fn fetch(
        ctx: &FetchContext,
        dep_table: &[DepSource],
        entries: &[Entry<Self::Resolution>],
        row: &mut QueueRow<Self>,
    );

    /// Where the entry's contents live on disk.
    fn entry_path(ctx: &FetchContext, res: &Self::Resolution) -> PathBuf;

    /// Cache directory basename for the entry, for sources that cache on
    /// disk. `None` exempts the source from cache GC.
    fn cache_basename(res: &Self::Resolution) -> Option<String>;
}

/// Read the child dependencies of a fetched package tree.
///
/// A missing manifest means the package has no dependencies. Only the
/// package's runtime `[dependencies]` are walked; its build-deps are its own
/// business.
pub fn discover_deps(dir: &Path) -> Result<Vec<Dependency>, String> {
    let manifest = dir.join(MANIFEST_NAME);
    if !manifest.is_file() {
        return Ok(Vec::new());
    }
    let project = Project::from_path(&manifest).map_err(|e| e.to_string())?;
    project.normal_deps().map_err(|e| e.to_string())
}
