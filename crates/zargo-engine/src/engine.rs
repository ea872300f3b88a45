//! The engine driver: lifecycle, the breadth-first batch loop, targeted
//! resolution invalidation, and the post-run cache GC.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use zargo_core::dependency::{DepSource, Dependency, SourceKind};
use zargo_core::graph::{Edge, Parent};
use zargo_core::project::Project;
use zargo_core::{DEPS_FILE_NAME, LOCKFILE_NAME, MANIFEST_NAME};
use zargo_sources::driver::{FetchContext, SourceDriver};
use zargo_sources::git::GitDriver;
use zargo_sources::local::LocalDriver;
use zargo_sources::pkg::PkgDriver;
use zargo_sources::url::UrlDriver;
use zargo_util::errors::ZargoError;

use crate::emit::{self, BuildPkg, GraphView};
use crate::queue::{FetchQueue, NextBuffer};
use crate::reconcile::{reconcile_source, FetchStats};
use crate::resolutions::Resolutions;

/// The resolve/fetch engine.
///
/// Owns every table of a run: the dependency table, the per-source
/// resolution tables, the fetch queue, the accumulated edge list, and the
/// paths map. Nothing is shared with callers; everything is released when
/// the engine drops.
pub struct Engine {
    project: Project,
    ctx: FetchContext,
    dep_table: Vec<DepSource>,
    edges: Vec<Edge>,
    paths: HashMap<usize, PathBuf>,
    resolutions: Resolutions,
    queue: FetchQueue,
    stats: FetchStats,
}

impl Engine {
    /// Build an engine from an already-parsed project, a fetch context, and
    /// the previous lockfile's text (empty for a first run).
    ///
    /// Seeds the dependency table and queue with the project's normal deps
    /// followed by its build deps, in manifest order.
    pub fn new(project: Project, ctx: FetchContext, lockfile_text: &str) -> miette::Result<Self> {
        let normal = project.normal_deps()?;
        let build = project.build_deps()?;

        let mut dep_table: Vec<DepSource> = Vec::with_capacity(normal.len() + build.len());
        let mut queue = FetchQueue::default();
        seed(&mut dep_table, &mut queue, Parent::RootNormal, normal);
        seed(&mut dep_table, &mut queue, Parent::RootBuild, build);

        let resolutions = Resolutions::parse(lockfile_text)?;

        Ok(Self {
            project,
            ctx,
            dep_table,
            edges: Vec::new(),
            paths: HashMap::new(),
            resolutions,
            queue,
            stats: FetchStats::default(),
        })
    }

    /// Build an engine for the project rooted at `project_root`, reading
    /// `zargo.toml` and `zargo.lock` from disk.
    pub fn load(project_root: &Path, offline: bool) -> miette::Result<Self> {
        let project = Project::from_path(&project_root.join(MANIFEST_NAME))?;
        let registry = project.package.registry.clone();
        let ctx = FetchContext::new(project_root.to_path_buf(), registry, offline)?;

        let lock_path = project_root.join(LOCKFILE_NAME);
        let lockfile_text = if lock_path.is_file() {
            std::fs::read_to_string(&lock_path).map_err(ZargoError::Io)?
        } else {
            String::new()
        };
        Self::new(project, ctx, &lockfile_text)
    }

    /// Resolve and fetch the full transitive closure.
    ///
    /// Loops batches until no row stages a child: spawn workers for the
    /// current queue, reconcile sequentially, promote the staged edges. A
    /// cycle check runs after every batch; the cache GC runs once at the
    /// end.
    pub fn fetch(&mut self) -> miette::Result<FetchStats> {
        while !self.queue.is_empty() {
            let mut next = NextBuffer::default();
            self.queue
                .parallel_fetch(&self.ctx, &self.dep_table, &self.resolutions);
            self.reconcile_batch(&mut next)?;
            self.check_cycles(&next)?;
            self.queue.clear_and_load(next);
        }
        self.stats.pruned = self.gc_cache()?;
        Ok(self.stats)
    }

    fn reconcile_batch(&mut self, next: &mut NextBuffer) -> miette::Result<()> {
        let mut explained = false;
        reconcile_source::<PkgDriver>(
            &self.ctx,
            &mut self.resolutions.pkg,
            &mut self.queue.pkg,
            &mut self.dep_table,
            next,
            &mut self.paths,
            &mut self.edges,
            &mut explained,
            &mut self.stats,
        )?;
        reconcile_source::<LocalDriver>(
            &self.ctx,
            &mut self.resolutions.local,
            &mut self.queue.local,
            &mut self.dep_table,
            next,
            &mut self.paths,
            &mut self.edges,
            &mut explained,
            &mut self.stats,
        )?;
        reconcile_source::<UrlDriver>(
            &self.ctx,
            &mut self.resolutions.url,
            &mut self.queue.url,
            &mut self.dep_table,
            next,
            &mut self.paths,
            &mut self.edges,
            &mut explained,
            &mut self.stats,
        )?;
        reconcile_source::<GitDriver>(
            &self.ctx,
            &mut self.resolutions.git,
            &mut self.queue.git,
            &mut self.dep_table,
            next,
            &mut self.paths,
            &mut self.edges,
            &mut explained,
            &mut self.stats,
        )?;
        if explained {
            return Err(ZargoError::Explained.into());
        }
        Ok(())
    }

    /// Abort if the graph known so far (accumulated edges plus the edges
    /// just staged) contains a cycle.
    ///
    /// The check is descriptor-keyed and runs every batch: a cyclic graph
    /// would otherwise re-expand itself forever through `copy_deps` and
    /// never reach a post-loop check.
    fn check_cycles(&self, next: &NextBuffer) -> miette::Result<()> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for edge in self.edges.iter().chain(next.iter()) {
            let Parent::Dep(parent_idx) = edge.from else {
                continue;
            };
            let from = node_for(&mut graph, &mut nodes, &self.dep_table[parent_idx]);
            let to = node_for(&mut graph, &mut nodes, &self.dep_table[edge.to]);
            if from == to {
                return Err(ZargoError::Cycle {
                    members: graph[from].clone(),
                }
                .into());
            }
            graph.add_edge(from, to, ());
        }

        for scc in tarjan_scc(&graph) {
            if scc.len() > 1 {
                let members = scc
                    .iter()
                    .map(|&i| graph[i].as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ZargoError::Cycle { members }.into());
            }
        }
        Ok(())
    }

    /// Delete cache subdirectories that no validated entry claims.
    ///
    /// Returns the number of directories removed. Non-directory children of
    /// the cache are left alone. Skipped wholesale on Windows, where
    /// recursive deletion of hidden/read-only entries misbehaves.
    pub fn gc_cache(&self) -> miette::Result<u32> {
        if cfg!(windows) {
            return Ok(0);
        }

        let mut live: HashSet<String> = HashSet::new();
        for entry in &self.resolutions.pkg.entries {
            if entry.is_fresh() {
                live.extend(PkgDriver::cache_basename(&entry.res));
            }
        }
        for entry in &self.resolutions.url.entries {
            if entry.is_fresh() {
                live.extend(UrlDriver::cache_basename(&entry.res));
            }
        }
        for entry in &self.resolutions.git.entries {
            if entry.is_fresh() {
                live.extend(GitDriver::cache_basename(&entry.res));
            }
        }

        let Ok(read_dir) = std::fs::read_dir(&self.ctx.cache_dir) else {
            return Ok(0);
        };
        let mut removed = 0u32;
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if !live.contains(&name) {
                tracing::debug!("pruning stale cache entry {name}");
                std::fs::remove_dir_all(&path).map_err(ZargoError::Io)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop the resolution entry behind a root dependency so the next fetch
    /// resolves it from scratch. Returns how many entries were removed.
    pub fn clear_resolution(&mut self, alias: &str) -> usize {
        let mut targets: Vec<usize> = Vec::new();
        collect_root_targets(&self.queue.pkg, alias, &mut targets);
        collect_root_targets(&self.queue.local, alias, &mut targets);
        collect_root_targets(&self.queue.url, alias, &mut targets);
        collect_root_targets(&self.queue.git, alias, &mut targets);

        let mut removed = 0;
        for dep_idx in targets {
            let source = &self.dep_table[dep_idx];
            let hit = match source.kind() {
                SourceKind::Pkg => PkgDriver::find_resolution(source, &self.resolutions.pkg.entries)
                    .map(|ri| drop_entry(&mut self.resolutions.pkg.entries, ri)),
                SourceKind::Local => {
                    LocalDriver::find_resolution(source, &self.resolutions.local.entries)
                        .map(|ri| drop_entry(&mut self.resolutions.local.entries, ri))
                }
                SourceKind::Url => {
                    UrlDriver::find_resolution(source, &self.resolutions.url.entries)
                        .map(|ri| drop_entry(&mut self.resolutions.url.entries, ri))
                }
                SourceKind::Git => {
                    GitDriver::find_resolution(source, &self.resolutions.git.entries)
                        .map(|ri| drop_entry(&mut self.resolutions.git.entries, ri))
                }
            };
            if hit.is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Write `zargo.lock` next to the manifest.
    pub fn write_lockfile(&self) -> miette::Result<()> {
        let path = self.ctx.project_root.join(LOCKFILE_NAME);
        std::fs::write(&path, self.lockfile_text()).map_err(ZargoError::Io)?;
        Ok(())
    }

    /// Write the generated `deps.zig` next to the manifest.
    pub fn write_deps_file(&self) -> miette::Result<()> {
        let path = self.ctx.project_root.join(DEPS_FILE_NAME);
        let mut buf = Vec::new();
        emit::write_deps_zig(&self.graph_view(), &mut buf).map_err(ZargoError::Io)?;
        std::fs::write(&path, buf).map_err(ZargoError::Io)?;
        Ok(())
    }

    /// The build-time dependency graph as an in-memory tree, for direct
    /// consumption by build tooling.
    pub fn build_deps(&self) -> Vec<BuildPkg> {
        emit::build_deps_tree(&self.graph_view())
    }

    pub fn graph_view(&self) -> GraphView<'_> {
        GraphView {
            edges: &self.edges,
            paths: &self.paths,
            exports: &self.project.exports,
        }
    }

    pub fn lockfile_text(&self) -> String {
        self.resolutions.to_text()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn paths(&self) -> &HashMap<usize, PathBuf> {
        &self.paths
    }

    pub fn dep_table(&self) -> &[DepSource] {
        &self.dep_table
    }

    pub fn resolutions(&self) -> &Resolutions {
        &self.resolutions
    }

    pub fn resolutions_mut(&mut self) -> &mut Resolutions {
        &mut self.resolutions
    }

    pub fn cache_dir(&self) -> &Path {
        &self.ctx.cache_dir
    }
}

fn seed(
    dep_table: &mut Vec<DepSource>,
    queue: &mut FetchQueue,
    parent: Parent,
    deps: Vec<Dependency>,
) {
    for dep in deps {
        let idx = dep_table.len();
        let kind = dep.source.kind();
        dep_table.push(dep.source);
        queue.push(
            kind,
            Edge {
                from: parent,
                to: idx,
                alias: dep.alias,
            },
        );
    }
}

fn node_for(
    graph: &mut DiGraph<String, ()>,
    nodes: &mut HashMap<String, NodeIndex>,
    source: &DepSource,
) -> NodeIndex {
    let key = format!("{} {}", source.kind(), source);
    *nodes
        .entry(key.clone())
        .or_insert_with(|| graph.add_node(key))
}

fn collect_root_targets<D: SourceDriver>(
    rows: &[zargo_sources::driver::QueueRow<D>],
    alias: &str,
    targets: &mut Vec<usize>,
) {
    for row in rows {
        if row.edge.from.is_root() && row.edge.alias == alias {
            targets.push(row.edge.to);
        }
    }
}

fn drop_entry<R>(entries: &mut Vec<zargo_sources::driver::Entry<R>>, ri: usize) {
    // Ordered remove: survivors keep their relative order.
    entries.remove(ri);
}
