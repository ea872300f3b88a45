//! Sequential reconciliation of a batch's worker results.
//!
//! Runs once per source after that batch's workers have joined, visiting
//! rows in stable row-index order so the outcome never depends on worker
//! completion order. Folds results into the resolutions store, records
//! paths, stages discovered children, and appends the batch's edges to the
//! engine's accumulated edge list.

use std::collections::HashMap;
use std::path::PathBuf;

use zargo_core::dependency::DepSource;
use zargo_core::graph::{Edge, Parent};
use zargo_sources::driver::{
    Entry, FetchContext, FetchError, FetchOutcome, QueueRow, SourceDriver,
};
use zargo_util::errors::ZargoError;

use crate::queue::NextBuffer;
use crate::resolutions::Table;

/// Running totals reported back to the caller after a fetch.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchStats {
    /// Dependency instances processed (one per edge).
    pub resolved: usize,
    /// Entries fetched over the wire or from disk this run.
    pub downloaded: usize,
    /// Entries satisfied from the lockfile or an earlier row.
    pub reused: usize,
    /// Cache subdirectories removed by the post-run GC.
    pub pruned: u32,
}

/// Fold one source's queue rows back into its table.
///
/// Non-Explained worker errors abort immediately; Explained ones only raise
/// the caller's sticky flag so every independent failure of the batch gets
/// surfaced before the abort.
#[allow(clippy::too_many_arguments)]
pub fn reconcile_source<D: SourceDriver>(
    ctx: &FetchContext,
    table: &mut Table<D>,
    rows: &mut [QueueRow<D>],
    dep_table: &mut Vec<DepSource>,
    next: &mut NextBuffer,
    paths: &mut HashMap<usize, PathBuf>,
    edges: &mut Vec<Edge>,
    explained: &mut bool,
    stats: &mut FetchStats,
) -> Result<(), ZargoError> {
    for row in rows.iter_mut() {
        let dep_idx = row.edge.to;
        let outcome = row.result.take().ok_or_else(|| ZargoError::Generic {
            message: format!("{} worker for `{}` reported no result", D::NAME, row.edge.alias),
        })?;

        match outcome {
            FetchOutcome::ReplaceMe(ri) => {
                let entry = &mut table.entries[ri];
                if entry.dep_idx.is_none() {
                    entry.dep_idx = Some(dep_idx);
                }
                if entry.deps.is_empty() && !row.deps.is_empty() {
                    entry.deps = row.deps.clone();
                }
                row.path = Some(D::entry_path(ctx, &entry.res));
                table.binds.push((dep_idx, ri));
                stats.reused += 1;
            }
            FetchOutcome::FillResolution(ri) => {
                let entry = &mut table.entries[ri];
                entry.dep_idx = Some(dep_idx);
                entry.deps = row.deps.clone();
                table.binds.push((dep_idx, ri));
                stats.downloaded += 1;
            }
            FetchOutcome::CopyDeps(ri) => {
                let entry = &table.entries[ri];
                row.path = Some(D::entry_path(ctx, &entry.res));
                row.deps = entry.deps.clone();
                table.binds.push((dep_idx, ri));
                stats.reused += 1;
            }
            FetchOutcome::NewEntry(res) => {
                // First writer wins within a source: a row earlier in this
                // pass may already have appended an equivalent entry.
                match D::find_resolution(&dep_table[dep_idx], &table.entries) {
                    Some(ri) => {
                        let entry = &mut table.entries[ri];
                        if entry.dep_idx.is_none() {
                            entry.dep_idx = Some(dep_idx);
                        }
                        table.binds.push((dep_idx, ri));
                    }
                    None => {
                        table.entries.push(Entry {
                            res,
                            dep_idx: Some(dep_idx),
                            deps: row.deps.clone(),
                        });
                        table.binds.push((dep_idx, table.entries.len() - 1));
                    }
                }
                stats.downloaded += 1;
            }
            FetchOutcome::Err(e) => {
                if e.already_explained() {
                    *explained = true;
                } else {
                    return Err(ZargoError::Fetch {
                        source_name: D::NAME,
                        alias: row.edge.alias.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    // Record where every resolved dep lives. A second insertion for the same
    // dep_idx means two rows claimed one graph node, which the disjoint
    // row/edge construction rules out.
    for row in rows.iter() {
        if let Some(path) = &row.path {
            let prev = paths.insert(row.edge.to, path.clone());
            assert!(
                prev.is_none(),
                "duplicate path registration for dep_idx {}",
                row.edge.to
            );
        }
    }

    // Stage discovered children: each gets a fresh dependency-table slot and
    // an edge in the next batch, grouped under its own source kind.
    for row in rows.iter_mut() {
        for child in row.deps.drain(..) {
            let child_idx = dep_table.len();
            let kind = child.source.kind();
            dep_table.push(child.source);
            next.push(
                kind,
                Edge {
                    from: Parent::Dep(row.edge.to),
                    to: child_idx,
                    alias: child.alias,
                },
            );
        }
    }

    // The batch's edges join the engine's accumulated list in per-source,
    // per-row order; the emitters depend on this order.
    edges.extend(rows.iter().map(|row| row.edge.clone()));
    stats.resolved += rows.len();

    Ok(())
}
