//! The fetch queue: per-source work tables for the current batch, the
//! staging buffer for the next one, and the parallel fetch driver.

use std::thread;

use zargo_core::dependency::{DepSource, SourceKind};
use zargo_core::graph::Edge;
use zargo_sources::driver::{Entry, FetchContext, QueueRow, SourceDriver};
use zargo_sources::git::GitDriver;
use zargo_sources::local::LocalDriver;
use zargo_sources::pkg::PkgDriver;
use zargo_sources::url::UrlDriver;

use crate::resolutions::Resolutions;

/// The active queue: one row table per source, addressed by row index.
/// Rows are the mutation target of the current batch's workers.
#[derive(Default)]
pub struct FetchQueue {
    pub pkg: Vec<QueueRow<PkgDriver>>,
    pub local: Vec<QueueRow<LocalDriver>>,
    pub url: Vec<QueueRow<UrlDriver>>,
    pub git: Vec<QueueRow<GitDriver>>,
}

/// Shape-mirror of the queue holding only edges: children discovered during
/// a batch are staged here without mutating the draining queue.
#[derive(Debug, Default)]
pub struct NextBuffer {
    pub pkg: Vec<Edge>,
    pub local: Vec<Edge>,
    pub url: Vec<Edge>,
    pub git: Vec<Edge>,
}

impl NextBuffer {
    pub fn push(&mut self, kind: SourceKind, edge: Edge) {
        match kind {
            SourceKind::Pkg => self.pkg.push(edge),
            SourceKind::Local => self.local.push(edge),
            SourceKind::Url => self.url.push(edge),
            SourceKind::Git => self.git.push(edge),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pkg.is_empty() && self.local.is_empty() && self.url.is_empty() && self.git.is_empty()
    }

    /// All staged edges, in fixed source order.
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.pkg
            .iter()
            .chain(self.local.iter())
            .chain(self.url.iter())
            .chain(self.git.iter())
    }
}

impl FetchQueue {
    /// Append a fresh row for `edge` to the source's table.
    pub fn push(&mut self, kind: SourceKind, edge: Edge) {
        match kind {
            SourceKind::Pkg => self.pkg.push(QueueRow::new(edge)),
            SourceKind::Local => self.local.push(QueueRow::new(edge)),
            SourceKind::Url => self.url.push(QueueRow::new(edge)),
            SourceKind::Git => self.git.push(QueueRow::new(edge)),
        }
    }

    /// True iff every per-source table is drained.
    pub fn is_empty(&self) -> bool {
        self.pkg.is_empty() && self.local.is_empty() && self.url.is_empty() && self.git.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pkg.len() + self.local.len() + self.url.len() + self.git.len()
    }

    /// Drain the current rows (keeping capacity) and promote the staged
    /// edges, each as a fresh row with an empty deps buffer.
    pub fn clear_and_load(&mut self, next: NextBuffer) {
        self.pkg.clear();
        self.local.clear();
        self.url.clear();
        self.git.clear();
        for edge in next.pkg {
            self.pkg.push(QueueRow::new(edge));
        }
        for edge in next.local {
            self.local.push(QueueRow::new(edge));
        }
        for edge in next.url {
            self.url.push(QueueRow::new(edge));
        }
        for edge in next.git {
            self.git.push(QueueRow::new(edge));
        }
    }

    /// Run one batch: one worker thread per row per source, all joined
    /// before returning.
    ///
    /// Workers share the dependency table and the entry tables read-only and
    /// each own exactly one row mutably; completion order is irrelevant
    /// because reconciliation visits rows sequentially by index afterwards.
    /// The scope joins every spawned worker even if a spawn fails or a
    /// worker panics mid-batch.
    pub fn parallel_fetch(
        &mut self,
        ctx: &FetchContext,
        dep_table: &[DepSource],
        resolutions: &Resolutions,
    ) {
        thread::scope(|scope| {
            spawn_rows::<PkgDriver>(scope, ctx, dep_table, &resolutions.pkg.entries, &mut self.pkg);
            spawn_rows::<LocalDriver>(
                scope,
                ctx,
                dep_table,
                &resolutions.local.entries,
                &mut self.local,
            );
            spawn_rows::<UrlDriver>(scope, ctx, dep_table, &resolutions.url.entries, &mut self.url);
            spawn_rows::<GitDriver>(scope, ctx, dep_table, &resolutions.git.entries, &mut self.git);
        });
    }
}

fn spawn_rows<'scope, D: SourceDriver>(
    scope: &'scope thread::Scope<'scope, '_>,
    ctx: &'scope FetchContext,
    dep_table: &'scope [DepSource],
    entries: &'scope [Entry<D::Resolution>],
    rows: &'scope mut [QueueRow<D>],
) {
    for row in rows.iter_mut() {
        scope.spawn(move || D::fetch(ctx, dep_table, entries, row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zargo_core::graph::Parent;

    fn edge(to: usize, alias: &str) -> Edge {
        Edge {
            from: Parent::RootNormal,
            to,
            alias: alias.to_string(),
        }
    }

    #[test]
    fn clear_and_load_drains_then_promotes() {
        let mut queue = FetchQueue::default();
        queue.push(SourceKind::Pkg, edge(0, "a"));
        queue.push(SourceKind::Git, edge(1, "b"));
        assert_eq!(queue.len(), 2);

        let mut next = NextBuffer::default();
        next.push(SourceKind::Pkg, edge(2, "c"));
        next.push(SourceKind::Url, edge(3, "d"));
        next.push(SourceKind::Pkg, edge(4, "e"));

        queue.clear_and_load(next);

        // Old rows gone, staged edges promoted with per-source grouping kept
        assert_eq!(queue.len(), 3);
        assert!(queue.git.is_empty());
        assert_eq!(queue.pkg.len(), 2);
        assert_eq!(queue.pkg[0].edge.to, 2);
        assert_eq!(queue.pkg[1].edge.to, 4);
        assert_eq!(queue.url[0].edge.to, 3);
        assert!(queue.pkg[0].deps.is_empty());
        assert!(queue.pkg[0].result.is_none());
    }

    #[test]
    fn empty_next_empties_queue() {
        let mut queue = FetchQueue::default();
        queue.push(SourceKind::Local, edge(0, "a"));
        queue.clear_and_load(NextBuffer::default());
        assert!(queue.is_empty());
    }
}
