//! The zargo resolve/fetch engine.
//!
//! Takes a project's declared direct dependencies, resolves each to a
//! concrete version and on-disk location using the previous lockfile as a
//! hint, transitively discovers and fetches their dependencies in parallel,
//! and emits a refreshed `zargo.lock` plus a generated `deps.zig` exposing
//! the graph to the Zig build system.
//!
//! The engine drives a breadth-first loop: each batch spawns one worker
//! thread per queued dependency per source, joins them, then sequentially
//! folds the results back into the resolution tables and stages newly
//! discovered children for the next batch.

pub mod emit;
pub mod engine;
pub mod queue;
pub mod reconcile;
pub mod resolutions;
