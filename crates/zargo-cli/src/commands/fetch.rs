//! Command: resolve and fetch all dependencies.

use std::path::PathBuf;

use miette::Result;
use zargo_core::project::find_project_root;
use zargo_core::MANIFEST_NAME;
use zargo_engine::engine::Engine;
use zargo_engine::reconcile::FetchStats;
use zargo_util::errors::ZargoError;
use zargo_util::progress;

pub fn run(offline: bool, verbose: bool) -> Result<()> {
    let root = project_root()?;
    let mut engine = Engine::load(&root, offline)?;

    let spinner = progress::fetch_spinner("Fetching dependencies");
    let outcome = engine.fetch();
    spinner.finish_and_clear();
    let stats = outcome?;

    engine.write_lockfile()?;
    engine.write_deps_file()?;
    report(&stats, verbose);
    Ok(())
}

/// The nearest enclosing project root, from the current directory.
pub(crate) fn project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(ZargoError::Io)?;
    find_project_root(&cwd).ok_or_else(|| {
        ZargoError::Manifest {
            message: format!(
                "No {MANIFEST_NAME} found in {} or any parent directory",
                cwd.display()
            ),
        }
        .into()
    })
}

pub(crate) fn report(stats: &FetchStats, verbose: bool) {
    if stats.resolved == 0 {
        if verbose {
            progress::status("Resolved", "no dependencies declared");
        }
        return;
    }
    if verbose || stats.downloaded > 0 || stats.pruned > 0 {
        progress::status(
            "Resolved",
            &format!(
                "{} dependencies ({} fetched, {} reused, {} pruned)",
                stats.resolved, stats.downloaded, stats.reused, stats.pruned
            ),
        );
    } else {
        progress::status(
            "Resolved",
            &format!("{} dependencies, all up-to-date", stats.resolved),
        );
    }
}
