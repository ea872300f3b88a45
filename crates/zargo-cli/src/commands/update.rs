//! Command: drop pinned resolutions and fetch them again.

use miette::Result;
use zargo_engine::engine::Engine;
use zargo_util::progress;

pub fn run(alias: Option<&str>, verbose: bool) -> Result<()> {
    let root = super::fetch::project_root()?;
    let mut engine = Engine::load(&root, false)?;

    match alias {
        Some(alias) => {
            if engine.clear_resolution(alias) == 0 {
                progress::status_warn(
                    "Warning",
                    &format!("`{alias}` has no pinned resolution to drop"),
                );
            }
        }
        None => {
            let aliases: Vec<String> = engine
                .project()
                .dependencies
                .keys()
                .chain(engine.project().build_dependencies.keys())
                .cloned()
                .collect();
            for alias in aliases {
                engine.clear_resolution(&alias);
            }
        }
    }

    let spinner = progress::fetch_spinner("Refreshing dependencies");
    let outcome = engine.fetch();
    spinner.finish_and_clear();
    let stats = outcome?;

    engine.write_lockfile()?;
    engine.write_deps_file()?;
    super::fetch::report(&stats, verbose);
    Ok(())
}
