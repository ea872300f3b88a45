//! End-to-end engine runs over local-path dependency trees.

use std::path::Path;

use zargo_core::graph::Parent;
use zargo_engine::engine::Engine;

/// Write a package directory with a manifest declaring the given local deps.
fn init_pkg(root: &Path, rel: &str, deps: &[(&str, &str)]) {
    let dir = root.join(rel);
    std::fs::create_dir_all(&dir).unwrap();
    let name = rel.rsplit('/').next().unwrap();
    let mut manifest = format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n");
    if !deps.is_empty() {
        manifest.push_str("\n[dependencies]\n");
        for (alias, path) in deps {
            manifest.push_str(&format!("{alias} = {{ local = \"{path}\" }}\n"));
        }
    }
    std::fs::write(dir.join("zargo.toml"), manifest).unwrap();
}

/// Write the top-level project manifest.
fn init_project(root: &Path, deps: &[(&str, &str)], build_deps: &[(&str, &str)]) {
    let mut manifest = String::from("[package]\nname = \"app\"\nversion = \"0.1.0\"\n");
    if !deps.is_empty() {
        manifest.push_str("\n[dependencies]\n");
        for (alias, path) in deps {
            manifest.push_str(&format!("{alias} = {{ local = \"{path}\" }}\n"));
        }
    }
    if !build_deps.is_empty() {
        manifest.push_str("\n[build-dependencies]\n");
        for (alias, path) in build_deps {
            manifest.push_str(&format!("{alias} = {{ local = \"{path}\" }}\n"));
        }
    }
    std::fs::write(root.join("zargo.toml"), manifest).unwrap();
}

#[test]
fn empty_project_produces_empty_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[], &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let stats = engine.fetch().unwrap();

    assert_eq!(stats.resolved, 0);
    assert!(engine.edges().is_empty());
    assert!(engine.paths().is_empty());
    assert_eq!(engine.lockfile_text(), "");

    engine.write_deps_file().unwrap();
    let deps_zig = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();
    assert!(deps_zig.contains("_ = artifact;"));
    assert!(!deps_zig.contains("exports"));
}

#[test]
fn single_local_dep_resolves_and_locks() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let stats = engine.fetch().unwrap();

    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.downloaded, 1);
    assert_eq!(engine.edges().len(), 1);
    assert_eq!(engine.edges()[0].from, Parent::RootNormal);
    assert_eq!(engine.edges()[0].to, 0);
    assert_eq!(engine.edges()[0].alias, "a");
    assert!(engine.paths()[&0].ends_with("vendor/a"));
    assert_eq!(engine.lockfile_text(), "local vendor/a\n");
    assert!(engine.resolutions().local.entries[0].is_fresh());
}

#[test]
fn transitive_deps_extend_the_edge_list_in_bfs_order() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[("b", "vendor/b")]);
    init_pkg(tmp.path(), "vendor/b", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    engine.fetch().unwrap();

    let edges = engine.edges();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].from, Parent::RootNormal);
    assert_eq!(edges[0].to, 0);
    assert_eq!(edges[1].from, Parent::Dep(0));
    assert_eq!(edges[1].to, 1);
    assert_eq!(edges[1].alias, "b");

    engine.write_deps_file().unwrap();
    let deps_zig = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();
    assert!(deps_zig.contains(".dependencies = &[_]Pkg{"));
    assert!(deps_zig.contains(".name = \"b\","));
}

#[test]
fn diamond_yields_one_entry_but_two_graph_nodes() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a"), ("b", "vendor/b")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[("c", "vendor/c")]);
    init_pkg(tmp.path(), "vendor/b", &[("c", "vendor/c")]);
    init_pkg(tmp.path(), "vendor/c", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    engine.fetch().unwrap();

    // a, b, and two table slots for c
    assert_eq!(engine.dep_table().len(), 4);
    assert_eq!(engine.edges().len(), 4);
    assert_eq!(engine.paths().len(), 4);
    // but only one resolution entry per distinct package
    assert_eq!(engine.resolutions().local.entries.len(), 3);

    // both c slots bind to the same entry
    let binds = &engine.resolutions().local.binds;
    let c_binds: Vec<_> = binds.iter().filter(|(dep_idx, _)| *dep_idx >= 2).collect();
    assert_eq!(c_binds.len(), 2);
    assert_eq!(c_binds[0].1, c_binds[1].1);
}

#[test]
fn second_run_reuses_the_lockfile_and_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[("b", "vendor/b")]);
    init_pkg(tmp.path(), "vendor/b", &[]);

    let mut first = Engine::load(tmp.path(), true).unwrap();
    first.fetch().unwrap();
    first.write_lockfile().unwrap();
    first.write_deps_file().unwrap();
    let lock_before = first.lockfile_text();
    let edges_before = first.edges().to_vec();
    let deps_zig_before = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();

    let mut second = Engine::load(tmp.path(), true).unwrap();
    let stats = second.fetch().unwrap();
    second.write_deps_file().unwrap();

    assert_eq!(stats.downloaded, 0);
    assert_eq!(stats.reused, 2);
    assert_eq!(second.edges(), edges_before.as_slice());
    assert_eq!(second.lockfile_text(), lock_before);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap(),
        deps_zig_before
    );
}

#[test]
fn prepopulated_lockfile_entry_is_claimed_not_duplicated() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[]);
    std::fs::write(tmp.path().join("zargo.lock"), "local vendor/a\n").unwrap();

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let stats = engine.fetch().unwrap();

    assert_eq!(engine.resolutions().local.entries.len(), 1);
    assert_eq!(engine.resolutions().local.binds, vec![(0, 0)]);
    assert_eq!(stats.downloaded, 0);
    assert_eq!(stats.reused, 1);
    assert!(engine.paths()[&0].ends_with("vendor/a"));
}

#[test]
fn clear_resolution_forces_a_refetch() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a"), ("b", "vendor/b")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[]);
    init_pkg(tmp.path(), "vendor/b", &[]);

    let mut first = Engine::load(tmp.path(), true).unwrap();
    first.fetch().unwrap();
    first.write_lockfile().unwrap();
    let lock_before = first.lockfile_text();

    let mut second = Engine::load(tmp.path(), true).unwrap();
    assert_eq!(second.clear_resolution("a"), 1);
    assert_eq!(second.resolutions().local.entries.len(), 1);

    second.fetch().unwrap();
    assert_eq!(second.resolutions().local.entries.len(), 2);
    // b survived the removal in order; a was re-appended at the end
    assert_eq!(second.lockfile_text(), "local vendor/b\nlocal vendor/a\n");
    assert_eq!(
        lock_before.lines().collect::<std::collections::HashSet<_>>(),
        second
            .lockfile_text()
            .lines()
            .collect::<std::collections::HashSet<_>>()
    );
}

#[test]
fn clear_resolution_with_unknown_alias_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    assert_eq!(engine.clear_resolution("nope"), 0);
}

#[test]
fn dependency_cycle_aborts_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[("b", "vendor/b")]);
    init_pkg(tmp.path(), "vendor/b", &[("a", "vendor/a")]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let err = engine.fetch().unwrap_err();
    assert!(err.to_string().contains("cycle"));
    assert!(err.to_string().contains("vendor/a"));
    assert!(err.to_string().contains("vendor/b"));
}

#[test]
fn self_referential_package_aborts_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[("me", "vendor/a")]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let err = engine.fetch().unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn build_deps_come_back_as_a_tree_not_a_literal() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[("opts", "vendor/opts")]);
    init_pkg(tmp.path(), "vendor/a", &[]);
    init_pkg(tmp.path(), "vendor/opts", &[("inner", "vendor/inner")]);
    init_pkg(tmp.path(), "vendor/inner", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    engine.fetch().unwrap();

    let build = engine.build_deps();
    assert_eq!(build.len(), 1);
    assert_eq!(build[0].name, "opts");
    assert_eq!(build[0].dependencies.len(), 1);
    assert_eq!(build[0].dependencies[0].name, "inner");

    engine.write_deps_file().unwrap();
    let deps_zig = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();
    assert!(!deps_zig.contains("opts"));
    assert!(deps_zig.contains("pub const a"));
}

#[test]
fn missing_local_dependency_fails_with_context() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/missing")], &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    let err = engine.fetch().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a"));
    assert!(message.contains("does not exist"));
}

#[test]
fn exports_block_follows_the_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = "[package]\nname = \"app\"\nversion = \"0.1.0\"\n\n\
                    [dependencies]\na = { local = \"vendor/a\" }\n\n\
                    [exports]\napp = {}\n";
    std::fs::write(tmp.path().join("zargo.toml"), manifest).unwrap();
    init_pkg(tmp.path(), "vendor/a", &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    engine.fetch().unwrap();
    engine.write_deps_file().unwrap();

    let deps_zig = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();
    assert!(deps_zig.contains("pub const exports = struct {"));
    assert!(deps_zig.contains(".path = FileSource{ .path = \"src/main.zig\" },"));
    assert!(deps_zig.contains("pkgs.a,"));
}

#[test]
fn gc_removes_only_unclaimed_cache_directories() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[], &[]);

    let mut engine = Engine::load(tmp.path(), true).unwrap();

    // Simulate a validated registry entry plus an orphaned leftover.
    let live_entry = {
        let mut fields = "u a 1.0.0 deadbeef".split_whitespace();
        use zargo_sources::driver::SourceDriver;
        let res = zargo_sources::pkg::PkgDriver::parse_entry(&mut fields).unwrap();
        let mut entry = zargo_sources::driver::Entry::loaded(res);
        entry.dep_idx = Some(0);
        entry
    };
    engine.resolutions_mut().pkg.entries.push(live_entry);

    let cache = engine.cache_dir().to_path_buf();
    std::fs::create_dir_all(cache.join("u-a-1.0.0")).unwrap();
    std::fs::create_dir_all(cache.join("u-old-0.9.0")).unwrap();
    std::fs::write(cache.join("README"), "not a directory").unwrap();

    let removed = engine.gc_cache().unwrap();
    assert_eq!(removed, 1);
    assert!(cache.join("u-a-1.0.0").is_dir());
    assert!(!cache.join("u-old-0.9.0").exists());
    assert!(cache.join("README").is_file());
}

#[test]
fn stale_lockfile_entries_are_carried_over() {
    let tmp = tempfile::tempdir().unwrap();
    init_project(tmp.path(), &[("a", "vendor/a")], &[]);
    init_pkg(tmp.path(), "vendor/a", &[]);
    // An entry for a dep this project no longer declares
    std::fs::write(
        tmp.path().join("zargo.lock"),
        "pkg u gone 1.0.0 deadbeef\nlocal vendor/a\n",
    )
    .unwrap();

    let mut engine = Engine::load(tmp.path(), true).unwrap();
    engine.fetch().unwrap();

    assert!(!engine.resolutions().pkg.entries[0].is_fresh());
    assert_eq!(
        engine.lockfile_text(),
        "pkg u gone 1.0.0 deadbeef\nlocal vendor/a\n"
    );
}
