use assert_cmd::Command;
use predicates::prelude::*;

fn zargo() -> Command {
    Command::cargo_bin("zargo").unwrap()
}

#[test]
fn help_lists_the_command_surface() {
    zargo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn fetch_outside_a_project_fails_with_a_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    zargo()
        .arg("fetch")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("zargo.toml"));
}

#[test]
fn fetch_writes_lockfile_and_deps_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("zargo.toml"),
        "[package]\nname = \"app\"\nversion = \"0.1.0\"\n\n\
         [dependencies]\na = { local = \"vendor/a\" }\n",
    )
    .unwrap();
    std::fs::create_dir_all(tmp.path().join("vendor/a")).unwrap();

    zargo()
        .arg("fetch")
        .arg("--offline")
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(tmp.path().join("zargo.lock")).unwrap(),
        "local vendor/a\n"
    );
    let deps_zig = std::fs::read_to_string(tmp.path().join("deps.zig")).unwrap();
    assert!(deps_zig.contains("pub const a = Pkg{"));
    assert!(deps_zig.contains("artifact.addPackage(pkgs.a);"));
}

#[test]
fn update_refreshes_a_single_root() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("zargo.toml"),
        "[package]\nname = \"app\"\nversion = \"0.1.0\"\n\n\
         [dependencies]\na = { local = \"vendor/a\" }\n",
    )
    .unwrap();
    std::fs::create_dir_all(tmp.path().join("vendor/a")).unwrap();

    zargo().arg("fetch").current_dir(tmp.path()).assert().success();
    zargo()
        .args(["update", "a"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(tmp.path().join("zargo.lock")).unwrap(),
        "local vendor/a\n"
    );
}
