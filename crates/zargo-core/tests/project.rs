use zargo_core::dependency::SourceKind;
use zargo_core::project::{find_project_root, Project};

const FULL_MANIFEST: &str = r#"
[package]
name = "myapp"
version = "0.1.0"
description = "demo"

[dependencies]
ini = { pkg = "nektro/ini", version = "0.1.0" }
zlib = { url = "https://example.com/zlib.zip", sha256 = "deadbeef" }
args = { git = "https://github.com/x/args", rev = "v1.2.0" }

[build-dependencies]
opts = { local = "tools/opts" }

[exports]
myapp = { path = "src/lib.zig" }
"#;

#[test]
fn all_source_forms_parse() {
    let project = Project::parse_toml(FULL_MANIFEST).unwrap();
    let deps = project.normal_deps().unwrap();
    assert_eq!(deps.len(), 3);

    // BTreeMap order: args, ini, zlib
    assert_eq!(deps[0].alias, "args");
    assert_eq!(deps[0].source.kind(), SourceKind::Git);
    assert_eq!(deps[1].alias, "ini");
    assert_eq!(deps[1].source.kind(), SourceKind::Pkg);
    assert_eq!(deps[2].alias, "zlib");
    assert_eq!(deps[2].source.kind(), SourceKind::Url);

    let build = project.build_deps().unwrap();
    assert_eq!(build.len(), 1);
    assert_eq!(build[0].alias, "opts");
    assert_eq!(build[0].source.kind(), SourceKind::Local);
}

#[test]
fn bad_coordinates_surface_as_manifest_error() {
    let project = Project::parse_toml(
        r#"
[package]
name = "myapp"
version = "0.1.0"

[dependencies]
broken = { pkg = "noslash", version = "1.0.0" }
"#,
    )
    .unwrap();
    let err = project.normal_deps().unwrap_err();
    assert!(err.to_string().contains("user/name"));
}

#[test]
fn from_path_reports_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let err = Project::from_path(&tmp.path().join("zargo.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}

#[test]
fn project_root_found_from_nested_directory() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("zargo.toml"), FULL_MANIFEST).unwrap();
    let nested = tmp.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();

    assert_eq!(find_project_root(&nested).unwrap(), tmp.path());
    assert_eq!(find_project_root(tmp.path()).unwrap(), tmp.path());
}

#[test]
fn project_root_absent_yields_none() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(find_project_root(tmp.path()).is_none());
}

#[test]
fn from_path_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("zargo.toml");
    std::fs::write(&path, FULL_MANIFEST).unwrap();
    let project = Project::from_path(&path).unwrap();
    assert_eq!(project.package.name, "myapp");
    assert_eq!(project.exports.len(), 1);
}
