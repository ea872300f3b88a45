//! Build-graph emitters.
//!
//! Two consumers walk the accumulated edge list: the generated `deps.zig`
//! renders the normal-deps graph as a nested package literal for the Zig
//! build system, and [`build_deps_tree`] materializes the build-deps graph
//! as an in-memory tree.
//!
//! Both rely on the edge list's discovery order: every child edge sits at a
//! strictly greater index than its parent's edge, so a subtree can be
//! expanded with a forward scan and an explicit stack.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zargo_core::graph::{Edge, Parent};
use zargo_core::project::ExportSpec;

/// The slice of engine state the emitters need.
pub struct GraphView<'a> {
    pub edges: &'a [Edge],
    pub paths: &'a HashMap<usize, PathBuf>,
    pub exports: &'a BTreeMap<String, ExportSpec>,
}

/// One node of the in-memory build-deps tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPkg {
    pub name: String,
    pub path: PathBuf,
    pub dependencies: Vec<BuildPkg>,
}

const INDENT: &str = "    ";

fn pad(out: &mut dyn Write, level: usize) -> io::Result<()> {
    for _ in 0..level {
        out.write_all(INDENT.as_bytes())?;
    }
    Ok(())
}

/// Escape an alias for use as a Zig identifier: aliases that are keywords or
/// not identifier-shaped are wrapped as `@"..."`.
fn zig_ident(alias: &str) -> String {
    const KEYWORDS: &[&str] = &[
        "align", "and", "asm", "async", "await", "break", "catch", "comptime", "const",
        "continue", "defer", "else", "enum", "error", "export", "extern", "fn", "for", "if",
        "inline", "noalias", "or", "orelse", "packed", "pub", "resume", "return", "struct",
        "suspend", "switch", "test", "threadlocal", "try", "union", "unreachable", "undefined",
        "usingnamespace", "var", "volatile", "while",
    ];
    let mut chars = alias.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok && !KEYWORDS.contains(&alias) {
        alias.to_string()
    } else {
        format!("@\"{alias}\"")
    }
}

/// Render a path for a Zig string literal. Backslash separators would end
/// the escape early, so they are doubled.
fn zig_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

fn node_path(view: &GraphView<'_>, dep_idx: usize) -> String {
    view.paths.get(&dep_idx).map(|p| zig_path(p)).unwrap_or_default()
}

/// Write the generated `deps.zig` source.
pub fn write_deps_zig(view: &GraphView<'_>, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "const std = @import(\"std\");")?;
    writeln!(out, "const Pkg = std.build.Pkg;")?;
    writeln!(out, "const FileSource = std.build.FileSource;")?;
    writeln!(out)?;
    writeln!(out, "pub const pkgs = struct {{")?;

    let roots: Vec<usize> = view
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.from == Parent::RootNormal)
        .map(|(i, _)| i)
        .collect();

    for &root_idx in &roots {
        write_pkg_literal(view, out, root_idx)?;
        writeln!(out)?;
    }

    pad(out, 1)?;
    writeln!(out, "pub fn addAllTo(artifact: *std.build.LibExeObjStep) void {{")?;
    if roots.is_empty() {
        pad(out, 2)?;
        writeln!(out, "_ = artifact;")?;
    }
    for &root_idx in &roots {
        pad(out, 2)?;
        writeln!(
            out,
            "artifact.addPackage(pkgs.{});",
            zig_ident(&view.edges[root_idx].alias)
        )?;
    }
    pad(out, 1)?;
    writeln!(out, "}}")?;
    writeln!(out, "}};")?;

    if !view.exports.is_empty() {
        writeln!(out)?;
        writeln!(out, "pub const exports = struct {{")?;
        for (name, spec) in view.exports {
            pad(out, 1)?;
            writeln!(out, "pub const {} = Pkg{{", zig_ident(name))?;
            pad(out, 2)?;
            writeln!(out, ".name = \"{name}\",")?;
            pad(out, 2)?;
            writeln!(
                out,
                ".path = FileSource{{ .path = \"{}\" }},",
                zig_path(Path::new(spec.path_or_default()))
            )?;
            pad(out, 2)?;
            writeln!(out, ".dependencies = &[_]Pkg{{")?;
            for &root_idx in &roots {
                pad(out, 3)?;
                writeln!(out, "pkgs.{},", zig_ident(&view.edges[root_idx].alias))?;
            }
            pad(out, 2)?;
            writeln!(out, "}},")?;
            pad(out, 1)?;
            writeln!(out, "}};")?;
        }
        writeln!(out, "}};")?;
    }

    Ok(())
}

/// Depth-first expansion of one top-level package as a nested literal.
///
/// Scans the edge list forward from the root edge with an explicit stack.
/// The first descent from the root indents by two levels, deeper descents by
/// three; existing generated files depend on exactly this shape.
fn write_pkg_literal(
    view: &GraphView<'_>,
    out: &mut dyn Write,
    root_idx: usize,
) -> io::Result<()> {
    struct Frame {
        edge_idx: usize,
        cursor: usize,
        has_deps: bool,
        level: usize,
    }

    open_node(view, out, root_idx, 1, true)?;

    let mut current = root_idx;
    let mut cursor = root_idx + 1;
    let mut has_deps = false;
    let mut level = 1usize;
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        if cursor < view.edges.len() {
            if view.edges[cursor].from == Parent::Dep(view.edges[current].to) {
                if !has_deps {
                    pad(out, level + 1)?;
                    writeln!(out, ".dependencies = &[_]Pkg{{")?;
                    has_deps = true;
                }
                let child_level = level + if stack.is_empty() { 2 } else { 3 };
                open_node(view, out, cursor, child_level, false)?;
                stack.push(Frame {
                    edge_idx: current,
                    cursor,
                    has_deps,
                    level,
                });
                current = cursor;
                cursor += 1;
                has_deps = false;
                level = child_level;
            } else {
                cursor += 1;
            }
        } else {
            if has_deps {
                pad(out, level + 1)?;
                writeln!(out, "}},")?;
            }
            match stack.pop() {
                Some(frame) => {
                    pad(out, level)?;
                    writeln!(out, "}},")?;
                    current = frame.edge_idx;
                    cursor = frame.cursor + 1;
                    has_deps = frame.has_deps;
                    level = frame.level;
                }
                None => {
                    pad(out, level)?;
                    writeln!(out, "}};")?;
                    return Ok(());
                }
            }
        }
    }
}

fn open_node(
    view: &GraphView<'_>,
    out: &mut dyn Write,
    edge_idx: usize,
    level: usize,
    top_level: bool,
) -> io::Result<()> {
    let edge = &view.edges[edge_idx];
    pad(out, level)?;
    if top_level {
        writeln!(out, "pub const {} = Pkg{{", zig_ident(&edge.alias))?;
    } else {
        writeln!(out, "Pkg{{")?;
    }
    pad(out, level + 1)?;
    writeln!(out, ".name = \"{}\",", edge.alias)?;
    pad(out, level + 1)?;
    writeln!(
        out,
        ".path = FileSource{{ .path = \"{}\" }},",
        node_path(view, edge.to)
    )?;
    Ok(())
}

/// Materialize the build-deps graph as owned records, one tree per
/// root-as-build edge. Same stack discipline as the literal emitter, but
/// accumulating nodes instead of writing text.
pub fn build_deps_tree(view: &GraphView<'_>) -> Vec<BuildPkg> {
    view.edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.from == Parent::RootBuild)
        .map(|(i, _)| collect_tree(view, i))
        .collect()
}

fn collect_tree(view: &GraphView<'_>, root_idx: usize) -> BuildPkg {
    let make = |edge: &Edge| BuildPkg {
        name: edge.alias.clone(),
        path: view.paths.get(&edge.to).cloned().unwrap_or_default(),
        dependencies: Vec::new(),
    };

    let mut current = root_idx;
    let mut cursor = root_idx + 1;
    let mut node = make(&view.edges[root_idx]);
    let mut stack: Vec<(usize, usize, BuildPkg)> = Vec::new();

    loop {
        if cursor < view.edges.len() {
            if view.edges[cursor].from == Parent::Dep(view.edges[current].to) {
                let child = make(&view.edges[cursor]);
                stack.push((current, cursor, std::mem::replace(&mut node, child)));
                current = cursor;
                cursor += 1;
            } else {
                cursor += 1;
            }
        } else {
            match stack.pop() {
                Some((parent_edge, child_cursor, mut parent_node)) => {
                    parent_node.dependencies.push(node);
                    node = parent_node;
                    current = parent_edge;
                    cursor = child_cursor + 1;
                }
                None => return node,
            }
        }
    }
}
