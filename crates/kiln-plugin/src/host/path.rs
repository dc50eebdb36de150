//! `path` module: lexical path manipulation.

use std::path::{Component, MAIN_SEPARATOR_STR, Path, PathBuf};
use std::rc::Rc;

use rquickjs::{Ctx, Object, Value};

use super::{HostError, HostFn, HostResult, HostState, build_module, string_arg, string_rest, to_js};

#[cfg(windows)]
const DELIMITER: &str = ";";
#[cfg(not(windows))]
const DELIMITER: &str = ":";

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("resolve", resolve),
    ("normalize", normalize),
    ("isAbsolute", is_absolute),
    ("join", join),
    ("relative", relative),
    ("dirname", dirname),
    ("basename", basename),
    ("extname", extname),
    ("parse", parse),
    ("match", matches),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    let module = build_module(ctx, state, FUNCTIONS)?;
    module.set("sep", MAIN_SEPARATOR_STR)?;
    module.set("delimiter", DELIMITER)?;
    Ok(module)
}

fn resolve<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let segments = string_rest(args, 0, "path")?;
    to_js(ctx, display(&resolve_segments(&segments)?))
}

fn normalize<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    to_js(ctx, display(&normalize_path(Path::new(&path))))
}

fn is_absolute<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    to_js(ctx, Path::new(&path).is_absolute())
}

fn join<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let segments = string_rest(args, 0, "path")?;
    let joined = segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR);
    to_js(ctx, display(&normalize_path(Path::new(&joined))))
}

fn relative<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let from = resolve_segments(&[string_arg(args, 0, "from")?])?;
    let to = resolve_segments(&[string_arg(args, 1, "to")?])?;
    to_js(ctx, relative_path(&from, &to))
}

fn dirname<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    to_js(ctx, dirname_of(&path))
}

fn basename<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let mut base = basename_of(&path);
    if args.len() > 1 {
        let ext = string_arg(args, 1, "ext")?;
        if base.len() > ext.len() && base.ends_with(&ext) {
            base.truncate(base.len() - ext.len());
        }
    }
    to_js(ctx, base)
}

fn extname<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    to_js(ctx, extname_of(&basename_of(&path)))
}

fn parse<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let base = basename_of(&path);
    let ext = extname_of(&base);
    let name = base[..base.len() - ext.len()].to_string();
    let root = if Path::new(&path).has_root() {
        MAIN_SEPARATOR_STR
    } else {
        ""
    };
    let dir = if path.contains(MAIN_SEPARATOR_STR) {
        dirname_of(&path)
    } else {
        String::new()
    };

    let parsed = Object::new(ctx.clone())?;
    parsed.set("root", root)?;
    parsed.set("dir", dir)?;
    parsed.set("base", base.as_str())?;
    parsed.set("ext", ext)?;
    parsed.set("name", name)?;
    Ok(parsed.into_value())
}

/// `match(pattern, path)`: glob match of a path string.
fn matches<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let pattern = string_arg(args, 0, "pattern")?;
    let path = string_arg(args, 1, "path")?;
    let pattern = glob::Pattern::new(&pattern)
        .map_err(|e| HostError::value(format!("invalid pattern '{pattern}': {e}")))?;
    to_js(ctx, pattern.matches(&path))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexical helpers
// ─────────────────────────────────────────────────────────────────────────────

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Resolve `segments` right to left against the working directory.
fn resolve_segments(segments: &[String]) -> Result<PathBuf, HostError> {
    let mut resolved = std::env::current_dir()
        .map_err(|e| HostError::value(format!("cannot read working directory: {e}")))?;
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        resolved.push(segment);
    }
    Ok(normalize_path(&resolved))
}

/// Collapse `.` and `..` without touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component);
    }
    display(&result)
}

fn dirname_of(path: &str) -> String {
    match Path::new(path).parent() {
        None if Path::new(path).has_root() => MAIN_SEPARATOR_STR.to_string(),
        None => ".".to_string(),
        Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
        Some(parent) => display(parent),
    }
}

fn basename_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension of a file name including the dot; dotfiles have none.
fn extname_of(base: &str) -> String {
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(index) => base[index..].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Interpreter;
    use tempfile::TempDir;

    fn eval_string(source: &str) -> String {
        let dir = TempDir::new().unwrap();
        let interpreter = Interpreter::new(HostState::new(dir.path().join("t.js"), dir.path())).unwrap();
        interpreter.eval_to_string(source).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path(Path::new("/a/b/c"), Path::new("/a/d")), "../../d");
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a/b/c")), "b/c");
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), "");
    }

    #[test]
    fn test_name_parts() {
        assert_eq!(dirname_of("/a/b/c.js"), "/a/b");
        assert_eq!(dirname_of("c.js"), ".");
        assert_eq!(dirname_of("/"), "/");
        assert_eq!(basename_of("/a/b/c.js"), "c.js");
        assert_eq!(extname_of("c.test.js"), ".js");
        assert_eq!(extname_of(".bashrc"), "");
        assert_eq!(extname_of("Makefile"), "");
    }

    #[test]
    fn test_script_surface() {
        let out = eval_string(
            r#"const path = require("node:path");
               [
                 path.join("a", "b", "../c"),
                 path.basename("/x/y/file.txt", ".txt"),
                 path.extname("archive.tar.gz"),
                 path.isAbsolute("/etc"),
                 path.match("*.js", "greet.js"),
                 JSON.stringify(path.parse("/home/u/file.txt")),
               ].join("|")"#,
        );
        assert_eq!(
            out,
            r#"a/c|file|.gz|true|true|{"root":"/","dir":"/home/u","base":"file.txt","ext":".txt","name":"file"}"#
        );
    }

    #[test]
    fn test_missing_argument_is_error_value() {
        let out = eval_string(r#"require("path").dirname().message"#);
        assert_eq!(out, "dirname: missing argument 'path'");
    }

    #[test]
    fn test_invalid_pattern_is_error_value() {
        let out = eval_string(r#"String(require("path").match("[", "x") instanceof Error)"#);
        assert_eq!(out, "true");
    }
}
