//! `fs` module: synchronous filesystem access.
//!
//! Relative paths resolve against the process working directory. Failures
//! are returned as `Error` values naming the path.

use std::fs;
use std::io::Write;
use std::rc::Rc;
use std::time::UNIX_EPOCH;

use rquickjs::{Ctx, Object, Value};

use super::{HostError, HostFn, HostResult, HostState, bool_arg, build_module, string_arg, text_arg, to_js, undefined};

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("readFile", read_file),
    ("writeFile", write_file),
    ("appendFile", append_file),
    ("exists", exists),
    ("readdir", readdir),
    ("mkdir", mkdir),
    ("rm", rm),
    ("copyFile", copy_file),
    ("rename", rename),
    ("unlink", unlink),
    ("realpath", realpath),
    ("readlink", readlink),
    ("stat", stat),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    build_module(ctx, state, FUNCTIONS)
}

fn read_file<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let contents = fs::read_to_string(&path).map_err(|e| HostError::io(&path, e))?;
    to_js(ctx, contents)
}

fn write_file<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let data = text_arg(args, 1, "data")?;
    fs::write(&path, data).map_err(|e| HostError::io(&path, e))?;
    undefined(ctx)
}

fn append_file<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let data = text_arg(args, 1, "data")?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(data.as_bytes()))
        .map_err(|e| HostError::io(&path, e))?;
    undefined(ctx)
}

fn exists<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    to_js(ctx, fs::symlink_metadata(&path).is_ok())
}

fn readdir<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let entries = fs::read_dir(&path).map_err(|e| HostError::io(&path, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| HostError::io(&path, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    to_js(ctx, names)
}

fn mkdir<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let result = if bool_arg(args, 1) {
        fs::create_dir_all(&path)
    } else {
        fs::create_dir(&path)
    };
    result.map_err(|e| HostError::io(&path, e))?;
    undefined(ctx)
}

fn rm<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let meta = fs::symlink_metadata(&path).map_err(|e| HostError::io(&path, e))?;
    let result = match (meta.is_dir(), bool_arg(args, 1)) {
        (true, true) => fs::remove_dir_all(&path),
        (true, false) => fs::remove_dir(&path),
        (false, _) => fs::remove_file(&path),
    };
    result.map_err(|e| HostError::io(&path, e))?;
    undefined(ctx)
}

fn copy_file<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let src = string_arg(args, 0, "src")?;
    let dst = string_arg(args, 1, "dst")?;
    fs::copy(&src, &dst).map_err(|e| HostError::io(&src, e))?;
    undefined(ctx)
}

fn rename<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let from = string_arg(args, 0, "from")?;
    let to = string_arg(args, 1, "to")?;
    fs::rename(&from, &to).map_err(|e| HostError::io(&from, e))?;
    undefined(ctx)
}

fn unlink<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    fs::remove_file(&path).map_err(|e| HostError::io(&path, e))?;
    undefined(ctx)
}

fn realpath<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let real = fs::canonicalize(&path).map_err(|e| HostError::io(&path, e))?;
    to_js(ctx, real.display().to_string())
}

fn readlink<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let target = fs::read_link(&path).map_err(|e| HostError::io(&path, e))?;
    to_js(ctx, target.display().to_string())
}

fn stat<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let path = string_arg(args, 0, "path")?;
    let link = fs::symlink_metadata(&path).map_err(|e| HostError::io(&path, e))?;
    // Follow the link for everything except `isSymlink`; dangling links
    // report on the link itself.
    let meta = fs::metadata(&path).unwrap_or_else(|_| link.clone());
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as f64);

    let info = Object::new(ctx.clone())?;
    info.set("size", meta.len() as f64)?;
    info.set("isFile", meta.is_file())?;
    info.set("isDirectory", meta.is_dir())?;
    info.set("isSymlink", link.file_type().is_symlink())?;
    info.set("modified", modified)?;
    Ok(info.into_value())
}

#[cfg(test)]
mod tests {
    use crate::host::HostState;
    use crate::runtime::Interpreter;
    use tempfile::TempDir;

    fn eval_string(dir: &TempDir, source: &str) -> String {
        let interpreter = Interpreter::new(HostState::new(dir.path().join("t.js"), dir.path())).unwrap();
        interpreter.eval_to_string(source).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("out.txt");
        let source = format!(
            r#"const fs = require("fs");
               fs.writeFile({p:?}, "one ");
               fs.appendFile({p:?}, 2);
               fs.readFile({p:?})"#,
            p = file.display().to_string()
        );
        assert_eq!(eval_string(&dir, &source), "one 2");
    }

    #[test]
    fn test_missing_argument_returns_error_value() {
        let dir = TempDir::new().unwrap();
        let out = eval_string(
            &dir,
            r#"const r = require("fs").readFile(); (r instanceof Error) + ":" + r.message"#,
        );
        assert_eq!(out, "true:readFile: missing argument 'path'");
    }

    #[test]
    fn test_read_missing_file_returns_error_value() {
        let dir = TempDir::new().unwrap();
        let out = eval_string(
            &dir,
            r#"const r = require("fs").readFile("/definitely/not/here"); String(r instanceof Error)"#,
        );
        assert_eq!(out, "true");
    }

    #[test]
    fn test_mkdir_readdir_rm() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().display().to_string();
        let source = format!(
            r#"const fs = require("fs");
               fs.mkdir({root:?} + "/a/b", true);
               fs.writeFile({root:?} + "/a/z.txt", "");
               const listed = fs.readdir({root:?} + "/a").join(",");
               const refused = fs.rm({root:?} + "/a") instanceof Error;
               fs.rm({root:?} + "/a", true);
               listed + "|" + refused + "|" + fs.exists({root:?} + "/a")"#
        );
        assert_eq!(eval_string(&dir, &source), "b,z.txt|true|false");
    }

    #[test]
    fn test_stat_reports_kind_and_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "12345").unwrap();
        let source = format!(
            r#"const s = require("fs").stat({p:?});
               [s.size, s.isFile, s.isDirectory, s.isSymlink, typeof s.modified].join(",")"#,
            p = dir.path().join("f.txt").display().to_string()
        );
        assert_eq!(eval_string(&dir, &source), "5,true,false,false,number");
    }

    #[test]
    fn test_copy_and_rename() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "data").unwrap();
        let root = dir.path().display().to_string();
        let source = format!(
            r#"const fs = require("fs");
               fs.copyFile({root:?} + "/a.txt", {root:?} + "/b.txt");
               fs.rename({root:?} + "/b.txt", {root:?} + "/c.txt");
               fs.unlink({root:?} + "/a.txt");
               fs.readdir({root:?}).join(",")"#
        );
        assert_eq!(eval_string(&dir, &source), "c.txt");
    }
}
