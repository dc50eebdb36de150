//! `child_process` module: synchronous command execution only.

use std::process::Command;
use std::rc::Rc;

use rquickjs::{Ctx, Object, Value};

use super::{HostError, HostFn, HostResult, HostState, build_module, error_value, string_arg, to_js};

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("execSync", exec_sync),
    ("exec", not_implemented),
    ("execFile", not_implemented),
    ("spawn", not_implemented),
    ("fork", not_implemented),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    build_module(ctx, state, FUNCTIONS)
}

/// `execSync(command, args?)`: run to completion and return stdout followed
/// by stderr. Without `args` the command line is split with shell word rules
/// (no shell is involved).
fn exec_sync<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let command = string_arg(args, 0, "command")?;
    let argv = match args.get(1).filter(|v| !v.is_undefined() && !v.is_null()) {
        Some(list) => {
            let list = list
                .as_array()
                .ok_or_else(|| HostError::value("argument 'args' must be an array"))?;
            let mut argv = vec![command.clone()];
            for item in list.iter::<Value>() {
                let item = item?;
                let arg = item
                    .as_string()
                    .ok_or_else(|| HostError::value("argument 'args' must contain only strings"))?;
                argv.push(arg.to_string()?);
            }
            argv
        }
        None => shell_words::split(&command)
            .map_err(|e| HostError::value(format!("cannot parse command line: {e}")))?,
    };

    let Some((program, rest)) = argv.split_first() else {
        return Err(HostError::value("empty command"));
    };

    tracing::debug!(program = %program, args = ?rest, "execSync");
    let output = Command::new(program)
        .args(rest)
        .output()
        .map_err(|e| HostError::value(format!("{program}: {e}")))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        return to_js(ctx, combined);
    }

    let status = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let error = error_value(ctx, &format!("execSync: {command} exited with status {status}"))?;
    if let Some(object) = error.as_object() {
        object.set("output", combined)?;
        object.set("status", output.status.code())?;
    }
    Ok(error)
}

fn not_implemented<'js>(_: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    Err(HostError::value("asynchronous process spawning is not implemented; use execSync"))
}
