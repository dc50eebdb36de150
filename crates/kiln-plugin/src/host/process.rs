//! `process` module: the running kiln process.

use std::rc::Rc;

use rquickjs::{Ctx, Function, Object, Value};

use super::os::{platform_name, procfs};
use super::{HostError, HostFn, HostResult, HostState, build_module, number_arg, string_arg, to_js, undefined};

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("exit", exit),
    ("cwd", cwd),
    ("chdir", chdir),
    ("uptime", uptime),
    ("memoryUsage", memory_usage),
    ("kill", kill),
    ("getuid", ids::getuid),
    ("getgid", ids::getgid),
    ("geteuid", ids::geteuid),
    ("getegid", ids::getegid),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    let module = build_module(ctx, state, FUNCTIONS)?;
    module.set("env", kiln_config::merged_env(state.project_dir()))?;
    module.set("pid", std::process::id())?;
    module.set("platform", platform_name())?;

    // `argv` gains the positional arguments once the command is invoked,
    // so it is read through a getter rather than copied at require time.
    let argv_state = Rc::clone(state);
    let getter = Function::new(ctx.clone(), move || argv_state.argv.borrow().clone())?;
    define_getter(ctx, &module, "argv", getter)?;
    Ok(module)
}

fn define_getter<'js>(
    ctx: &Ctx<'js>,
    target: &Object<'js>,
    name: &str,
    getter: Function<'js>,
) -> rquickjs::Result<()> {
    let object: Object = ctx.globals().get("Object")?;
    let define: Function = object.get("defineProperty")?;
    let descriptor = Object::new(ctx.clone())?;
    descriptor.set("get", getter)?;
    descriptor.set("enumerable", true)?;
    define.call::<_, Value>((target.clone(), name, descriptor))?;
    Ok(())
}

fn exit<'js>(_: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let code = args.first().and_then(Value::as_number).unwrap_or(0.0) as i32;
    tracing::debug!(code, "script requested process exit");
    std::process::exit(code)
}

fn cwd<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    let dir = std::env::current_dir().map_err(|e| HostError::value(e.to_string()))?;
    to_js(ctx, dir.display().to_string())
}

fn chdir<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let dir = string_arg(args, 0, "directory")?;
    std::env::set_current_dir(&dir).map_err(|e| HostError::io(&dir, e))?;
    undefined(ctx)
}

fn uptime<'js>(ctx: &Ctx<'js>, state: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, state.started().elapsed().as_secs_f64())
}

fn memory_usage<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    let usage = Object::new(ctx.clone())?;
    usage.set("rss", procfs::rss()? as f64)?;
    Ok(usage.into_value())
}

#[cfg(unix)]
fn kill<'js>(ctx: &Ctx<'js>, _: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = number_arg(args, 0, "pid")? as i32;
    let signal = match args.get(1).filter(|v| !v.is_undefined()) {
        None => Some(Signal::SIGTERM),
        Some(value) => {
            if let Some(number) = value.as_number() {
                let number = number as i32;
                if number == 0 {
                    None
                } else {
                    Some(
                        Signal::try_from(number)
                            .map_err(|_| HostError::value(format!("unknown signal {number}")))?,
                    )
                }
            } else {
                let name = string_arg(args, 1, "signal")?;
                Some(parse_signal(&name)?)
            }
        }
    };

    signal::kill(Pid::from_raw(pid), signal)
        .map_err(|e| HostError::value(format!("pid {pid}: {e}")))?;
    to_js(ctx, true)
}

#[cfg(unix)]
fn parse_signal(name: &str) -> Result<nix::sys::signal::Signal, HostError> {
    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    full.parse()
        .map_err(|_| HostError::value(format!("unknown signal '{name}'")))
}

#[cfg(not(unix))]
fn kill<'js>(_: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    Err(HostError::not_implemented())
}

#[cfg(unix)]
mod ids {
    use nix::unistd;
    use rquickjs::{Ctx, Value};

    use super::{HostResult, HostState, to_js};

    pub fn getuid<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
        to_js(ctx, unistd::getuid().as_raw())
    }

    pub fn getgid<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
        to_js(ctx, unistd::getgid().as_raw())
    }

    pub fn geteuid<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
        to_js(ctx, unistd::geteuid().as_raw())
    }

    pub fn getegid<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
        to_js(ctx, unistd::getegid().as_raw())
    }
}

#[cfg(not(unix))]
mod ids {
    use rquickjs::{Ctx, Value};

    use super::{HostError, HostResult, HostState};

    pub fn getuid<'js>(_: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
        Err(HostError::not_implemented())
    }

    pub use getuid as getgid;
    pub use getuid as geteuid;
    pub use getuid as getegid;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Interpreter;
    use tempfile::TempDir;

    fn interpreter(dir: &TempDir) -> Interpreter {
        Interpreter::new(HostState::new(dir.path().join("t.js"), dir.path())).unwrap()
    }

    #[test]
    fn test_env_includes_prefixed_env_file_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "KILN_GREETING=\"hello there\"\nIGNORED=1\n").unwrap();

        let out = interpreter(&dir)
            .eval_to_string(
                r#"const env = require("process").env;
                   env.KILN_GREETING + "|" + (env.IGNORED === undefined)"#,
            )
            .unwrap();
        assert_eq!(out, "hello there|true");
    }

    #[test]
    fn test_argv_starts_with_script_path() {
        let dir = TempDir::new().unwrap();
        let out = interpreter(&dir)
            .eval_to_string(r#"require("process").argv.length"#)
            .unwrap();
        assert_eq!(out, "1");
    }

    #[cfg(unix)]
    #[test]
    fn test_ids_and_signal_parsing() {
        let dir = TempDir::new().unwrap();
        let out = interpreter(&dir)
            .eval_to_string(r#"typeof require("process").getuid()"#)
            .unwrap();
        assert_eq!(out, "number");

        assert_eq!(parse_signal("term").unwrap(), nix::sys::signal::Signal::SIGTERM);
        assert_eq!(parse_signal("SIGKILL").unwrap(), nix::sys::signal::Signal::SIGKILL);
        assert!(parse_signal("SIGNOPE").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_signal_zero_probes_own_pid() {
        let dir = TempDir::new().unwrap();
        let out = interpreter(&dir)
            .eval_to_string(r#"const p = require("process"); String(p.kill(p.pid, 0))"#)
            .unwrap();
        assert_eq!(out, "true");
    }

    #[test]
    fn test_uptime_is_non_negative() {
        let dir = TempDir::new().unwrap();
        let out = interpreter(&dir)
            .eval_to_string(r#"String(require("process").uptime() >= 0)"#)
            .unwrap();
        assert_eq!(out, "true");
    }
}
