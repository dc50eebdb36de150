//! Module registry: the only doors from script code into the host.
//!
//! A fresh interpreter gets exactly these globals:
//! - `require(name)` resolving the fixed [`MODULES`] table
//! - `console`
//! - `setTimeout`, `setInterval`, `setImmediate`, `clearTimeout`, `clearInterval`

use std::rc::Rc;
use std::time::Duration;

use rquickjs::prelude::Opt;
use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value};

use crate::host::{self, HostState};

/// Builds one module object.
pub type ModuleBuilder = for<'js> fn(&Ctx<'js>, &Rc<HostState>) -> rquickjs::Result<Object<'js>>;

/// Names accepted by `require`, with an optional `node:` prefix.
pub const MODULES: &[(&str, ModuleBuilder)] = &[
    ("fs", host::fs::module),
    ("os", host::os::module),
    ("path", host::path::module),
    ("process", host::process::module),
    ("child_process", host::child_process::module),
    ("console", host::console::module),
    ("kiln", host::domain::module),
];

/// Look up a module builder by `require` name.
pub fn lookup(name: &str) -> Option<ModuleBuilder> {
    let name = name.strip_prefix("node:").unwrap_or(name);
    MODULES
        .iter()
        .find(|(module, _)| *module == name)
        .map(|&(_, builder)| builder)
}

/// Install the registry into a fresh context.
pub fn install<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let require_state = Rc::clone(state);
    globals.set(
        "require",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: Value<'js>| -> rquickjs::Result<Object<'js>> {
                let name = name
                    .as_string()
                    .map(|s| s.to_string())
                    .transpose()?
                    .unwrap_or_default();
                match lookup(&name) {
                    Some(builder) => builder(&ctx, &require_state),
                    None => Err(Exception::throw_message(
                        &ctx,
                        &format!("Cannot find module '{name}'"),
                    )),
                }
            },
        )?,
    )?;

    globals.set("console", host::console::module(ctx, state)?)?;

    install_timers(ctx, state, &globals)
}

fn install_timers<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<HostState>,
    globals: &Object<'js>,
) -> rquickjs::Result<()> {
    for (name, repeat) in [("setTimeout", false), ("setInterval", true)] {
        let state = Rc::clone(state);
        globals.set(
            name,
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, callback: Value<'js>, delay: Opt<Value<'js>>| {
                    schedule(&ctx, &state, callback, delay_of(delay.0), repeat)
                },
            )?,
        )?;
    }

    let immediate_state = Rc::clone(state);
    globals.set(
        "setImmediate",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, callback: Value<'js>| {
            schedule(&ctx, &immediate_state, callback, Duration::ZERO, false)
        })?,
    )?;

    for name in ["clearTimeout", "clearInterval"] {
        let state = Rc::clone(state);
        globals.set(
            name,
            Function::new(ctx.clone(), move |id: Opt<Value<'js>>| {
                if let Some(id) = id.0.and_then(|v| v.as_number()) {
                    state.timers.borrow_mut().cancel(id as u32);
                }
            })?,
        )?;
    }

    Ok(())
}

/// Longest delay a timer accepts; anything larger fires after 1ms.
const MAX_DELAY_MS: f64 = 2_147_483_647.0;

fn delay_of(value: Option<Value<'_>>) -> Duration {
    delay_from_millis(value.and_then(|v| v.as_number()).unwrap_or(0.0))
}

fn delay_from_millis(millis: f64) -> Duration {
    if !millis.is_finite() || millis <= 0.0 {
        Duration::ZERO
    } else if millis > MAX_DELAY_MS {
        Duration::from_millis(1)
    } else {
        Duration::from_secs_f64(millis / 1000.0)
    }
}

fn schedule<'js>(
    ctx: &Ctx<'js>,
    state: &HostState,
    callback: Value<'js>,
    delay: Duration,
    repeat: bool,
) -> rquickjs::Result<u32> {
    let Some(callback) = callback.into_function() else {
        return Err(Exception::throw_type(ctx, "timer callback must be a function"));
    };
    let callback = Persistent::save(ctx, callback);
    Ok(state.timers.borrow_mut().schedule(callback, delay, repeat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_node_prefix() {
        assert!(lookup("fs").is_some());
        assert!(lookup("node:fs").is_some());
        assert!(lookup("node:child_process").is_some());
        assert!(lookup("kiln").is_some());
        assert!(lookup("net").is_none());
        assert!(lookup("node:").is_none());
    }

    #[test]
    fn test_delay_is_clamped_to_timer_range() {
        assert_eq!(delay_from_millis(0.0), Duration::ZERO);
        assert_eq!(delay_from_millis(-5.0), Duration::ZERO);
        assert_eq!(delay_from_millis(f64::NAN), Duration::ZERO);
        assert_eq!(delay_from_millis(f64::INFINITY), Duration::ZERO);
        assert_eq!(delay_from_millis(250.0), Duration::from_millis(250));
        assert_eq!(delay_from_millis(MAX_DELAY_MS), Duration::from_millis(2_147_483_647));
        assert_eq!(delay_from_millis(1e22), Duration::from_millis(1));
    }

    #[test]
    fn test_module_table_is_fixed() {
        let names: Vec<_> = MODULES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["fs", "os", "path", "process", "child_process", "console", "kiln"]
        );
    }
}
