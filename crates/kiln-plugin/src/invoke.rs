//! Invocation bridge: call a bound script's `run` with a context object.
//!
//! The context handed to `run` has two members:
//! - `Args()` returns the positional arguments as an array
//! - `Flags()` returns a frozen object with one property per flag plus a
//!   `get(name)` accessor

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use rquickjs::prelude::{Coerced, This};
use rquickjs::{CatchResultExt, Ctx, Function, Object, Persistent, Value};

use crate::descriptor::FlagValue;
use crate::host::{describe_caught, describe_value};
use crate::runtime::Interpreter;

/// Outcome of one `run` call and the deferred work that followed it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// What `run` threw, or the reason its returned promise rejected.
    pub error: Option<String>,
    /// Errors thrown later by timers and promise jobs.
    pub deferred_errors: Vec<String>,
    /// Deferred work was abandoned at the quiesce bound.
    pub timed_out: bool,
}

impl Invocation {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.deferred_errors.is_empty()
    }

    /// Every error message, the `run` failure first.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.error
            .iter()
            .chain(&self.deferred_errors)
            .map(String::as_str)
    }
}

/// Call `run` with the given positional arguments and flag values, then
/// quiesce the interpreter.
pub(crate) fn invoke(
    interpreter: &Interpreter,
    run: &Persistent<Function<'static>>,
    args: Vec<String>,
    flags: Vec<(String, FlagValue)>,
    timeout: Option<Duration>,
) -> Invocation {
    let state = interpreter.shared_state();
    {
        let mut argv = state.argv.borrow_mut();
        argv.truncate(1);
        argv.extend(args.iter().cloned());
    }

    let rejection: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let called = interpreter.with(|ctx| {
        call_run(&ctx, run, args, flags, &rejection)
            .catch(&ctx)
            .map_err(describe_caught)
    });

    let report = interpreter.quiesce(timeout);
    let error = called.err().or_else(|| rejection.borrow_mut().take());
    Invocation {
        error,
        deferred_errors: report.errors,
        timed_out: report.timed_out,
    }
}

fn call_run<'js>(
    ctx: &Ctx<'js>,
    run: &Persistent<Function<'static>>,
    args: Vec<String>,
    flags: Vec<(String, FlagValue)>,
    rejection: &Rc<RefCell<Option<String>>>,
) -> rquickjs::Result<()> {
    let run = run.clone().restore(ctx)?;
    let context = context_object(ctx, args, flags)?;
    let returned: Value = run.call((context,))?;
    watch_thenable(ctx, returned, rejection)
}

/// Build the `ctx` argument passed to `run`.
fn context_object<'js>(
    ctx: &Ctx<'js>,
    args: Vec<String>,
    flags: Vec<(String, FlagValue)>,
) -> rquickjs::Result<Object<'js>> {
    let context = Object::new(ctx.clone())?;
    context.set("Args", Function::new(ctx.clone(), move || args.clone())?)?;

    let flags = Rc::new(flags);
    context.set(
        "Flags",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| flags_object(&ctx, &flags))?,
    )?;
    Ok(context)
}

fn flags_object<'js>(ctx: &Ctx<'js>, flags: &Rc<Vec<(String, FlagValue)>>) -> rquickjs::Result<Object<'js>> {
    let object = Object::new(ctx.clone())?;
    for (name, value) in flags.iter() {
        object.set(name.as_str(), value.clone())?;
    }

    let lookup: BTreeMap<String, FlagValue> = flags.iter().cloned().collect();
    object.set(
        "get",
        Function::new(ctx.clone(), move |name: Coerced<String>| lookup.get(&name.0).cloned())?,
    )?;

    let object_ctor: Object = ctx.globals().get("Object")?;
    let freeze: Function = object_ctor.get("freeze")?;
    freeze.call::<_, Value>((object.clone(),))?;
    Ok(object)
}

/// If `run` returned a thenable, record its rejection reason.
fn watch_thenable<'js>(
    ctx: &Ctx<'js>,
    returned: Value<'js>,
    rejection: &Rc<RefCell<Option<String>>>,
) -> rquickjs::Result<()> {
    let Some(object) = returned.as_object() else {
        return Ok(());
    };
    let then: Value = object.get("then")?;
    let Some(then) = then.as_function() else {
        return Ok(());
    };

    let on_fulfilled = Function::new(ctx.clone(), || ())?;
    let slot = Rc::clone(rejection);
    let on_rejected = Function::new(ctx.clone(), move |reason: Value<'js>| {
        slot.replace(Some(describe_value(&reason)));
    })?;
    then.call::<_, Value>((This(object.clone()), on_fulfilled, on_rejected))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_errors_order() {
        let invocation = Invocation {
            error: Some("run failed".into()),
            deferred_errors: vec!["timer failed".into()],
            timed_out: false,
        };
        assert!(!invocation.succeeded());
        assert_eq!(
            invocation.errors().collect::<Vec<_>>(),
            vec!["run failed", "timer failed"]
        );
        assert!(Invocation::default().succeeded());
    }
}
