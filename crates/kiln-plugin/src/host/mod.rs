//! Host API bridge.
//!
//! Every host function is a plain `fn` with the [`HostFn`] signature. The
//! module builders wrap them into JavaScript functions with a uniform error
//! contract: [`HostError::Value`] becomes a returned `Error` object (scripts
//! check for it, nothing is thrown) and [`HostError::Fault`] propagates as
//! an interpreter exception.

pub mod child_process;
pub mod console;
pub mod domain;
pub mod fs;
pub mod os;
pub mod path;
pub mod process;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use kiln_config::MetadataStore;
use rquickjs::prelude::{Coerced, IntoJs, Rest};
use rquickjs::{CaughtError, Ctx, Exception, Function, Object, Value};

use crate::descriptor::CommandDescriptor;
use crate::timers::TimerQueue;

pub use console::ConsoleSink;

// ─────────────────────────────────────────────────────────────────────────────
// Host state
// ─────────────────────────────────────────────────────────────────────────────

/// Per-interpreter host state shared by every installed host function.
pub struct HostState {
    script_path: PathBuf,
    project_dir: PathBuf,
    console: ConsoleSink,
    metadata: MetadataStore,
    started: Instant,
    pub(crate) argv: RefCell<Vec<String>>,
    pub(crate) registration: RefCell<Option<CommandDescriptor>>,
    pub(crate) timers: RefCell<TimerQueue>,
}

impl HostState {
    pub fn new(script_path: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        let script_path = script_path.into();
        let project_dir = project_dir.into();
        Self {
            argv: RefCell::new(vec![script_path.display().to_string()]),
            metadata: MetadataStore::for_project(&project_dir),
            script_path,
            project_dir,
            console: ConsoleSink::default(),
            started: Instant::now(),
            registration: RefCell::new(None),
            timers: RefCell::new(TimerQueue::default()),
        }
    }

    /// Route console output somewhere other than stdout.
    pub fn with_console(mut self, console: ConsoleSink) -> Self {
        self.console = console;
        self
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn console(&self) -> &ConsoleSink {
        &self.console
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// When this state (and its interpreter) was created.
    pub fn started(&self) -> Instant {
        self.started
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host functions
// ─────────────────────────────────────────────────────────────────────────────

/// Failure of a host function.
#[derive(Debug)]
pub enum HostError {
    /// Returned to the script as an `Error` value.
    Value(String),
    /// Raised in the interpreter as an exception.
    Fault(rquickjs::Error),
}

impl From<rquickjs::Error> for HostError {
    fn from(err: rquickjs::Error) -> Self {
        HostError::Fault(err)
    }
}

impl HostError {
    pub fn value(message: impl Into<String>) -> Self {
        HostError::Value(message.into())
    }

    pub fn not_implemented() -> Self {
        HostError::Value("not implemented".to_string())
    }

    /// An I/O failure on `path`.
    pub fn io(path: &str, err: std::io::Error) -> Self {
        HostError::Value(format!("{path}: {err}"))
    }
}

pub type HostResult<'js> = Result<Value<'js>, HostError>;

/// Signature shared by every host function.
pub type HostFn = for<'js> fn(&Ctx<'js>, &HostState, &[Value<'js>]) -> HostResult<'js>;

/// Build a module object from a table of host functions.
pub(crate) fn build_module<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<HostState>,
    functions: &[(&'static str, HostFn)],
) -> rquickjs::Result<Object<'js>> {
    let module = Object::new(ctx.clone())?;
    for &(name, f) in functions {
        module.set(name, wrap(ctx, state, name, f)?)?;
    }
    Ok(module)
}

fn wrap<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<HostState>,
    name: &'static str,
    f: HostFn,
) -> rquickjs::Result<Function<'js>> {
    let state = Rc::clone(state);
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            match f(&ctx, &state, &args.0) {
                Ok(value) => Ok(value),
                Err(HostError::Value(message)) => error_value(&ctx, &format!("{name}: {message}")),
                Err(HostError::Fault(err)) => Err(err),
            }
        },
    )
}

/// Construct (without throwing) a JavaScript `Error` object.
pub fn error_value<'js>(ctx: &Ctx<'js>, message: &str) -> rquickjs::Result<Value<'js>> {
    Ok(Exception::from_message(ctx.clone(), message)?
        .into_object()
        .into_value())
}

/// Convert a host value into a script value.
pub(crate) fn to_js<'js>(ctx: &Ctx<'js>, value: impl IntoJs<'js>) -> HostResult<'js> {
    Ok(value.into_js(ctx)?)
}

pub(crate) fn undefined<'js>(ctx: &Ctx<'js>) -> HostResult<'js> {
    Ok(Value::new_undefined(ctx.clone()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument coercion
// ─────────────────────────────────────────────────────────────────────────────

fn present<'a, 'js>(args: &'a [Value<'js>], index: usize) -> Option<&'a Value<'js>> {
    args.get(index).filter(|v| !v.is_undefined())
}

/// A required string argument.
pub(crate) fn string_arg(args: &[Value<'_>], index: usize, name: &str) -> Result<String, HostError> {
    let value = present(args, index)
        .ok_or_else(|| HostError::value(format!("missing argument '{name}'")))?;
    match value.as_string() {
        Some(s) => Ok(s.to_string()?),
        None => Err(HostError::value(format!("argument '{name}' must be a string"))),
    }
}

/// A required argument converted to text (numbers, booleans, objects via `String()`).
pub(crate) fn text_arg(args: &[Value<'_>], index: usize, name: &str) -> Result<String, HostError> {
    let value = present(args, index)
        .ok_or_else(|| HostError::value(format!("missing argument '{name}'")))?;
    Ok(value.get::<Coerced<String>>()?.0)
}

/// An optional boolean argument; anything but `true` is false.
pub(crate) fn bool_arg(args: &[Value<'_>], index: usize) -> bool {
    present(args, index).and_then(Value::as_bool).unwrap_or(false)
}

/// A required numeric argument.
pub(crate) fn number_arg(args: &[Value<'_>], index: usize, name: &str) -> Result<f64, HostError> {
    let value = present(args, index)
        .ok_or_else(|| HostError::value(format!("missing argument '{name}'")))?;
    value
        .as_number()
        .ok_or_else(|| HostError::value(format!("argument '{name}' must be a number")))
}

/// Every argument from `start` on as a required string.
pub(crate) fn string_rest(args: &[Value<'_>], start: usize, name: &str) -> Result<Vec<String>, HostError> {
    (start..args.len())
        .map(|index| string_arg(args, index, name))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Error rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Human-readable message for a caught script error.
pub fn describe_caught(err: CaughtError<'_>) -> String {
    match err {
        CaughtError::Exception(exception) => {
            let message = exception.message().unwrap_or_default();
            let name = exception
                .as_object()
                .get::<_, Option<String>>("name")
                .ok()
                .flatten();
            match name {
                Some(name) if name != "Error" && !name.is_empty() => format!("{name}: {message}"),
                _ => message,
            }
        }
        CaughtError::Value(value) => describe_value(&value),
        CaughtError::Error(err) => err.to_string(),
    }
}

/// Message for an arbitrary thrown or rejected value.
pub fn describe_value(value: &Value<'_>) -> String {
    if let Some(exception) = value.as_exception() {
        return describe_caught(CaughtError::Exception(exception.clone()));
    }
    console::format_value(value)
}
