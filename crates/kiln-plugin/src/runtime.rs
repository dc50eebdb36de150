//! The embedded JavaScript interpreter.
//!
//! One [`Interpreter`] per script: a QuickJS runtime and context equipped by
//! the [module registry](crate::registry) before any script code runs.

use std::rc::Rc;
use std::time::{Duration, Instant};

use rquickjs::{CatchResultExt, Context, Ctx, Runtime, Value};

use crate::descriptor::CommandDescriptor;
use crate::host::{HostState, describe_caught, describe_value};
use crate::{PluginError, Result, registry};

/// What happened while waiting for deferred work.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QuiesceReport {
    /// Errors thrown by timer callbacks or promise jobs, in order.
    pub errors: Vec<String>,
    /// The bound elapsed before the work drained.
    pub timed_out: bool,
}

pub struct Interpreter {
    // Field order is drop order: host state (and any persistent values it
    // holds) must go before the context and runtime.
    state: Rc<HostState>,
    context: Context,
    runtime: Runtime,
}

impl Interpreter {
    /// Create an interpreter and install the host modules.
    pub fn new(state: HostState) -> Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let state = Rc::new(state);
        context.with(|ctx| registry::install(&ctx, &state))?;
        Ok(Self {
            state,
            context,
            runtime,
        })
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub(crate) fn shared_state(&self) -> &Rc<HostState> {
        &self.state
    }

    /// Run a closure inside the interpreter's context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(Ctx<'js>) -> R,
    {
        self.context.with(f)
    }

    /// Evaluate script text and return the command it registered, if any.
    ///
    /// The registration slot belongs to this evaluation alone: it is emptied
    /// before the script runs and handed back afterwards.
    pub fn evaluate(&self, source: &str) -> Result<Option<CommandDescriptor>> {
        self.state.registration.borrow_mut().take();
        let evaluated = self.context.with(|ctx| {
            ctx.eval::<Value, _>(source)
                .map(|_| ())
                .catch(&ctx)
                .map_err(describe_caught)
        });
        let descriptor = self.state.registration.borrow_mut().take();
        match evaluated {
            Ok(()) => Ok(descriptor),
            Err(message) => Err(PluginError::Evaluation(message)),
        }
    }

    /// Wait until no promise jobs or timers remain, or until `timeout`.
    pub fn quiesce(&self, timeout: Option<Duration>) -> QuiesceReport {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut report = QuiesceReport::default();

        loop {
            self.drain_jobs(&mut report);

            let Some(due) = self.state.timers.borrow().next_due() else {
                break;
            };
            if let Some(deadline) = deadline
                && due > deadline
            {
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                report.timed_out = true;
                break;
            }

            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }

            let callback = self.state.timers.borrow_mut().pop_due(Instant::now());
            if let Some(callback) = callback {
                let fired = self.context.with(|ctx| {
                    callback
                        .restore(&ctx)
                        .and_then(|f| f.call::<_, Value>(()))
                        .map(|_| ())
                        .catch(&ctx)
                        .map_err(describe_caught)
                });
                if let Err(message) = fired {
                    tracing::debug!(error = %message, "timer callback failed");
                    report.errors.push(message);
                }
            }
        }

        if report.timed_out {
            self.state.timers.borrow_mut().clear();
        }
        report
    }

    fn drain_jobs(&self, report: &mut QuiesceReport) {
        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(_) => {}
                Err(failed) => {
                    let message = failed.0.with(|ctx| describe_value(&ctx.catch()));
                    tracing::debug!(error = %message, "deferred job failed");
                    report.errors.push(message);
                }
            }
        }
    }

    /// Evaluate an expression and render its value as the console would.
    #[cfg(test)]
    pub(crate) fn eval_to_string(&self, source: &str) -> std::result::Result<String, String> {
        self.context.with(|ctx| {
            ctx.eval::<Value, _>(source)
                .map(|value| crate::host::console::format_value(&value))
                .catch(&ctx)
                .map_err(describe_caught)
        })
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Persistent callbacks must be released while the runtime is alive.
        self.state.timers.borrow_mut().clear();
        self.state.registration.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConsoleSink;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn interpreter(dir: &TempDir) -> (Interpreter, Rc<RefCell<String>>) {
        let (sink, output) = ConsoleSink::buffer();
        let state = HostState::new(dir.path().join("t.js"), dir.path()).with_console(sink);
        (Interpreter::new(state).unwrap(), output)
    }

    #[test]
    fn test_evaluate_without_registration() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        assert!(interpreter.evaluate("const x = 1;").unwrap().is_none());
    }

    #[test]
    fn test_syntax_error_is_evaluation_error() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        let err = interpreter.evaluate("function (").unwrap_err();
        assert!(matches!(err, PluginError::Evaluation(_)));
        assert!(err.to_string().contains("SyntaxError"));
    }

    #[test]
    fn test_unknown_module_throws() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        let err = interpreter.evaluate(r#"require("net")"#).unwrap_err();
        assert!(err.to_string().contains("Cannot find module 'net'"));
    }

    #[test]
    fn test_require_builds_fresh_module_objects() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        let out = interpreter
            .eval_to_string(r#"const a = require("fs"); a.extra = 1; String(require("node:fs").extra)"#)
            .unwrap();
        assert_eq!(out, "undefined");
    }

    #[test]
    fn test_no_ambient_host_access() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        let out = interpreter
            .eval_to_string(r#"[typeof std, typeof os, typeof scriptArgs, typeof fs].join(",")"#)
            .unwrap();
        assert_eq!(out, "undefined,undefined,undefined,undefined");
    }

    #[test]
    fn test_quiesce_runs_timers_in_due_order() {
        let dir = TempDir::new().unwrap();
        let (interpreter, output) = interpreter(&dir);
        interpreter
            .evaluate(
                r#"setTimeout(() => console.log("late"), 20);
                   setTimeout(() => console.log("early"), 5);
                   setImmediate(() => console.log("now"));
                   Promise.resolve().then(() => console.log("job"));"#,
            )
            .unwrap();

        let report = interpreter.quiesce(None);
        assert!(report.errors.is_empty());
        assert!(!report.timed_out);
        assert_eq!(output.borrow().as_str(), "job\nnow\nearly\nlate\n");
    }

    #[test]
    fn test_interval_can_cancel_itself() {
        let dir = TempDir::new().unwrap();
        let (interpreter, output) = interpreter(&dir);
        interpreter
            .evaluate(
                r#"let n = 0;
                   const id = setInterval(() => {
                     n += 1;
                     console.log("tick", n);
                     if (n === 3) clearInterval(id);
                   }, 1);"#,
            )
            .unwrap();

        interpreter.quiesce(None);
        assert_eq!(output.borrow().as_str(), "tick 1\ntick 2\ntick 3\n");
    }

    #[test]
    fn test_cleared_timeout_never_fires() {
        let dir = TempDir::new().unwrap();
        let (interpreter, output) = interpreter(&dir);
        interpreter
            .evaluate(r#"clearTimeout(setTimeout(() => console.log("nope"), 1));"#)
            .unwrap();
        interpreter.quiesce(None);
        assert_eq!(output.borrow().as_str(), "");
    }

    #[test]
    fn test_timer_errors_are_collected_and_draining_continues() {
        let dir = TempDir::new().unwrap();
        let (interpreter, output) = interpreter(&dir);
        interpreter
            .evaluate(
                r#"setTimeout(() => { throw new Error("first"); }, 1);
                   setTimeout(() => console.log("still runs"), 2);"#,
            )
            .unwrap();

        let report = interpreter.quiesce(None);
        assert_eq!(report.errors, vec!["first".to_string()]);
        assert_eq!(output.borrow().as_str(), "still runs\n");
    }

    #[test]
    fn test_quiesce_timeout_abandons_runaway_interval() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        interpreter.evaluate("setInterval(() => {}, 5);").unwrap();

        let report = interpreter.quiesce(Some(Duration::from_millis(30)));
        assert!(report.timed_out);
        assert!(interpreter.state().timers.borrow().is_empty());
    }

    #[test]
    fn test_huge_timer_delay_fires_promptly() {
        let dir = TempDir::new().unwrap();
        let (interpreter, output) = interpreter(&dir);
        interpreter
            .evaluate(r#"setTimeout(() => console.log("fired"), 1e22);"#)
            .unwrap();

        let report = interpreter.quiesce(Some(Duration::from_secs(5)));
        assert!(!report.timed_out);
        assert_eq!(output.borrow().as_str(), "fired\n");
    }

    #[test]
    fn test_timer_callback_must_be_function() {
        let dir = TempDir::new().unwrap();
        let (interpreter, _) = interpreter(&dir);
        assert!(interpreter.evaluate(r#"setTimeout("code", 1)"#).is_err());
    }
}
