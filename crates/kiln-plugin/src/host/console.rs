//! `console` module: plain and colored line loggers.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use console::Style;
use rquickjs::prelude::Coerced;
use rquickjs::{Ctx, Object, Type, Value};

use super::{HostFn, HostResult, HostState, build_module, undefined};

/// Color used by `console.color` when only a message is given.
pub const DEFAULT_COLOR: &str = "cyan";

/// Where console output goes.
#[derive(Debug, Clone, Default)]
pub enum ConsoleSink {
    /// Process stdout; colors are applied when the terminal supports them.
    #[default]
    Stdout,
    /// In-memory capture of the uncolored text.
    Buffer(Rc<RefCell<String>>),
}

impl ConsoleSink {
    /// A capturing sink and a handle to its contents.
    pub fn buffer() -> (Self, Rc<RefCell<String>>) {
        let contents = Rc::new(RefCell::new(String::new()));
        (ConsoleSink::Buffer(Rc::clone(&contents)), contents)
    }

    /// Write one line, optionally styled.
    pub fn write_line(&self, line: &str, style: Option<&Style>) {
        match self {
            ConsoleSink::Stdout => {
                let mut out = std::io::stdout().lock();
                let written = match style {
                    Some(style) => writeln!(out, "{}", style.apply_to(line)),
                    None => writeln!(out, "{line}"),
                };
                if let Err(e) = written {
                    tracing::debug!(error = %e, "console write failed");
                }
            }
            ConsoleSink::Buffer(contents) => {
                let mut contents = contents.borrow_mut();
                contents.push_str(line);
                contents.push('\n');
            }
        }
    }
}

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("log", log),
    ("info", log),
    ("warn", log),
    ("error", log),
    ("debug", log),
    ("green", green),
    ("yellow", yellow),
    ("red", red),
    ("color", color),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    build_module(ctx, state, FUNCTIONS)
}

fn log<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    state.console().write_line(&join_values(args), None);
    undefined(ctx)
}

fn green<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    state
        .console()
        .write_line(&join_values(args), Some(&Style::new().green()));
    undefined(ctx)
}

fn yellow<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    state
        .console()
        .write_line(&join_values(args), Some(&Style::new().yellow()));
    undefined(ctx)
}

fn red<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    state
        .console()
        .write_line(&join_values(args), Some(&Style::new().red()));
    undefined(ctx)
}

/// `color(...values, name)`. A lone argument is the message, not a color.
fn color<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let (message, color_name) = color_parts(args);
    let style = Style::from_dotted_str(&color_name);
    state.console().write_line(&message, Some(&style));
    undefined(ctx)
}

/// Split `color` arguments into the message text and the color name.
fn color_parts(args: &[Value<'_>]) -> (String, String) {
    match args {
        [] | [_] => (join_values(args), DEFAULT_COLOR.to_string()),
        [values @ .., name] => (join_values(values), format_value(name)),
    }
}

fn join_values(values: &[Value<'_>]) -> String {
    values.iter().map(format_value).collect::<Vec<_>>().join(" ")
}

/// Render one value the way the console prints it.
pub fn format_value(value: &Value<'_>) -> String {
    match value.type_of() {
        Type::Undefined => "undefined".to_string(),
        Type::Null => "null".to_string(),
        Type::String => value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .unwrap_or_default(),
        Type::Function | Type::Constructor => "[Function]".to_string(),
        Type::Symbol => "Symbol()".to_string(),
        Type::Exception => {
            let message = value
                .as_exception()
                .and_then(|e| e.message())
                .unwrap_or_default();
            format!("Error: {message}")
        }
        Type::Object | Type::Array => stringify(value),
        _ => coerce(value),
    }
}

fn stringify(value: &Value<'_>) -> String {
    let ctx = value.ctx();
    match ctx.json_stringify(value.clone()) {
        Ok(Some(json)) => json.to_string().unwrap_or_default(),
        Ok(None) => coerce(value),
        Err(_) => {
            // Clear the pending exception (e.g. a cyclic structure)
            let _ = ctx.catch();
            coerce(value)
        }
    }
}

fn coerce(value: &Value<'_>) -> String {
    match value.get::<Coerced<String>>() {
        Ok(s) => s.0,
        Err(_) => {
            let _ = value.ctx().catch();
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn render(source: &str) -> String {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: Value = ctx.eval(source).unwrap();
            format_value(&value)
        })
    }

    #[test]
    fn test_format_scalars() {
        assert_eq!(render("'hi'"), "hi");
        assert_eq!(render("42"), "42");
        assert_eq!(render("1.5"), "1.5");
        assert_eq!(render("true"), "true");
        assert_eq!(render("null"), "null");
        assert_eq!(render("undefined"), "undefined");
    }

    #[test]
    fn test_format_compound_values() {
        assert_eq!(render("({a: 1, b: [true, 'x']})"), r#"{"a":1,"b":[true,"x"]}"#);
        assert_eq!(render("[1, 2]"), "[1,2]");
        assert_eq!(render("(function f() {})"), "[Function]");
        assert_eq!(render("(() => 1)"), "[Function]");
    }

    #[test]
    fn test_format_error_value() {
        assert_eq!(render("new Error('boom')"), "Error: boom");
    }

    #[test]
    fn test_format_cyclic_object_does_not_throw() {
        assert_eq!(render("(() => { const o = {}; o.self = o; return o; })()"), "[object Object]");
    }

    fn color_parts_of(source: &str) -> (String, String) {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let array: rquickjs::Array = ctx.eval(source).unwrap();
            let values: Vec<Value> = array.iter().collect::<rquickjs::Result<_>>().unwrap();
            color_parts(&values)
        })
    }

    #[test]
    fn test_color_lone_argument_is_message() {
        assert_eq!(
            color_parts_of(r#"["red"]"#),
            ("red".to_string(), DEFAULT_COLOR.to_string())
        );
        assert_eq!(color_parts_of("[]"), (String::new(), DEFAULT_COLOR.to_string()));
    }

    #[test]
    fn test_color_last_argument_is_color_name() {
        assert_eq!(
            color_parts_of(r#"["a", "b", "red"]"#),
            ("a b".to_string(), "red".to_string())
        );
        assert_eq!(
            color_parts_of(r#"["done", 3, "magenta.bold"]"#),
            ("done 3".to_string(), "magenta.bold".to_string())
        );
    }

    #[test]
    fn test_buffer_sink_strips_style() {
        let (sink, contents) = ConsoleSink::buffer();
        sink.write_line("plain", None);
        sink.write_line("colored", Some(&Style::new().red()));
        assert_eq!(contents.borrow().as_str(), "plain\ncolored\n");
    }
}
