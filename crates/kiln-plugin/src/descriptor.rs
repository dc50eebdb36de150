//! Command and flag descriptors produced by a script's `Command` call.

use std::fmt;

use rquickjs::prelude::{Coerced, IntoJs};
use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Flags
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of flag types a script may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Bool,
}

impl FlagKind {
    /// Parse the `type` field of a flag declaration.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FlagKind::String),
            "bool" => Some(FlagKind::Bool),
            _ => None,
        }
    }

    /// Name as written in scripts.
    pub fn as_str(self) -> &'static str {
        match self {
            FlagKind::String => "string",
            FlagKind::Bool => "bool",
        }
    }

    /// The value a flag takes when no default is declared.
    pub fn zero(self) -> FlagValue {
        match self {
            FlagKind::String => FlagValue::String(String::new()),
            FlagKind::Bool => FlagValue::Bool(false),
        }
    }
}

/// A typed flag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    String(String),
    Bool(bool),
}

impl FlagValue {
    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::String(_) => FlagKind::String,
            FlagValue::Bool(_) => FlagKind::Bool,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::String(s) => f.write_str(s),
            FlagValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl<'js> IntoJs<'js> for FlagValue {
    fn into_js(self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        match self {
            FlagValue::String(s) => s.into_js(ctx),
            FlagValue::Bool(b) => b.into_js(ctx),
        }
    }
}

/// One declared CLI option.
///
/// The flag's type is carried by `default`, which always holds a value of
/// the declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDescriptor {
    pub name: String,
    pub shorthand: Option<String>,
    pub default: FlagValue,
    pub description: String,
}

impl FlagDescriptor {
    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command
// ─────────────────────────────────────────────────────────────────────────────

/// The result of one script's `Command({...})` call.
pub struct CommandDescriptor {
    /// The script's `run` callback.
    pub run: Persistent<Function<'static>>,
    pub short: String,
    pub long: String,
    pub aliases: Vec<String>,
    pub flags: Vec<FlagDescriptor>,
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("short", &self.short)
            .field("long", &self.long)
            .field("aliases", &self.aliases)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl CommandDescriptor {
    /// Build a descriptor from the object passed to `Command`.
    ///
    /// Contract violations (not an object, missing or non-callable `run`,
    /// unsupported flag type, non-boolean default on a bool flag) are thrown
    /// as `TypeError`s into the evaluating script.
    pub fn from_config<'js>(ctx: &Ctx<'js>, config: &Value<'js>) -> rquickjs::Result<Self> {
        let Some(config) = config.as_object().filter(|_| !config.is_function()) else {
            return Err(Exception::throw_type(
                ctx,
                "Command expects a configuration object",
            ));
        };

        let run: Value = config.get("run")?;
        let Some(run) = run.into_function() else {
            return Err(Exception::throw_type(
                ctx,
                "Command configuration requires a 'run' function",
            ));
        };

        Ok(Self {
            run: Persistent::save(ctx, run),
            short: optional_string(config, "short")?,
            long: optional_string(config, "long")?,
            aliases: read_aliases(config)?,
            flags: read_flags(ctx, config)?,
        })
    }
}

fn optional_string(object: &Object<'_>, key: &str) -> rquickjs::Result<String> {
    let value: Value = object.get(key)?;
    if value.is_undefined() || value.is_null() {
        return Ok(String::new());
    }
    Ok(value.get::<Coerced<String>>()?.0)
}

fn read_aliases(config: &Object<'_>) -> rquickjs::Result<Vec<String>> {
    let value: Value = config.get("alias")?;
    let Some(array) = value.as_array() else {
        return Ok(Vec::new());
    };
    let mut aliases = Vec::new();
    for item in array.iter::<Value>() {
        if let Some(s) = item?.as_string() {
            aliases.push(s.to_string()?);
        }
    }
    Ok(aliases)
}

fn read_flags<'js>(ctx: &Ctx<'js>, config: &Object<'js>) -> rquickjs::Result<Vec<FlagDescriptor>> {
    let value: Value = config.get("flags")?;
    let Some(array) = value.as_array() else {
        return Ok(Vec::new());
    };
    let mut flags = Vec::new();
    for item in array.iter::<Value>() {
        let item = item?;
        if item.is_function() || item.is_array() {
            continue;
        }
        if let Some(object) = item.as_object() {
            flags.push(read_flag(ctx, object)?);
        }
    }
    Ok(flags)
}

fn read_flag<'js>(ctx: &Ctx<'js>, object: &Object<'js>) -> rquickjs::Result<FlagDescriptor> {
    let name = optional_string(object, "name")?;
    let type_name = optional_string(object, "type")?;
    let Some(kind) = FlagKind::parse(&type_name) else {
        return Err(Exception::throw_type(
            ctx,
            &format!("flag '{name}': unsupported type '{type_name}' (expected \"string\" or \"bool\")"),
        ));
    };

    let default_value: Value = object.get("default")?;
    let default = if default_value.is_undefined() {
        kind.zero()
    } else {
        match kind {
            FlagKind::Bool => match default_value.as_bool() {
                Some(b) => FlagValue::Bool(b),
                None => {
                    return Err(Exception::throw_type(
                        ctx,
                        &format!("flag '{name}': default of a bool flag must be a boolean"),
                    ));
                }
            },
            FlagKind::String if default_value.is_null() => kind.zero(),
            FlagKind::String => FlagValue::String(default_value.get::<Coerced<String>>()?.0),
        }
    };

    let shorthand = optional_string(object, "shorthand")?;
    Ok(FlagDescriptor {
        name,
        shorthand: (!shorthand.is_empty()).then_some(shorthand),
        default,
        description: optional_string(object, "description")?,
    })
}
