//! `kiln` module: project metadata and command registration.

use std::rc::Rc;

use rquickjs::{Ctx, Exception, Object, Value};

use super::{HostError, HostFn, HostResult, HostState, build_module, string_arg, to_js, undefined};
use crate::descriptor::CommandDescriptor;

const FUNCTIONS: &[(&str, HostFn)] = &[("getMetadata", get_metadata), ("Command", command)];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    build_module(ctx, state, FUNCTIONS)
}

/// `getMetadata(key)`: one field of the project metadata store.
fn get_metadata<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    if args.len() != 1 {
        return Err(HostError::value(format!(
            "expected exactly one argument, got {}",
            args.len()
        )));
    }
    let key = string_arg(args, 0, "key")?;
    let value = state
        .metadata()
        .get(&key)
        .map_err(|e| HostError::value(e.to_string()))?;
    to_js(ctx, value)
}

/// `Command(config)`: register this script's command.
///
/// Unlike the rest of the host API, misuse throws: registration happens once
/// at load time and a broken registration must stop the script from binding.
fn command<'js>(ctx: &Ctx<'js>, state: &HostState, args: &[Value<'js>]) -> HostResult<'js> {
    let [config] = args else {
        return Err(HostError::Fault(Exception::throw_type(
            ctx,
            &format!("Command expects exactly one argument, got {}", args.len()),
        )));
    };
    let descriptor = CommandDescriptor::from_config(ctx, config)?;
    tracing::debug!(
        script = %state.script_path().display(),
        flags = descriptor.flags.len(),
        aliases = descriptor.aliases.len(),
        "command registered"
    );
    state.registration.replace(Some(descriptor));
    undefined(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FlagKind, FlagValue};
    use crate::runtime::Interpreter;
    use tempfile::TempDir;

    fn interpreter(dir: &TempDir) -> Interpreter {
        Interpreter::new(HostState::new(dir.path().join("t.js"), dir.path())).unwrap()
    }

    #[test]
    fn test_get_metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        kiln_config::MetadataStore::for_project(dir.path())
            .set("version", "1.4.2")
            .unwrap();

        let out = interpreter(&dir)
            .eval_to_string(r#"require("kiln").getMetadata("version")"#)
            .unwrap();
        assert_eq!(out, "1.4.2");
    }

    #[test]
    fn test_get_metadata_missing_key_is_error_value() {
        let dir = TempDir::new().unwrap();
        kiln_config::MetadataStore::for_project(dir.path())
            .set("name", "demo")
            .unwrap();

        let out = interpreter(&dir)
            .eval_to_string(
                r#"const r = require("kiln").getMetadata("license");
                   (r instanceof Error) + "|" + r.message"#,
            )
            .unwrap();
        assert!(out.starts_with("true|getMetadata: "));
        assert!(out.contains("license"));
    }

    #[test]
    fn test_get_metadata_arity_is_error_value() {
        let dir = TempDir::new().unwrap();
        let out = interpreter(&dir)
            .eval_to_string(
                r#"const k = require("kiln");
                   [k.getMetadata() instanceof Error, k.getMetadata("a", "b") instanceof Error].join(",")"#,
            )
            .unwrap();
        assert_eq!(out, "true,true");
    }

    #[test]
    fn test_command_builds_descriptor() {
        let dir = TempDir::new().unwrap();
        let interpreter = interpreter(&dir);
        let descriptor = interpreter
            .evaluate(
                r#"require("kiln").Command({
                     short: "Greet",
                     long: 42,
                     alias: ["hi", 7, "hello"],
                     flags: [
                       { name: "name", type: "string", default: "world", shorthand: "n", description: "who" },
                       "not a flag",
                       { name: "loud", type: "bool" },
                       { name: "count", type: "string", default: 3 },
                     ],
                     run: () => {},
                   });"#,
            )
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.short, "Greet");
        assert_eq!(descriptor.long, "42");
        assert_eq!(descriptor.aliases, vec!["hi", "hello"]);
        assert_eq!(descriptor.flags.len(), 3);
        assert_eq!(descriptor.flags[0].shorthand.as_deref(), Some("n"));
        assert_eq!(descriptor.flags[0].description, "who");
        assert_eq!(descriptor.flags[1].kind(), FlagKind::Bool);
        assert_eq!(descriptor.flags[1].default, FlagValue::Bool(false));
        assert_eq!(descriptor.flags[2].default, FlagValue::String("3".into()));
    }

    #[test]
    fn test_command_contract_violations_throw() {
        let dir = TempDir::new().unwrap();
        let cases = [
            r#"require("kiln").Command()"#,
            r#"require("kiln").Command({run() {}}, {})"#,
            r#"require("kiln").Command(null)"#,
            r#"require("kiln").Command(() => {})"#,
            r#"require("kiln").Command({})"#,
            r#"require("kiln").Command({run: "nope"})"#,
            r#"require("kiln").Command({run() {}, flags: [{name: "x", type: "number"}]})"#,
            r#"require("kiln").Command({run() {}, flags: [{name: "x", type: "bool", default: "yes"}]})"#,
        ];
        for source in cases {
            let interpreter = interpreter(&dir);
            assert!(interpreter.evaluate(source).is_err(), "expected fault: {source}");
        }
    }

    #[test]
    fn test_bool_default_fault_ignores_earlier_registration() {
        let dir = TempDir::new().unwrap();
        let result = interpreter(&dir).evaluate(
            r#"const { Command } = require("kiln");
               Command({ run() {} });
               Command({ run() {}, flags: [{ name: "v", type: "bool", default: 1 }] });"#,
        );
        assert!(result.is_err());
    }
}
