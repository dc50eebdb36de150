//! CLI integration tests for the kiln command-line interface.
//!
//! Each test runs the built binary inside a temporary project with an empty
//! temporary config directory, so no user configuration leaks in.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A throwaway project with its own config directory.
struct Project {
    root: TempDir,
    config: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            config: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write a script into the default commands directory.
    fn script(&self, name: &str, source: &str) -> &Self {
        let dir = self.path().join(".kiln/commands");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), source).unwrap();
        self
    }

    fn kiln(&self) -> Command {
        let mut cmd = Command::cargo_bin("kiln").unwrap();
        cmd.current_dir(self.path())
            .env("KILN_CONFIG_DIR", self.config.path())
            .env_remove("KILN_LOG");
        cmd
    }
}

const GREET: &str = r#"
const { Command } = require("kiln");
Command({
  short: "Say hi",
  long: "Say hi to someone, loudly if asked.",
  alias: ["hello"],
  flags: [
    { name: "name", type: "string", shorthand: "n", default: "world", description: "Who to greet" },
    { name: "loud", type: "bool", description: "Shout it" },
  ],
  run(ctx) {
    const f = ctx.Flags();
    const line = "hi " + f.get("name");
    console.log(f.loud ? line.toUpperCase() : line);
  },
});
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    Project::new()
        .kiln()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"))
        .stdout(predicate::str::contains("custom"))
        .stdout(predicate::str::contains("scripts"))
        .stdout(predicate::str::contains("metadata"));
}

#[test]
fn test_version_displays() {
    Project::new()
        .kiln()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln"));
}

#[test]
fn test_verbose_flag_accepted() {
    Project::new().kiln().args(["--verbose", "--help"]).assert().success();
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_custom_command_runs_with_defaults_and_flags() {
    let project = Project::new();
    project.script("greet.js", GREET);

    project
        .kiln()
        .args(["custom", "greet"])
        .assert()
        .success()
        .stdout("hi world\n");

    project
        .kiln()
        .args(["custom", "greet", "--name", "Ada"])
        .assert()
        .success()
        .stdout("hi Ada\n");

    project
        .kiln()
        .args(["x", "hello", "-n", "Bo", "--loud"])
        .assert()
        .success()
        .stdout("HI BO\n");
}

#[test]
fn test_custom_command_help_does_not_run_script() {
    let project = Project::new();
    project.script("greet.js", GREET);

    project
        .kiln()
        .args(["custom", "greet", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Say hi to someone, loudly if asked."))
        .stdout(predicate::str::contains("Who to greet"))
        .stdout(predicate::str::contains("Shout it"))
        .stdout(predicate::str::contains("hi world").not());

    project
        .kiln()
        .args(["custom", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greet"))
        .stdout(predicate::str::contains("Say hi"));
}

#[test]
fn test_broken_script_is_skipped_with_warning() {
    let project = Project::new();
    project
        .script("greet.js", GREET)
        .script("broken.js", r#"require("kiln").Command({ short: "no run" });"#);

    project
        .kiln()
        .args(["custom", "greet"])
        .assert()
        .success()
        .stdout("hi world\n")
        .stderr(predicate::str::contains("warning: skipped"))
        .stderr(predicate::str::contains("broken.js"));
}

#[test]
fn test_failing_run_reports_path_and_exits_nonzero() {
    let project = Project::new();
    project.script(
        "fail.js",
        r#"require("kiln").Command({ run() { console.log("before"); throw new Error("boom"); } });"#,
    );

    project
        .kiln()
        .args(["custom", "fail"])
        .assert()
        .failure()
        .code(1)
        .stdout("before\n")
        .stderr(predicate::str::contains("fail.js: boom"));
}

#[test]
fn test_unknown_custom_command_rejected() {
    Project::new()
        .kiln()
        .args(["custom", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_ignore_rules_from_project_config() {
    let project = Project::new();
    project
        .script("greet.js", GREET)
        .script("draft.js", "this is not javascript(");
    fs::write(
        project.path().join("kiln.toml"),
        "[commands]\nignore = [\"draft.*\"]\n",
    )
    .unwrap();

    project
        .kiln()
        .arg("scripts")
        .assert()
        .success()
        .stdout(predicate::str::contains("greet"))
        .stdout(predicate::str::contains("Skipped").not())
        .stderr(predicate::str::contains("draft.js").not());
}

// ─────────────────────────────────────────────────────────────────────────────
// Builtin Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scripts_json_lists_commands_and_skipped() {
    let project = Project::new();
    project
        .script("greet.js", GREET)
        .script("quiet.js", "const nothing = 1;");

    let output = project.kiln().args(["scripts", "--json"]).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["commands"][0]["name"], "greet");
    assert_eq!(report["commands"][0]["aliases"][0], "hello");
    assert_eq!(report["commands"][0]["flags"][0]["default"], "world");
    assert_eq!(report["commands"][0]["flags"][1]["type"], "bool");
    assert!(report["skipped"][0]["path"].as_str().unwrap().ends_with("quiet.js"));
}

#[test]
fn test_scripts_with_no_commands_dir() {
    Project::new()
        .kiln()
        .arg("scripts")
        .assert()
        .success()
        .stdout(predicate::str::contains("No scripts found"));
}

#[test]
fn test_metadata_set_get_list() {
    let project = Project::new();

    project
        .kiln()
        .args(["metadata", "set", "version", "0.3.1"])
        .assert()
        .success();

    project
        .kiln()
        .args(["metadata", "get", "version"])
        .assert()
        .success()
        .stdout("0.3.1\n");

    project
        .kiln()
        .args(["metadata", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\": \"0.3.1\""));

    project
        .kiln()
        .args(["metadata", "get", "license"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("license"));
}

#[test]
fn test_script_reads_metadata_set_from_cli() {
    let project = Project::new();
    project.script(
        "version.js",
        r#"const kiln = require("kiln");
           kiln.Command({ run() { console.log(kiln.getMetadata("version")); } });"#,
    );

    project
        .kiln()
        .args(["metadata", "set", "version", "2.0.0"])
        .assert()
        .success();

    project
        .kiln()
        .args(["custom", "version"])
        .assert()
        .success()
        .stdout("2.0.0\n");
}
