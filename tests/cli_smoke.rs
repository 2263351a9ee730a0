//! CLI smoke tests against the built `pov` binary.

mod common;

use std::fs;

use serde_json::Value;

use common::Sandbox;

const BASE: &str = "user_pref(\"browser.startup.page\", 0);\nuser_pref(\"privacy.resistFingerprinting\", true);\n";

fn json_of(result: &common::CmdResult) -> Value {
    serde_json::from_str(result.stdout.trim()).unwrap_or_else(|err| {
        panic!(
            "expected JSON output, parse failed: {err}; stdout={:?}; log={}",
            result.stdout,
            result.log_path.display()
        )
    })
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: pov [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("pov"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn subcommand_help_flags_work() {
    for subcmd in ["install", "update", "uninstall", "diff", "backups", "config"] {
        let case_name = format!("subcommand_help_{subcmd}");
        let result = common::run_cli_case(&case_name, &[subcmd, "--help"]);
        assert!(
            result.status.success(),
            "help failed for {subcmd}; log: {}",
            result.log_path.display()
        );
        assert!(
            result.stdout.contains("Usage: pov"),
            "missing usage for {subcmd}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn completions_command_generates_shell_script() {
    let result = common::run_cli_case("completions_bash", &["completions", "bash"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("_pov"),
        "completion script missing function; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_path_reports_explicit_file() {
    let sandbox = Sandbox::new(BASE);
    let result = sandbox.run("config_path_json", &["config", "path", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_of(&result);
    assert_eq!(payload["command"], "config path");
    assert_eq!(payload["exists"], true);
}

#[test]
fn missing_explicit_config_is_a_user_error() {
    let sandbox = Sandbox::new(BASE);
    let missing = sandbox.home().join("nope.toml");
    let result = common::run_cli_case_in(
        "missing_explicit_config",
        &["--config", &missing.display().to_string(), "config", "show"],
        Some(sandbox.home()),
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("POV-1002"), "log: {}", result.log_path.display());
}

#[test]
fn install_update_uninstall_round_trip() {
    let sandbox = Sandbox::new(BASE);
    fs::write(sandbox.profile.join("user.js"), "user_pref(\"mine\", 1);\n").unwrap();
    fs::write(&sandbox.override_file, "user_pref(\"browser.startup.page\", 3);\n").unwrap();

    let install = sandbox.run("install", &["install", "--yes", "--no-schedule", "--json"]);
    assert!(install.status.success(), "log: {}", install.log_path.display());
    let payload = json_of(&install);
    assert_eq!(payload["command"], "install");
    assert_eq!(payload["report"]["apply"]["outcome"], "applied");
    assert_eq!(
        payload["report"]["apply"]["conflicts"]["keys"][0],
        "browser.startup.page"
    );
    let expected = format!("{BASE}user_pref(\"browser.startup.page\", 3);\n");
    assert_eq!(sandbox.live().as_deref(), Some(expected.as_str()));

    let update = sandbox.run("update_auto", &["update", "--auto", "--json"]);
    assert!(update.status.success(), "log: {}", update.log_path.display());
    assert_eq!(json_of(&update)["report"]["apply"]["outcome"], "up_to_date");

    let list = sandbox.run("backups_list", &["backups", "list", "--json"]);
    assert!(list.status.success(), "log: {}", list.log_path.display());
    let backups = json_of(&list)["backups"]["backups"].clone();
    assert_eq!(backups.as_array().map(Vec::len), Some(2));
    assert_eq!(backups[1]["reason"], "install");

    let uninstall = sandbox.run("uninstall", &["uninstall", "--yes", "--json"]);
    assert!(uninstall.status.success(), "log: {}", uninstall.log_path.display());
    assert_eq!(sandbox.live().as_deref(), Some("user_pref(\"mine\", 1);\n"));

    let log = sandbox.event_log();
    for event in ["install_start", "update_start", "applied", "up_to_date", "backup_restored"] {
        assert!(log.contains(event), "event log missing {event}:\n{log}");
    }
}

#[test]
fn diff_previews_without_writing() {
    let sandbox = Sandbox::new(BASE);
    let install = sandbox.run("diff_install", &["install", "--yes", "--no-schedule", "--json"]);
    assert!(install.status.success(), "log: {}", install.log_path.display());
    let before = sandbox.live();

    fs::write(&sandbox.override_file, "user_pref(\"added.by.override\", 1);\n").unwrap();
    let diff = sandbox.run("diff", &["diff", "--json"]);
    assert!(diff.status.success(), "log: {}", diff.log_path.display());
    let payload = json_of(&diff);
    assert_eq!(payload["preview"]["summary"], "added.by.override");
    assert_eq!(payload["preview"]["up_to_date"], false);
    assert_eq!(sandbox.live(), before);
}

#[test]
fn missing_profile_exits_with_user_error() {
    let sandbox = Sandbox::new(BASE);
    fs::remove_dir_all(&sandbox.profile).unwrap();
    let result = sandbox.run("missing_profile", &["update", "--auto", "--json"]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("POV-1101"), "log: {}", result.log_path.display());
    assert!(sandbox.event_log().contains("POV-1101"));
}

#[test]
fn uninstall_without_backups_is_a_user_error() {
    let sandbox = Sandbox::new(BASE);
    let result = sandbox.run("uninstall_no_backups", &["uninstall", "--yes"]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("POV-2004"), "log: {}", result.log_path.display());
}
