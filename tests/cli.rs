use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("garden-assistant").unwrap();
    // Keep the developer's real keys and .env-loaded settings out of these runs.
    cmd.env_remove("ORS_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: garden-assistant <COMMAND>"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    cli()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: garden-assistant serve"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--templates-dir <TEMPLATES_DIR>"))
        .stdout(predicate::str::contains("--ors-api-key <ORS_API_KEY>"))
        .stdout(predicate::str::contains("--openrouter-api-key <OPENROUTER_API_KEY>"));
}

#[test]
fn test_cli_chat_help() {
    cli()
        .arg("chat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: garden-assistant chat"))
        .stdout(predicate::str::contains("--address <ADDRESS>"));
}

#[test]
fn test_missing_api_keys_abort_startup() {
    cli()
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--ors-api-key <ORS_API_KEY>"))
        .stderr(predicate::str::contains("--openrouter-api-key <OPENROUTER_API_KEY>"));
}

#[test]
fn test_cli_no_command() {
    cli()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: garden-assistant <COMMAND>"));
}

#[test]
fn test_chat_ends_on_eof_with_greeting() {
    cli()
        .arg("chat")
        .env("ORS_API_KEY", "unused")
        .env("OPENROUTER_API_KEY", "unused")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("assistant> Hello! I'm your Gardening Assistant."));
}
