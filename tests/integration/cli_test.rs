use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("spine-forge").expect("binary");
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_config_prints_json() {
    cli()
        .env("SPINE_FORGE__CONVERTER__TIMEOUT_SECONDS", "42")
        .args(["config", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"timeout_seconds\": 42"));
}

#[test]
fn test_rewrite_command_resets_paths() {
    let temp = tempfile::tempdir().expect("tempdir");
    let json = temp.path().join("hero.json");
    std::fs::write(
        &json,
        r#"{"skeleton":{"images":"D:/art/images/","audio":"D:/art/audio"}}"#,
    )
    .expect("write");

    cli()
        .arg("rewrite")
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("images, audio"));

    let rewritten = std::fs::read_to_string(&json).expect("read");
    assert_eq!(
        rewritten,
        r#"{"skeleton":{"images": "./images/","audio": ""}}"#
    );
    assert!(temp.path().join("hero.json.backup").is_file());
}

#[test]
fn test_convert_missing_input_exits_nonzero() {
    let temp = tempfile::tempdir().expect("tempdir");

    cli()
        .arg("convert")
        .arg(temp.path().join("missing.spine"))
        .arg("--output")
        .arg(temp.path().join("out"))
        .args(["--format", "json"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("input_file_not_found"));
}

#[test]
fn test_convert_requires_output() {
    cli()
        .args(["convert", "hero.spine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}
