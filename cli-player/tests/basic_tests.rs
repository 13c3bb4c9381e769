use assert_cmd::prelude::*;
use predicates::prelude::predicate;
use std::io::Write;
use std::process::{Command, Stdio};

#[test]
fn basic_story_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("loomplayer")?;

    cmd.arg("tests/data/pick_one.json");
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());

    let mut child = cmd.spawn()?;
    let mut stdin = child.stdin.take().unwrap();

    stdin.write_all(b"1\n").unwrap();
    drop(stdin);

    let output = child.wait_with_output()?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.starts_with("Pick one."));
    assert!(output_str.contains("1: Red"));
    assert!(output_str.contains("2: Blue"));
    assert!(output_str.ends_with("You picked red.\n"));

    Ok(())
}

#[test]
fn quit_command_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = assert_cmd::Command::cargo_bin("loomplayer")?;

    cmd.arg("tests/data/pick_one.json");
    cmd.write_stdin("quit\n");

    let output = cmd.output()?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.starts_with("Pick one."));
    assert!(!output_str.contains("You picked"));

    Ok(())
}

#[test]
fn out_of_range_option_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = assert_cmd::Command::cargo_bin("loomplayer")?;

    cmd.arg("tests/data/pick_one.json");
    cmd.write_stdin("7\n2\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::ends_with("You picked blue.\n"))
        .stderr(predicate::str::contains("option out of range"));

    Ok(())
}

#[test]
fn auto_play_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("loomplayer")?;

    cmd.args(["-a", "-s", "7", "tests/data/pick_one.json"]);

    let output = cmd.output()?;
    let output_str = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(output_str.contains("?> "));
    assert!(
        output_str.ends_with("You picked red.\n") || output_str.ends_with("You picked blue.\n")
    );

    Ok(())
}

#[test]
fn story_not_found_test() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("loomplayer")?;

    cmd.arg("nonexistent.json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not read file"));

    Ok(())
}
