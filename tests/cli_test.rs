use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_smoke_runs_the_flow_to_completion() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("lodgepay"));
    cmd.arg("smoke");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("checkout issued"))
        .stdout(predicate::str::contains("payment completed"));

    Ok(())
}

#[test]
fn test_verify_requires_gateway_arguments() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("lodgepay"));
    cmd.args(["verify", "5e0ee0b8-6f5a-4fb6-9f6e-8f5a9b1c2d3e"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--gateway-url"));

    Ok(())
}

#[test]
fn test_help_lists_subcommands() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("lodgepay"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("smoke"));

    Ok(())
}
