use assert_cmd::Command;

fn cli(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("connect-cli").unwrap();
    cmd.env_clear().current_dir(dir.path()).env("RUST_LOG", "off");
    cmd
}

#[test]
fn provision_without_profile_reports_configuration_failure() {
    let dir = tempfile::tempdir().unwrap();

    let output = cli(&dir).arg("provision").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["outcome"], "failed");
    assert_eq!(outcome["stage"], "configuration");
    assert_eq!(outcome["message"], "MissingField: endpoint");
}

#[test]
fn provision_reads_secrets_from_environment() {
    let dir = tempfile::tempdir().unwrap();

    let output = cli(&dir)
        .env("CONNECT_COSMOS__ACCOUNT_ENDPOINT", "https://127.0.0.1:9/")
        .args(["provision", "--database", "bad/name"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    // The key is missing, so resolution stops before the name is checked.
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["message"], "MissingField: accessKey");
}

#[test]
fn invalid_name_is_rejected_before_connecting() {
    let dir = tempfile::tempdir().unwrap();

    let output = cli(&dir)
        .env("CONNECT_COSMOS__ACCOUNT_ENDPOINT", "https://127.0.0.1:9/")
        .env("CONNECT_COSMOS__AUTH_KEY", "c2VjcmV0")
        .args(["provision", "--database", "bad/name"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["stage"], "provision");
    assert!(outcome["message"].as_str().unwrap().starts_with("InvalidName: "));
}

#[test]
fn unknown_trust_mode_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();

    cli(&dir)
        .args(["provision", "--trust-mode", "sometimes"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn transport_flags_accept_kernel_values() {
    let dir = tempfile::tempdir().unwrap();

    let output = cli(&dir)
        .args([
            "provision",
            "--trust-mode",
            "accept-all-certificates",
            "--topology",
            "direct",
        ])
        .output()
        .unwrap();

    // Parsed fine; fails later on the missing profile.
    assert_eq!(output.status.code(), Some(1));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["stage"], "configuration");
}
