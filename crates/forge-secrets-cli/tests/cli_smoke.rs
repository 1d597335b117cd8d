use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn cli_cmd(tmp: &TempDir) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("forge-secrets");
    cmd.current_dir(tmp.path())
        .env_remove("FORGE_SECRETS_MASTER_KEY_PROVIDER")
        .env_remove("FORGE_SECRETS_KEY_FILE")
        .env_remove("FORGE_SECRETS_GENERATE_IF_MISSING");
    cmd
}

fn stdout_line(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8_lossy(&output).trim().to_string()
}

#[test]
fn help_works() {
    let tmp = TempDir::new().unwrap();
    cli_cmd(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Forge secrets CLI"));
}

#[test]
fn keygen_refuses_to_overwrite_without_force() {
    let tmp = TempDir::new().unwrap();
    let key_file = tmp.path().join("master.key");

    let share = stdout_line(cli_cmd(&tmp).args(["keygen", "--key-file", key_file.to_str().unwrap()]));
    assert!(!share.is_empty());
    let contents = fs::read_to_string(&key_file).unwrap();
    assert!(contents.contains(&format!("FORGE_SECRETS_MASTER_KEY={share}")));

    cli_cmd(&tmp)
        .args(["keygen", "--key-file", key_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("--force"));

    let replaced = stdout_line(cli_cmd(&tmp).args([
        "keygen",
        "--key-file",
        key_file.to_str().unwrap(),
        "--force",
    ]));
    assert_ne!(replaced, share);
}

#[test]
fn forced_keygen_keeps_old_key_when_provisioning_fails() {
    let tmp = TempDir::new().unwrap();
    let key_file = tmp.path().join("master.key");
    let original = stdout_line(cli_cmd(&tmp).args(["keygen", "--key-file", key_file.to_str().unwrap()]));
    let before = fs::read_to_string(&key_file).unwrap();

    // A directory squatting on the staging path makes provisioning fail.
    fs::create_dir(tmp.path().join("master.key.new")).unwrap();
    cli_cmd(&tmp)
        .args(["keygen", "--key-file", key_file.to_str().unwrap(), "--force"])
        .assert()
        .failure();

    assert_eq!(fs::read_to_string(&key_file).unwrap(), before);
    assert!(before.contains(&original));
}

#[test]
fn forced_keygen_leaves_no_staging_file() {
    let tmp = TempDir::new().unwrap();
    let key_file = tmp.path().join("master.key");
    for args in [vec!["keygen"], vec!["keygen", "--force"]] {
        cli_cmd(&tmp)
            .args(args)
            .args(["--key-file", key_file.to_str().unwrap()])
            .assert()
            .success();
    }
    assert!(key_file.exists());
    assert!(!tmp.path().join("master.key.new").exists());
}

#[test]
fn encrypt_then_decrypt_with_plain_key() {
    let tmp = TempDir::new().unwrap();
    let key_file = tmp.path().join("master.key");
    cli_cmd(&tmp)
        .args(["keygen", "--key-file", key_file.to_str().unwrap()])
        .assert()
        .success();

    let sealed = stdout_line(
        cli_cmd(&tmp)
            .env("FORGE_SECRETS_MASTER_KEY_PROVIDER", "plain")
            .env("FORGE_SECRETS_KEY_FILE", &key_file)
            .args(["encrypt", "vvvvvvv"]),
    );
    assert_ne!(sealed, "vvvvvvv");

    let opened = stdout_line(
        cli_cmd(&tmp)
            .env("FORGE_SECRETS_MASTER_KEY_PROVIDER", "plain")
            .env("FORGE_SECRETS_KEY_FILE", &key_file)
            .args(["decrypt", &sealed]),
    );
    assert_eq!(opened, "vvvvvvv");
}

#[test]
fn config_file_selects_provider() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("secrets.toml");
    fs::write(&config, "master_key_provider = \"none\"\n").unwrap();

    let out = stdout_line(cli_cmd(&tmp).args([
        "--config",
        config.to_str().unwrap(),
        "encrypt",
        "visible",
    ]));
    assert_eq!(out, "visible");
}

#[test]
fn unknown_provider_fails() {
    let tmp = TempDir::new().unwrap();
    cli_cmd(&tmp)
        .env("FORGE_SECRETS_MASTER_KEY_PROVIDER", "vault")
        .args(["encrypt", "value"])
        .assert()
        .failure()
        .stderr(contains("vault"));
}

#[test]
fn plain_provider_without_key_fails() {
    let tmp = TempDir::new().unwrap();
    cli_cmd(&tmp)
        .env("FORGE_SECRETS_MASTER_KEY_PROVIDER", "plain")
        .args(["encrypt", "value"])
        .assert()
        .failure();
}
