mod common;

use common::TestEnv;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn list_text_rows_are_tab_separated() {
    let env = TestEnv::new();
    let ckpt = env.write_json(
        "small.json",
        &serde_json::json!({
            "a": {"b": {"__tensor__": {"dtype": "float32", "shape": [2, 2]}}},
            "c": 5
        }),
    );

    env.cmd()
        .args(["list", &ckpt])
        .assert()
        .success()
        .stdout(contains("a.b\tfloat32 [2, 2]\t16.00B"))
        .stdout(contains("c\tint = 5\t28.00B"))
        .stdout(contains("total: 2 items"));
}

#[test]
fn compare_requires_two_paths() {
    let env = TestEnv::new();
    let ckpt = env.write_json("one.json", &serde_json::json!({"a": 1}));
    env.cmd().args(["compare", &ckpt]).assert().failure();
}

#[test]
fn logs_stay_off_stdout() {
    let env = TestEnv::new();
    let ckpt = env.write_json("one.json", &serde_json::json!({"a": 1}));
    env.cmd()
        .env("CKPT_INSPECT_LOG", "debug")
        .args(["--json", "list", &ckpt])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stderr(contains("loaded checkpoint"));
}

#[test]
fn explicit_config_must_exist() {
    let env = TestEnv::new();
    let ckpt = env.write_json("one.json", &serde_json::json!({"a": 1}));
    env.cmd()
        .args(["--config", &env.path("absent.toml"), "list", &ckpt])
        .assert()
        .failure()
        .stderr(contains("config file not found"));
}
