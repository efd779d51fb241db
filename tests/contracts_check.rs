mod common;

use common::{training_checkpoint, TestEnv};
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

fn load_schema(name: &str) -> Value {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let raw = fs::read_to_string(root.join("docs/contracts").join(name)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn validate(schema_name: &str, data: &Value) {
    let schema = load_schema(schema_name);
    let validator = JSONSchema::compile(&schema).expect("compile schema");
    let msgs: Vec<String> = match validator.validate(data) {
        Ok(()) => return,
        Err(errors) => errors.map(|e| e.to_string()).collect(),
    };
    panic!("schema validation failed: {}", msgs.join(" | "));
}

#[test]
fn list_output_matches_contract() {
    let env = TestEnv::new();
    let ckpt = env.write_json("train.json", &training_checkpoint());
    let st = env.write_safetensors(
        "model.safetensors",
        Some(json!({"step": "100"})),
        &[("w", "F16", vec![4, 4], 32), ("scalar", "I64", vec![], 8)],
    );

    validate("list.schema.json", &env.run_json(&["list", &ckpt]));
    validate("list.schema.json", &env.run_json(&["list", &st]));
}

#[test]
fn analyze_output_matches_contract() {
    let env = TestEnv::new();
    let a = env.write_json("a.json", &training_checkpoint());
    let b = env.write_safetensors(
        "b.safetensors",
        None,
        &[("model.w", "F32", vec![2, 3], 24), ("model.b", "F32", vec![3], 12)],
    );
    let missing = env.path("gone.json");

    let out = env.run_json(&["--group-prefix", "analyze", &a, &b, &missing]);
    validate("analyze.schema.json", &out);
}

#[test]
fn compare_output_matches_contract() {
    let env = TestEnv::new();
    let a = env.write_json("a.json", &training_checkpoint());
    let b = env.write_json("b.json", &json!({"empty": {}}));

    validate("compare.schema.json", &env.run_json(&["compare", &a, &b]));
}
