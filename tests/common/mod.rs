#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        let dir = tmp.path().join("ckpts");
        fs::create_dir_all(&home).expect("create isolated home");
        fs::create_dir_all(&dir).expect("create checkpoint dir");
        Self {
            _tmp: tmp,
            home,
            dir,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("ckpt-inspect");
        cmd.env("HOME", &self.home).env_remove("CKPT_INSPECT_LOG");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.join(name).to_str().expect("utf8 path").to_string()
    }

    pub fn write_json(&self, name: &str, body: &Value) -> String {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(body).expect("serialize"))
            .expect("write json checkpoint");
        path.to_str().expect("utf8 path").to_string()
    }

    /// Writes a safetensors file with zeroed data. `tensors` is
    /// `(name, dtype, shape, byte_len)` in file order.
    pub fn write_safetensors(
        &self,
        name: &str,
        metadata: Option<Value>,
        tensors: &[(&str, &str, Vec<usize>, usize)],
    ) -> String {
        let path = self.dir.join(name);
        write_safetensors_file(&path, metadata, tensors);
        path.to_str().expect("utf8 path").to_string()
    }

    pub fn write_config(&self, body: &str) {
        let dir = self.home.join(".config/ckpt-inspect");
        fs::create_dir_all(&dir).expect("create config dir");
        fs::write(dir.join("config.toml"), body).expect("write config");
    }
}

pub fn write_safetensors_file(
    path: &Path,
    metadata: Option<Value>,
    tensors: &[(&str, &str, Vec<usize>, usize)],
) {
    let mut header = serde_json::Map::new();
    if let Some(m) = metadata {
        header.insert("__metadata__".to_string(), m);
    }
    let mut offset = 0usize;
    for (name, dtype, shape, len) in tensors {
        header.insert(
            name.to_string(),
            json!({"dtype": dtype, "shape": shape, "data_offsets": [offset, offset + len]}),
        );
        offset += len;
    }
    let header = Value::Object(header).to_string();
    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend(std::iter::repeat(0u8).take(offset));
    fs::write(path, bytes).expect("write safetensors");
}

/// Training checkpoint shaped like `{model, optimizer, epoch, args}`.
pub fn training_checkpoint() -> Value {
    json!({
        "model": {
            "encoder.weight": {"__tensor__": {"dtype": "float32", "shape": [16, 16]}},
            "encoder.bias": {"__tensor__": {"dtype": "float32", "shape": [16]}},
            "head": {
                "weight": {"__tensor__": {"dtype": "float16", "shape": [4, 16]}}
            }
        },
        "optimizer": {
            "state": {
                "0": {
                    "step": 100,
                    "exp_avg": {"__tensor__": {"dtype": "float32", "shape": [16, 16]}}
                }
            },
            "param_groups": [{"lr": 0.001}]
        },
        "epoch": 7,
        "args": {"__object__": {"type": "Namespace", "repr": "Namespace(lr=0.001, epochs=10)"}},
        "scheduler_fn": {"__callable__": "lr_lambda"}
    })
}
