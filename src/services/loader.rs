//! Checkpoint loading: file on disk → [`Mapping`].
//!
//! Two on-disk layouts are understood:
//! - safetensors, memory-mapped and read through its header only;
//! - a JSON manifest where tensors, callables and opaque objects are tagged
//!   objects (`__tensor__`, `__callable__`, `__object__`).

use crate::cli::CheckpointFormat;
use crate::domain::node::{DType, Leaf, Mapping, Node, TensorMeta, UnknownDType};
use crate::services::analyzer::join_key;
use memmap2::MmapOptions;
use safetensors::SafeTensors;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const METADATA_KEY: &str = "__metadata__";
const TENSOR_TAG: &str = "__tensor__";
const CALLABLE_TAG: &str = "__callable__";
const OBJECT_TAG: &str = "__object__";

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid safetensors data: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
    #[error("invalid json checkpoint: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checkpoint root is not a mapping")]
    NotAMapping,
    #[error("invalid entry at {key}: {reason}")]
    InvalidEntry { key: String, reason: String },
    #[error(transparent)]
    UnknownDType(#[from] UnknownDType),
    #[error("unsupported checkpoint format: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub format: CheckpointFormat,
    pub group_prefix: bool,
}

#[derive(Debug)]
pub struct LoadedCheckpoint {
    pub path: PathBuf,
    pub format: CheckpointFormat,
    pub file_size: u64,
    pub sha256: String,
    pub root: Mapping,
}

pub fn load_checkpoint(path: &Path, opts: LoadOptions) -> Result<LoadedCheckpoint, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let file_size = file.metadata().map_err(io_err)?.len();
    let mmap = unsafe { MmapOptions::new().map(&file).map_err(io_err)? };
    let bytes: &[u8] = &mmap;

    let format = resolve_format(path, opts.format, bytes)?;
    debug!(path = %path.display(), format = format.name(), "resolved checkpoint format");

    let root = match format {
        CheckpointFormat::Json => parse_json(bytes)?,
        _ => parse_safetensors(bytes, opts.group_prefix)?,
    };
    let sha256 = hex::encode(Sha256::digest(bytes));
    if root.is_empty() {
        warn!(path = %path.display(), "checkpoint has no entries");
    }

    info!(
        path = %path.display(),
        file_size,
        top_level_keys = root.len(),
        "loaded checkpoint"
    );
    Ok(LoadedCheckpoint {
        path: path.to_path_buf(),
        format,
        file_size,
        sha256,
        root,
    })
}

fn resolve_format(
    path: &Path,
    requested: CheckpointFormat,
    bytes: &[u8],
) -> Result<CheckpointFormat, LoadError> {
    if requested != CheckpointFormat::Auto {
        return Ok(requested);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("safetensors") => return Ok(CheckpointFormat::Safetensors),
        Some("json") => return Ok(CheckpointFormat::Json),
        _ => {}
    }
    if bytes.starts_with(b"PK\x03\x04") || bytes.first() == Some(&0x80) {
        return Err(LoadError::Unsupported(
            "pickled PyTorch checkpoint; convert it to safetensors first".to_string(),
        ));
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(CheckpointFormat::Json),
        _ => Ok(CheckpointFormat::Safetensors),
    }
}

/// Builds the tree from a safetensors header. Tensors keep file (data offset) order.
pub fn parse_safetensors(bytes: &[u8], group_prefix: bool) -> Result<Mapping, LoadError> {
    let (_, metadata) = SafeTensors::read_metadata(bytes)?;
    let mut root = Mapping::new();

    if let Some(extra) = metadata.metadata() {
        let mut pairs: Vec<_> = extra.iter().collect();
        pairs.sort();
        let meta: Mapping = pairs
            .into_iter()
            .map(|(k, v)| (k.clone(), Node::Value(Leaf::Str(v.clone()))))
            .collect();
        root.insert(METADATA_KEY, meta.into());
    }

    let mut infos: Vec<_> = metadata.tensors().into_iter().collect();
    infos.sort_by(|a, b| {
        a.1.data_offsets
            .cmp(&b.1.data_offsets)
            .then_with(|| a.0.cmp(&b.0))
    });
    debug!(tensors = infos.len(), "parsed safetensors header");

    for (name, info) in infos {
        let dtype = DType::try_from(info.dtype)?;
        let node: Node = sized_tensor(TensorMeta::new(info.shape.clone(), dtype), &name)?.into();
        if group_prefix {
            insert_grouped(&mut root, &name, node);
        } else {
            root.insert(name, node);
        }
    }
    Ok(root)
}

/// Nests `a.b.c` under `a` as `b.c`; names without a dot stay at the top.
fn insert_grouped(root: &mut Mapping, name: &str, node: Node) {
    if let Some((head, rest)) = name.split_once('.') {
        if root.get(head).is_none() {
            root.insert(head, Node::Mapping(Mapping::new()));
        }
        if let Some(Node::Mapping(group)) = root.get_mut(head) {
            group.insert(rest, node);
            return;
        }
    }
    root.insert(name, node);
}

#[derive(Deserialize)]
struct TensorSpec {
    dtype: String,
    shape: Vec<usize>,
    #[serde(default)]
    device: Option<String>,
}

#[derive(Deserialize)]
struct ObjectSpec {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    repr: Option<String>,
}

pub fn parse_json(bytes: &[u8]) -> Result<Mapping, LoadError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(obj) => json_mapping(&obj, ""),
        _ => Err(LoadError::NotAMapping),
    }
}

fn json_mapping(obj: &serde_json::Map<String, Value>, path: &str) -> Result<Mapping, LoadError> {
    let mut m = Mapping::new();
    for (k, v) in obj {
        let key = join_key(path, k);
        m.insert(k.clone(), json_node(v, &key)?);
    }
    Ok(m)
}

fn json_node(v: &Value, key: &str) -> Result<Node, LoadError> {
    let obj = match v {
        Value::Object(obj) => obj,
        other => return Ok(json_leaf(other).into()),
    };
    if obj.len() == 1 {
        if let Some(spec) = obj.get(TENSOR_TAG) {
            return json_tensor(spec, key).map(Node::from);
        }
        if let Some(name) = obj.get(CALLABLE_TAG) {
            let name = match name {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Leaf::Callable { name }.into());
        }
        if let Some(spec) = obj.get(OBJECT_TAG) {
            let spec: ObjectSpec =
                serde_json::from_value(spec.clone()).map_err(|e| invalid(key, e))?;
            let repr = spec
                .repr
                .unwrap_or_else(|| format!("<{} object>", spec.type_name));
            return Ok(Node::Value(Leaf::Object {
                type_name: spec.type_name,
                repr,
            }));
        }
    }
    json_mapping(obj, key).map(Node::from)
}

fn json_tensor(spec: &Value, key: &str) -> Result<TensorMeta, LoadError> {
    let spec: TensorSpec = serde_json::from_value(spec.clone()).map_err(|e| invalid(key, e))?;
    let dtype: DType = spec.dtype.parse().map_err(|e| invalid(key, e))?;
    let mut t = TensorMeta::new(spec.shape, dtype);
    if let Some(device) = spec.device {
        t.device = device;
    }
    sized_tensor(t, key)
}

/// Rejects tensors whose byte size does not fit in a `u64`.
fn sized_tensor(t: TensorMeta, key: &str) -> Result<TensorMeta, LoadError> {
    match t.checked_size_bytes() {
        Some(_) => Ok(t),
        None => Err(invalid(
            key,
            format!("tensor of shape {:?} ({}) is too large", t.shape, t.dtype),
        )),
    }
}

fn json_leaf(v: &Value) -> Leaf {
    match v {
        Value::Null => Leaf::None,
        Value::Bool(b) => Leaf::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Leaf::Int(i),
            None => Leaf::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Leaf::Str(s.clone()),
        Value::Array(items) => Leaf::List(items.iter().map(json_leaf).collect()),
        Value::Object(_) => Leaf::Object {
            type_name: "dict".to_string(),
            repr: v.to_string(),
        },
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> LoadError {
    LoadError::InvalidEntry {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
