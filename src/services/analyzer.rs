//! Depth-bounded structure analyzer.
//!
//! Walks a checkpoint mapping depth-first and emits one [`Descriptor`] per
//! leaf. Intermediate mappings produce no record of their own.

use crate::domain::models::{Descriptor, DescriptorKind};
use crate::domain::node::{Leaf, Mapping, Node, TensorMeta};
use crate::services::format::truncate_chars;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const PREVIEW_CHARS: usize = 100;
pub const CALLABLE_MARKER: &str = "callable";

/// Returns descriptors for every leaf of `node` reachable within `max_depth`.
///
/// A call whose `current_depth` already exceeds `max_depth` yields nothing,
/// so a mapping nested at depth `max_depth + 1` contributes no records.
pub fn analyze(
    node: &Mapping,
    prefix: &str,
    max_depth: usize,
    current_depth: usize,
) -> Vec<Descriptor> {
    let mut out = Vec::new();
    walk(node, prefix, max_depth, current_depth, &mut out);
    out
}

fn walk(
    node: &Mapping,
    prefix: &str,
    max_depth: usize,
    current_depth: usize,
    out: &mut Vec<Descriptor>,
) {
    if current_depth > max_depth {
        return;
    }
    for (key, value) in node.iter() {
        let full_key = join_key(prefix, key);
        match value {
            Node::Mapping(inner) => walk(inner, &full_key, max_depth, current_depth + 1, out),
            Node::Tensor(t) => out.push(describe_tensor(full_key, t)),
            Node::Value(leaf) => out.push(describe_value(full_key, leaf, PREVIEW_CHARS)),
        }
    }
}

pub fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Describes a single non-mapping node. Returns `None` for mappings.
pub fn describe_leaf(key: &str, node: &Node, preview_chars: usize) -> Option<Descriptor> {
    match node {
        Node::Mapping(_) => None,
        Node::Tensor(t) => Some(describe_tensor(key.to_string(), t)),
        Node::Value(leaf) => Some(describe_value(key.to_string(), leaf, preview_chars)),
    }
}

fn describe_tensor(key: String, t: &TensorMeta) -> Descriptor {
    Descriptor {
        key,
        kind: DescriptorKind::Tensor,
        type_name: None,
        shape: Some(t.shape.clone()),
        dtype: Some(t.dtype.to_string()),
        device: Some(t.device.clone()),
        size_bytes: t.size_bytes(),
        preview: None,
    }
}

fn describe_value(key: String, leaf: &Leaf, preview_chars: usize) -> Descriptor {
    let preview = if leaf.is_callable() {
        CALLABLE_MARKER.to_string()
    } else {
        truncate_chars(&leaf.to_string(), preview_chars)
    };
    Descriptor {
        key,
        kind: DescriptorKind::Other,
        type_name: Some(leaf.type_name().to_string()),
        shape: None,
        dtype: None,
        device: None,
        size_bytes: leaf.estimated_size(),
        preview: Some(preview),
    }
}
