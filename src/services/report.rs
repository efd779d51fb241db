use crate::domain::models::{
    CheckpointReport, ComparisonReport, Descriptor, FileSummary, KeyPresence, KeyReport, KeyShare,
};
use crate::domain::node::{Mapping, Node};
use crate::services::analyzer::{analyze, describe_leaf};
use crate::services::loader::LoadedCheckpoint;
use std::collections::{BTreeMap, BTreeSet};

pub const TOP_LEVEL_PREVIEW_CHARS: usize = 200;

pub fn build_checkpoint_report(loaded: &LoadedCheckpoint, max_depth: usize) -> CheckpointReport {
    let keys: Vec<KeyReport> = loaded
        .root
        .iter()
        .map(|(key, value)| key_report(key, value, max_depth))
        .collect();

    let accounted_bytes = total_size(keys.iter().map(|k| k.size_bytes));
    let unaccounted = i128::from(loaded.file_size) - i128::from(accounted_bytes);
    let unaccounted_bytes = unaccounted.clamp(i64::MIN.into(), i64::MAX.into()) as i64;

    let mut breakdown: Vec<KeyShare> = keys
        .iter()
        .map(|k| KeyShare {
            key: k.key.clone(),
            size_bytes: k.size_bytes,
            percent: percent_of(k.size_bytes, loaded.file_size),
        })
        .collect();
    breakdown.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));

    CheckpointReport {
        path: loaded.path.display().to_string(),
        file_name: file_name(loaded),
        format: loaded.format.name().to_string(),
        file_size: loaded.file_size,
        sha256: loaded.sha256.clone(),
        top_level_keys: loaded.root.keys().map(str::to_string).collect(),
        keys,
        accounted_bytes,
        unaccounted_bytes,
        breakdown,
    }
}

/// Descriptors for every top-level entry, walked the same way the per-key
/// report walks them: a mapping's children start at depth 0.
pub fn checkpoint_descriptors(root: &Mapping, max_depth: usize) -> Vec<Descriptor> {
    root.iter()
        .flat_map(|(key, value)| entry_descriptors(key, value, max_depth))
        .collect()
}

fn entry_descriptors(key: &str, value: &Node, max_depth: usize) -> Vec<Descriptor> {
    match value {
        Node::Mapping(inner) => analyze(inner, key, max_depth, 0),
        leaf => describe_leaf(key, leaf, TOP_LEVEL_PREVIEW_CHARS)
            .into_iter()
            .collect(),
    }
}

/// Sum of sizes, saturating at `u64::MAX`.
pub fn total_size(sizes: impl IntoIterator<Item = u64>) -> u64 {
    sizes.into_iter().fold(0, u64::saturating_add)
}

fn key_report(key: &str, value: &Node, max_depth: usize) -> KeyReport {
    match value {
        Node::Mapping(inner) => {
            let items = entry_descriptors(key, value, max_depth);
            let size_bytes = total_size(items.iter().map(|d| d.size_bytes));
            let (mut tensors, others): (Vec<Descriptor>, Vec<Descriptor>) =
                items.into_iter().partition(Descriptor::is_tensor);
            tensors.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
            KeyReport {
                key: key.to_string(),
                kind: "dict".to_string(),
                item_count: Some(inner.len()),
                size_bytes,
                tensor_count: tensors.len(),
                other_count: others.len(),
                tensors,
                others,
            }
        }
        leaf => {
            let desc = describe_leaf(key, leaf, TOP_LEVEL_PREVIEW_CHARS);
            let (kind, size_bytes, tensors, others) = match desc {
                Some(d) if d.is_tensor() => ("tensor".to_string(), d.size_bytes, vec![d], vec![]),
                Some(d) => (
                    d.type_name.clone().unwrap_or_default(),
                    d.size_bytes,
                    vec![],
                    vec![d],
                ),
                None => (String::new(), 0, vec![], vec![]),
            };
            KeyReport {
                key: key.to_string(),
                kind,
                item_count: None,
                size_bytes,
                tensor_count: tensors.len(),
                other_count: others.len(),
                tensors,
                others,
            }
        }
    }
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn file_name(loaded: &LoadedCheckpoint) -> String {
    loaded
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| loaded.path.display().to_string())
}

pub fn build_comparison(reports: &[CheckpointReport]) -> ComparisonReport {
    let files: Vec<FileSummary> = reports
        .iter()
        .map(|r| FileSummary {
            file_name: r.file_name.clone(),
            file_size: r.file_size,
            sha256: r.sha256.clone(),
            top_level_keys: r.top_level_keys.clone(),
            largest_component: largest_component(r),
        })
        .collect();

    let all_keys: BTreeSet<&String> = reports.iter().flat_map(|r| &r.top_level_keys).collect();
    let presence = all_keys
        .iter()
        .map(|key| KeyPresence {
            key: key.to_string(),
            files: reports
                .iter()
                .filter(|r| r.top_level_keys.contains(*key))
                .map(|r| r.file_name.clone())
                .collect(),
        })
        .collect();

    let mut by_digest: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for r in reports {
        by_digest
            .entry(r.sha256.as_str())
            .or_default()
            .push(r.file_name.clone());
    }
    let identical_files = by_digest.into_values().filter(|g| g.len() > 1).collect();

    ComparisonReport {
        files,
        all_keys: all_keys.into_iter().cloned().collect(),
        presence,
        identical_files,
    }
}

/// Largest key by size; ties go to the earliest key.
fn largest_component(r: &CheckpointReport) -> Option<KeyShare> {
    let mut best: Option<&KeyReport> = None;
    for k in &r.keys {
        if best.map(|b| k.size_bytes > b.size_bytes).unwrap_or(true) {
            best = Some(k);
        }
    }
    best.map(|k| KeyShare {
        key: k.key.clone(),
        size_bytes: k.size_bytes,
        percent: percent_of(k.size_bytes, r.file_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CheckpointFormat;
    use crate::domain::node::{DType, Leaf, Mapping, TensorMeta};
    use std::path::PathBuf;

    fn loaded(name: &str, file_size: u64, sha: &str, root: Mapping) -> LoadedCheckpoint {
        LoadedCheckpoint {
            path: PathBuf::from(format!("/tmp/{}", name)),
            format: CheckpointFormat::Json,
            file_size,
            sha256: sha.to_string(),
            root,
        }
    }

    fn sample_root() -> Mapping {
        let model: Mapping = vec![
            ("small", Node::Tensor(TensorMeta::new(vec![2], DType::F32))),
            ("big", Node::Tensor(TensorMeta::new(vec![8, 8], DType::F32))),
            ("note", Node::Value(Leaf::Str("hi".into()))),
        ]
        .into_iter()
        .collect();
        vec![
            ("model", Node::Mapping(model)),
            ("step", Node::Tensor(TensorMeta::new(vec![], DType::I64))),
            ("epoch", Node::Value(Leaf::Int(3))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn per_key_sizes_sum_their_descriptors() {
        let r = build_checkpoint_report(&loaded("a.json", 1000, "x", sample_root()), 3);
        let model = &r.keys[0];
        assert_eq!(model.kind, "dict");
        assert_eq!(model.item_count, Some(3));
        assert_eq!(model.tensor_count, 2);
        assert_eq!(model.other_count, 1);
        assert_eq!(model.tensors[0].key, "model.big");
        assert_eq!(model.size_bytes, 256 + 8 + 51);

        assert_eq!(r.keys[1].kind, "tensor");
        assert_eq!(r.keys[1].size_bytes, 8);
        assert_eq!(r.keys[2].kind, "int");

        let total: u64 = r.keys.iter().map(|k| k.size_bytes).sum();
        assert_eq!(r.accounted_bytes, total);
        assert_eq!(r.unaccounted_bytes, 1000 - total as i64);
    }

    #[test]
    fn breakdown_is_sorted_and_relative_to_file_size() {
        let r = build_checkpoint_report(&loaded("a.json", 630, "x", sample_root()), 3);
        assert_eq!(r.breakdown[0].key, "model");
        assert!((r.breakdown[0].percent - 50.0).abs() < 1e-9);
        assert!(r
            .breakdown
            .windows(2)
            .all(|w| w[0].size_bytes >= w[1].size_bytes));
    }

    #[test]
    fn empty_file_has_zero_percentages() {
        let r = build_checkpoint_report(&loaded("e.json", 0, "x", sample_root()), 3);
        assert!(r.breakdown.iter().all(|s| s.percent == 0.0));
        assert!(r.unaccounted_bytes < 0);
    }

    #[test]
    fn huge_tensor_sizes_saturate_the_accounting() {
        let half = || Node::Tensor(TensorMeta::new(vec![1 << 60], DType::F64));
        let root: Mapping = vec![("a", half()), ("b", half())].into_iter().collect();
        let r = build_checkpoint_report(&loaded("big.json", 64, "x", root), 3);
        assert_eq!(r.keys[0].size_bytes, 1 << 63);
        assert_eq!(r.accounted_bytes, u64::MAX);
        assert_eq!(r.unaccounted_bytes, i64::MIN);
    }

    #[test]
    fn flat_descriptors_match_the_per_key_walk() {
        let root = sample_root();
        for depth in 0..3 {
            let flat = checkpoint_descriptors(&root, depth);
            let r = build_checkpoint_report(&loaded("a.json", 10, "x", root.clone()), depth);
            let mut grouped: Vec<&str> = r
                .keys
                .iter()
                .flat_map(|k| k.tensors.iter().chain(&k.others))
                .map(|d| d.key.as_str())
                .collect();
            let mut flat_keys: Vec<&str> = flat.iter().map(|d| d.key.as_str()).collect();
            flat_keys.sort();
            grouped.sort();
            assert_eq!(flat_keys, grouped);
            assert_eq!(total_size(flat.iter().map(|d| d.size_bytes)), r.accounted_bytes);
        }
    }

    #[test]
    fn comparison_tracks_key_presence_and_duplicates() {
        let mut other = Mapping::new();
        other.insert("model", Node::Mapping(Mapping::new()));
        other.insert("optimizer", Node::Mapping(Mapping::new()));
        let reports = vec![
            build_checkpoint_report(&loaded("a.json", 10, "d1", sample_root()), 3),
            build_checkpoint_report(&loaded("b.json", 10, "d2", other), 3),
            build_checkpoint_report(&loaded("c.json", 10, "d1", sample_root()), 3),
        ];
        let cmp = build_comparison(&reports);
        assert_eq!(cmp.all_keys, vec!["epoch", "model", "optimizer", "step"]);
        let optimizer = cmp.presence.iter().find(|p| p.key == "optimizer").unwrap();
        assert_eq!(optimizer.files, vec!["b.json"]);
        let model = cmp.presence.iter().find(|p| p.key == "model").unwrap();
        assert_eq!(model.files.len(), 3);
        assert_eq!(cmp.identical_files, vec![vec!["a.json", "c.json"]]);
        assert_eq!(
            cmp.files[0].largest_component.as_ref().map(|c| c.key.as_str()),
            Some("model")
        );
        // all-zero sizes: first key wins
        assert_eq!(
            cmp.files[1].largest_component.as_ref().map(|c| c.key.as_str()),
            Some("model")
        );
    }
}
