use serde::Serialize;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Tensor,
    Other,
}

/// One record per leaf reached by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub key: String,
    pub kind: DescriptorKind,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    /// Informational only; never used in size accounting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl Descriptor {
    pub fn is_tensor(&self) -> bool {
        self.kind == DescriptorKind::Tensor
    }
}

#[derive(Serialize)]
pub struct KeyReport {
    pub key: String,
    /// `dict`, `tensor`, or the runtime type name of a top-level value.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    pub size_bytes: u64,
    pub tensor_count: usize,
    pub other_count: usize,
    pub tensors: Vec<Descriptor>,
    pub others: Vec<Descriptor>,
}

#[derive(Serialize, Clone)]
pub struct KeyShare {
    pub key: String,
    pub size_bytes: u64,
    pub percent: f64,
}

#[derive(Serialize)]
pub struct CheckpointReport {
    pub path: String,
    pub file_name: String,
    pub format: String,
    pub file_size: u64,
    pub sha256: String,
    pub top_level_keys: Vec<String>,
    pub keys: Vec<KeyReport>,
    pub accounted_bytes: u64,
    pub unaccounted_bytes: i64,
    pub breakdown: Vec<KeyShare>,
}

#[derive(Serialize)]
pub struct LoadFailure {
    pub path: String,
    pub error: String,
}

#[derive(Serialize, Clone)]
pub struct FileSummary {
    pub file_name: String,
    pub file_size: u64,
    pub sha256: String,
    pub top_level_keys: Vec<String>,
    pub largest_component: Option<KeyShare>,
}

#[derive(Serialize)]
pub struct KeyPresence {
    pub key: String,
    pub files: Vec<String>,
}

#[derive(Serialize)]
pub struct ComparisonReport {
    pub files: Vec<FileSummary>,
    pub all_keys: Vec<String>,
    pub presence: Vec<KeyPresence>,
    pub identical_files: Vec<Vec<String>>,
}

#[derive(Serialize)]
pub struct AnalyzeOutput {
    pub reports: Vec<CheckpointReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
    pub failures: Vec<LoadFailure>,
}

#[derive(Serialize)]
pub struct ListOutput {
    pub path: String,
    pub count: usize,
    pub total_bytes: u64,
    pub descriptors: Vec<Descriptor>,
}
