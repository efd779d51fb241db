use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ckpt-inspect",
    version,
    about = "Explain what takes up space in model checkpoint files"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Config file (default: ~/.config/ckpt-inspect/config.toml)"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Nesting depth to descend into below each top-level key"
    )]
    pub max_depth: Option<usize>,
    #[arg(long, global = true, value_enum, default_value_t = CheckpointFormat::Auto)]
    pub format: CheckpointFormat,
    #[arg(
        long,
        global = true,
        help = "Group flat tensor names by their first dotted segment"
    )]
    pub group_prefix: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Per-key size breakdown for each checkpoint, compared when several are given
    Analyze {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, help = "Largest tensors shown per key")]
        top: Option<usize>,
        #[arg(long, help = "Non-tensor items shown per key")]
        others: Option<usize>,
    },
    /// Flat list of every leaf with its size
    List {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = KindFilter::All)]
        kind: KindFilter,
        #[arg(long, value_enum, default_value_t = SortOrder::Order)]
        sort: SortOrder,
    },
    /// Compare top-level composition across checkpoints
    Compare {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    Auto,
    Safetensors,
    Json,
}

impl CheckpointFormat {
    pub fn name(self) -> &'static str {
        match self {
            CheckpointFormat::Auto => "auto",
            CheckpointFormat::Safetensors => "safetensors",
            CheckpointFormat::Json => "json",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindFilter {
    All,
    Tensor,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// Traversal order
    Order,
    /// Largest first
    Size,
}
