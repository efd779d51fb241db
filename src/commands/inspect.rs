use crate::cli::{Cli, Commands, KindFilter, SortOrder};
use crate::domain::models::{
    AnalyzeOutput, CheckpointReport, ComparisonReport, Descriptor, DescriptorKind, KeyReport,
    ListOutput, LoadFailure,
};
use crate::services::format::{format_shape, format_signed_size, format_size, group_thousands};
use crate::services::loader::{load_checkpoint, LoadOptions, LoadedCheckpoint};
use crate::services::output::print_out;
use crate::services::report::{
    build_checkpoint_report, build_comparison, checkpoint_descriptors, total_size,
};
use crate::services::settings::ReportSettings;
use anyhow::Context;
use std::path::PathBuf;
use tracing::{error, info};

const RULE_WIDE: usize = 80;
const RULE_NARROW: usize = 60;

pub fn handle_commands(cli: &Cli, settings: ReportSettings) -> anyhow::Result<()> {
    let opts = LoadOptions {
        format: cli.format,
        group_prefix: cli.group_prefix,
    };
    match &cli.command {
        Commands::Analyze { paths, top, others } => {
            let settings = settings.with_overrides(None, *top, *others);
            let (loaded, failures) = load_all(paths, opts);
            if loaded.is_empty() {
                anyhow::bail!("no checkpoint could be analyzed ({})", describe(&failures));
            }
            let reports: Vec<CheckpointReport> = loaded
                .iter()
                .map(|l| build_checkpoint_report(l, settings.max_depth))
                .collect();
            let comparison = (reports.len() > 1).then(|| build_comparison(&reports));
            let out = AnalyzeOutput {
                reports,
                comparison,
                failures,
            };
            print_out(cli.json, out, |o| render_analyze(o, &settings))?;
        }
        Commands::List { path, kind, sort } => {
            let loaded = load_checkpoint(path, opts)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let descriptors = list_descriptors(&loaded, settings.max_depth, *kind, *sort);
            let out = ListOutput {
                path: loaded.path.display().to_string(),
                count: descriptors.len(),
                total_bytes: total_size(descriptors.iter().map(|d| d.size_bytes)),
                descriptors,
            };
            print_out(cli.json, out, render_list)?;
        }
        Commands::Compare { paths } => {
            let (loaded, failures) = load_all(paths, opts);
            if loaded.len() < 2 {
                anyhow::bail!(
                    "compare needs at least two readable checkpoints ({})",
                    describe(&failures)
                );
            }
            let reports: Vec<CheckpointReport> = loaded
                .iter()
                .map(|l| build_checkpoint_report(l, settings.max_depth))
                .collect();
            print_out(cli.json, build_comparison(&reports), render_comparison)?;
        }
    }
    Ok(())
}

/// Loads each path, collecting failures instead of stopping at the first one.
fn load_all(paths: &[PathBuf], opts: LoadOptions) -> (Vec<LoadedCheckpoint>, Vec<LoadFailure>) {
    let mut loaded = Vec::new();
    let mut failures = Vec::new();
    for path in paths {
        match load_checkpoint(path, opts) {
            Ok(l) => loaded.push(l),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load checkpoint");
                failures.push(LoadFailure {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    info!(
        loaded = loaded.len(),
        failed = failures.len(),
        "checkpoint loading finished"
    );
    (loaded, failures)
}

fn describe(failures: &[LoadFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.path, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn list_descriptors(
    loaded: &LoadedCheckpoint,
    max_depth: usize,
    kind: KindFilter,
    sort: SortOrder,
) -> Vec<Descriptor> {
    let mut out: Vec<Descriptor> = checkpoint_descriptors(&loaded.root, max_depth)
        .into_iter()
        .filter(|d| match kind {
            KindFilter::All => true,
            KindFilter::Tensor => d.kind == DescriptorKind::Tensor,
            KindFilter::Other => d.kind == DescriptorKind::Other,
        })
        .collect();
    if sort == SortOrder::Size {
        out.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    }
    out
}

fn render_list(out: &ListOutput) -> Vec<String> {
    let mut lines: Vec<String> = out
        .descriptors
        .iter()
        .map(|d| format!("{}\t{}\t{}", d.key, detail(d), format_size(d.size_bytes)))
        .collect();
    lines.push(format!(
        "total: {} items, {}",
        out.count,
        format_size(out.total_bytes)
    ));
    lines
}

fn detail(d: &Descriptor) -> String {
    match d.kind {
        DescriptorKind::Tensor => format!(
            "{} {}",
            d.dtype.as_deref().unwrap_or("?"),
            format_shape(d.shape.as_deref().unwrap_or(&[]))
        ),
        DescriptorKind::Other => format!(
            "{} = {}",
            d.type_name.as_deref().unwrap_or("?"),
            d.preview.as_deref().unwrap_or("")
        ),
    }
}

fn render_analyze(out: &AnalyzeOutput, settings: &ReportSettings) -> Vec<String> {
    let mut lines = Vec::new();
    for f in &out.failures {
        lines.push(format!("ERROR: {}: {}", f.path, f.error));
    }
    for r in &out.reports {
        render_report(r, settings, &mut lines);
    }
    if let Some(cmp) = &out.comparison {
        lines.extend(render_comparison(cmp));
    }
    lines
}

fn render_report(r: &CheckpointReport, settings: &ReportSettings, lines: &mut Vec<String>) {
    lines.push(String::new());
    lines.push("=".repeat(RULE_WIDE));
    lines.push(format!("ANALYZING: {}", r.path));
    lines.push("=".repeat(RULE_WIDE));
    lines.push(format!(
        "File size: {} ({} bytes)",
        format_size(r.file_size),
        group_thousands(r.file_size)
    ));
    lines.push(format!("Format: {}", r.format));
    lines.push(format!("SHA-256: {}", r.sha256));
    lines.push(format!("Top-level keys: [{}]", r.top_level_keys.join(", ")));

    for k in &r.keys {
        lines.push(String::new());
        lines.push("-".repeat(RULE_NARROW));
        lines.push(format!("KEY: {}", k.key));
        lines.push("-".repeat(RULE_NARROW));
        render_key(k, settings, lines);
    }

    lines.push(String::new());
    lines.push("=".repeat(RULE_NARROW));
    lines.push("SUMMARY".to_string());
    lines.push("=".repeat(RULE_NARROW));
    lines.push(format!("File size: {}", format_size(r.file_size)));
    lines.push(format!("Accounted size: {}", format_size(r.accounted_bytes)));
    lines.push(format!(
        "Unaccounted: {}",
        format_signed_size(r.unaccounted_bytes)
    ));
    lines.push(String::new());
    lines.push("Size breakdown by key:".to_string());
    for s in &r.breakdown {
        lines.push(format!(
            "  {}: {} ({:.1}%)",
            s.key,
            format_size(s.size_bytes),
            s.percent
        ));
    }
}

fn render_key(k: &KeyReport, settings: &ReportSettings, lines: &mut Vec<String>) {
    if k.kind != "dict" {
        if let Some(t) = k.tensors.first() {
            lines.push("Type: tensor".to_string());
            lines.push(format!(
                "Shape: {}",
                format_shape(t.shape.as_deref().unwrap_or(&[]))
            ));
            lines.push(format!("Dtype: {}", t.dtype.as_deref().unwrap_or("?")));
            lines.push(format!("Size: {}", format_size(t.size_bytes)));
            lines.push(format!("Device: {}", t.device.as_deref().unwrap_or("?")));
        } else if let Some(o) = k.others.first() {
            lines.push(format!("Type: {}", k.kind));
            lines.push(format!("Size: {}", format_size(o.size_bytes)));
            lines.push(format!("Preview: {}...", o.preview.as_deref().unwrap_or("")));
        }
        return;
    }

    lines.push(format!(
        "Type: dict with {} items",
        k.item_count.unwrap_or_default()
    ));
    lines.push(format!("Total size: {}", format_size(k.size_bytes)));

    if !k.tensors.is_empty() {
        lines.push(String::new());
        lines.push(format!("Tensors ({} items):", k.tensor_count));
        for (i, t) in k.tensors.iter().take(settings.top_tensors).enumerate() {
            lines.push(format!(
                "  {:2}. {}: {} ({}) - {}",
                i + 1,
                t.key,
                format_shape(t.shape.as_deref().unwrap_or(&[])),
                t.dtype.as_deref().unwrap_or("?"),
                format_size(t.size_bytes)
            ));
        }
        if k.tensor_count > settings.top_tensors {
            lines.push(format!(
                "  ... and {} more tensors",
                k.tensor_count - settings.top_tensors
            ));
        }
    }

    if !k.others.is_empty() {
        lines.push(String::new());
        lines.push(format!("Other items ({} items):", k.other_count));
        for o in k.others.iter().take(settings.top_others) {
            lines.push(format!(
                "  - {}: {} - {}",
                o.key,
                o.type_name.as_deref().unwrap_or("?"),
                format_size(o.size_bytes)
            ));
            if let Some(p) = &o.preview {
                lines.push(format!("    Preview: {}", p));
            }
        }
        if k.other_count > settings.top_others {
            lines.push(format!(
                "  ... and {} more items",
                k.other_count - settings.top_others
            ));
        }
    }
}

fn render_comparison(cmp: &ComparisonReport) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=".repeat(RULE_WIDE),
        "COMPARATIVE ANALYSIS".to_string(),
        "=".repeat(RULE_WIDE),
    ];
    for f in &cmp.files {
        lines.push(String::new());
        lines.push(format!("{}:", f.file_name));
        lines.push(format!("  File size: {}", format_size(f.file_size)));
        lines.push(format!(
            "  Top-level keys: [{}]",
            f.top_level_keys.join(", ")
        ));
        if let Some(c) = &f.largest_component {
            lines.push(format!(
                "  Largest component: {} ({})",
                c.key,
                format_size(c.size_bytes)
            ));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "All unique top-level keys found: [{}]",
        cmp.all_keys.join(", ")
    ));
    for p in &cmp.presence {
        lines.push(format!("  {}: [{}]", p.key, p.files.join(", ")));
    }
    for group in &cmp.identical_files {
        lines.push(format!("Identical files: {}", group.join(", ")));
    }
    lines
}
