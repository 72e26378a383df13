use std::path::Path;

use anyhow::Context as _;
use colored::Colorize;
use rkns::{
    default_registry, AdapterRegistry, ChannelMapping, Document, DocumentInfo, FormatDetector,
    FormatId, OpenOptions, RknsConfig, StoreLocation,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::cli::*;

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub registry: AdapterRegistry,
    pub config: RknsConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => RknsConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RknsConfig::default(),
        };
        Ok(Self {
            registry: default_registry()?,
            config,
            format: cli.format,
        })
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn open_store(&self, path: &Path) -> anyhow::Result<Document> {
        Document::initialize_from_rkns(path, &self.config)
            .with_context(|| format!("opening store {}", path.display()))
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Command::Convert(args) => cmd_convert(&ctx, args),
        Command::Detect(args) => cmd_detect(&ctx, args),
        Command::Info(args) => cmd_info(&ctx, args),
        Command::Populate(args) => cmd_populate(&ctx, args),
        Command::Reset(args) => cmd_reset(&ctx, args),
        Command::ExtractRaw(args) => cmd_extract_raw(&ctx, args),
        Command::History(args) => cmd_history(&ctx, args),
        Command::Remap(args) => cmd_remap(&ctx, args),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_convert(ctx: &Context, args: ConvertArgs) -> anyhow::Result<()> {
    let options = OpenOptions {
        target: StoreLocation::Local(args.output.clone()),
        populate: Some(!args.no_populate),
    };
    let preexisting = args.output.exists();
    let document = match Document::open_with(&args.input, &ctx.registry, &ctx.config, options) {
        Ok(document) => document,
        Err(err) => {
            if !preexisting {
                discard_partial_store(&args.output);
            }
            return Err(err).with_context(|| format!("converting {}", args.input.display()));
        }
    };
    let info = document.info()?;
    if ctx.json() {
        return print_json(&info);
    }
    println!(
        "{} Converted {} ({}) into {}",
        "✓".green().bold(),
        info.source.path_basename.bold(),
        info.source.source_format.to_string().cyan(),
        args.output.display().to_string().bold()
    );
    print_summary(&info);
    Ok(())
}

/// Remove a store directory left behind by a failed convert.
fn discard_partial_store(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial store"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial store"),
    }
}

fn cmd_detect(ctx: &Context, args: DetectArgs) -> anyhow::Result<()> {
    let detector = FormatDetector::new(&ctx.registry, ctx.config.detect_prefix_len);
    let mut results = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let format = detector
            .detect_path(path)
            .with_context(|| format!("detecting {}", path.display()))?;
        results.push((path, format));
    }
    if ctx.json() {
        let rows: Vec<_> = results
            .iter()
            .map(|(path, format)| json!({ "path": path.display().to_string(), "format": format }))
            .collect();
        return print_json(&rows);
    }
    for (path, format) in results {
        let tag = format.to_string();
        let tag = if format.is_foreign() || format == FormatId::Rkns {
            tag.green()
        } else {
            tag.red()
        };
        println!("{:<10} {}", tag, path.display());
    }
    Ok(())
}

fn cmd_info(ctx: &Context, args: InfoArgs) -> anyhow::Result<()> {
    let document = Document::open(&args.path, &ctx.registry, &ctx.config)
        .with_context(|| format!("opening {}", args.path.display()))?;
    let info = document.info()?;
    if ctx.json() {
        return print_json(&info);
    }
    println!("{} {}", "Document".bold(), info.location);
    print_summary(&info);
    if args.tree {
        println!();
        print!("{}", document.tree()?);
    }
    Ok(())
}

fn print_summary(info: &DocumentInfo) {
    println!("  Version: {}", info.format_version);
    println!("  State: {}", format!("{:?}", info.state).yellow());
    println!(
        "  Source: {} ({}, {} bytes)",
        info.source.path_basename,
        info.source.source_format,
        info.source.size_bytes
    );
    println!("  BLAKE3: {}", info.source.blake3.dimmed());
    for group in &info.frequency_groups {
        let rate = group
            .sample_rate
            .map_or_else(|| "?".to_string(), |r| format!("{r} Hz"));
        println!(
            "  {} {} x {} samples: {}",
            group.name.cyan(),
            rate,
            group.samples_per_channel,
            group.channels.join(", ")
        );
    }
    println!("  Annotations: {}", info.annotations);
    println!("  History: {} entries", info.history_entries);
}

fn cmd_populate(ctx: &Context, args: StoreArgs) -> anyhow::Result<()> {
    let mut document = ctx.open_store(&args.store)?;
    document.populate(&ctx.registry)?;
    report_derived(ctx, &document, "Populated")
}

fn cmd_reset(ctx: &Context, args: StoreArgs) -> anyhow::Result<()> {
    let mut document = ctx.open_store(&args.store)?;
    document.reset(&ctx.registry)?;
    report_derived(ctx, &document, "Reset")
}

fn report_derived(ctx: &Context, document: &Document, verb: &str) -> anyhow::Result<()> {
    let groups = document.frequency_groups()?;
    if ctx.json() {
        return print_json(&json!({ "state": document.state(), "frequency_groups": groups }));
    }
    println!(
        "{} {} /rkns: {}",
        "✓".green().bold(),
        verb,
        groups.join(", ").cyan()
    );
    Ok(())
}

fn cmd_extract_raw(ctx: &Context, args: ExtractRawArgs) -> anyhow::Result<()> {
    let document = ctx.open_store(&args.store)?;
    let bytes = document.reconstruct_original_file(&args.output)?;
    if ctx.json() {
        return print_json(&json!({ "output": args.output.display().to_string(), "bytes": bytes }));
    }
    println!(
        "{} Wrote {} bytes to {}",
        "✓".green().bold(),
        bytes,
        args.output.display().to_string().bold()
    );
    Ok(())
}

fn cmd_history(ctx: &Context, args: StoreArgs) -> anyhow::Result<()> {
    let document = ctx.open_store(&args.store)?;
    let entries = document.history()?;
    if ctx.json() {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("History: no entries.");
    }
    for entry in entries {
        println!(
            "{}  {}  {}",
            format!("#{}", entry.seq).yellow().bold(),
            entry.timestamp.to_rfc3339().dimmed(),
            entry.operation.to_string().green()
        );
        if !entry.details.is_null() {
            println!("  {}", entry.details);
        }
    }
    Ok(())
}

fn cmd_remap(ctx: &Context, args: RemapArgs) -> anyhow::Result<()> {
    let mut document = ctx.open_store(&args.store)?;
    let mut mapping: ChannelMapping = document.channel_mapping()?;
    if !args.assignments.is_empty() {
        for (label, id) in &args.assignments {
            anyhow::ensure!(mapping.contains(label), "no channel labelled {label:?}");
            mapping.insert(label.clone(), id.clone());
        }
        document.remap_channels(mapping.clone())?;
    }
    if ctx.json() {
        return print_json(&mapping.to_attributes());
    }
    for (label, id) in mapping.iter() {
        println!("{:<24} {}", label, id.cyan());
    }
    if !args.assignments.is_empty() {
        println!(
            "{} Mapping updated; run {} to apply it to /rkns.",
            "✓".green().bold(),
            "rkns reset".bold()
        );
    }
    Ok(())
}
