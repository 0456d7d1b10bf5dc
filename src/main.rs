//! modscope - browse, preview and manage applied mod records

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use modscope::archive::{LooseArchive, ModArchive};
use modscope::catalog::{
    tokenize_search, CategoryTree, ModList, NodeId, NodeKind, PackSummary, STANDALONE_NAME,
};
use modscope::classify::{classify, facets};
use modscope::config::Settings;
use modscope::preview::{
    resolve_selection, CancellationToken, ItemError, PipelineOptions, PipelineSink, PreviewRow, Progress,
    UpdatePipeline,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modscope")]
#[command(version)]
#[command(about = "Browse, preview and manage applied mod records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Archive directory (defaults to the one saved in settings)
    #[arg(short, long, global = true, env = "MODSCOPE_ARCHIVE")]
    archive: Option<PathBuf>,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the pack / category / item tree
    Tree {
        /// Only show items whose name or pack contains every word
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Classify a single resource path
    Classify {
        /// Item name (needed for character paths)
        name: String,
        /// Archive-internal resource path
        path: String,
    },

    /// Decode every record of an item and list the preview rows
    Preview {
        /// Pack name ("Standalone" for records outside any pack)
        pack: String,
        /// Category name
        category: String,
        /// Item name
        item: String,

        /// Write one PNG per row into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Prefetch a partition index above this many records
        #[arg(long)]
        prefetch_threshold: Option<usize>,
    },

    /// Show author, version and contents of a pack
    PackInfo {
        /// Pack name ("Standalone" for records outside any pack)
        pack: String,
    },

    /// Flip the enabled state of one record
    Toggle {
        /// Resource path of the record
        full_path: String,
    },

    /// Enable or disable a whole pack (whichever most records are not)
    TogglePack {
        pack: String,
    },

    /// Delete one record
    Delete {
        full_path: String,
    },

    /// Delete a pack and all of its records
    DeletePack {
        pack: String,
    },

    /// Show saved settings, updating any that are given
    Config {
        #[arg(long)]
        prefetch_threshold: Option<usize>,

        #[arg(long)]
        search_debounce_ms: Option<u64>,

        /// Default archive directory
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive(if cli.verbose {
                "modscope=debug".parse()?
            } else {
                "modscope=warn".parse()?
            }))
            .init();
    }

    let settings = Settings::load();

    match &cli.command {
        Commands::Classify { name, path } => return print_classification(name, path),
        Commands::Config {
            prefetch_threshold,
            search_debounce_ms,
            archive_dir,
        } => {
            return configure(settings, *prefetch_threshold, *search_debounce_ms, archive_dir.as_deref())
        }
        _ => {}
    }

    let archive_dir = cli
        .archive
        .clone()
        .or_else(|| settings.archive_dir())
        .context("No archive directory given (use --archive or set archive_dir in settings)")?;
    let archive = LooseArchive::open(&archive_dir)
        .with_context(|| format!("Failed to open archive {}", archive_dir.display()))?;

    match cli.command {
        Commands::Classify { .. } | Commands::Config { .. } => Ok(()),
        Commands::Tree { search } => {
            let list = archive.list_records()?;
            let terms = search.as_deref().map(tokenize_search).unwrap_or_default();
            print_tree(&list, &terms);
            Ok(())
        }
        Commands::Preview {
            pack,
            category,
            item,
            out,
            prefetch_threshold,
        } => {
            let mut options = settings.pipeline_options();
            if let Some(threshold) = prefetch_threshold {
                options.prefetch_threshold = threshold;
            }
            run_preview(&archive, &pack, &category, &item, out.as_deref(), options)
        }
        Commands::PackInfo { pack } => {
            let list = archive.list_records()?;
            let summary = PackSummary::collect(&list, pack_key(&pack));
            ensure_pack_exists(&summary, &pack)?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Toggle { full_path } => {
            let list = archive.list_records()?;
            let record = list
                .mods
                .iter()
                .find(|m| m.full_path == full_path)
                .with_context(|| format!("No record with path {}", full_path))?;
            let enabled = !record.enabled;
            archive.set_record_enabled(&full_path, enabled)?;
            println!("{} {}", if enabled { "Enabled" } else { "Disabled" }, full_path);
            Ok(())
        }
        Commands::TogglePack { pack } => toggle_pack(&archive, &pack),
        Commands::Delete { full_path } => {
            archive.delete_record(&full_path)?;
            println!("Deleted {}", full_path);
            Ok(())
        }
        Commands::DeletePack { pack } => delete_pack(&archive, &pack),
    }
}

/// Pack argument to pack name; "standalone" selects the records outside
/// any pack
fn pack_key(pack: &str) -> Option<&str> {
    if pack.eq_ignore_ascii_case("standalone") {
        None
    } else {
        Some(pack)
    }
}

fn tree_pack_name(pack: &str) -> &str {
    pack_key(pack).unwrap_or(STANDALONE_NAME)
}

fn ensure_pack_exists(summary: &PackSummary, pack: &str) -> Result<()> {
    if summary.record_count == 0 && pack_key(pack).is_some() {
        bail!("No pack named {}", pack);
    }
    Ok(())
}

fn configure(
    mut settings: Settings,
    prefetch_threshold: Option<usize>,
    search_debounce_ms: Option<u64>,
    archive_dir: Option<&Path>,
) -> Result<()> {
    let changed = prefetch_threshold.is_some() || search_debounce_ms.is_some() || archive_dir.is_some();
    if let Some(threshold) = prefetch_threshold {
        settings.prefetch_threshold = threshold;
    }
    if let Some(ms) = search_debounce_ms {
        settings.search_debounce_ms = ms;
    }
    if let Some(dir) = archive_dir {
        settings.archive_dir = dir.to_string_lossy().into_owned();
    }
    if changed {
        settings.save()?;
    }

    println!("prefetch_threshold: {}", settings.prefetch_threshold);
    println!("search_debounce_ms: {}", settings.search_debounce_ms);
    println!("archive_dir:        {}", settings.archive_dir);
    Ok(())
}

fn print_classification(name: &str, path: &str) -> Result<()> {
    let identity = classify(name, path)?;
    let row = facets(name, path, identity.as_ref())?;

    match identity {
        Some(identity) => {
            println!("Category: {}", identity.category);
            if let Some(model) = identity.model_id {
                println!("Model:    {}", model);
            }
            if let Some(body) = identity.body_id {
                println!("Body:     {}", body);
            }
        }
        None => println!("Category: (unrecognized)"),
    }
    println!("Race:     {}", row.race);
    println!("Map:      {}", row.map);
    println!("Part:     {}", row.part);
    println!("Type:     {}", row.kind);
    Ok(())
}

fn print_tree(list: &ModList, terms: &[String]) {
    let build = CategoryTree::build(&list.mods, terms);
    let tree = &build.tree;

    fn walk(tree: &CategoryTree, id: NodeId, depth: usize) {
        for &child in tree.children(id) {
            let Some(node) = tree.node(child) else { continue };
            match tree.kind(child) {
                Some(NodeKind::Leaf) => println!("{}{}", "  ".repeat(depth), node.name),
                _ => println!("{}{} ({})", "  ".repeat(depth), node.name, tree.children(child).len()),
            }
            walk(tree, child, depth + 1);
        }
    }

    println!("{}", tree.node(tree.root()).map(|n| n.name.as_str()).unwrap_or_default());
    walk(tree, tree.root(), 1);

    for e in &build.errors {
        eprintln!("warning: {}", e);
    }
}

fn print_summary(summary: &PackSummary) {
    println!("Title:    {}", summary.title);
    println!("Author:   {}", summary.author);
    println!("Version:  {}", summary.version);
    println!("Records:  {}", summary.record_count);
    println!("Enabled:  {}", summary.enabled);
    println!("Disabled: {}", summary.disabled);
    println!();
    print!("{}", summary.content_text());
    println!();
    println!("Suggested action: {}", summary.suggested_action());
}

/// Drives an indicatif bar from pipeline progress and collects rows
struct BarSink {
    bar: ProgressBar,
    rows: Mutex<Vec<PreviewRow>>,
}

impl PipelineSink for BarSink {
    fn on_row(&self, row: PreviewRow) {
        self.rows.lock().push(row);
    }

    fn on_progress(&self, progress: Progress) {
        self.bar.set_position(progress.completed as u64);
    }

    fn on_item_error(&self, error: ItemError) {
        self.bar.println(format!("warning: {}", error));
    }
}

fn run_preview(
    archive: &LooseArchive,
    pack: &str,
    category: &str,
    item: &str,
    out: Option<&Path>,
    options: PipelineOptions,
) -> Result<()> {
    let list = archive.list_records()?;
    let tree = CategoryTree::build(&list.mods, &[]).tree;
    let leaf = tree
        .find_path(pack_key(pack), &[category, item])
        .filter(|&id| tree.kind(id) == Some(NodeKind::Leaf))
        .with_context(|| format!("No item {} / {} / {}", pack, category, item))?;

    let records = resolve_selection(&tree, leaf, &list.mods);
    let identity = tree.node(leaf).and_then(|n| n.item.as_ref()).and_then(|i| i.identity);

    let bar = ProgressBar::new(records.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    bar.set_message(item.to_string());

    let sink = BarSink {
        bar,
        rows: Mutex::new(Vec::new()),
    };
    let summary = UpdatePipeline::new(archive, options).run(
        &records,
        identity.as_ref(),
        &CancellationToken::new(),
        &sink,
    )?;
    sink.bar.finish_and_clear();

    let rows = sink.rows.into_inner();
    println!(
        "{:<24} {:<9} {:<5} {:<10} {:<9} {:>9}  PATH",
        "RACE", "MAP", "PART", "TYPE", "STATUS", "SIZE"
    );
    for row in &rows {
        let (w, h) = row.image.dimensions();
        println!(
            "{:<24} {:<9} {:<5} {:<10} {:<9} {:>9}  {}",
            row.race,
            row.map.to_string(),
            row.part,
            row.kind,
            row.status.label(),
            format!("{}x{}", w, h),
            row.record.full_path
        );
    }
    println!(
        "{} rows, {} skipped ({:?})",
        summary.published, summary.skipped, summary.strategy
    );

    if let Some(out) = out {
        export_rows(&rows, out)?;
        println!("Wrote {} images to {}", rows.len(), out.display());
    }

    Ok(())
}

fn export_rows(rows: &[PreviewRow], out: &Path) -> Result<()> {
    std::fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;

    for (i, row) in rows.iter().enumerate() {
        let stem = Path::new(&row.record.full_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "row".to_string());
        let path = out.join(format!("{:02}_{}.png", i, stem));
        row.render()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn toggle_pack(archive: &LooseArchive, pack: &str) -> Result<()> {
    let list = archive.list_records()?;
    let summary = PackSummary::collect(&list, pack_key(pack));
    ensure_pack_exists(&summary, pack)?;
    let action = summary.suggested_action();
    let enabled = action.target_state();

    match pack_key(pack) {
        Some(name) => archive.set_pack_enabled(name, enabled)?,
        None => {
            for record in list.mods.iter().filter(|m| m.mod_pack.is_none() && m.enabled != enabled) {
                archive.set_record_enabled(&record.full_path, enabled)?;
            }
        }
    }

    println!("{}d {} ({} records)", action, summary.title, summary.record_count);
    Ok(())
}

fn delete_pack(archive: &LooseArchive, pack: &str) -> Result<()> {
    match pack_key(pack) {
        Some(name) => archive.delete_pack(name)?,
        None => {
            let list = archive.list_records()?;
            for record in list.mods.iter().filter(|m| m.mod_pack.is_none()) {
                archive.delete_record(&record.full_path)?;
            }
        }
    }
    println!("Deleted {}", tree_pack_name(pack));
    Ok(())
}
