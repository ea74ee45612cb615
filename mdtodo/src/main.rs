use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use mdtodo::cache::ChangeNotice;
use mdtodo::config::ScanConfig;
use mdtodo::coordinator::ChangeSignal;
use mdtodo::core::TodoFile;
use mdtodo::indexer::index_lines;
use mdtodo::session::Session;
use mdtodo::storage::{FsReader, TextReader};
use mdtodo::view::{RenderedNode, format_tree};
use mdtodo::watch::watch_workspace;
use notify::RecommendedWatcher;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mdtodo",
    about = "Index Markdown checklists across a workspace",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan a workspace and print its checklist tree.
    List(ListArgs),

    /// Scan, then keep reprinting the tree as files change.
    Watch(ListArgs),

    /// Index individual Markdown files and print their structure.
    Parse(ParseArgs),

    /// Resolve a todo id to `path:line`.
    Focus(FocusArgs),
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Workspace root. Defaults to the current directory.
    #[arg(default_value = ".")]
    root: PathBuf,
    /// Read scan settings from this file instead of `<root>/.mdtodo.json`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extra exclude glob, relative to the root. May be repeated.
    #[arg(long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,
    /// Discard configured exclude globs before applying --exclude.
    #[arg(long)]
    reset_excludes: bool,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    scan: ScanArgs,
    /// Show ticked items and finished files too.
    #[arg(long)]
    all: bool,
    /// Emit JSON instead of an outline.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Markdown files or directories containing Markdown files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Emit JSON instead of a debug representation.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct FocusArgs {
    /// Todo id as printed by `list --json` (`<path>:<line>`).
    id: String,
    #[command(flatten)]
    scan: ScanArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::List(args) => handle_list(args),
        Commands::Watch(args) => handle_watch(args),
        Commands::Parse(args) => handle_parse(args),
        Commands::Focus(args) => handle_focus(args),
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "mdtodo=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Canonical root plus the effective config for it.
fn resolve_scan(args: &ScanArgs) -> Result<(PathBuf, ScanConfig)> {
    let root = fs::canonicalize(&args.root)
        .with_context(|| format!("resolving root {:?}", args.root))?;
    if !root.is_dir() {
        anyhow::bail!("{:?} is not a directory", root);
    }

    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path),
        None => ScanConfig::discover(&root),
    }
    .context("loading scan config")?;

    if args.reset_excludes {
        config.exclude.clear();
    }
    config.exclude.extend(args.excludes.iter().cloned());
    debug!(?config, root = %root.display(), "scan config");
    Ok((root, config))
}

fn open_session(args: &ScanArgs) -> Result<Session> {
    let (root, config) = resolve_scan(args)?;
    scan_workspace(&root, &config)
}

/// Like `open_session`, but the watcher is running before the scan starts so edits
/// made while scanning are queued rather than lost.
fn open_watched_session(
    args: &ScanArgs,
) -> Result<(PathBuf, Session, RecommendedWatcher, Receiver<ChangeSignal>)> {
    let (root, config) = resolve_scan(args)?;
    let rules = config.compile().context("compiling scan rules")?;
    let (watcher, signals) =
        watch_workspace(&root, rules).with_context(|| format!("watching {:?}", root))?;
    let session = scan_workspace(&root, &config)?;
    Ok((root, session, watcher, signals))
}

fn scan_workspace(root: &Path, config: &ScanConfig) -> Result<Session> {
    let mut session = Session::open(root, config)
        .with_context(|| format!("opening workspace {:?}", root))?;
    session
        .reindex()
        .with_context(|| format!("scanning {:?}", root))?;
    Ok(session)
}

fn print_tree(nodes: &[RenderedNode], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
    } else if nodes.is_empty() {
        eprintln!("No open todos found.");
    } else {
        print!("{}", format_tree(nodes));
    }
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<()> {
    let ListArgs { scan, all, json } = args;
    let mut session = open_session(&scan)?;
    session.set_display_ticked(all);
    print_tree(&session.render(), json)
}

fn handle_watch(args: ListArgs) -> Result<()> {
    let ListArgs { scan, all, json } = args;
    let (root, mut session, _watcher, signals) = open_watched_session(&scan)?;
    session.set_display_ticked(all);

    let (notice_tx, notice_rx) = mpsc::channel();
    session.subscribe(move |notice| {
        let _ = notice_tx.send(notice.clone());
    });
    info!(root = %root.display(), "watching for changes");
    print_tree(&session.render(), json)?;

    for signal in signals {
        session.handle(&signal);
        let notices: Vec<ChangeNotice> = notice_rx.try_iter().collect();
        if notices.is_empty() {
            continue;
        }
        println!();
        println!(
            "== {} {} ==",
            Local::now().format("%H:%M:%S"),
            signal.path().display()
        );
        print_tree(&session.render(), json)?;
    }
    Ok(())
}

fn handle_parse(args: ParseArgs) -> Result<()> {
    let ParseArgs { inputs, json } = args;
    let expanded = expand_inputs(&inputs)?;
    if expanded.is_empty() {
        anyhow::bail!("no Markdown files found in the provided inputs");
    }

    let mut parsed = Vec::new();
    for path in expanded {
        debug!(path = %path.display(), "indexing");
        let lines = FsReader
            .read_lines(&path)
            .with_context(|| format!("reading {:?}", path))?;
        parsed.push(index_lines(&path, &lines));
    }

    if json {
        let payload: Vec<&TodoFile> = parsed.iter().collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (idx, file) in parsed.iter().enumerate() {
            if parsed.len() > 1 {
                println!("== {} ==", file.path.display());
            }
            println!("{:#?}", file);
            if parsed.len() > 1 && idx + 1 < parsed.len() {
                println!();
            }
        }
    }
    Ok(())
}

fn handle_focus(args: FocusArgs) -> Result<()> {
    let FocusArgs { id, scan } = args;
    let session = open_session(&scan)?;
    let location = session
        .focus(&id)
        .with_context(|| format!("no todo with id {:?}", id))?;
    println!("{location}");
    Ok(())
}

/// Files are taken as given; directories contribute every `.md` below them.
fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = BTreeSet::new();
    for path in paths {
        let canonical =
            fs::canonicalize(path).with_context(|| format!("resolving path {:?}", path))?;
        if canonical.is_dir() {
            for file in collect_markdown(&canonical)? {
                if visited.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if is_markdown(&canonical) {
            if visited.insert(canonical.clone()) {
                out.push(canonical);
            }
        } else {
            anyhow::bail!("{:?} is not a Markdown file", canonical);
        }
    }
    Ok(out)
}

fn collect_markdown(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("walking {:?}", dir))?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}
