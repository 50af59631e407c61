use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use treediff_common::{
    load_config, load_config_from, AppConfig, CompareMethod, DiffResult, DiffStatus, DiffSummary,
    PathCasing,
};
use treediff_core::TreeDiff;

const COMPLETE_MARKER: &str = ">> COMPLETE <<";

#[derive(Parser)]
#[command(name = "treediff")]
#[command(author = "Treediff Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare two directory trees file by file", long_about = None)]
struct Cli {
    /// Left (original) directory
    left: PathBuf,

    /// Right (updated) directory
    right: PathBuf,

    /// Ignore patterns (can be specified multiple times)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Match paths case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Content comparison method
    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Maximum bytes compared per window
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Number of classification worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show only differences (hide identical files)
    #[arg(short = 'd', long)]
    diff_only: bool,

    /// Output results as JSON lines
    #[arg(long)]
    json: bool,

    /// Print per-status counts after completion
    #[arg(long)]
    summary: bool,

    /// Disable ANSI colors in output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Mmap,
    Buffered,
}

impl From<MethodArg> for CompareMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Mmap => CompareMethod::Mmap,
            MethodArg::Buffered => CompareMethod::Buffered,
        }
    }
}

fn main() {
    // Initialize tracing to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("Comparison failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    for (side, path) in [("Left", &cli.left), ("Right", &cli.right)] {
        if !path.exists() {
            warn!("{} path does not exist: {}", side, path.display());
        }
    }

    info!("Comparing:");
    info!("  Left:  {}", cli.left.display());
    info!("  Right: {}", cli.right.display());

    let stream = TreeDiff::new(cli.left.clone(), cli.right.clone(), config)
        .start()
        .context("failed to start comparison")?;

    let use_color = !cli.no_color && !cli.json && io::stdout().is_terminal();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut summary = DiffSummary::default();

    for result in stream {
        summary.record(result.status);

        if cli.diff_only && result.status == DiffStatus::Identical {
            continue;
        }

        if cli.json {
            writeln!(out, "{}", serde_json::to_string(&result)?)?;
        } else {
            writeln!(out, "{}", render_line(&result, use_color))?;
        }
    }

    if cli.json {
        let marker = JsonComplete {
            complete: true,
            summary: cli.summary.then_some(summary),
        };
        writeln!(out, "{}", serde_json::to_string(&marker)?)?;
    } else {
        writeln!(out)?;
        writeln!(out, "{}", COMPLETE_MARKER)?;
        if cli.summary {
            write_summary(&mut out, &summary)?;
        }
    }
    out.flush()?;

    info!(
        "Done: {} paths, {} with differences, {} errors",
        summary.total(),
        summary.total() - summary.identical - summary.errors,
        summary.errors
    );
    Ok(())
}

/// File config first, then command-line overrides
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let loaded = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };
    if loaded.exists {
        info!("Using config file: {}", loaded.path.display());
    }

    let mut config = loaded.config;
    config.ignore_patterns.extend(cli.ignore.iter().cloned());
    if cli.follow_symlinks {
        config.follow_symlinks = true;
    }
    if cli.case_sensitive {
        config.path_casing = PathCasing::Sensitive;
    }
    if let Some(method) = cli.method {
        config.compare_method = method.into();
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(threads) = cli.threads {
        config.worker_threads = Some(threads);
    }
    Ok(config)
}

#[derive(Serialize)]
struct JsonComplete {
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<DiffSummary>,
}

fn status_color(status: DiffStatus) -> &'static str {
    match status {
        DiffStatus::Identical => "\x1b[32m", // Green
        DiffStatus::Modified => "\x1b[31m",  // Red
        DiffStatus::Deleted => "\x1b[33m",   // Yellow
        DiffStatus::Added => "\x1b[34m",     // Blue
        DiffStatus::Error => "\x1b[35m",     // Magenta
    }
}

fn render_line(result: &DiffResult, use_color: bool) -> String {
    if use_color {
        format!(
            "{} >>> {}{}\x1b[0m",
            result.path,
            status_color(result.status),
            result.status
        )
    } else {
        result.to_string()
    }
}

fn write_summary(out: &mut impl Write, summary: &DiffSummary) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(40))?;
    writeln!(out, "Summary:")?;
    writeln!(out, "  Total:      {}", summary.total())?;
    writeln!(out, "  Identical:  {}", summary.identical)?;
    writeln!(out, "  Modified:   {}", summary.modified)?;
    writeln!(out, "  Added:      {}", summary.added)?;
    writeln!(out, "  Deleted:    {}", summary.deleted)?;
    writeln!(out, "  Error:      {}", summary.errors)?;
    writeln!(out, "{}", "=".repeat(40))
}

#[cfg(test)]
mod tests {
    use super::*;
    use treediff_common::RelPath;

    #[test]
    fn test_render_line_plain() {
        let result = DiffResult::new(RelPath::new("dir/a.txt"), DiffStatus::Added);
        assert_eq!(render_line(&result, false), "/dir/a.txt >>> Added");
    }

    #[test]
    fn test_render_line_colored() {
        let result = DiffResult::new(RelPath::new("a.txt"), DiffStatus::Modified);
        assert_eq!(render_line(&result, true), "/a.txt >>> \x1b[31mModified\x1b[0m");
    }

    #[test]
    fn test_cli_overrides_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let config_path = temp.path().join("treediff.toml");
        std::fs::write(&config_path, "ignore_patterns = [\"*.o\"]\nchunk_size = 8192\n").unwrap();

        let cli = Cli::parse_from([
            "treediff",
            "left",
            "right",
            "--config",
            config_path.to_str().unwrap(),
            "-i",
            "*.log",
            "--case-sensitive",
            "--method",
            "buffered",
            "-j",
            "2",
        ]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.ignore_patterns, vec!["*.o".to_string(), "*.log".to_string()]);
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.path_casing, PathCasing::Sensitive);
        assert_eq!(config.compare_method, CompareMethod::Buffered);
        assert_eq!(config.worker_threads, Some(2));
    }

    #[test]
    fn test_summary_block() {
        let mut summary = DiffSummary::default();
        summary.record(DiffStatus::Identical);
        summary.record(DiffStatus::Error);

        let mut buf = Vec::new();
        write_summary(&mut buf, &summary).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Total:      2"));
        assert!(text.contains("Error:      1"));
    }
}
