//! CLI binary for url2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ImportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use url2md::{
    convert_html, convert_html_to_file, import_to_file, import_url_to_markdown, render_document,
    ImportConfig,
    ImportError, ImportResult, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_REDIRECTS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import a page (stdout)
  url2md https://example.com/blog/post

  # Write to a file with YAML front matter
  url2md https://example.com/blog/post -o post.md --metadata

  # Machine-readable result or failure
  url2md --json https://example.com/blog/post

  # Convert a saved page without network access
  url2md --html-file saved.html --base-url https://example.com/blog/post

ERROR CODES (--json):
  Code                        HTTP  Exit
  ──────────────────────────  ────  ────
  INVALID_URL                 400   2
  UNSUPPORTED_HOST            400   2
  FETCH_TIMEOUT               504   1
  UNSUPPORTED_CONTENT_TYPE    422   2
  CONTENT_TOO_LARGE           422   2
  PARSE_FAILED                422   2
  INTERNAL_ERROR              500   1

ENVIRONMENT VARIABLES:
  URL2MD_TIMEOUT        Whole-import budget in seconds
  URL2MD_MAX_BYTES      Response body ceiling in bytes
  URL2MD_MAX_REDIRECTS  Redirect hop limit
  URL2MD_USER_AGENT     User-Agent header
  RUST_LOG              Log filter (overrides -v / -q)
"#;

/// Import a public web page as Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "url2md",
    version,
    about = "Import a public web page as Markdown",
    long_about = "Fetch a public http(s) page, keep its main content, and convert it to \
Markdown with absolute links. Private, loopback and link-local targets are refused, \
including targets reached through redirects.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// http or https URL to import.
    #[arg(required_unless_present = "html_file")]
    url: Option<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "URL2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Output the JSON result (or error payload) instead of Markdown.
    #[arg(long, env = "URL2MD_JSON")]
    json: bool,

    /// Prepend YAML front-matter with title, source and fetch time.
    #[arg(long, env = "URL2MD_METADATA")]
    metadata: bool,

    /// Convert a local HTML file instead of fetching.
    #[arg(long, requires = "base_url", conflicts_with = "url")]
    html_file: Option<PathBuf>,

    /// Base URL for links in --html-file.
    #[arg(long, requires = "html_file")]
    base_url: Option<String>,

    /// Whole-import budget in seconds.
    #[arg(long, env = "URL2MD_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Response body ceiling in bytes.
    #[arg(long, env = "URL2MD_MAX_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_bytes: usize,

    /// Maximum redirects to follow.
    #[arg(long, env = "URL2MD_MAX_REDIRECTS", default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// User-Agent header sent with every request.
    #[arg(long, env = "URL2MD_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Disable the progress spinner.
    #[arg(long, env = "URL2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "URL2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "URL2MD_QUIET", conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ImportConfig::builder()
        .timeout_secs(cli.timeout)
        .max_body_bytes(cli.max_bytes)
        .max_redirects(cli.max_redirects)
        .user_agent(cli.user_agent.clone())
        .build()
        .context("Invalid configuration")?;

    let spinner = show_progress.then(|| new_spinner(&cli));
    let started = Instant::now();
    let outcome = run(&cli, &config).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let result = match outcome {
        Ok(result) => result,
        Err(e) => return report_failure(&cli, &e),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(render_document(&result, cli.metadata).as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        let target = cli
            .output
            .as_ref()
            .map(|p| bold(&p.display().to_string()))
            .unwrap_or_else(|| "stdout".to_string());
        eprintln!(
            "{}  {}  {}  →  {}",
            green("✔"),
            result.title,
            dim(&format!(
                "{} chars, {}ms",
                result.markdown.len(),
                started.elapsed().as_millis()
            )),
            target,
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Dispatch to the offline, file or stdout path.
async fn run(cli: &Cli, config: &ImportConfig) -> Result<ImportResult, ImportError> {
    if let (Some(path), Some(base)) = (&cli.html_file, &cli.base_url) {
        let html = tokio::fs::read(path).await.map_err(|e| {
            ImportError::Internal(format!("Failed to read {}: {e}", path.display()))
        })?;
        let html = String::from_utf8_lossy(&html);
        return match cli.output {
            Some(ref out) => convert_html_to_file(&html, base, out, cli.metadata, config).await,
            None => convert_html(&html, base, config).await,
        };
    }

    let url = cli.url.as_deref().unwrap_or_default();
    match cli.output {
        Some(ref out) => import_to_file(url, out, cli.metadata, config).await,
        None => import_url_to_markdown(url, config).await,
    }
}

fn report_failure(cli: &Cli, err: &ImportError) -> Result<ExitCode> {
    let failure = err.to_failure();
    if cli.json {
        let json = serde_json::to_string_pretty(&failure.to_json())
            .context("Failed to serialise error")?;
        println!("{json}");
    } else {
        eprintln!("{} {}: {}", red("✘"), bold(failure.code.as_str()), failure.message);
        if cli.verbose {
            eprintln!("  {}", dim(&err.to_string()));
        }
    }

    let status = failure.code.http_status();
    Ok(if (400..500).contains(&status) {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    })
}

fn new_spinner(cli: &Cli) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Importing");
    let target = cli
        .url
        .clone()
        .or_else(|| cli.html_file.as_ref().map(|p| p.display().to_string()))
        .unwrap_or_default();
    bar.set_message(target);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
