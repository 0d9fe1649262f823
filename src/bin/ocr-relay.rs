//! CLI binary for pdf-ocr-relay.
//!
//! `serve` runs the relay; `convert` pushes one PDF through a running relay
//! and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_ocr_relay::config::{
    DEFAULT_API_URL, DEFAULT_BIND, DEFAULT_RELAY_URL, ENV_API_URL, ENV_APP_ID, ENV_APP_KEY,
    ENV_BIND, ENV_MAX_UPLOAD_MB, ENV_TIMEOUT_SECS,
};
use pdf_ocr_relay::{
    render_document, serve, ConversionJob, JobTracker, PdfUpload, PollProgressCallback,
    PollState, ProgressCallback, ProxyClient, RelayConfig, TrackerConfig,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Percentage bar fed by poll progress events.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PollProgressCallback for CliProgressCallback {
    fn on_submitted(&self, job_id: &str) {
        self.bar.set_prefix("Converting");
        self.bar.println(format!("{} job {}", green("✓"), bold(job_id)));
    }

    fn on_progress(&self, _job_id: &str, status: &str, fraction: f64) {
        self.bar.set_position((fraction * 100.0).round() as u64);
        self.bar.set_message(status.to_string());
    }

    fn on_completed(&self, _job_id: &str, markup_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} conversion completed  {}",
            green("✔"),
            dim(&format!("{markup_len} chars"))
        );
    }

    fn on_failed(&self, error: &str) {
        self.bar.abandon();
        eprintln!("{} {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the relay (credentials from the environment or .env)
  ocr-relay serve

  # Run on another port against a staging service
  ocr-relay serve --bind 127.0.0.1:8080 --api-url https://staging.example.com

  # Convert a PDF through a local relay
  ocr-relay convert paper.pdf -o paper.md

  # Standalone HTML page with typeset math
  ocr-relay convert paper.pdf --format html -o paper.html

ENVIRONMENT VARIABLES:
  MATHPIX_APP_ID            OCR service app id (serve)
  MATHPIX_APP_KEY           OCR service app key (serve)
  MATHPIX_API_URL           OCR service base URL (default https://api.mathpix.com)
  OCR_RELAY_BIND            Listen address (default 0.0.0.0:3000)
  OCR_RELAY_MAX_UPLOAD_MB   Upload size limit in MiB (default 50)
  OCR_RELAY_TIMEOUT_SECS    Outbound request timeout (default: none)
  OCR_RELAY_URL             Relay used by `convert` (default http://127.0.0.1:3000)
  RUST_LOG                  Log filter, overrides -v / -q
"#;

/// Relay PDF uploads to an OCR service and track conversions.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-relay",
    version,
    about = "Relay PDF uploads to an OCR service and track conversions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR_RELAY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCR_RELAY_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay HTTP server.
    Serve(ServeArgs),
    /// Upload a PDF through a running relay and print the converted markup.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = ENV_BIND, default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// OCR service app id.
    #[arg(long, env = ENV_APP_ID, hide_env_values = true)]
    app_id: Option<String>,

    /// OCR service app key.
    #[arg(long, env = ENV_APP_KEY, hide_env_values = true)]
    app_key: Option<String>,

    /// OCR service base URL.
    #[arg(long, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Upload size limit in MiB.
    #[arg(long, env = ENV_MAX_UPLOAD_MB, default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..=4096))]
    max_upload_mb: u64,

    /// Outbound request timeout in seconds (none by default).
    #[arg(long, env = ENV_TIMEOUT_SECS)]
    timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Relay base URL.
    #[arg(long, env = "OCR_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    /// Delay between status checks in milliseconds.
    #[arg(long, default_value_t = 5000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Output format.
    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Html,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env values must be visible to clap's `env = …` fallbacks
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback for `convert`; keep library logs quiet
    // underneath it unless -v was given.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress,
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Convert(args) => run_convert(&args, cli.quiet, show_progress).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut builder = RelayConfig::builder()
        .api_base_url(args.api_url)
        .bind_addr(args.bind)
        .max_upload_bytes((args.max_upload_mb * 1024 * 1024) as usize);
    if let Some(id) = args.app_id {
        builder = builder.app_id(id);
    }
    if let Some(key) = args.app_key {
        builder = builder.app_key(key);
    }
    if let Some(secs) = args.timeout {
        builder = builder.request_timeout_secs(secs);
    }

    let config = builder.build().context("Invalid relay configuration")?;
    serve(config).await.context("Relay server failed")?;
    Ok(())
}

async fn run_convert(args: &ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    // Validate before touching the network.
    let upload = PdfUpload::from_path(&args.input).await;

    let mut builder = TrackerConfig::builder()
        .relay_url(args.relay_url.as_str())
        .poll_interval(Duration::from_millis(args.poll_interval_ms));
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new() as ProgressCallback);
    }
    let config = builder.build().context("Invalid client configuration")?;

    let client = ProxyClient::from_config(&config).context("Failed to create relay client")?;
    let tracker = JobTracker::new(Arc::new(client), config);
    let session = tracker
        .submit(upload)
        .with_context(|| format!("Cannot upload {}", args.input.display()))?;

    // Without a bar, report state changes as plain lines.
    if !quiet && !show_progress {
        let mut states = WatchStream::new(session.subscribe());
        tokio::spawn(async move {
            while let Some(state) = states.next().await {
                match &state {
                    PollState::Polling(job) => eprintln!(
                        "{} {}  {:.0}%",
                        dim(job.id()),
                        job.status,
                        job.progress() * 100.0
                    ),
                    other => eprintln!("{}", dim(other.name())),
                }
            }
        });
    }

    // Dropping the session on Ctrl-C cancels it.
    let state = tokio::select! {
        state = session.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            bail!("Cancelled");
        }
    };

    match state {
        PollState::Completed(job) => {
            let rendered = format_job(&job, args.format, &args.input)?;
            write_output(&rendered, args.output.as_deref()).await?;
            if !quiet {
                if let Some(path) = &args.output {
                    eprintln!("{}  {}", green("✔"), bold(&path.display().to_string()));
                }
            }
            Ok(())
        }
        PollState::Failed(e) => bail!("Conversion failed: {}", e.message()),
        other => bail!("Conversion stopped while {}", other.name()),
    }
}

fn format_job(job: &ConversionJob, format: OutputFormat, input: &Path) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(job).context("Failed to serialise job")
        }
        OutputFormat::Markdown => Ok(job.markup().unwrap_or_default().to_string()),
        OutputFormat::Html => {
            let Some(result) = &job.result else {
                bail!("Job {} completed without a result", job.id());
            };
            let title = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| job.id().to_string());
            Ok(render_document(result, &title))
        }
    }
}

/// Write to `path` via a temporary sibling and rename, or to stdout.
async fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        if !content.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("partial");
    tokio::fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move output into {}", path.display()))?;
    Ok(())
}
