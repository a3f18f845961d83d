//! CLI binary for pdf-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! picks the PDF to process, and prints progress and results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_ocr::{
    discover_pdf, load_env_file, materialize_from_json, process_pdf, ArtifactError, OcrConfig,
    OcrOutput, OcrProgressCallback, ProgressCallback, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while a stage runs, one line on
/// stdout per finished stage and saved image, one line on stderr per failure.
struct CliProgressCallback {
    spinner: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        spinner.set_style(style);
        Arc::new(Self { spinner })
    }

    fn out(&self, line: String) {
        self.spinner.suspend(|| println!("{line}"));
    }

    fn err(&self, line: String) {
        self.spinner.suspend(|| eprintln!("{line}"));
    }
}

impl OcrProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.spinner.set_prefix(stage.to_string());
        self.spinner.set_message("…");
        self.spinner.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let detail = match stage {
            Stage::Upload => format!("file id {detail}"),
            Stage::SignedUrl => "ok".to_string(),
            Stage::Process | Stage::Materialize => detail.to_string(),
        };
        self.out(format!("{} {}  {}", green("✓"), stage, dim(&detail)));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.spinner.finish_and_clear();
        self.err(format!("{} {} failed: {}", red("✗"), stage, red(error)));
    }

    fn on_page(&self, page: usize, images: usize) {
        self.spinner.set_message(format!("page {page}"));
        if images > 0 {
            self.out(format!("  Page {page:>3}  {}", dim(&format!("{images} images"))));
        }
    }

    fn on_image_saved(&self, _page: usize, id: &str, bytes: usize) {
        self.out(format!(
            "      {} {}  {}",
            green("↳"),
            id,
            dim(&format!("{bytes} bytes"))
        ));
    }

    fn on_artifact_error(&self, error: &ArtifactError) {
        self.err(format!("  {} {}", cyan("⚠"), error));
    }

    fn on_complete(&self, _markdown_path: &Path) {
        self.spinner.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a specific file
  pdf-ocr report.pdf

  # OCR the first PDF found in the current directory
  pdf-ocr --auto-find

  # OCR the first PDF found in another directory
  pdf-ocr --directory ~/Downloads

  # Re-create the output directory from a saved response (no API call)
  pdf-ocr --from-json report_ocr_output/report_ocr_response.json report.pdf

  # Machine-readable summary
  pdf-ocr --json report.pdf > summary.json

OUTPUT LAYOUT (beside the PDF):
  report_ocr_output/
    report_ocr_response.json   full OCR response
    report_ocr.md              Markdown, one page after another
    img-0.jpeg …               images, named exactly as referenced in the Markdown

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY     Mistral API key (required unless --api-key is given)
  PDF_OCR_MODEL       Override the OCR model
  PDF_OCR_BASE_URL    Override the API base URL
  RUST_LOG            Override the log filter

  A .env file in the current directory (or next to the executable) is
  loaded before the key is looked up, e.g.:
    MISTRAL_API_KEY=your_api_key
"#;

/// OCR PDF documents to Markdown and images with the Mistral OCR API.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-ocr",
    version,
    about = "OCR PDF documents to Markdown and images with the Mistral OCR API",
    long_about = "Upload a PDF to the Mistral OCR service and write the result beside it: \
the full JSON response, every embedded image, and a Markdown file whose image references \
point at those images.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to process. If omitted, the first PDF in --directory (or the
    /// current directory) is used.
    pdf: Option<PathBuf>,

    /// Directory to search for a PDF when no file is given.
    #[arg(short, long, conflicts_with = "pdf")]
    directory: Option<PathBuf>,

    /// Find the PDF automatically (the first one in --directory or the
    /// current directory). This is also what happens when no file is given.
    #[arg(short = 'a', long, conflicts_with = "pdf")]
    auto_find: bool,

    /// Load environment variables from this file instead of ./.env.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Mistral API key. Defaults to $MISTRAL_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// OCR model ID.
    #[arg(long, env = "PDF_OCR_MODEL", default_value = pdf_ocr::config::DEFAULT_MODEL)]
    model: String,

    /// API base URL.
    #[arg(long, env = "PDF_OCR_BASE_URL", default_value = pdf_ocr::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "PDF_OCR_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Do not request inline image payloads (Markdown and JSON only).
    #[arg(long)]
    no_images: bool,

    /// Re-materialize from a saved response JSON instead of calling the API.
    #[arg(long, value_name = "RESPONSE_JSON", requires = "pdf")]
    from_json: Option<PathBuf>,

    /// Print a JSON summary of the output on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress lines.
    #[arg(long, env = "PDF_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs duplicate the progress lines, so they are only shown
    // when progress is off.
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("✘ OCR failed:"), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let say = |line: String| {
        if !cli.quiet && !cli.json {
            println!("{line}");
        }
    };

    // ── Environment ──────────────────────────────────────────────────────
    if let Some(ref path) = cli.env_file {
        let n = load_env_file(path)
            .with_context(|| format!("Failed to load environment from {}", path.display()))?;
        say(format!("Loaded {n} variables from {}", path.display()));
    } else if let Some(path) = default_env_file() {
        match load_env_file(&path) {
            Ok(n) => say(format!("Loaded {n} variables from {}", path.display())),
            Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
        }
    }

    // ── Pick the PDF ─────────────────────────────────────────────────────
    let pdf = match search_dir(cli)? {
        None => cli.pdf.clone().context("No PDF given")?,
        Some(dir) => {
            say(format!("Searching for PDF files in: {}", dir.display()));
            let found = discover_pdf(&dir)?;
            say(format!("Found PDF file: {}", bold(&found.path.display().to_string())));
            if found.candidates > 1 {
                say(format!(
                    "{} found {} PDF files, using the first: {}",
                    cyan("Note:"),
                    found.candidates,
                    found
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ));
            }
            found.path
        }
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn OcrProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = if let Some(ref json_path) = cli.from_json {
        say(format!("Re-materializing from {}", json_path.display()));
        materialize_from_json(json_path, &pdf, &config)
            .await
            .context("Materialization failed")?
    } else {
        say(format!("Running OCR on {}", bold(&pdf.display().to_string())));
        process_pdf(&pdf, &config).await.context("OCR failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Directory to search when the PDF is to be found automatically, or `None`
/// when an explicit file was given.
fn search_dir(cli: &Cli) -> Result<Option<PathBuf>> {
    if cli.pdf.is_some() {
        return Ok(None);
    }
    match cli.directory {
        Some(ref d) => Ok(Some(d.clone())),
        None => std::env::current_dir()
            .map(Some)
            .context("Failed to read current directory"),
    }
}

/// `./.env`, else `.env` next to the executable.
fn default_env_file() -> Option<PathBuf> {
    let cwd = PathBuf::from(".env");
    if cwd.is_file() {
        return Some(cwd);
    }
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let beside_exe = exe_dir.join(".env");
    beside_exe.is_file().then_some(beside_exe)
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .model(&cli.model)
        .base_url(&cli.base_url)
        .request_timeout_secs(cli.timeout)
        .include_image_base64(!cli.no_images);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &OcrOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        for err in &output.artifact_errors {
            eprintln!("  {} {}", cyan("⚠"), err);
        }
    }
    println!(
        "{} OCR completed successfully  {} pages  {} images  {}ms",
        if output.is_complete() {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.page_count,
        stats.images_saved,
        stats.total_duration_ms,
    );
    println!("   {}", bold(&output.markdown_path.display().to_string()));
    if stats.images_skipped > 0 || !output.artifact_errors.is_empty() {
        println!(
            "   {}",
            dim(&format!(
                "{} images skipped, {} warnings",
                stats.images_skipped,
                output.artifact_errors.len()
            ))
        );
    }
}
