//! CLI binary for edgequake-petition.
//!
//! A thin shim over the library crate: `generate` maps flags to a
//! `RewriterConfig` and runs one petition, `serve` starts the HTTP service.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_petition::server::{self, AppState};
use edgequake_petition::{
    Context, FormatterConfig, LlmCompletion, LocalDirPublisher, ParagraphSource, PetitionGenerator,
    PetitionRequest, ProgressCallback, RewriteProgressCallback, Rewriter, RewriterConfig,
    StoragePublisher, SupabaseConfig, SupabasePublisher, TierProfile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over body paragraphs, one log line per paragraph.
struct CliProgressCallback {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Loading paragraphs…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }
}

impl RewriteProgressCallback for CliProgressCallback {
    fn on_rewrite_start(&self, total_body_paragraphs: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} paragraphs  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_body_paragraphs as u64);
        self.bar.set_prefix("Rewriting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rewriting {total_body_paragraphs} paragraphs…"))
        ));
    }

    fn on_paragraph_start(&self, _index: usize, _total: usize, section: &str) {
        let section = if section.is_empty() { "Geral" } else { section };
        self.bar.set_message(section.to_string());
    }

    fn on_paragraph_complete(&self, index: usize, _total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Paragraph {:>3}  {}",
            green("✓"),
            index + 1,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_paragraph_degraded(&self, index: usize, _total: usize, error: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Paragraph {:>3}  {}",
            red("✗"),
            index + 1,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_rewrite_complete(&self, total: usize, rewritten: usize, total_cost_usd: f64) {
        self.bar.finish_and_clear();
        let failed = self.degraded.load(Ordering::SeqCst);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{} {}/{} paragraphs rewritten  {}",
            mark,
            bold(&rewritten.to_string()),
            total,
            dim(&format!("~${total_cost_usd:.4}")),
        );
        if failed > 0 {
            eprintln!("  {} degraded to the fallback text", red(&failed.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Built-in petition, context from flags, DOCX in the current directory
  petition generate -c reclamante="Maria da Silva" -c empresa=ACME

  # Context from a JSON object, custom template and letterhead
  petition generate --context-file caso.json --template modelo.docx \
      --header-image timbre.png --out-dir saida/

  # Print only the rewritten text (no DOCX)
  petition generate --context-file caso.json --text-only

  # Upload to Supabase storage instead of a local directory
  petition generate --context-file caso.json --publish

  # HTTP service (POST /gerar-peticao)
  petition serve --addr 0.0.0.0:8000

TIERS:
  Paragraphs under FATOS, FUNDAMENTAÇÃO or PEDIDOS use the high tier.
  Tier       Model (default)   $/1K in   $/1K out
  standard   gpt-3.5-turbo     0.0005    0.0015
  high       gpt-4             0.01      0.03

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  SUPABASE_URL            Supabase project URL (for --publish / serve)
  SUPABASE_KEY            Supabase key with write access to the bucket
  A .env file in the working directory is loaded first.
"#;

/// Rewrite labour petitions with an LLM and render them as DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "petition",
    version,
    about = "Rewrite labour petitions with an LLM and render them as DOCX",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PETITION_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PETITION_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one petition.
    Generate(GenerateArgs),
    /// Serve `POST /gerar-peticao` over HTTP.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Context entry `key=value`; repeatable, later entries win.
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
    context: Vec<String>,

    /// JSON object with the case context. `--context` entries are applied on top.
    #[arg(long, env = "PETITION_CONTEXT_FILE")]
    context_file: Option<PathBuf>,

    #[command(flatten)]
    document: DocumentArgs,

    /// Directory the finished DOCX is written to.
    #[arg(short, long, env = "PETITION_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Upload to Supabase storage instead of writing to `--out-dir`.
    #[arg(long)]
    publish: bool,

    /// Print the rewritten text and skip the DOCX.
    #[arg(long)]
    text_only: bool,

    /// Output structured JSON instead of a summary.
    #[arg(long, env = "PETITION_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PETITION_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    rewrite: RewriteArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "PETITION_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    /// Publish into this directory instead of Supabase storage.
    #[arg(long, env = "PETITION_PUBLISH_DIR")]
    publish_dir: Option<PathBuf>,

    /// Keep generated files here instead of a per-request temp directory.
    #[arg(long, env = "PETITION_WORK_DIR")]
    work_dir: Option<PathBuf>,

    #[command(flatten)]
    document: DocumentArgs,

    #[command(flatten)]
    rewrite: RewriteArgs,
}

#[derive(Args, Debug)]
struct DocumentArgs {
    /// Template (.docx or text, one paragraph per line). Default: built-in petition.
    #[arg(long, env = "PETITION_TEMPLATE")]
    template: Option<PathBuf>,

    /// Letterhead image for the page header; skipped when missing.
    #[arg(long, env = "PETITION_HEADER_IMAGE")]
    header_image: Option<PathBuf>,

    /// Footer text on every page.
    #[arg(long, env = "PETITION_FOOTER")]
    footer: Option<String>,
}

#[derive(Args, Debug)]
struct RewriteArgs {
    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for the standard tier.
    #[arg(long, env = "PETITION_STANDARD_MODEL")]
    standard_model: Option<String>,

    /// Model for the high tier (FATOS, FUNDAMENTAÇÃO, PEDIDOS).
    #[arg(long, env = "PETITION_HIGH_MODEL")]
    high_model: Option<String>,

    /// Standard tier rates as `INPUT/OUTPUT` USD per 1K tokens.
    #[arg(long, value_name = "IN/OUT", env = "PETITION_STANDARD_RATES")]
    standard_rates: Option<String>,

    /// High tier rates as `INPUT/OUTPUT` USD per 1K tokens.
    #[arg(long, value_name = "IN/OUT", env = "PETITION_HIGH_RATES")]
    high_rates: Option<String>,

    /// Section keywords routed to the high tier (comma separated).
    #[arg(long, value_delimiter = ',', env = "PETITION_HIGH_TIER_KEYWORDS")]
    high_tier_keywords: Option<Vec<String>>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PETITION_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Retries per paragraph on LLM failure.
    #[arg(long, env = "PETITION_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-paragraph LLM call timeout in seconds.
    #[arg(long, env = "PETITION_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `generate`.
    let show_progress = match &cli.command {
        Command::Generate(g) => !cli.quiet && !g.no_progress && !g.json,
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
        Command::Generate(args) => run_generate(args, show_progress, cli.quiet).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_generate(args: GenerateArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let context = load_context(args.context_file.as_deref(), &args.context).await?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RewriteProgressCallback>)
    } else {
        None
    };
    let rewriter = build_rewriter(&args.rewrite, progress)?;
    let source = paragraph_source(&args.document);

    // ── Text only ────────────────────────────────────────────────────────
    if args.text_only {
        let paragraphs = source.load().await.context("Failed to load paragraphs")?;
        let output = rewriter.rewrite(&paragraphs, &context).await;
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            let mut handle = io::stdout().lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    // ── Full pipeline ────────────────────────────────────────────────────
    let publisher: Arc<dyn StoragePublisher> = if args.publish {
        Arc::new(supabase_publisher()?)
    } else {
        Arc::new(LocalDirPublisher::new(&args.out_dir))
    };
    let generator =
        PetitionGenerator::new(rewriter, publisher).formatter(formatter_config(&args.document));

    let mut request = PetitionRequest::new(context).source(source);
    request.header_image = args.document.header_image.clone();

    let generated = generator
        .generate(request)
        .await
        .context("Petition generation failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&generated.response)
                .context("Failed to serialise response")?
        );
    } else if !quiet {
        let stats = &generated.rewrite.stats;
        eprintln!(
            "{}  {}  {}ms  →  {}",
            if stats.degraded_paragraphs == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&generated.response.arquivo),
            generated.duration_ms,
            generated.response.url_download,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  ~${:.4}",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            generated.response.custo_estimado_usd,
        );
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let rewriter = build_rewriter(&args.rewrite, None)?;
    let publisher: Arc<dyn StoragePublisher> = match &args.publish_dir {
        Some(dir) => Arc::new(LocalDirPublisher::new(dir)),
        None => Arc::new(supabase_publisher()?),
    };

    let mut generator =
        PetitionGenerator::new(rewriter, publisher).formatter(formatter_config(&args.document));
    if let Some(dir) = &args.work_dir {
        generator = generator.work_dir(dir);
    }

    let mut state = AppState::new(Arc::new(generator));
    state.source = paragraph_source(&args.document);
    state.header_image = args.document.header_image.clone();

    info!("Paragraph source: {:?}", state.source);
    server::serve(args.addr, state)
        .await
        .context("HTTP server failed")
}

/// Map CLI args to a `Rewriter` backed by `edgequake-llm`.
fn build_rewriter(args: &RewriteArgs, progress: Option<ProgressCallback>) -> Result<Rewriter> {
    let mut standard = TierProfile::standard_default();
    let mut high = TierProfile::high_default();
    if let Some(m) = &args.standard_model {
        standard.model = m.clone();
    }
    if let Some(m) = &args.high_model {
        high.model = m.clone();
    }
    if let Some(r) = &args.standard_rates {
        (standard.input_rate_per_1k, standard.output_rate_per_1k) = parse_rates(r)?;
    }
    if let Some(r) = &args.high_rates {
        (high.input_rate_per_1k, high.output_rate_per_1k) = parse_rates(r)?;
    }

    let mut builder = RewriterConfig::builder()
        .standard(standard)
        .high(high)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout);
    if let Some(keywords) = &args.high_tier_keywords {
        builder = builder.high_tier_keywords(keywords.iter().map(|k| k.trim().to_string()));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let provider =
        LlmCompletion::from_env(args.provider.as_deref()).context("No LLM provider available")?;
    Ok(Rewriter::new(Arc::new(provider), config))
}

fn paragraph_source(args: &DocumentArgs) -> ParagraphSource {
    match &args.template {
        Some(path) => ParagraphSource::Template(path.clone()),
        None => ParagraphSource::Builtin,
    }
}

fn formatter_config(args: &DocumentArgs) -> FormatterConfig {
    let mut config = FormatterConfig::default();
    if let Some(footer) = &args.footer {
        config.footer_text = footer.clone();
    }
    config
}

fn supabase_publisher() -> Result<SupabasePublisher> {
    let config = SupabaseConfig::from_env().context("Supabase storage is not configured")?;
    SupabasePublisher::new(config).context("Failed to create storage client")
}

/// Context from an optional JSON file, then `key=value` overrides.
async fn load_context(file: Option<&Path>, entries: &[String]) -> Result<Context> {
    let mut context = match file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read context from {:?}", path))?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {:?}", path))?;
            let object = value
                .as_object()
                .with_context(|| format!("{:?} must contain a JSON object", path))?;
            Context::from_json_object(object)
        }
        None => Context::new(),
    };
    for entry in entries {
        let (key, value) = parse_entry(entry)?;
        context.insert(key, value);
    }
    Ok(context)
}

/// Parse `--context key=value`.
fn parse_entry(s: &str) -> Result<(&str, &str)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Invalid context entry '{s}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid context entry '{s}': empty key");
    }
    Ok((key, value))
}

/// Parse `--*-rates IN/OUT`.
fn parse_rates(s: &str) -> Result<(f64, f64)> {
    let (input, output) = s
        .split_once('/')
        .with_context(|| format!("Invalid rates '{s}': expected INPUT/OUTPUT"))?;
    let input: f64 = input.trim().parse().context("Invalid input rate")?;
    let output: f64 = output.trim().parse().context("Invalid output rate")?;
    Ok((input, output))
}
