//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use nodecatalog_core::{PipelineConfig, ProgressReporter, RunOutput, build_snapshot, write_snapshot};
use nodecatalog_shared::{
    AppConfig, SourceOutcome, SourceResult, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nodecatalog — a deduplicated catalogue of n8n nodes.
#[derive(Parser)]
#[command(
    name = "nodecatalog",
    version,
    about = "Build a catalogue of core and community n8n nodes.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Collect all sources and write the snapshot.
    Run {
        /// Snapshot path (defaults to `output.path` from config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Config file to use instead of ~/.nodecatalog/nodecatalog.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the package version lookup.
        #[arg(long)]
        no_versions: bool,

        /// Skip node type/version extraction.
        #[arg(long)]
        no_node_types: bool,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nodecatalog=info",
        1 => "nodecatalog=debug",
        _ => "nodecatalog=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            out,
            config,
            no_versions,
            no_node_types,
        } => cmd_run(out.as_deref(), config.as_deref(), no_versions, no_node_types).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_run(
    out: Option<&Path>,
    config_path: Option<&Path>,
    no_versions: bool,
    no_node_types: bool,
) -> Result<()> {
    let mut app = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_flags(&mut app, no_versions, no_node_types);

    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&app.output.path));

    let config = PipelineConfig::from(&app);
    if config.token.is_none() {
        info!(env = %app.http.token_env, "no token set, registry requests are anonymous");
    }

    let reporter = CliProgress::new();
    let output = nodecatalog_core::run(&config, &reporter)
        .await
        .inspect_err(|_| reporter.spinner.finish_and_clear())?;

    let snapshot = build_snapshot(&output, Utc::now());
    write_snapshot(&out_path, &snapshot)?;

    println!();
    println!("  Catalogue written to {}", out_path.display());
    println!("  Total:      {}", snapshot.total);
    println!("  Core:       {}", snapshot.core_count);
    println!("  Community:  {}", snapshot.community_count);
    println!("  API calls:  {}", output.meta.api_calls);
    if !output.meta.degraded.is_empty() {
        let degraded: Vec<&str> = output.meta.degraded.keys().map(String::as_str).collect();
        println!("  Degraded:   {}", degraded.join(", "));
    }
    println!("  Time:       {:.1}s", output.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Command-line switches only ever turn metadata steps off.
fn apply_flags(app: &mut AppConfig, no_versions: bool, no_node_types: bool) {
    if no_versions {
        app.versions.enabled = false;
    }
    if no_node_types {
        app.registry.extract_node_types = false;
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_done(&self, outcome: &SourceOutcome) {
        let line = match &outcome.result {
            SourceResult::Collected(items) => format!("  ✓ {:<16} {}", outcome.source, items.len()),
            SourceResult::Degraded { reason } => format!("  ✗ {:<16} 0 ({reason})", outcome.source),
        };
        self.spinner.println(line);
    }

    fn done(&self, _output: &RunOutput) {
        self.spinner.finish_and_clear();
    }
}
