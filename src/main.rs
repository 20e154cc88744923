//! userdir-client binary entry point.
//!
//! Without a subcommand it initializes the terminal in raw mode, runs the TUI
//! event loop, and restores the terminal state on exit. The `list`, `delete`
//! and `journey` subcommands talk to the service without a terminal UI.
//!
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use userdir_client::api::UsersApi;
use userdir_client::api::http::HttpUsersApi;
use userdir_client::app::config::{ClientConfig, log_directive};
use userdir_client::app::keymap::Keymap;
use userdir_client::app::{self, AppState, Theme, config_file_path};
use userdir_client::journey::{self, JourneyConfig};
use userdir_client::state::DirectoryState;
use userdir_client::sync::{Answer, Confirm, LinePrompt, RemoveOutcome, SyncEngine};

/// Terminal client for a REST user directory.
#[derive(Parser)]
#[command(name = "userdir-client", version, about, propagate_version = true)]
struct Cli {
    /// Service root, e.g. http://localhost:8000/api/v1
    #[arg(long, env = "USERDIR_API_URL", global = true)]
    api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "USERDIR_TIMEOUT_SECS", global = true,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Client config file (default: <config dir>/userdir-client/client.conf).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `userdir_client=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Where TUI logs go (default: <config dir>/userdir-client/userdir-client.log).
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive directory (default).
    Tui,

    /// Print every user record.
    #[command(alias = "ls")]
    List,

    /// Delete one user after confirmation, then print the remaining records.
    #[command(alias = "rm")]
    Delete {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Run the scripted create/update/delete/list journey and check thresholds.
    Journey {
        #[arg(long, default_value_t = 1)]
        actors: usize,
        #[arg(long, default_value_t = 1)]
        iterations: usize,
        /// Pause after each step, in milliseconds.
        #[arg(long, default_value_t = 0)]
        think_ms: u64,
    },
}

/// Initialize a Crossterm-backed `ratatui` terminal in raw mode.
fn init_terminal() -> Result<Terminal<CrosstermBackend<std::io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn env_filter(level: Option<&str>, fallback: &str) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    EnvFilter::new(log_directive(level, rust_log.as_deref(), fallback))
}

/// The TUI owns the terminal, so its logs go to a file.
fn init_file_logging(level: Option<&str>, path: PathBuf) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level, "info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn init_stderr_logging(level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level, "warn"))
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then `--api-url`/`--timeout-secs` (or their env vars) on top.
fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path("client.conf"));
    let mut cfg = if cli.config.is_some() {
        ClientConfig::from_file(&path)?
    } else {
        ClientConfig::load_or_init(&path)?
    };
    if let Some(url) = &cli.api_url {
        cfg.api_url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        cfg.timeout = Duration::from_secs(secs);
    }
    Ok(cfg)
}

fn build_api(cfg: &ClientConfig) -> Result<Arc<dyn UsersApi>> {
    let api = HttpUsersApi::new(&cfg.api_url, cfg.timeout, cfg.trailing_slash)?;
    Ok(Arc::new(api))
}

fn run_tui(cfg: ClientConfig, runtime: &tokio::runtime::Runtime) -> Result<()> {
    let engine = SyncEngine::new(build_api(&cfg)?);
    let theme = Theme::load_or_init(&config_file_path("theme.conf"));
    let keymap = Keymap::load_or_init(&config_file_path("keybinds.conf"));
    let state = AppState::new(cfg.refresh_ordering, cfg.api_url.clone(), theme, keymap);

    let mut terminal = init_terminal().context("init terminal")?;

    let res = app::run(&mut terminal, runtime.handle(), engine, state);

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

fn print_users(state: &DirectoryState) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{:>6}  {:<32}  EMAIL", "ID", "NAME")?;
    for u in state.users() {
        writeln!(out, "{:>6}  {:<32}  {}", u.id, u.name, u.email)?;
    }
    Ok(())
}

async fn run_list(cfg: &ClientConfig) -> Result<()> {
    let engine = SyncEngine::new(build_api(cfg)?);
    let mut state = DirectoryState::new(cfg.refresh_ordering);
    engine.fetch_all(&mut state).await?;
    print_users(&state)
}

async fn run_delete(cfg: &ClientConfig, id: i64, yes: bool) -> Result<()> {
    let engine = SyncEngine::new(build_api(cfg)?);
    let mut state = DirectoryState::new(cfg.refresh_ordering);
    let outcome = if yes {
        engine.remove(&mut state, id, &Answer(true)).await?
    } else {
        let prompt = LinePrompt::new(std::io::stdin().lock(), std::io::stderr());
        let confirm: &dyn Confirm = &prompt;
        engine.remove(&mut state, id, confirm).await?
    };
    match outcome {
        RemoveOutcome::Deleted => print_users(&state),
        RemoveOutcome::Declined => {
            eprintln!("not deleted");
            Ok(())
        }
    }
}

async fn run_journey(cfg: &ClientConfig, actors: usize, iterations: usize, think_ms: u64) -> Result<bool> {
    let api = build_api(cfg)?;
    let jcfg = JourneyConfig {
        actors,
        iterations,
        think_time: Duration::from_millis(think_ms),
        ..JourneyConfig::default()
    };
    let tag = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string();
    let report = journey::run(api, &jcfg, &tag).await;
    for step in report.steps() {
        println!(
            "{:<8} requests: {:>5}  failed: {:>5}  p95: {:?}",
            step.op, step.count, step.failures, step.p95
        );
    }
    for check in report.check_summaries() {
        let mark = if check.passed == check.total { "ok  " } else { "FAIL" };
        println!("{mark} {:<22} {}/{}", check.name, check.passed, check.total);
    }
    println!(
        "requests: {}  p95: {:?}  failed: {:.2}%  checks: {:.2}%",
        report.samples.len(),
        report.p95(),
        report.failure_rate() * 100.0,
        report.check_rate() * 100.0
    );
    let violations = report.violations(&jcfg);
    for v in &violations {
        println!("threshold violated: {v}");
    }
    Ok(violations.is_empty())
}

fn run(cli: Cli) -> Result<bool> {
    let cfg = resolve_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build async runtime")?;
    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_tui(cfg, &runtime).map(|_| true),
        Commands::List => runtime.block_on(run_list(&cfg)).map(|_| true),
        Commands::Delete { id, yes } => runtime.block_on(run_delete(&cfg, id, yes)).map(|_| true),
        Commands::Journey { actors, iterations, think_ms } => {
            runtime.block_on(run_journey(&cfg, actors, iterations, think_ms))
        }
    }
}

/// Program entry point: set up logging, dispatch the subcommand, and report
/// any top-level error to stderr.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = cli.log_level.clone();
    let is_tui = matches!(cli.command, None | Some(Commands::Tui));
    if is_tui {
        let path = cli
            .log_file
            .clone()
            .unwrap_or_else(|| config_file_path("userdir-client.log"));
        if let Err(e) = init_file_logging(level.as_deref(), path) {
            eprintln!("logging disabled: {e:#}");
        }
    } else {
        init_stderr_logging(level.as_deref());
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
