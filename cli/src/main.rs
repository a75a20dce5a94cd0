mod agent_bridge;
mod atomic_write;
mod config;
mod history;
mod line_editor;
mod question_prompts;
mod startup;

use std::path::PathBuf;

use anyhow::Context;
use attache_console::ExitReason;
use attache_console::SessionConfig;
use attache_console::SessionController;
use attache_console::SessionHandles;
use attache_console::Terminal;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::agent_bridge::AgentBridge;
use crate::config::ConfigStore;
use crate::history::HistoryStore;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Interactive terminal controller for one long-lived agent process"
)]
struct Cli {
    /// Agent command line to launch (may include arguments).
    ///
    /// Falls back to `command` under `[agent]` in the config file.
    #[arg(long, env = "ATTACHE_AGENT")]
    agent: Option<String>,

    /// Config file path (default: ~/.attache/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable ANSI styling.
    #[arg(long)]
    no_color: bool,

    /// Cap on persisted history entries.
    #[arg(long)]
    history_limit: Option<usize>,

    /// Persist the resolved agent command into the config file.
    #[arg(long)]
    save_config: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::new_default()?,
    };

    let Some(agent_command) = cli.agent.clone().or(store.agent_command()?) else {
        eprint!(
            "{}",
            startup::AgentCommandError::Empty.render_ansi()
        );
        std::process::exit(1);
    };
    let resolved = match startup::resolve_agent_command(&agent_command) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprint!("{}", err.render_ansi());
            std::process::exit(1);
        }
    };
    if cli.save_config {
        store.set_agent_command(&agent_command)?;
    }

    let color = !cli.no_color && store.color_enabled()?;
    let history_limit = match cli.history_limit {
        Some(limit) => limit,
        None => store.history_limit()?,
    };
    let known_commands = store.known_commands()?;

    let history_store = HistoryStore::new_default(history_limit)?;
    let command_history = match history_store.load() {
        Ok(history) => history,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load history; starting empty");
            Vec::new()
        }
    };

    let bridge = AgentBridge::spawn(&resolved)
        .with_context(|| format!("launch agent `{agent_command}`"))?;
    tracing::info!(agent = %resolved.program, "agent launched");

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());
    let editor_tx = line_editor::spawn(cancel.clone());
    let question_tx = question_prompts::spawn(cancel.clone());

    let controller = SessionController::new(
        Terminal::stdout(color),
        SessionConfig {
            known_commands,
            command_history,
        },
        SessionHandles {
            exec_rx: bridge.exec_rx,
            log_rx: bridge.log_rx,
            op_tx: bridge.op_tx,
            editor_tx,
            question_tx,
        },
    );

    let exit = controller.run(cancel).await?;

    if let Err(err) = history_store.record(&exit.submitted_commands) {
        tracing::warn!(error = %err, "failed to persist history");
    }
    match exit.reason {
        ExitReason::Cancelled => tracing::info!("session cancelled"),
        ExitReason::AgentStopped => tracing::info!("agent stopped"),
    }

    Ok(())
}

/// Ctrl-C outside a raw-mode prompt arrives as SIGINT; both paths funnel
/// into the session token.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

/// File-based logging: the controller owns the terminal, so diagnostics
/// never go there. Best-effort; a read-only home just disables logging.
fn init_logging() {
    let Ok(home) = config::attache_home() else {
        return;
    };
    if std::fs::create_dir_all(&home).is_err() {
        return;
    }
    let Ok(log_file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(home.join("attache.log"))
    else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ATTACHE_LOG")
                .unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
}
