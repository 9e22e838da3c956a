//! Birdline - a terminal front-end for bird rescue volunteers.
//!
//! Volunteers browse open rescue alerts, accept one, and move it along
//! `Pending → In Route → Rescued → Delivered`. Without a subcommand the
//! interactive TUI starts; subcommands cover scripting and quick lookups.

mod app;
mod commands;
mod ui;
mod utils;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use birdline_core::{AirtableRepository, Config, MemoryRepository, RescueRepository};

use app::{App, AppState};
use commands::Commands;
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "birdline.log";

#[derive(Parser, Debug)]
#[command(name = "birdline", version, about = "Coordinate bird rescue pickups and transport")]
struct Cli {
    /// Use built-in sample data instead of the Airtable base
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr for one-shot subcommands
fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// The terminal belongs to ratatui, so the TUI logs to a daily file.
/// Falls back to no logging if the log directory cannot be created.
fn init_tui_tracing() -> Option<WorkerGuard> {
    let log_dir = Config::log_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Some(guard)
}

fn load_config() -> Config {
    match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Failed to load config, using defaults");
            Config::default()
        }
    }
}

/// The rescue store: sample data in demo mode, otherwise the Airtable base.
fn open_store(demo: bool, config: &Config) -> Result<Arc<dyn RescueRepository>> {
    if demo {
        info!("Using demo data");
        return Ok(Arc::new(MemoryRepository::demo()));
    }
    let token = config.resolve_token()?;
    Ok(Arc::new(AirtableRepository::from_config(config, token)?))
}

fn source_label(demo: bool, config: &Config) -> String {
    if demo {
        "demo data".to_string()
    } else {
        format!("{} / {}", config.base_id.as_deref().unwrap_or("?"), config.rescue_table)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(command) = cli.command {
        init_cli_tracing();
        let config = load_config();
        let demo = cli.demo;
        return command.run(&config, || open_store(demo, &config)).await;
    }

    let config = load_config();
    let _log_guard = init_tui_tracing();
    info!("Birdline starting");

    // Resolve the store before touching the terminal so errors print normally
    let repo = open_store(cli.demo, &config)?;
    let mut app = App::new(
        repo,
        config.status_filter(),
        config.transition_guard(),
        source_label(cli.demo, &config),
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.refresh_background();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Birdline shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }

                    if handle_input(app, key) {
                        return Ok(());
                    }
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Let spawned tasks make progress between frames
        tokio::task::yield_now().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["birdline", "--demo", "list", "--status", "pending", "--status", "in-route"])
            .unwrap();
        assert!(cli.demo);
        match cli.command {
            Some(Commands::List { statuses, all }) => {
                assert_eq!(statuses.len(), 2);
                assert!(!all);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_without_subcommand_runs_tui() {
        let cli = Cli::try_parse_from(["birdline"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.demo);
    }

    #[test]
    fn test_cli_rejects_status_with_all() {
        assert!(Cli::try_parse_from(["birdline", "list", "--all", "--status", "pending"]).is_err());
    }

    #[test]
    fn test_accept_requires_volunteer() {
        assert!(Cli::try_parse_from(["birdline", "accept", "rec1"]).is_err());
        let cli = Cli::try_parse_from(["birdline", "accept", "rec1", "--volunteer", "Dana"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Accept { .. })));
    }

    #[test]
    fn test_set_token_accepts_base() {
        let cli = Cli::try_parse_from(["birdline", "set-token", "--base", "appBirds"]).unwrap();
        match cli.command {
            Some(Commands::SetToken { base }) => assert_eq!(base.as_deref(), Some("appBirds")),
            other => panic!("unexpected command {:?}", other),
        }
        let cli = Cli::try_parse_from(["birdline", "clear-token"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ClearToken)));
    }

    #[test]
    fn test_source_label() {
        let config = Config {
            base_id: Some("appBirds".to_string()),
            ..Default::default()
        };
        assert_eq!(source_label(true, &config), "demo data");
        assert_eq!(source_label(false, &config), "appBirds / Bird Alerts");
    }
}
