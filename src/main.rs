use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod gemini;
mod handler;
mod session;
mod state;
mod toast;
mod tui;
mod ui;

use app::{App, Settings};
use config::{Config, API_KEY_ENV};

#[derive(Parser)]
#[command(name = "gemini-chat")]
#[command(author, version, about = "Chat with Google Gemini from the terminal", long_about = None)]
struct Cli {
    /// Gemini model to talk to
    #[arg(short, long)]
    model: Option<String>,

    /// API base URL (without the /models/... suffix)
    #[arg(long)]
    base_url: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Logs go to a file; the terminal belongs to the TUI
fn init_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::cache_dir()
        .context("could not determine cache directory")?
        .join("gemini-chat");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_file = File::create(log_dir.join("gemini-chat.log"))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    Ok(())
}

fn resolve_settings(cli: &Cli) -> Settings {
    let config = Config::load().unwrap_or_else(|err| {
        warn!(error = %err, "ignoring unreadable config");
        Config::default()
    });

    Settings {
        model: cli.model.clone().unwrap_or_else(|| config.model_or_default()),
        base_url: cli.base_url.clone().unwrap_or_else(|| config.base_url_or_default()),
        api_key: config.resolve_api_key(std::env::var(API_KEY_ENV).ok()),
    }
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await,
            None => break,
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let settings = resolve_settings(&cli);
    info!(model = %settings.model, has_key = settings.api_key.is_some(), "starting gemini-chat");

    let mut app = App::new(settings);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    app.shift_enter_newline = tui::keyboard_enhanced();
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Some(task) = app.request_task.take() {
        task.abort();
    }
    info!("exiting");

    result
}
