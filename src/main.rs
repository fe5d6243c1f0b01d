use std::fs::File;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod app;
mod coach;
mod config;
mod effects;
mod handler;
mod tui;
mod ui;

use app::App;
use coach::CoachClient;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    tracing::info!(
        endpoint = %config.endpoint_url,
        effects = config.effects_enabled,
        "starting octocoach"
    );

    let coach = CoachClient::new(&config.endpoint_url, &config.csrf_cookie_name)?;
    let mut app = App::new(coach, config.effects_enabled);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }

        // Pick up the coach reply once the background task finishes
        app.poll_pending().await;
    }

    app.quit();
    tui::restore()?;
    Ok(())
}

/// Best-effort tracing setup. The terminal belongs to the TUI, so events go
/// to a log file next to the config; any failure here never blocks startup.
fn init_logging() {
    let Ok(path) = Config::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = File::create(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("octocoach=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init();
}
