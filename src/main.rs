//! TAXWIZ - Terminal State Tax Form Wizard
//!
//! Walks the user through choosing a state, filling in that state's tax form
//! with live validation, and downloading the generated PDF documents.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use taxwiz::application::{App, WizardStep};
use taxwiz::infrastructure::{init_tracing, AppConfig, DegradingClient, HttpClient, StatesRepository};
use taxwiz::presentation::{render_ui, InputHandler};

/// Entry point for the taxwiz terminal wizard.
///
/// Loads configuration and logging before the terminal is taken over, so
/// a broken config file is reported on the normal console.
///
/// # Errors
///
/// Returns an error if the configuration is malformed, the HTTP client
/// cannot be built, or terminal setup fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let log_path = init_tracing(&config.data_dir)?;
    tracing::info!(api = %config.api_base_url, log = %log_path.display(), "starting taxwiz");

    let client = HttpClient::new(config.api_base_url.clone(), config.request_timeout())?;
    let repository = StatesRepository::new(&config.data_dir);
    let mut app = App::new(Box::new(DegradingClient::new(client)), config, Some(repository));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        println!("{err:?}");
    }

    Ok(())
}

/// Main application event loop.
///
/// Requests block the loop, so keys pressed while one was running are
/// dropped once it returns.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    terminal.draw(|f| render_ui(f, app))?;
    app.fetch_states();

    loop {
        terminal.draw(|f| render_ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(());
            }
            if key.code == KeyCode::Char('q') && app.can_quit() {
                return Ok(());
            }

            let step = app.wizard.step();
            let sends_request = is_request_key(step, key.code);
            InputHandler::handle_key_event(app, key.code, key.modifiers);
            app.run_deferred();

            if sends_request {
                discard_pending_events()?;
            }
        }
    }
}

/// Keys that may trigger a blocking service call on the given step.
fn is_request_key(step: WizardStep, key: KeyCode) -> bool {
    match step {
        WizardStep::SelectingState => matches!(key, KeyCode::Enter | KeyCode::Char('r' | '1'..='5')),
        WizardStep::FillingForm => key == KeyCode::Enter,
        WizardStep::Success => matches!(key, KeyCode::Enter | KeyCode::Char('d')),
    }
}

fn discard_pending_events() -> io::Result<()> {
    let mut dropped = 0;
    while event::poll(Duration::ZERO)? {
        event::read()?;
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "discarded input queued during request");
    }
    Ok(())
}
