use crate::application::{App, AppMode, CursorMove, WizardStep, POPULAR_STATES};
use crossterm::event::{KeyCode, KeyModifiers};

/// Maps key presses onto [`App`] actions.
pub struct InputHandler;

impl InputHandler {
    /// Routes a key press to the handler for the current mode and wizard step.
    ///
    /// # Arguments
    ///
    /// * `app` - Application state to update
    /// * `key` - The pressed key
    /// * `modifiers` - Modifier keys held during the press
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Normal => match app.wizard.step() {
                WizardStep::SelectingState => Self::handle_state_selection(app, key),
                WizardStep::FillingForm => Self::handle_form(app, key, modifiers),
                WizardStep::Success => Self::handle_success(app, key),
            },
            AppMode::Search => Self::handle_search_mode(app, key),
            AppMode::Help => Self::handle_help_mode(app, key),
        }
    }

    fn open_help(app: &mut App) {
        app.mode = AppMode::Help;
        app.help_scroll = 0;
    }

    /// Step 1: list navigation, search, popular shortcuts and retry.
    fn handle_state_selection(app: &mut App, key: KeyCode) {
        app.status_message = None;

        match key {
            KeyCode::Char('/') => app.start_search(),
            KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
            KeyCode::PageUp => app.move_selection(-10),
            KeyCode::PageDown => app.move_selection(10),
            KeyCode::Enter => app.select_highlighted_state(),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < POPULAR_STATES {
                    app.select_popular_state(index);
                }
            }
            KeyCode::Char('r') => app.fetch_states(),
            KeyCode::Char('x') => app.dismiss_error(),
            KeyCode::Esc => app.cancel_search(),
            KeyCode::F(1) | KeyCode::Char('?') => Self::open_help(app),
            _ => {}
        }
    }

    /// Edits the search query; the list filters as the user types.
    fn handle_search_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Enter => app.finish_search(),
            KeyCode::Esc => app.cancel_search(),
            KeyCode::Backspace => app.search_backspace(),
            KeyCode::Delete => app.search_delete(),
            KeyCode::Left => {
                app.cursor_position = app.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if app.cursor_position < app.search_query.chars().count() {
                    app.cursor_position += 1;
                }
            }
            KeyCode::Home => {
                app.cursor_position = 0;
            }
            KeyCode::End => {
                app.cursor_position = app.search_query.chars().count();
            }
            KeyCode::Up => app.move_selection(-1),
            KeyCode::Down => app.move_selection(1),
            KeyCode::Char(c) => app.search_insert(c),
            _ => {}
        }
    }

    /// Printable keys go to the focused field, so the form uses F1 for help
    /// and Ctrl+X to dismiss the error banner.
    fn handle_form(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            if key == KeyCode::Char('x') {
                app.dismiss_error();
            }
            return;
        }

        match key {
            KeyCode::Tab | KeyCode::Down => app.focus_next(),
            KeyCode::BackTab | KeyCode::Up => app.focus_previous(),
            KeyCode::Left => app.move_cursor(CursorMove::Left),
            KeyCode::Right => app.move_cursor(CursorMove::Right),
            KeyCode::Home => app.move_cursor(CursorMove::Home),
            KeyCode::End => app.move_cursor(CursorMove::End),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Delete => app.delete(),
            KeyCode::Enter => app.submit_form(),
            KeyCode::Esc => app.go_back(),
            KeyCode::F(1) => Self::open_help(app),
            KeyCode::Char(' ') if Self::focused_is_checkbox(app) => app.toggle_checkbox(),
            KeyCode::Char(c) => app.type_char(c),
            _ => {}
        }
    }

    fn focused_is_checkbox(app: &App) -> bool {
        let Some(name) = app.focused_field_name() else {
            return false;
        };
        app.form
            .as_ref()
            .is_some_and(|form| form.input(&name).is_none())
    }

    /// Step 3: document selection, download, copy, export and restart.
    fn handle_success(app: &mut App, key: KeyCode) {
        app.status_message = None;

        match key {
            KeyCode::Up | KeyCode::Char('k') => app.move_link_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => app.move_link_selection(1),
            KeyCode::Char('d') | KeyCode::Enter => app.download_selected(),
            KeyCode::Char('c') => app.copy_selected_link(),
            KeyCode::Char('e') => app.export_summary(),
            KeyCode::Char('n') => app.start_new_form(),
            KeyCode::Char('x') => app.dismiss_error(),
            KeyCode::Esc => app.go_back(),
            KeyCode::F(1) | KeyCode::Char('?') => Self::open_help(app),
            _ => {}
        }
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.mode = AppMode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }
}
