//! Application state for the terminal wizard.
//!
//! [`App`] wraps the [`Wizard`] with everything the terminal needs on top of
//! it: the live form controller, list and field focus, the search box, and
//! transient status messages.

use chrono::Local;
use uuid::Uuid;

use super::form::{CursorMove, FormController};
use super::wizard::{Wizard, WizardStep};
use crate::domain::{DownloadLink, StateData};
use crate::infrastructure::{AppConfig, FileRepository, StatesRepository, TaxPolicyApi};

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Six random upper-case alphanumerics, drawn from the random bytes of a v4 UUID.
fn confirmation_token() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(6)
        .map(|byte| TOKEN_ALPHABET[usize::from(*byte) % TOKEN_ALPHABET.len()] as char)
        .collect()
}

/// Represents the current input mode of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Keys act on the current wizard screen
    Normal,
    /// User is typing a state search query
    Search,
    /// Help screen is displayed
    Help,
}

/// Main application state.
///
/// # Examples
///
/// ```
/// use taxwiz::application::{App, AppMode, WizardStep};
/// use taxwiz::infrastructure::{AppConfig, DegradingClient, HttpClient};
/// use std::time::Duration;
///
/// let client = HttpClient::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
/// let app = App::new(Box::new(DegradingClient::new(client)), AppConfig::default(), None);
/// assert_eq!(app.mode, AppMode::Normal);
/// assert_eq!(app.wizard.step(), WizardStep::SelectingState);
/// ```
pub struct App {
    /// Wizard state and the service client
    pub wizard: Wizard<Box<dyn TaxPolicyApi>>,
    /// Controller of the form shown on step 2
    pub form: Option<FormController>,
    /// Current input mode
    pub mode: AppMode,
    /// State search query
    pub search_query: String,
    /// Cursor position within the search query
    pub cursor_position: usize,
    /// Highlighted row of the filtered state list
    pub selected_index: usize,
    /// Focused field of the form
    pub focused_field: usize,
    /// Highlighted download link on the success screen
    pub selected_link: usize,
    /// Scroll position in help text
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Confirmation shown on the success screen
    pub confirmation_id: Option<String>,
    /// Completion date shown on the success screen
    pub completed_on: Option<String>,
    config: AppConfig,
    repository: Option<StatesRepository>,
}

impl App {
    /// Creates the app, restoring the persisted state list when available.
    pub fn new(
        api: Box<dyn TaxPolicyApi>,
        config: AppConfig,
        repository: Option<StatesRepository>,
    ) -> Self {
        let persisted = repository.as_ref().and_then(|repo| match repo.load() {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::warn!(path = %repo.path().display(), error = %err, "ignoring stored state list");
                None
            }
        });
        let wizard = match persisted {
            Some(persisted) => Wizard::with_persisted(api, persisted),
            None => Wizard::new(api),
        };

        Self {
            wizard,
            form: None,
            mode: AppMode::Normal,
            search_query: String::new(),
            cursor_position: 0,
            selected_index: 0,
            focused_field: 0,
            selected_link: 0,
            help_scroll: 0,
            status_message: None,
            confirmation_id: None,
            completed_on: None,
            config,
            repository,
        }
    }

    /// Settings the app was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Moves the notice of the last degraded request into the status bar.
    fn take_notice(&mut self) {
        if let Some(notice) = self.wizard.api().take_notice() {
            self.status_message = Some(notice);
        }
    }

    /// Loads the state list (a no-op once loaded) and stores it.
    pub fn fetch_states(&mut self) {
        self.wizard.fetch_states();
        self.take_notice();
        if let Some(repository) = &self.repository {
            if let Err(err) = repository.save(&self.wizard.persisted()) {
                tracing::warn!(error = %err, "could not store state list");
            }
        }
        self.selected_index = 0;
    }

    /// States matching the search query, by name or abbreviation.
    pub fn filtered_states(&self) -> Vec<&StateData> {
        let query = self.search_query.trim();
        self.wizard
            .states()
            .iter()
            .filter(|state| query.is_empty() || state.matches(query))
            .collect()
    }

    /// Moves the state-list highlight by `delta` rows, clamped to the
    /// filtered list.
    ///
    /// # Arguments
    ///
    /// * `delta` - Rows to move; negative values move up
    pub fn move_selection(&mut self, delta: isize) {
        let count = self.filtered_states().len();
        if count == 0 {
            self.selected_index = 0;
            return;
        }
        let index = self.selected_index as isize + delta;
        self.selected_index = index.clamp(0, count as isize - 1) as usize;
    }

    /// Selects the highlighted entry of the filtered state list.
    pub fn select_highlighted_state(&mut self) {
        let state = self.filtered_states().get(self.selected_index).map(|s| (*s).clone());
        if let Some(state) = state {
            self.select_state(state);
        }
    }

    /// Selects one of the popular-state shortcuts (zero-based).
    pub fn select_popular_state(&mut self, index: usize) {
        if let Some(state) = self.wizard.popular_states().get(index).cloned() {
            self.select_state(state);
        }
    }

    /// Loads the form of `state` and, once the wizard reaches step 2,
    /// mounts a controller for it. Failures stay on step 1 with the error set.
    pub fn select_state(&mut self, state: StateData) {
        self.wizard.select_state(state);
        self.take_notice();
        if self.wizard.step() == WizardStep::FillingForm {
            self.open_form();
        }
    }

    /// Builds a fresh controller for the current schema, seeded with the
    /// last submitted data.
    fn open_form(&mut self) {
        self.form = self
            .wizard
            .compiled_schema()
            .cloned()
            .map(|schema| FormController::new(schema, self.wizard.form_data()));
        self.focused_field = 0;
    }

    /// Name of the focused form field, if a form is open.
    pub fn focused_field_name(&self) -> Option<String> {
        let form = self.form.as_ref()?;
        form.fields()
            .get(self.focused_field)
            .map(|field| field.name().to_string())
    }

    /// Moves focus to the next field, wrapping to the first.
    pub fn focus_next(&mut self) {
        let count = self.form.as_ref().map_or(0, |form| form.fields().len());
        if count > 0 {
            self.focused_field = (self.focused_field + 1) % count;
        }
    }

    /// Moves focus to the previous field, wrapping to the last.
    pub fn focus_previous(&mut self) {
        let count = self.form.as_ref().map_or(0, |form| form.fields().len());
        if count > 0 {
            self.focused_field = (self.focused_field + count - 1) % count;
        }
    }

    /// Inserts `c` at the caret of the focused field.
    ///
    /// Characters the field's input does not accept, such as letters in a
    /// number field, are ignored.
    pub fn type_char(&mut self, c: char) {
        if let (Some(name), Some(form)) = (self.focused_field_name(), self.form.as_mut()) {
            form.insert_char(&name, c);
        }
    }

    /// Deletes left of the caret. Phone fields skip their punctuation.
    pub fn backspace(&mut self) {
        if let (Some(name), Some(form)) = (self.focused_field_name(), self.form.as_mut()) {
            form.backspace(&name);
        }
    }

    /// Deletes the character under the caret.
    pub fn delete(&mut self) {
        if let (Some(name), Some(form)) = (self.focused_field_name(), self.form.as_mut()) {
            form.delete(&name);
        }
    }

    /// Moves the caret within the focused field.
    pub fn move_cursor(&mut self, movement: CursorMove) {
        if let (Some(name), Some(form)) = (self.focused_field_name(), self.form.as_mut()) {
            form.move_cursor(&name, movement);
        }
    }

    /// Flips the focused checkbox. Text fields are left alone.
    pub fn toggle_checkbox(&mut self) {
        if let (Some(name), Some(form)) = (self.focused_field_name(), self.form.as_mut()) {
            form.toggle_checkbox(&name);
        }
    }

    /// Applies caret corrections queued by the last change.
    pub fn run_deferred(&mut self) {
        if let Some(form) = self.form.as_mut() {
            form.run_deferred();
        }
    }

    /// Validates the form and, when it passes, submits it for PDF generation.
    pub fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if form.fields().is_empty() {
            self.status_message = Some("This form has no fields to submit".to_string());
            return;
        }
        match form.submit() {
            Ok(data) => {
                self.status_message = None;
                self.wizard.submit_form(data);
                self.take_notice();
                if self.wizard.step() == WizardStep::Success {
                    self.enter_success();
                }
            }
            Err(report) => {
                self.status_message = Some(format!(
                    "Please correct {} field(s) before submitting",
                    report.len()
                ));
                let first_invalid = form
                    .fields()
                    .iter()
                    .position(|field| report.contains_key(field.name()));
                if let Some(index) = first_invalid {
                    self.focused_field = index;
                }
            }
        }
    }

    /// Stamps the confirmation id and date for the success screen.
    fn enter_success(&mut self) {
        let abbreviation = self
            .wizard
            .selected_state()
            .map(|state| state.abbreviation.clone())
            .unwrap_or_default();
        self.confirmation_id = Some(format!("TX-{}-{}", confirmation_token(), abbreviation));
        self.completed_on = Some(Local::now().format("%B %-d, %Y").to_string());
        self.selected_link = 0;
    }

    /// One step back. Returning to the form remounts it with the submitted data.
    pub fn go_back(&mut self) {
        self.wizard.go_to_previous_step();
        match self.wizard.step() {
            WizardStep::SelectingState => self.form = None,
            WizardStep::FillingForm => self.open_form(),
            WizardStep::Success => {}
        }
    }

    /// Starts over at state selection, keeping the loaded state list.
    pub fn start_new_form(&mut self) {
        self.wizard.reset();
        self.form = None;
        self.focused_field = 0;
        self.selected_link = 0;
        self.selected_index = 0;
        self.search_query.clear();
        self.cursor_position = 0;
        self.confirmation_id = None;
        self.completed_on = None;
        self.status_message = None;
    }

    /// Hides the error banner without retrying the failed action.
    pub fn dismiss_error(&mut self) {
        self.wizard.clear_error();
    }

    /// `(label, value)` pairs of the submitted form; unset values read `N/A`.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let Some(schema) = self.wizard.form_schema() else {
            return Vec::new();
        };
        schema
            .fields
            .iter()
            .map(|field| {
                let value = match self.wizard.form_data().get(&field.name) {
                    Some(value) if !value.is_blank() => value.to_string(),
                    _ => "N/A".to_string(),
                };
                (field.label(), value)
            })
            .collect()
    }

    /// Document highlighted on the success screen.
    pub fn selected_download(&self) -> Option<&DownloadLink> {
        self.wizard.download_links().get(self.selected_link)
    }

    /// Moves the document highlight by `delta`, clamped to the list.
    pub fn move_link_selection(&mut self, delta: isize) {
        let count = self.wizard.download_links().len();
        if count > 0 {
            let index = self.selected_link as isize + delta;
            self.selected_link = index.clamp(0, count as isize - 1) as usize;
        }
    }

    /// Downloads the highlighted document into the download directory.
    pub fn download_selected(&mut self) {
        let Some(link) = self.selected_download().cloned() else {
            return;
        };
        let url = self.config.download_url(&link.url);
        let result = self
            .wizard
            .api()
            .download(&url)
            .map_err(|err| err.to_string())
            .and_then(|bytes| {
                FileRepository::save_download(&self.config.download_dir, link.file_name(), &bytes)
                    .map_err(|err| err.to_string())
            });
        self.wizard.api().take_notice();
        self.status_message = Some(match result {
            Ok(path) => format!("Saved {} to {}", link.title, path.display()),
            Err(err) => format!("Download failed: {}", err),
        });
    }

    /// Copies the full URL of the highlighted document to the clipboard.
    pub fn copy_selected_link(&mut self) {
        let Some(link) = self.selected_download() else {
            return;
        };
        let url = self.config.download_url(&link.url);
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(url.clone()));
        self.status_message = Some(match result {
            Ok(()) => format!("Copied {}", url),
            Err(err) => format!("Copy failed: {}", err),
        });
    }

    /// Writes the form summary as CSV into the download directory.
    pub fn export_summary(&mut self) {
        let abbreviation = self
            .wizard
            .selected_state()
            .map(|state| state.abbreviation.to_lowercase())
            .unwrap_or_else(|| "form".to_string());
        let path = self
            .config
            .download_dir
            .join(format!("{}-summary.csv", abbreviation));
        self.status_message = Some(match FileRepository::export_summary_csv(&self.summary_rows(), &path) {
            Ok(path) => format!("Exported summary to {}", path.display()),
            Err(err) => format!("Export failed: {}", err),
        });
    }

    /// Quitting is allowed outside of text entry.
    pub fn can_quit(&self) -> bool {
        self.mode == AppMode::Normal && self.wizard.step() != WizardStep::FillingForm
    }

    /// Enters search mode with the caret after the current query.
    pub fn start_search(&mut self) {
        self.mode = AppMode::Search;
        self.cursor_position = self.search_query.chars().count();
    }

    /// Leaves search mode keeping the query as a filter.
    pub fn finish_search(&mut self) {
        self.mode = AppMode::Normal;
    }

    /// Leaves search mode and clears the filter.
    pub fn cancel_search(&mut self) {
        self.mode = AppMode::Normal;
        self.search_query.clear();
        self.cursor_position = 0;
        self.selected_index = 0;
    }

    /// The query changed, so the highlight goes back to the first match.
    pub fn search_changed(&mut self) {
        self.selected_index = 0;
    }

    fn search_byte_index(&self) -> usize {
        self.search_query
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.search_query.len(), |(index, _)| index)
    }

    /// Inserts `c` at the search caret.
    pub fn search_insert(&mut self, c: char) {
        let index = self.search_byte_index();
        self.search_query.insert(index, c);
        self.cursor_position += 1;
        self.search_changed();
    }

    /// Removes the character before the search caret.
    pub fn search_backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.search_byte_index();
            self.search_query.remove(index);
            self.search_changed();
        }
    }

    /// Removes the character under the search caret.
    pub fn search_delete(&mut self) {
        if self.cursor_position < self.search_query.chars().count() {
            let index = self.search_byte_index();
            self.search_query.remove(index);
            self.search_changed();
        }
    }
}
