//! The three-step wizard: select a state, fill its form, download the result.
//!
//! [`Wizard`] is an explicit state container constructed once per session.
//! It owns the tax policy client and performs every request itself; each
//! action finishes with the wizard in a stable, navigable state.

use crate::domain::{
    CompiledSchema, DownloadLink, FormTemplate, FormValues, PersistedStates, StateData, to_payload,
};
use crate::infrastructure::TaxPolicyApi;

/// How many states from the top of the list are offered as shortcuts.
pub const POPULAR_STATES: usize = 5;

pub const FETCH_STATES_ERROR: &str = "Failed to fetch states. Please try again later.";
pub const LOAD_TEMPLATE_ERROR: &str = "Unable to load form template. Please try again later.";
pub const NO_STATE_ERROR: &str = "No state selected";
pub const SUBMIT_ERROR: &str = "Failed to generate PDF. Please try again.";

/// Wizard step. Forward moves happen only through actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    SelectingState = 1,
    FillingForm = 2,
    Success = 3,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Progress bar percentage for the step.
    pub fn progress(self) -> u8 {
        match self {
            WizardStep::SelectingState => 0,
            WizardStep::FillingForm => 50,
            WizardStep::Success => 100,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            WizardStep::SelectingState | WizardStep::FillingForm => WizardStep::SelectingState,
            WizardStep::Success => WizardStep::FillingForm,
        }
    }
}

/// Session state of the wizard.
///
/// # Examples
///
/// ```
/// use taxwiz::application::{Wizard, WizardStep};
/// use taxwiz::infrastructure::{DegradingClient, HttpClient};
/// use std::time::Duration;
///
/// let client = HttpClient::new("http://localhost:3000", Duration::from_secs(1)).unwrap();
/// let wizard = Wizard::new(DegradingClient::new(client));
/// assert_eq!(wizard.step(), WizardStep::SelectingState);
/// assert_eq!(wizard.progress(), 0);
/// ```
pub struct Wizard<A> {
    api: A,
    states: Vec<StateData>,
    popular_states: Vec<StateData>,
    initialized: bool,
    loading: bool,
    step: WizardStep,
    selected_state: Option<StateData>,
    form_schema: Option<FormTemplate>,
    compiled_schema: Option<CompiledSchema>,
    form_data: FormValues,
    is_submitting: bool,
    download_links: Vec<DownloadLink>,
    error: Option<String>,
}

impl<A: TaxPolicyApi> Wizard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            states: Vec::new(),
            popular_states: Vec::new(),
            initialized: false,
            loading: false,
            step: WizardStep::SelectingState,
            selected_state: None,
            form_schema: None,
            compiled_schema: None,
            form_data: FormValues::new(),
            is_submitting: false,
            download_links: Vec::new(),
            error: None,
        }
    }

    /// Starts a session from a previously persisted state list.
    pub fn with_persisted(api: A, persisted: PersistedStates) -> Self {
        let mut wizard = Self::new(api);
        wizard.states = persisted.states;
        wizard.popular_states = persisted.popular_states;
        wizard.initialized = persisted.initialized;
        wizard
    }

    /// The part of the wizard that is kept across restarts.
    pub fn persisted(&self) -> PersistedStates {
        PersistedStates {
            states: self.states.clone(),
            popular_states: self.popular_states.clone(),
            initialized: self.initialized,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn progress(&self) -> u8 {
        self.step.progress()
    }

    pub fn states(&self) -> &[StateData] {
        &self.states
    }

    pub fn popular_states(&self) -> &[StateData] {
        &self.popular_states
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn selected_state(&self) -> Option<&StateData> {
        self.selected_state.as_ref()
    }

    pub fn form_schema(&self) -> Option<&FormTemplate> {
        self.form_schema.as_ref()
    }

    pub fn compiled_schema(&self) -> Option<&CompiledSchema> {
        self.compiled_schema.as_ref()
    }

    pub fn form_data(&self) -> &FormValues {
        &self.form_data
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn download_links(&self) -> &[DownloadLink] {
        &self.download_links
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Dismisses the error banner without retrying anything.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn set_step(&mut self, step: WizardStep) {
        tracing::debug!(from = self.step.number(), to = step.number(), "wizard step");
        self.step = step;
    }

    /// Loads the state list unless a non-empty list is already loaded.
    ///
    /// A failure empties both lists and still marks the wizard initialized;
    /// the next explicit call retries because the list is empty.
    pub fn fetch_states(&mut self) {
        if self.initialized && !self.states.is_empty() {
            tracing::debug!("state list already loaded");
            return;
        }

        self.loading = true;
        self.error = None;
        match self.api.basic_data() {
            Ok(states) => {
                self.popular_states = states.iter().take(POPULAR_STATES).cloned().collect();
                self.states = states;
                self.initialized = true;
            }
            Err(err) => {
                tracing::error!(error = %err, "fetching states failed");
                self.error = Some(FETCH_STATES_ERROR.to_string());
                self.states.clear();
                self.popular_states.clear();
                self.initialized = true;
            }
        }
        self.loading = false;
    }

    /// Fetches and compiles the form of `state`, then moves to step 2.
    ///
    /// On failure the error is set and the wizard stays where it was.
    pub fn select_state(&mut self, state: StateData) {
        if self.loading || self.is_submitting {
            tracing::debug!(state = %state.abbreviation, "request pending, ignoring selection");
            return;
        }

        self.loading = true;
        self.error = None;
        let template = self
            .api
            .form_template(&state.abbreviation)
            .map_err(|err| err.to_string())
            .and_then(|template| {
                CompiledSchema::compile(&template.fields)
                    .map(|compiled| (template, compiled))
                    .map_err(|err| err.to_string())
            });
        self.loading = false;

        match template {
            Ok((template, compiled)) => {
                tracing::info!(
                    state = %state.abbreviation,
                    fields = compiled.fields().len(),
                    "form template loaded"
                );
                self.form_schema = Some(template.annotated_for(&state));
                self.compiled_schema = Some(compiled);
                self.selected_state = Some(state);
                self.set_step(WizardStep::FillingForm);
            }
            Err(err) => {
                tracing::error!(state = %state.abbreviation, error = %err, "loading form template failed");
                self.error = Some(LOAD_TEMPLATE_ERROR.to_string());
            }
        }
    }

    /// Sends sanitized form data for PDF generation and moves to step 3.
    pub fn submit_form(&mut self, data: FormValues) {
        let Some(state) = self.selected_state.clone() else {
            self.error = Some(NO_STATE_ERROR.to_string());
            return;
        };
        if self.is_submitting || self.loading {
            tracing::debug!("submission already pending");
            return;
        }

        self.is_submitting = true;
        self.error = None;
        let payload = to_payload(&data);
        self.form_data = data;

        let result = self.api.generate_pdf(&state.abbreviation, &payload);
        self.is_submitting = false;

        match result {
            Ok(response) if !response.download_links.is_empty() => {
                self.download_links = response.download_links;
                self.set_step(WizardStep::Success);
            }
            Ok(_) => {
                tracing::warn!(state = %state.abbreviation, "pdf generation returned no download links");
                self.error = Some(SUBMIT_ERROR.to_string());
            }
            Err(err) => {
                tracing::error!(state = %state.abbreviation, error = %err, "pdf generation failed");
                self.error = Some(SUBMIT_ERROR.to_string());
            }
        }
    }

    /// Steps back once; never below step 1. Selection and schema are kept.
    pub fn go_to_previous_step(&mut self) {
        let previous = self.step.previous();
        if previous != self.step {
            self.set_step(previous);
        }
    }

    /// Starts a new form. The fetched state list is kept.
    pub fn reset(&mut self) {
        self.selected_state = None;
        self.form_schema = None;
        self.compiled_schema = None;
        self.form_data.clear();
        self.download_links.clear();
        self.set_step(WizardStep::SelectingState);
    }
}
