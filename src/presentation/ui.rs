use crate::application::{App, AppMode, WizardStep};
use crate::domain::FormValue;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

const INPUT_PREFIX: &str = "  > ";

pub fn render_ui(f: &mut Frame, app: &App) {
    let banner_height = if app.wizard.error().is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(banner_height),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_progress(f, app, chunks[1]);
    if let Some(error) = app.wizard.error() {
        render_error_banner(f, app, error, chunks[2]);
    }
    match app.wizard.step() {
        WizardStep::SelectingState => render_state_selection(f, app, chunks[3]),
        WizardStep::FillingForm => render_form(f, app, chunks[3]),
        WizardStep::Success => render_success(f, app, chunks[3]),
    }
    render_status_bar(f, app, chunks[4]);

    if matches!(app.mode, AppMode::Help) {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let step = app.wizard.step();
    let title = match step {
        WizardStep::SelectingState => "Select State",
        WizardStep::FillingForm => "Fill Form",
        WizardStep::Success => "Complete",
    };
    let header = Paragraph::new(format!(
        "taxwiz - State Tax Form Wizard | Step {} of 3: {}",
        step.number(),
        title
    ))
    .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_progress(f: &mut Frame, app: &App, area: Rect) {
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
        .percent(u16::from(app.wizard.progress()));
    f.render_widget(gauge, area);
}

fn render_error_banner(f: &mut Frame, app: &App, error: &str, area: Rect) {
    let dismiss = if app.wizard.step() == WizardStep::FillingForm {
        "Ctrl+X"
    } else {
        "x"
    };
    let banner = Paragraph::new(error.to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Error ({} to dismiss)", dismiss)),
        )
        .style(Style::default().fg(Color::Red));
    f.render_widget(banner, area);
}

fn render_state_selection(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(32)])
        .split(area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(columns[0]);

    let searching = app.mode == AppMode::Search;
    let search = Paragraph::new(app.search_query.as_str())
        .block(Block::default().borders(Borders::ALL).title("Search (/)"))
        .style(if searching {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        });
    f.render_widget(search, rows[0]);
    if searching {
        f.set_cursor_position((rows[0].x + 1 + app.cursor_position as u16, rows[0].y + 1));
    }

    let states = app.filtered_states();
    let list_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("States ({})", states.len()));
    if states.is_empty() {
        let message = if !app.wizard.initialized() || app.wizard.loading() {
            "Loading states..."
        } else if app.wizard.states().is_empty() {
            "No states available. Press r to retry."
        } else {
            "No states match the search."
        };
        f.render_widget(Paragraph::new(message).block(list_block), rows[1]);
    } else {
        let items: Vec<ListItem> = states
            .iter()
            .map(|state| ListItem::new(format!("{} ({})", state.state, state.abbreviation)))
            .collect();
        let list = List::new(items)
            .block(list_block)
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");
        let mut list_state = ListState::default();
        list_state.select(Some(app.selected_index));
        f.render_stateful_widget(list, rows[1], &mut list_state);
    }

    let popular: Vec<Line> = app
        .wizard
        .popular_states()
        .iter()
        .enumerate()
        .map(|(i, state)| {
            Line::from(vec![
                Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Yellow)),
                Span::raw(format!("{} ({})", state.state, state.abbreviation)),
            ])
        })
        .collect();
    let panel = Paragraph::new(popular)
        .block(Block::default().borders(Borders::ALL).title("Popular States"));
    f.render_widget(panel, columns[1]);
}

fn render_form(f: &mut Frame, app: &App, area: Rect) {
    let (Some(form), Some(template)) = (app.form.as_ref(), app.wizard.form_schema()) else {
        return;
    };
    let abbreviation = app
        .wizard
        .selected_state()
        .map(|state| state.abbreviation.as_str())
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!(" {} ", abbreviation),
                Style::default().bg(Color::Blue).fg(Color::White),
            ),
            Span::raw(" "),
            Span::styled(template.description.clone(), Style::default().fg(Color::Gray)),
        ]),
        Line::default(),
    ];
    if form.fields().is_empty() {
        lines.push(Line::from("This form has no fields."));
    }

    let mut focus_line = 0;
    let mut caret: Option<(usize, usize)> = None;
    for (index, field) in form.fields().iter().enumerate() {
        let focused = index == app.focused_field;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let mut label = vec![Span::styled(field.label.clone(), label_style)];
        if field.required() {
            label.push(Span::styled(" *", Style::default().fg(Color::Red)));
        }
        lines.push(Line::from(label));

        if focused {
            focus_line = lines.len();
        }
        let marker = if focused { INPUT_PREFIX } else { "    " };
        match form.input(field.name()) {
            Some(input) => {
                if focused {
                    caret = Some((lines.len(), INPUT_PREFIX.chars().count() + input.cursor()));
                }
                lines.push(Line::from(format!("{}{}", marker, input.text())));
            }
            None => {
                let checked = form.value(field.name()) == Some(&FormValue::Bool(true));
                lines.push(Line::from(format!(
                    "{}[{}] {}",
                    marker,
                    if checked { "x" } else { " " },
                    field.label
                )));
            }
        }

        let hint = field
            .descriptor
            .detail
            .clone()
            .filter(|detail| !detail.trim().is_empty())
            .unwrap_or_else(|| field.hint());
        if !hint.is_empty() {
            lines.push(Line::styled(format!("    {}", hint), Style::default().fg(Color::DarkGray)));
        }
        for error in form.visible_errors(field.name()) {
            lines.push(Line::styled(format!("    ! {}", error), Style::default().fg(Color::Red)));
        }
        lines.push(Line::default());
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = (focus_line + 3).saturating_sub(inner_height);

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(template.title.clone()))
        .scroll((scroll as u16, 0));
    f.render_widget(body, area);

    if let Some((line, column)) = caret {
        if app.mode == AppMode::Normal && line >= scroll && line - scroll < inner_height {
            f.set_cursor_position((
                area.x + 1 + column as u16,
                area.y + 1 + (line - scroll) as u16,
            ));
        }
    }
}

fn render_success(f: &mut Frame, app: &App, area: Rect) {
    let state = app
        .wizard
        .selected_state()
        .map(|state| format!("{} ({})", state.state, state.abbreviation))
        .unwrap_or_default();

    let mut lines = vec![
        Line::styled(
            "Form Completed Successfully",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        Line::from(format!(
            "Confirmation: {}",
            app.confirmation_id.as_deref().unwrap_or_default()
        )),
        Line::from(format!("Date: {}", app.completed_on.as_deref().unwrap_or_default())),
        Line::from(format!("State: {}", state)),
        Line::default(),
        Line::styled("Summary", Style::default().add_modifier(Modifier::BOLD)),
    ];
    for (label, value) in app.summary_rows() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {}: ", label), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::styled("Documents", Style::default().add_modifier(Modifier::BOLD)));
    for (index, link) in app.wizard.download_links().iter().enumerate() {
        let text = format!("{} ({})", link.title, link.file_name());
        if index == app.selected_link {
            lines.push(Line::styled(
                format!("> {}", text),
                Style::default().bg(Color::Blue).fg(Color::White),
            ));
        } else {
            lines.push(Line::from(format!("  {}", text)));
        }
    }

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Complete"))
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match app.mode {
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
        AppMode::Search => "Type to filter | ↑↓: move | Enter: keep filter | Esc: clear".to_string(),
        AppMode::Normal => match &app.status_message {
            Some(status) => status.clone(),
            None => match app.wizard.step() {
                WizardStep::SelectingState => {
                    "/: search | ↑↓: move | Enter: select | 1-5: popular | r: retry | ?: help | q: quit".to_string()
                }
                WizardStep::FillingForm => {
                    "Tab/↑↓: field | Space: toggle | Enter: submit | Esc: back | F1: help".to_string()
                }
                WizardStep::Success => {
                    "↑↓: document | d: download | c: copy link | e: export CSV | n: new form | Esc: back | q: quit".to_string()
                }
            },
        },
    };

    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(match app.mode {
            AppMode::Normal if app.status_message.is_some() => Style::default().fg(Color::Yellow),
            AppMode::Normal => Style::default(),
            AppMode::Search => Style::default().fg(Color::Green),
            AppMode::Help => Style::default().fg(Color::Cyan),
        });
    f.render_widget(status, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let help_widget = Paragraph::new(help_lines[start_line..end_line].join("\n"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("taxwiz Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = r#"TAXWIZ STATE TAX FORM WIZARD

=== STEP 1: SELECT A STATE ===
/               Search states by name or abbreviation
↑↓ or j/k       Move the highlight
Enter           Load the highlighted state's form
1-5             Pick one of the popular states
r               Retry loading the state list
x               Dismiss the error banner
q               Quit

=== STEP 2: FILL THE FORM ===
Tab / ↓         Next field
Shift+Tab / ↑   Previous field
←→ Home End     Move the caret
Backspace/Del   Edit the focused field
Space           Toggle a checkbox
Enter           Validate and submit
Esc             Back to state selection
Ctrl+X          Dismiss the error banner
F1              Show this help

Fields marked * are required. Phone numbers are formatted as you type
and are sent as digits only. Errors appear once a field has been edited
or after the first submit.

=== STEP 3: DOCUMENTS ===
↑↓ or j/k       Select a document
d / Enter       Download it into the download directory
c               Copy its link to the clipboard
e               Export the form summary as CSV
n               Start a new form
Esc             Back to the form
q               Quit

=== CONFIGURATION ===
TAXWIZ_API_URL        Tax policy service base URL
TAXWIZ_DOWNLOAD_URL   Base URL of document links
TAXWIZ_DOWNLOAD_DIR   Where downloads and exports are written
TAXWIZ_DATA_DIR       State list cache and taxwiz.log
RUST_LOG              Log filter (default taxwiz=info)

=== HELP NAVIGATION ===
↑↓ or j/k       Scroll one line
Page Up/Down    Scroll five lines
Home            Jump to top
Esc/F1/?/q      Close this help window"#;
