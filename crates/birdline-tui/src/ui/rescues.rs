use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use birdline_core::{RescueAlert, TransitionAction};

use crate::app::{App, Focus};
use crate::ui::styles;
use crate::utils::{or_placeholder, truncate_string};

/// Render the rescue list and the detail pane side by side
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_rescue_table(frame, app, chunks[0]);
    render_rescue_detail(frame, app, chunks[1]);
}

fn render_rescue_table(frame: &mut Frame, app: &App, area: Rect) {
    let rescues = app.visible_rescues();
    let focused = matches!(app.focus, Focus::List);
    let open_id = app.workflow.selected().map(|r| r.id.as_str());

    let header = Row::new([
        Cell::from("Bird"),
        Cell::from("Status"),
        Cell::from("Pick Up"),
        Cell::from("Volunteer"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = rescues
        .iter()
        .enumerate()
        .map(|(i, rescue)| {
            let style = if i == app.list_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let marker = if open_id == Some(rescue.id.as_str()) { "▶ " } else { "  " };

            Row::new(vec![
                Cell::from(format!("{}{}", marker, rescue.species)),
                Cell::from(Span::styled(rescue.status.label(), styles::status_style(rescue.status))),
                Cell::from(truncate_string(or_placeholder(&rescue.pickup), 40)),
                Cell::from(rescue.volunteer_display().to_string()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(30),
        Constraint::Length(10),
        Constraint::Fill(2),
        Constraint::Fill(1),
    ];

    let title = format!(" Rescues ({} of {}) ", rescues.len(), app.directory.records().len());

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !rescues.is_empty() {
        state.select(Some(app.list_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_rescue_detail(frame: &mut Frame, app: &App, area: Rect) {
    let focused = matches!(app.focus, Focus::Detail);
    let is_open = app.workflow.selected().is_some();

    let content = match app.detail_rescue() {
        Some(rescue) => detail_lines(app, rescue, is_open),
        None => {
            let message = if app.directory.is_loading() {
                "Loading rescues..."
            } else {
                "No rescues match the current filter"
            };
            vec![Line::from(Span::styled(message, styles::muted_style()))]
        }
    };

    let title = if is_open { " Rescue " } else { " Preview " };
    let paragraph = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        );
    frame.render_widget(paragraph, area);
}

fn field<'a>(label: &'a str, value: impl Into<String>) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, styles::muted_style()),
        Span::raw(value.into()),
    ])
}

fn detail_lines<'a>(app: &App, rescue: &'a RescueAlert, is_open: bool) -> Vec<Line<'a>> {
    let mut lines = vec![];

    lines.push(Line::from(Span::styled(rescue.species.as_str(), styles::title_style())));
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::styled("Status:     ", styles::muted_style()),
        Span::styled(rescue.status.label(), styles::status_style(rescue.status)),
    ]));
    lines.push(field("Volunteer:  ", rescue.volunteer_display()));
    if !app.roster.is_empty() && !rescue.assignment_is_consistent(&app.roster) {
        lines.push(Line::from(Span::styled(
            "            not on this rescue's eligible list",
            styles::highlight_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Route", styles::highlight_style())));
    lines.push(field("Pick up:    ", or_placeholder(&rescue.pickup)));
    lines.push(field("Drop off:   ", or_placeholder(&rescue.dropoff)));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Handling", styles::highlight_style())));
    match rescue.risk_level {
        Some(level) => lines.push(Line::from(vec![
            Span::styled("R&T level:  ", styles::muted_style()),
            Span::styled(level.label(), styles::risk_style(level)),
        ])),
        None => lines.push(field("R&T level:  ", "-")),
    }
    let skills = if rescue.skills.is_empty() {
        "-".to_string()
    } else {
        rescue.skills.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    };
    lines.push(field("Skills:     ", skills));
    if let Some(ref photo) = rescue.photo {
        lines.push(field("Photo:      ", photo.url.clone()));
    }

    if !is_open {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Enter to open this rescue",
            styles::muted_style(),
        )));
        return lines;
    }

    lines.push(Line::from(""));
    match TransitionAction::for_status(rescue.status) {
        Some(action) => {
            let enabled = !app.is_busy();
            let label = if enabled {
                format!(" {} ", action.label())
            } else {
                " Updating... ".to_string()
            };
            lines.push(Line::from(vec![
                Span::styled("[a] ", styles::help_key_style()),
                Span::styled(label, styles::button_style(enabled)),
            ]));
        }
        None => lines.push(Line::from(Span::styled(
            "Delivered. No further action.",
            styles::muted_style(),
        ))),
    }

    if let Some(error) = app.workflow.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.to_string(), styles::error_style())));
    }

    lines
}
