use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use birdline_core::RescueStatus;

use crate::app::{App, AppState};

use super::rescues;
use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Filter bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_filter_bar(frame, app, chunks[1]);
    rescues::render(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::Filtering => render_filter_overlay(frame, app),
        AppState::Assigning => render_assign_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Birdline";
    let source = format!("  {}", app.source);
    let help_hint = "[?] Help";
    let used = title.len() + source.len() + help_hint.len() + 4;

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::styled(source, styles::muted_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

/// One entry per status with its count; hidden statuses are dimmed.
fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let filter = app.directory.filter();
    let mut spans = vec![Span::raw(" ")];
    for (i, (status, count)) in app.directory.status_counts().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {} ({})", i + 1, status.label(), count);
        if filter.contains(*status) {
            spans.push(Span::styled(label, styles::status_style(*status)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(styles::muted_style()),
    );
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[f]ilter | [u]pdate | [q]uit";

    let (left_text, left_style) = if let Some(ref msg) = app.status_message {
        let style = if app.directory.error().is_some() || app.workflow.error().is_some() {
            styles::error_style()
        } else {
            styles::muted_style()
        };
        (format!(" {} ", msg), style)
    } else {
        (format!(" Updated {} ", app.last_updated()), styles::muted_style())
    };

    let right_text = format!(" {} ", shortcuts);
    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(key, styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 24, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Birdline", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("  ↑/↓ j/k   ", "Move through the list"),
        help_line("  PgUp/PgDn ", "Scroll a page"),
        help_line("  Tab       ", "Switch focus (list ↔ detail)"),
        help_line("  Enter     ", "Open the highlighted rescue"),
        help_line("  Esc       ", "Back to the list"),
        Line::from(""),
        Line::from(Span::styled(" Rescues", styles::highlight_style())),
        help_line("  a         ", "Accept / mark rescued / delivered"),
        help_line("  1-4       ", "Show or hide a status"),
        help_line("  f         ", "Status filter"),
        help_line("  u         ", "Reload from the rescue table"),
        help_line("  q         ", "Quit"),
        Line::from(""),
        Line::from(Span::styled(" Accept Form", styles::highlight_style())),
        help_line("  ↑/↓       ", "Choose your name"),
        help_line("  Enter     ", "Confirm"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_filter_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(42, (RescueStatus::ALL.len() + 6) as u16, frame.area());
    frame.render_widget(Clear, area);

    let filter = app.directory.filter();
    let mut lines = vec![
        Line::from(Span::styled(" Show statuses", styles::highlight_style())),
        Line::from(""),
    ];
    for (i, status) in RescueStatus::ALL.iter().enumerate() {
        let check = if filter.contains(*status) { "[x]" } else { "[ ]" };
        let style = if i == app.filter_cursor {
            styles::selected_style()
        } else {
            styles::status_style(*status)
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{} {}", check, status.label()), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Space", styles::help_key_style()),
        Span::styled(" toggle  ", styles::muted_style()),
        Span::styled("a", styles::help_key_style()),
        Span::styled(" all  ", styles::muted_style()),
        Span::styled("d", styles::help_key_style()),
        Span::styled(" default  ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" done", styles::muted_style()),
    ]));

    let block = Block::default()
        .title(" Filter ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_assign_overlay(frame: &mut Frame, app: &App) {
    let Some(form) = app.workflow.form() else {
        return;
    };
    let species = app
        .workflow
        .selected()
        .map(|r| r.species.as_str())
        .unwrap_or_default();

    let option_rows = form.options().len().max(1);
    let height = (option_rows + 8 + usize::from(form.error().is_some()) * 2) as u16;
    let area = centered_rect_fixed(48, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(format!(" Accept: {}", species), styles::title_style())),
        Line::from(""),
        Line::from(Span::styled(" Who is taking this rescue?", styles::highlight_style())),
    ];

    if form.options().is_empty() {
        lines.push(Line::from(Span::styled(
            "   No eligible volunteers on the roster",
            styles::muted_style(),
        )));
    }
    for (i, volunteer) in form.options().iter().enumerate() {
        let chosen = form.selected_index() == Some(i);
        let (marker, style) = if chosen {
            ("(•)", styles::selected_style())
        } else {
            ("( )", styles::list_item_style())
        };
        lines.push(Line::from(vec![
            Span::raw("   "),
            Span::styled(format!("{} {}", marker, volunteer.name), style),
        ]));
    }

    lines.push(Line::from(""));
    let enabled = form.can_confirm() && !app.is_busy();
    let button = if app.is_busy() { " Updating... " } else { " Confirm " };
    lines.push(Line::from(vec![
        Span::raw("   [Enter] "),
        Span::styled(button, styles::button_style(enabled)),
        Span::styled("   [Esc] cancel", styles::muted_style()),
    ]));

    if let Some(error) = form.error() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 6, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    use birdline_core::{MemoryRepository, RescueAlert, StatusFilter, TransitionGuard};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_centered_rect_fits_inside() {
        let outer = Rect::new(0, 0, 20, 10);
        let rect = centered_rect_fixed(40, 6, outer);
        assert_eq!(rect.width, 20);
        assert_eq!(rect.y, 2);
    }

    #[test]
    fn test_renders_empty_directory() {
        let app = App::new(
            Arc::new(MemoryRepository::default()),
            StatusFilter::default(),
            TransitionGuard::LastWriterWins,
            "demo",
        );
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Birdline"));
        assert!(text.contains("No rescues match the current filter"));
        assert!(text.contains("Updated never"));
    }

    #[test]
    fn test_renders_open_rescue_action() {
        let mut app = App::new(
            Arc::new(MemoryRepository::default()),
            StatusFilter::default(),
            TransitionGuard::LastWriterWins,
            "demo",
        );
        let mut heron = RescueAlert::new("rec1", "Great Blue Heron", RescueStatus::InRoute);
        heron.assigned_volunteer = "Sam".to_string();
        app.workflow.select(heron);

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Great Blue Heron"));
        assert!(text.contains("Mark as Rescued"));
    }
}
