use ratatui::style::{Color, Modifier, Style};

use birdline_core::{RescueStatus, RiskLevel};

// Color palette
pub const PRIMARY: Color = Color::Rgb(64, 128, 192);
pub const SECONDARY: Color = Color::Rgb(96, 160, 96);
pub const ACCENT: Color = Color::Rgb(192, 160, 64);
pub const ERROR: Color = Color::Rgb(192, 64, 64);
pub const MUTED: Color = Color::Rgb(128, 128, 128);
pub const HIGHLIGHT: Color = Color::Rgb(48, 48, 64);

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

/// Action button; dimmed when it cannot be pressed
pub fn button_style(enabled: bool) -> Style {
    if enabled {
        selected_style().fg(SECONDARY)
    } else {
        muted_style().add_modifier(Modifier::DIM)
    }
}

pub fn status_style(status: RescueStatus) -> Style {
    match status {
        RescueStatus::Pending => Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        RescueStatus::InRoute => Style::default().fg(PRIMARY),
        RescueStatus::Rescued => Style::default().fg(SECONDARY),
        RescueStatus::Delivered => muted_style(),
    }
}

pub fn risk_style(level: RiskLevel) -> Style {
    match level {
        RiskLevel::Green => Style::default().fg(Color::Green),
        RiskLevel::Yellow => Style::default().fg(Color::Yellow),
        RiskLevel::Red => Style::default().fg(Color::Red),
        RiskLevel::Purple => Style::default().fg(Color::Magenta),
    }
}
