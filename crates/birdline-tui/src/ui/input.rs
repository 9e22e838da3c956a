//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use birdline_core::RescueStatus;

use crate::app::{App, AppState, Focus, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            false
        }
        AppState::ConfirmingQuit => handle_quit_input(app, key),
        AppState::Filtering => {
            handle_filter_input(app, key);
            false
        }
        AppState::Assigning => {
            handle_assign_input(app, key);
            false
        }
        AppState::Quitting => true,
        AppState::Normal => {
            handle_normal_input(app, key);
            false
        }
    }
}

fn handle_quit_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            if !app.can_quit() {
                app.status_message = Some("Cannot quit while an update is in progress. Please wait...".to_string());
                app.state = AppState::Normal;
                return false;
            }
            app.state = AppState::Quitting;
            true
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.state = AppState::Normal;
            false
        }
        _ => false,
    }
}

fn handle_normal_input(app: &mut App, key: KeyEvent) {
    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return;
        }
        KeyCode::Char('f') => {
            app.state = AppState::Filtering;
            return;
        }
        KeyCode::Char('u') => {
            app.status_message = None;
            app.refresh_background();
            return;
        }
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            if let Some(status) = RescueStatus::ALL.get(index).copied() {
                app.toggle_filter(status);
            }
            return;
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::List => Focus::Detail,
                Focus::Detail => Focus::List,
            };
            return;
        }
        _ => {}
    }

    match app.focus {
        Focus::List => handle_list_input(app, key),
        Focus::Detail => handle_detail_input(app, key),
    }
}

fn handle_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        KeyCode::Enter => app.open_highlighted(),
        KeyCode::Char('a') => {
            // Open and act in one step
            app.open_highlighted();
            app.advance();
        }
        KeyCode::Esc => app.back(),
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') | KeyCode::Enter => {
            if app.workflow.selected().is_none() {
                app.open_highlighted();
            } else {
                app.advance();
            }
        }
        KeyCode::Esc => app.back(),
        _ => {}
    }
}

fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.move_filter_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_filter_cursor(-1),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_filter_at_cursor(),
        KeyCode::Char('a') => app.show_all_statuses(),
        KeyCode::Char('d') => app.reset_filter(),
        KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => app.state = AppState::Normal,
        _ => {}
    }
}

fn handle_assign_input(app: &mut App, key: KeyEvent) {
    if app.is_busy() {
        // Ignore input until the write lands
        return;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if let Some(form) = app.workflow.form_mut() {
                form.select_next();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if let Some(form) = app.workflow.form_mut() {
                form.select_prev();
            }
        }
        KeyCode::Enter => app.confirm_assignment(),
        KeyCode::Esc => app.cancel_assignment(),
        _ => {}
    }
}
