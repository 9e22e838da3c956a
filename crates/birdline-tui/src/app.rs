//! Application state management for Birdline.
//!
//! This module contains the core `App` struct: UI state, the rescue directory
//! and workflow, and background task coordination. Loads and writes run on
//! spawned Tokio tasks and report back through an MPSC channel that the main
//! loop drains every tick.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use birdline_core::error::RescueResult;
use birdline_core::workflow::{execute_write, PendingWrite, TransitionOutcome, TransitionPlan};
use birdline_core::{
    Directory, RescueAlert, RescuePatch, RescueRepository, RescueStatus, StatusFilter,
    TransitionGuard, Volunteer, Workflow,
};

use crate::utils::age_display;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

const LOADING_MESSAGE: &str = "Loading rescues...";

/// Number of rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Current UI focus area (list panel or detail panel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    Filtering,
    Assigning,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks.
enum TaskResult {
    /// Rescues and roster fetched together
    Loaded {
        rescues: RescueResult<Vec<RescueAlert>>,
        roster: RescueResult<Vec<Volunteer>>,
    },
    /// A status write finished
    Written {
        write: PendingWrite,
        result: RescueResult<RescueAlert>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    repo: Arc<dyn RescueRepository>,
    /// Where the data comes from, shown in the title bar.
    pub source: String,

    pub directory: Directory,
    pub workflow: Workflow,
    pub roster: Vec<Volunteer>,

    // UI State
    pub state: AppState,
    pub focus: Focus,
    pub list_selection: usize,
    pub filter_cursor: usize,

    // Background task channel
    task_rx: Option<mpsc::Receiver<TaskResult>>,
    task_tx: mpsc::Sender<TaskResult>,
    /// A write landed while a load was out; that load is stale.
    reload_pending: bool,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    pub fn new(
        repo: Arc<dyn RescueRepository>,
        filter: StatusFilter,
        guard: TransitionGuard,
        source: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            repo,
            source: source.into(),

            directory: Directory::new(filter),
            workflow: Workflow::new(guard),
            roster: Vec::new(),

            state: AppState::Normal,
            focus: Focus::List,
            list_selection: 0,
            filter_cursor: 0,

            task_rx: Some(rx),
            task_tx: tx,
            reload_pending: false,

            status_message: None,
        }
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send task result - channel closed");
        }
    }

    /// Spawn a background load of rescues and the roster.
    pub fn refresh_background(&mut self) {
        if self.directory.is_loading() {
            debug!("Load already in progress");
            return;
        }
        info!("Starting background refresh");
        self.directory.begin_load();
        if self.status_message.is_none() {
            self.status_message = Some(LOADING_MESSAGE.to_string());
        }
        self.spawn_load();
    }

    /// Reload after a write. A load already in flight may predate the
    /// write, so its rescues are dropped and a fresh load follows it.
    fn reload_after_write(&mut self) {
        if self.directory.is_loading() {
            debug!("Write landed during a load, queueing another");
            self.reload_pending = true;
        } else {
            self.refresh_background();
        }
    }

    fn spawn_load(&mut self) {
        let repo = Arc::clone(&self.repo);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let (rescues, roster) = futures::join!(repo.load_all(), repo.list_volunteers());
            Self::send_result(&tx, TaskResult::Loaded { rescues, roster }).await;
        });
    }

    fn spawn_write(&mut self, write: PendingWrite) {
        info!(id = %write.record_id, target = ?write.target(), "Submitting status update");
        self.status_message = Some("Updating rescue...".to_string());

        let repo = Arc::clone(&self.repo);
        let guard = self.workflow.guard();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = execute_write(repo.as_ref(), &write, guard).await;
            Self::send_result(&tx, TaskResult::Written { write, result }).await;
        });
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        let results: Vec<TaskResult> = match self.task_rx {
            Some(ref mut rx) => {
                let mut results = Vec::new();
                while let Ok(result) = rx.try_recv() {
                    results.push(result);
                }
                results
            }
            None => Vec::new(),
        };

        for result in results {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Loaded { rescues, roster } => {
                match roster {
                    Ok(roster) => self.roster = roster,
                    Err(e) => warn!(error = %e, kept = self.roster.len(), "Could not load volunteer roster"),
                }
                if std::mem::take(&mut self.reload_pending) {
                    debug!("Dropping rescues fetched before the last write");
                    self.spawn_load();
                    return;
                }
                match self.directory.finish_load(rescues) {
                    Ok(_) => {
                        self.workflow.resync(self.directory.records());
                        let flagged = self.directory.inconsistent_assignments(&self.roster).len();
                        if flagged > 0 {
                            self.status_message = Some(format!(
                                "{} rescue(s) assigned outside their eligible volunteers",
                                flagged
                            ));
                        } else if self.status_message.as_deref() == Some(LOADING_MESSAGE) {
                            // Only clear progress; keep confirmations
                            self.status_message = None;
                        }
                    }
                    Err(e) => self.status_message = Some(e.user_message()),
                }
                self.clamp_selection();
            }
            TaskResult::Written { write, result } => {
                match self.workflow.finish_transition(&write, result) {
                    Ok(TransitionOutcome::Applied { record, keep_open }) => {
                        self.status_message = Some(format!("{} is now {}", record.species, record.status));
                        self.directory.replace_record(record);
                        if self.state == AppState::Assigning {
                            self.state = AppState::Normal;
                        }
                        // Another rescue may have been opened meanwhile
                        if !keep_open && self.workflow.selected().is_none() {
                            self.focus = Focus::List;
                        }
                        self.reload_after_write();
                    }
                    Ok(_) => {}
                    Err(e) => self.status_message = Some(e.user_message()),
                }
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.workflow.is_busy()
    }

    // =========================================================================
    // Directory Navigation
    // =========================================================================

    pub fn visible_rescues(&self) -> Vec<&RescueAlert> {
        self.directory.view()
    }

    /// Row under the cursor in the list.
    pub fn highlighted(&self) -> Option<&RescueAlert> {
        self.visible_rescues().get(self.list_selection).copied()
    }

    /// Rescue shown in the detail pane: the open one, else the highlighted row.
    pub fn detail_rescue(&self) -> Option<&RescueAlert> {
        self.workflow.selected().or_else(|| self.highlighted())
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_rescues().len();
        if len == 0 {
            self.list_selection = 0;
            return;
        }
        let max = len - 1;
        self.list_selection = if delta < 0 {
            self.list_selection.saturating_sub(delta.unsigned_abs())
        } else {
            (self.list_selection + delta as usize).min(max)
        };
    }

    pub fn select_first(&mut self) {
        self.list_selection = 0;
    }

    pub fn select_last(&mut self) {
        self.list_selection = self.visible_rescues().len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let max = self.visible_rescues().len().saturating_sub(1);
        self.list_selection = self.list_selection.min(max);
    }

    /// Open the highlighted rescue in the detail pane.
    pub fn open_highlighted(&mut self) {
        if let Some(record) = self.highlighted().cloned() {
            self.workflow.select(record);
            self.focus = Focus::Detail;
        }
    }

    /// Close the detail view and return to the list.
    pub fn back(&mut self) {
        self.workflow.clear_selection();
        self.focus = Focus::List;
    }

    // =========================================================================
    // Status Filter
    // =========================================================================

    pub fn toggle_filter(&mut self, status: RescueStatus) {
        self.directory.toggle_status(status);
        self.clamp_selection();
    }

    pub fn toggle_filter_at_cursor(&mut self) {
        if let Some(status) = RescueStatus::ALL.get(self.filter_cursor).copied() {
            self.toggle_filter(status);
        }
    }

    pub fn show_all_statuses(&mut self) {
        self.directory.set_filter(StatusFilter::all());
        self.clamp_selection();
    }

    pub fn reset_filter(&mut self) {
        self.directory.reset_filter();
        self.clamp_selection();
    }

    pub fn move_filter_cursor(&mut self, delta: isize) {
        let max = RescueStatus::ALL.len() - 1;
        self.filter_cursor = if delta < 0 {
            self.filter_cursor.saturating_sub(delta.unsigned_abs())
        } else {
            (self.filter_cursor + delta as usize).min(max)
        };
    }

    // =========================================================================
    // Workflow
    // =========================================================================

    /// Run the offered action of the open rescue.
    pub fn advance(&mut self) {
        let Some(action) = self.workflow.offered_action() else {
            return;
        };
        match self
            .workflow
            .begin_transition(action.requested_status(), RescuePatch::default(), &self.roster)
        {
            Ok(TransitionPlan::FormOpened) => self.state = AppState::Assigning,
            Ok(TransitionPlan::Write(write)) => self.spawn_write(write),
            Ok(TransitionPlan::Ignored) => {}
            Err(e) => self.status_message = Some(e.user_message()),
        }
    }

    /// Confirm the assignment form. An unconfirmable form keeps its error.
    pub fn confirm_assignment(&mut self) {
        if let Ok(write) = self.workflow.begin_assignment() {
            self.spawn_write(write);
        }
    }

    pub fn cancel_assignment(&mut self) {
        self.workflow.close_form();
        self.state = AppState::Normal;
    }

    // =========================================================================
    // Display Helpers
    // =========================================================================

    pub fn last_updated(&self) -> String {
        age_display(self.directory.loaded_at(), chrono::Utc::now())
    }

    /// Whether quitting now would drop an in-flight write.
    pub fn can_quit(&self) -> bool {
        !self.is_busy()
    }
}

// ============================================================================
// Tests
// ============================================================================
