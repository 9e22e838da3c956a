//! Rescue detail and status workflow.
//!
//! One selected rescue moves forward through
//! `Pending → In Route → Rescued → Delivered`, one step per action:
//!
//! | Status    | Action            | Effect                                     |
//! |-----------|-------------------|--------------------------------------------|
//! | Pending   | Accept Rescue     | opens the volunteer assignment form        |
//! | (form)    | confirm           | writes volunteer + `In Route`, stays open  |
//! | In Route  | Mark as Rescued   | writes `Rescued`, returns to the list      |
//! | Rescued   | Mark as Delivered | writes `Delivered`, returns to the list    |
//! | Delivered | none              |                                            |
//!
//! Writes are split into `begin_*` (validate and build a [`PendingWrite`]),
//! [`execute_write`] (talk to the store) and [`Workflow::finish_transition`]
//! (apply the result), so a front-end can run the middle step on a background
//! task. A failed write never changes the displayed status.

use tracing::{debug, error, info, warn};

use crate::error::{RescueError, RescueResult};
use crate::models::{RescueAlert, RescuePatch, RescueStatus, Volunteer};
use crate::repository::RescueRepository;

const PICK_NAME_MESSAGE: &str = "Please pick your name before accepting the rescue.";

/// How a write protects against another volunteer changing the same rescue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionGuard {
    /// Write unconditionally; the last writer wins.
    #[default]
    LastWriterWins,
    /// Re-read the rescue first and refuse if its status moved since it was
    /// displayed. Not atomic: a write landing between the read and our write
    /// still wins.
    RecheckStatus,
}

/// The single forward action offered for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    AcceptRescue,
    MarkRescued,
    MarkDelivered,
}

impl TransitionAction {
    /// `None` for Delivered.
    pub fn for_status(status: RescueStatus) -> Option<Self> {
        match status {
            RescueStatus::Pending => Some(TransitionAction::AcceptRescue),
            RescueStatus::InRoute => Some(TransitionAction::MarkRescued),
            RescueStatus::Rescued => Some(TransitionAction::MarkDelivered),
            RescueStatus::Delivered => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransitionAction::AcceptRescue => "Accept Rescue",
            TransitionAction::MarkRescued => "Mark as Rescued",
            TransitionAction::MarkDelivered => "Mark as Delivered",
        }
    }

    /// Status handed to `submit_transition`. Accepting requests `Pending`,
    /// which opens the assignment form instead of writing.
    pub fn requested_status(&self) -> RescueStatus {
        match self {
            TransitionAction::AcceptRescue => RescueStatus::Pending,
            TransitionAction::MarkRescued => RescueStatus::Rescued,
            TransitionAction::MarkDelivered => RescueStatus::Delivered,
        }
    }

    /// Status the rescue ends up in once the action completes.
    pub fn resulting_status(&self) -> RescueStatus {
        match self {
            TransitionAction::AcceptRescue => RescueStatus::InRoute,
            TransitionAction::MarkRescued => RescueStatus::Rescued,
            TransitionAction::MarkDelivered => RescueStatus::Delivered,
        }
    }

    pub fn opens_form(&self) -> bool {
        matches!(self, TransitionAction::AcceptRescue)
    }
}

/// Roster members allowed to take `record`, in roster order.
pub fn eligible_volunteers(record: &RescueAlert, roster: &[Volunteer]) -> Vec<Volunteer> {
    roster
        .iter()
        .filter(|v| record.is_eligible(&v.id))
        .cloned()
        .collect()
}

// ============================================================================
// Assignment form
// ============================================================================

/// Volunteer picker shown when accepting a rescue. Confirm stays disabled
/// until a name is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentForm {
    record_id: String,
    options: Vec<Volunteer>,
    selected: Option<usize>,
    error: Option<String>,
}

impl AssignmentForm {
    pub fn new(record: &RescueAlert, roster: &[Volunteer]) -> Self {
        Self {
            record_id: record.id.clone(),
            options: eligible_volunteers(record, roster),
            selected: None,
            error: None,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn options(&self) -> &[Volunteer] {
        &self.options
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn chosen(&self) -> Option<&Volunteer> {
        self.selected.and_then(|i| self.options.get(i))
    }

    pub fn can_confirm(&self) -> bool {
        self.chosen().is_some()
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.options.len() {
            self.selected = Some(index);
            self.error = None;
            true
        } else {
            false
        }
    }

    /// Choose by display name (case-insensitive).
    pub fn select_by_name(&mut self, name: &str) -> bool {
        let wanted = name.trim();
        match self
            .options
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(wanted))
        {
            Some(index) => self.select(index),
            None => false,
        }
    }

    pub fn select_next(&mut self) {
        if self.options.is_empty() {
            return;
        }
        let next = match self.selected {
            None => 0,
            Some(i) => (i + 1) % self.options.len(),
        };
        self.select(next);
    }

    pub fn select_prev(&mut self) {
        if self.options.is_empty() {
            return;
        }
        let prev = match self.selected {
            None | Some(0) => self.options.len() - 1,
            Some(i) => i - 1,
        };
        self.select(prev);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// A validated write waiting to be sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub record_id: String,
    /// Status the volunteer saw when they acted.
    pub expected_status: RescueStatus,
    pub patch: RescuePatch,
}

impl PendingWrite {
    pub fn target(&self) -> Option<RescueStatus> {
        self.patch.status
    }

    /// Accepting (writing In Route) keeps the detail open so the volunteer
    /// sees the assignment; other transitions return to the list.
    pub fn keeps_selection(&self) -> bool {
        self.target() == Some(RescueStatus::InRoute)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// No rescue selected, or a write is already in flight.
    Ignored,
    FormOpened,
    Write(PendingWrite),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Ignored,
    FormOpened,
    Applied { record: RescueAlert, keep_open: bool },
}

impl TransitionOutcome {
    pub fn applied(&self) -> Option<&RescueAlert> {
        match self {
            TransitionOutcome::Applied { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Send a validated write to the store, honoring the configured guard.
pub async fn execute_write(
    repo: &dyn RescueRepository,
    write: &PendingWrite,
    guard: TransitionGuard,
) -> RescueResult<RescueAlert> {
    if guard == TransitionGuard::RecheckStatus {
        let current = repo.find_one(&write.record_id).await.map_err(|e| {
            RescueError::UpdateFailed(format!("Could not re-read {} before writing: {}", write.record_id, e))
        })?;
        if current.status != write.expected_status {
            warn!(
                id = %write.record_id,
                expected = %write.expected_status,
                current = %current.status,
                "Rescue changed since it was displayed, refusing to write"
            );
            return Err(RescueError::Conflict {
                id: current.id,
                current: current.status,
                volunteer: current.assigned_volunteer,
            });
        }
    }

    repo.update_fields(&write.record_id, &write.patch).await
}

#[derive(Debug, Default)]
pub struct Workflow {
    selected: Option<RescueAlert>,
    form: Option<AssignmentForm>,
    in_flight: bool,
    error: Option<String>,
    guard: TransitionGuard,
}

impl Workflow {
    pub fn new(guard: TransitionGuard) -> Self {
        Self {
            guard,
            ..Default::default()
        }
    }

    pub fn guard(&self) -> TransitionGuard {
        self.guard
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Take ownership of one rescue for the detail view.
    pub fn select(&mut self, record: RescueAlert) {
        debug!(id = %record.id, status = %record.status, "Rescue selected");
        self.selected = Some(record);
        self.form = None;
        self.error = None;
    }

    /// Back to the list.
    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.form = None;
        self.error = None;
    }

    pub fn selected(&self) -> Option<&RescueAlert> {
        self.selected.as_ref()
    }

    /// Point the selection at a freshly loaded copy of the same rescue.
    /// A selection that vanished from the store is left as it was.
    pub fn resync(&mut self, records: &[RescueAlert]) {
        if let Some(ref mut selected) = self.selected {
            if let Some(fresh) = records.iter().find(|r| r.id == selected.id) {
                *selected = fresh.clone();
            }
        }
    }

    pub fn offered_action(&self) -> Option<TransitionAction> {
        self.selected
            .as_ref()
            .and_then(|r| TransitionAction::for_status(r.status))
    }

    pub fn form(&self) -> Option<&AssignmentForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut AssignmentForm> {
        self.form.as_mut()
    }

    /// Dismiss the assignment form; the rescue stays Pending and selected.
    pub fn close_form(&mut self) {
        self.form = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    // =========================================================================
    // Split-phase transitions
    // =========================================================================

    fn blocked(&mut self, reason: String) -> RescueError {
        let err = RescueError::ValidationBlocked(reason);
        self.error = Some(err.user_message());
        err
    }

    /// Validate a requested transition of the selected rescue.
    ///
    /// Requesting `Pending`, or `In Route` without a volunteer name in
    /// `extra`, opens the assignment form rather than writing.
    pub fn begin_transition(
        &mut self,
        target: RescueStatus,
        extra: RescuePatch,
        roster: &[Volunteer],
    ) -> RescueResult<TransitionPlan> {
        let Some(record) = self.selected.as_ref() else {
            debug!("Transition requested with no rescue selected");
            return Ok(TransitionPlan::Ignored);
        };
        if self.in_flight {
            debug!(id = %record.id, "Transition already in flight");
            return Ok(TransitionPlan::Ignored);
        }

        let current = record.status;
        let opens_form = current == RescueStatus::Pending
            && (target == RescueStatus::Pending
                || (target == RescueStatus::InRoute && extra.assigned_volunteer.is_none()));
        if opens_form {
            self.form = Some(AssignmentForm::new(record, roster));
            self.error = None;
            return Ok(TransitionPlan::FormOpened);
        }

        if current.next() != Some(target) {
            let reason = format!("A {} rescue cannot move to {}.", current, target);
            return Err(self.blocked(reason));
        }

        let mut patch = extra;
        if target == RescueStatus::InRoute {
            let requested = patch.assigned_volunteer.as_deref().unwrap_or("").trim();
            let matched = eligible_volunteers(record, roster)
                .into_iter()
                .find(|v| !requested.is_empty() && v.name.eq_ignore_ascii_case(requested));
            match matched {
                Some(volunteer) => patch.assigned_volunteer = Some(volunteer.name),
                None if requested.is_empty() => {
                    return Err(self.blocked(PICK_NAME_MESSAGE.to_string()));
                }
                None => {
                    let reason = format!("{} is not eligible for this rescue.", requested);
                    return Err(self.blocked(reason));
                }
            }
        }

        let write = PendingWrite {
            record_id: record.id.clone(),
            expected_status: current,
            patch: patch.with_status(target),
        };
        self.in_flight = true;
        self.error = None;
        Ok(TransitionPlan::Write(write))
    }

    /// Validate the assignment form and build the accept write.
    pub fn begin_assignment(&mut self) -> RescueResult<PendingWrite> {
        let Some(record) = self.selected.as_ref() else {
            return Err(self.blocked("No rescue selected.".to_string()));
        };
        if self.in_flight {
            return Err(self.blocked("This rescue is already being updated.".to_string()));
        }
        let Some(form) = self.form.as_mut() else {
            return Err(self.blocked(PICK_NAME_MESSAGE.to_string()));
        };

        let chosen = match form.chosen() {
            Some(v) if record.is_eligible(&v.id) => v.clone(),
            Some(v) => {
                let reason = format!("{} is not eligible for this rescue.", v.name);
                form.error = Some(reason.clone());
                return Err(self.blocked(reason));
            }
            None => {
                form.error = Some(PICK_NAME_MESSAGE.to_string());
                return Err(self.blocked(PICK_NAME_MESSAGE.to_string()));
            }
        };

        if record.status != RescueStatus::Pending {
            let reason = format!("This rescue is already {}.", record.status);
            form.error = Some(reason.clone());
            return Err(self.blocked(reason));
        }

        let write = PendingWrite {
            record_id: record.id.clone(),
            expected_status: RescueStatus::Pending,
            patch: RescuePatch::status(RescueStatus::InRoute).with_volunteer(chosen.name),
        };
        form.error = None;
        self.in_flight = true;
        self.error = None;
        Ok(write)
    }

    /// Apply the store's answer to a write started with `begin_*`.
    pub fn finish_transition(
        &mut self,
        write: &PendingWrite,
        result: RescueResult<RescueAlert>,
    ) -> RescueResult<TransitionOutcome> {
        self.in_flight = false;
        let still_selected = self
            .selected
            .as_ref()
            .map(|r| r.id == write.record_id)
            .unwrap_or(false);

        match result {
            Ok(record) => {
                let keep_open = write.keeps_selection();
                info!(id = %record.id, status = %record.status, keep_open, "Rescue status updated");
                if still_selected {
                    if keep_open {
                        self.selected = Some(record.clone());
                        self.form = None;
                        self.error = None;
                    } else {
                        self.clear_selection();
                    }
                }
                Ok(TransitionOutcome::Applied { record, keep_open })
            }
            Err(e) => {
                error!(error = %e, id = %write.record_id, "Error updating bird rescue status");
                if still_selected {
                    let message = e.user_message();
                    if let Some(ref mut form) = self.form {
                        form.error = Some(message.clone());
                    }
                    self.error = Some(message);
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // One-shot transitions
    // =========================================================================

    /// Validate, write and apply a transition of the selected rescue.
    pub async fn submit_transition(
        &mut self,
        repo: &dyn RescueRepository,
        target: RescueStatus,
        extra: RescuePatch,
        roster: &[Volunteer],
    ) -> RescueResult<TransitionOutcome> {
        match self.begin_transition(target, extra, roster)? {
            TransitionPlan::Ignored => Ok(TransitionOutcome::Ignored),
            TransitionPlan::FormOpened => Ok(TransitionOutcome::FormOpened),
            TransitionPlan::Write(write) => {
                let result = execute_write(repo, &write, self.guard).await;
                self.finish_transition(&write, result)
            }
        }
    }

    /// Confirm the assignment form.
    pub async fn submit_assignment(
        &mut self,
        repo: &dyn RescueRepository,
    ) -> RescueResult<TransitionOutcome> {
        let write = self.begin_assignment()?;
        let result = execute_write(repo, &write, self.guard).await;
        self.finish_transition(&write, result)
    }
}
