//! `RescueDesk` ties the directory, the workflow and a repository together.
//!
//! Front-ends that do not need background tasks (the CLI subcommands, the
//! integration tests) drive everything through this type. After every applied
//! transition the desk patches its local copy and then reloads, so the list
//! always reflects what the store holds.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::directory::{Directory, StatusFilter};
use crate::error::RescueResult;
use crate::models::{RescueAlert, RescuePatch, RescueStatus, Volunteer};
use crate::repository::RescueRepository;
use crate::workflow::{eligible_volunteers, TransitionGuard, TransitionOutcome, Workflow};

pub struct RescueDesk {
    repo: Arc<dyn RescueRepository>,
    pub directory: Directory,
    pub workflow: Workflow,
    roster: Vec<Volunteer>,
}

impl RescueDesk {
    pub fn new(repo: Arc<dyn RescueRepository>, filter: StatusFilter, guard: TransitionGuard) -> Self {
        Self {
            repo,
            directory: Directory::new(filter),
            workflow: Workflow::new(guard),
            roster: Vec::new(),
        }
    }

    pub fn roster(&self) -> &[Volunteer] {
        &self.roster
    }

    /// Reload rescues and the roster together.
    ///
    /// A roster failure is logged and the previous roster kept; only a rescue
    /// failure is returned.
    pub async fn refresh(&mut self) -> RescueResult<usize> {
        self.directory.begin_load();
        let (rescues, roster) = futures::join!(self.repo.load_all(), self.repo.list_volunteers());

        match roster {
            Ok(roster) => self.roster = roster,
            Err(e) => warn!(error = %e, kept = self.roster.len(), "Could not load volunteer roster"),
        }

        let count = self.directory.finish_load(rescues)?;
        self.workflow.resync(self.directory.records());
        self.directory.inconsistent_assignments(&self.roster);
        Ok(count)
    }

    /// Open one rescue, fetching it from the store when it is not loaded.
    pub async fn select(&mut self, id: &str) -> RescueResult<RescueAlert> {
        let record = match self.directory.lookup(id) {
            Some(record) => record.clone(),
            None => {
                debug!(id, "Rescue not in loaded list, fetching");
                self.repo.find_one(id).await?
            }
        };
        self.workflow.select(record.clone());
        Ok(record)
    }

    pub fn back(&mut self) {
        self.workflow.clear_selection();
    }

    /// Volunteers who may accept the selected rescue.
    pub fn eligible_for_selected(&self) -> Vec<Volunteer> {
        self.workflow
            .selected()
            .map(|r| eligible_volunteers(r, &self.roster))
            .unwrap_or_default()
    }

    /// Run the offered forward action of the selected rescue.
    pub async fn advance(&mut self) -> RescueResult<TransitionOutcome> {
        match self.workflow.offered_action() {
            Some(action) => {
                self.submit_transition(action.requested_status(), RescuePatch::default())
                    .await
            }
            None => Ok(TransitionOutcome::Ignored),
        }
    }

    pub async fn submit_transition(
        &mut self,
        target: RescueStatus,
        extra: RescuePatch,
    ) -> RescueResult<TransitionOutcome> {
        let outcome = self
            .workflow
            .submit_transition(self.repo.as_ref(), target, extra, &self.roster)
            .await?;
        self.after_write(&outcome).await;
        Ok(outcome)
    }

    /// Confirm the open assignment form.
    pub async fn confirm_assignment(&mut self) -> RescueResult<TransitionOutcome> {
        let outcome = self.workflow.submit_assignment(self.repo.as_ref()).await?;
        self.after_write(&outcome).await;
        Ok(outcome)
    }

    async fn after_write(&mut self, outcome: &TransitionOutcome) {
        let Some(record) = outcome.applied() else {
            return;
        };
        self.directory.replace_record(record.clone());
        info!(id = %record.id, status = %record.status, "Reloading after update");
        // A failed reload is reported through the directory; the write stands.
        let _ = self.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn desk(repo: Arc<MemoryRepository>) -> RescueDesk {
        RescueDesk::new(repo, StatusFilter::default(), TransitionGuard::LastWriterWins)
    }

    #[tokio::test]
    async fn test_refresh_loads_rescues_and_roster() {
        let repo = Arc::new(MemoryRepository::demo());
        let mut desk = desk(repo.clone());
        let count = desk.refresh().await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(desk.roster().len(), 4);
        // Delivered hidden by the default filter
        assert_eq!(desk.directory.view().len(), 4);
    }

    #[tokio::test]
    async fn test_select_fetches_unloaded_record() {
        let repo = Arc::new(MemoryRepository::demo());
        let mut desk = desk(repo);
        let record = desk.select("recDemoHawk").await.unwrap();
        assert_eq!(record.species, "Red-tailed Hawk");
        assert!(desk.select("recMissing").await.is_err());
    }

    #[tokio::test]
    async fn test_advance_reloads_after_write() {
        let repo = Arc::new(MemoryRepository::demo());
        let mut desk = desk(repo.clone());
        desk.refresh().await.unwrap();
        desk.select("recDemoHeron").await.unwrap();

        let outcome = desk.advance().await.unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied { keep_open: false, .. }));
        assert_eq!(repo.load_calls(), 2);
        assert_eq!(
            desk.directory.lookup("recDemoHeron").unwrap().status,
            RescueStatus::Delivered
        );
        assert!(desk.workflow.selected().is_none());
    }

    #[tokio::test]
    async fn test_accept_flow_through_desk() {
        let repo = Arc::new(MemoryRepository::demo());
        let mut desk = desk(repo.clone());
        desk.refresh().await.unwrap();
        desk.select("recDemoHawk").await.unwrap();

        let names: Vec<String> = desk.eligible_for_selected().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Dana Alvarez", "Sam Okafor"]);

        assert_eq!(desk.advance().await.unwrap(), TransitionOutcome::FormOpened);
        desk.workflow.form_mut().unwrap().select_by_name("Sam Okafor");
        let outcome = desk.confirm_assignment().await.unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied { keep_open: true, .. }));

        let selected = desk.workflow.selected().unwrap();
        assert_eq!(selected.status, RescueStatus::InRoute);
        assert_eq!(selected.assigned_volunteer, "Sam Okafor");
    }

    #[tokio::test]
    async fn test_reload_failure_after_write_keeps_result() {
        let repo = Arc::new(MemoryRepository::demo());
        let mut desk = desk(repo.clone());
        desk.refresh().await.unwrap();
        desk.select("recDemoGeese").await.unwrap();
        repo.set_fail_loads(true);

        let outcome = desk.advance().await.unwrap();
        assert!(outcome.applied().is_some());
        assert_eq!(
            desk.directory.lookup("recDemoGeese").unwrap().status,
            RescueStatus::Rescued
        );
        assert!(desk.directory.error().is_some());
    }
}
