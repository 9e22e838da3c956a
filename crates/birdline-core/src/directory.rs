//! Rescue directory: the in-memory list of alerts with its status filter.
//!
//! Loading is split into `begin_load` / `finish_load` so a front-end can run
//! the fetch on a background task; `load_all` does both in one call.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::RescueResult;
use crate::models::{RescueAlert, RescueStatus, Volunteer};
use crate::repository::RescueRepository;

/// Set of statuses the directory shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter(BTreeSet<RescueStatus>);

impl Default for StatusFilter {
    /// Everything except Delivered; delivered cases are resolved.
    fn default() -> Self {
        Self::from_statuses([
            RescueStatus::Pending,
            RescueStatus::InRoute,
            RescueStatus::Rescued,
        ])
    }
}

impl StatusFilter {
    pub fn from_statuses(statuses: impl IntoIterator<Item = RescueStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::from_statuses(RescueStatus::ALL)
    }

    pub fn only(status: RescueStatus) -> Self {
        Self::from_statuses([status])
    }

    pub fn contains(&self, status: RescueStatus) -> bool {
        self.0.contains(&status)
    }

    /// Add the status if absent, remove it if present.
    pub fn toggle(&mut self, status: RescueStatus) {
        if !self.0.remove(&status) {
            self.0.insert(status);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Statuses in workflow order.
    pub fn iter(&self) -> impl Iterator<Item = RescueStatus> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("None");
        }
        let labels: Vec<&str> = self.iter().map(|s| s.label()).collect();
        f.write_str(&labels.join(", "))
    }
}

/// Keep records whose status is in `filter`, ordered by workflow position.
///
/// The sort is stable: records with the same status keep their fetch order.
pub fn filtered_sorted<'a>(records: &'a [RescueAlert], filter: &StatusFilter) -> Vec<&'a RescueAlert> {
    let mut view: Vec<&RescueAlert> = records.iter().filter(|r| filter.contains(r.status)).collect();
    view.sort_by_key(|r| r.status.order());
    view
}

#[derive(Debug, Default)]
pub struct Directory {
    records: Vec<RescueAlert>,
    filter: StatusFilter,
    default_filter: StatusFilter,
    loading: bool,
    error: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl Directory {
    pub fn new(filter: StatusFilter) -> Self {
        Self {
            default_filter: filter.clone(),
            filter,
            ..Default::default()
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Mark a load as started.
    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Apply the result of a load. A successful load replaces the list
    /// wholesale; a failed one keeps the previous list and records the
    /// user-facing message.
    pub fn finish_load(&mut self, result: RescueResult<Vec<RescueAlert>>) -> RescueResult<usize> {
        self.loading = false;
        match result {
            Ok(records) => {
                let count = records.len();
                self.records = records;
                self.loaded_at = Some(Utc::now());
                info!(count, "Directory refreshed");
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, kept = self.records.len(), "Error fetching bird rescues");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Fetch every rescue from `repo` and replace the in-memory list.
    pub async fn load_all(&mut self, repo: &dyn RescueRepository) -> RescueResult<&[RescueAlert]> {
        self.begin_load();
        let result = repo.load_all().await;
        self.finish_load(result)?;
        Ok(&self.records)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Filtered, status-ordered view of the current list.
    pub fn view(&self) -> Vec<&RescueAlert> {
        filtered_sorted(&self.records, &self.filter)
    }

    pub fn records(&self) -> &[RescueAlert] {
        &self.records
    }

    pub fn lookup(&self, id: &str) -> Option<&RescueAlert> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Count of loaded records per status, in workflow order.
    pub fn status_counts(&self) -> [(RescueStatus, usize); 4] {
        RescueStatus::ALL.map(|status| {
            let count = self.records.iter().filter(|r| r.status == status).count();
            (status, count)
        })
    }

    /// Records whose assigned name is not one of their eligible volunteers.
    pub fn inconsistent_assignments<'a>(&'a self, roster: &[Volunteer]) -> Vec<&'a RescueAlert> {
        let flagged: Vec<&RescueAlert> = self
            .records
            .iter()
            .filter(|r| !r.assignment_is_consistent(roster))
            .collect();
        for rescue in &flagged {
            warn!(
                id = %rescue.id,
                volunteer = %rescue.assigned_volunteer,
                "Assigned volunteer is not in the rescue's eligible set"
            );
        }
        flagged
    }

    // =========================================================================
    // Filter
    // =========================================================================

    pub fn filter(&self) -> &StatusFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn toggle_status(&mut self, status: RescueStatus) {
        self.filter.toggle(status);
    }

    /// Back to the filter the directory was created with.
    pub fn reset_filter(&mut self) {
        self.filter = self.default_filter.clone();
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Replace the in-memory copy of one record after a successful write.
    /// Returns false if the record is not in the list.
    pub fn replace_record(&mut self, updated: RescueAlert) -> bool {
        match self.records.iter_mut().find(|r| r.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RescueError;
    use crate::repository::MemoryRepository;
    use proptest::prelude::*;

    fn alert(id: &str, status: RescueStatus) -> RescueAlert {
        RescueAlert::new(id, format!("Bird {}", id), status)
    }

    fn ids(view: &[&RescueAlert]) -> Vec<String> {
        view.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_default_filter_hides_delivered() {
        let filter = StatusFilter::default();
        assert!(filter.contains(RescueStatus::Pending));
        assert!(filter.contains(RescueStatus::InRoute));
        assert!(filter.contains(RescueStatus::Rescued));
        assert!(!filter.contains(RescueStatus::Delivered));
        assert_eq!(filter.to_string(), "Pending, In Route, Rescued");
    }

    #[test]
    fn test_reset_filter_restores_initial() {
        let mut directory = Directory::new(StatusFilter::only(RescueStatus::Rescued));
        directory.toggle_status(RescueStatus::Pending);
        directory.set_filter(StatusFilter::all());
        directory.reset_filter();
        assert_eq!(directory.filter(), &StatusFilter::only(RescueStatus::Rescued));
    }

    #[test]
    fn test_toggle() {
        let mut filter = StatusFilter::only(RescueStatus::Pending);
        filter.toggle(RescueStatus::Delivered);
        assert!(filter.contains(RescueStatus::Delivered));
        filter.toggle(RescueStatus::Pending);
        filter.toggle(RescueStatus::Delivered);
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "None");
    }

    #[test]
    fn test_pending_surfaces_first_regardless_of_fetch_order() {
        let records = vec![
            alert("d", RescueStatus::Delivered),
            alert("r", RescueStatus::Rescued),
            alert("i", RescueStatus::InRoute),
            alert("p", RescueStatus::Pending),
        ];
        let view = filtered_sorted(&records, &StatusFilter::all());
        assert_eq!(ids(&view), vec!["p", "i", "r", "d"]);
    }

    #[test]
    fn test_only_delivered() {
        let records = vec![
            alert("p", RescueStatus::Pending),
            alert("i", RescueStatus::InRoute),
            alert("r", RescueStatus::Rescued),
            alert("d", RescueStatus::Delivered),
        ];
        let view = filtered_sorted(&records, &StatusFilter::only(RescueStatus::Delivered));
        assert_eq!(ids(&view), vec!["d"]);
    }

    #[test]
    fn test_equal_status_keeps_fetch_order() {
        let records = vec![
            alert("B", RescueStatus::Pending),
            alert("x", RescueStatus::Rescued),
            alert("A", RescueStatus::Pending),
        ];
        let view = filtered_sorted(&records, &StatusFilter::default());
        assert_eq!(ids(&view), vec!["B", "A", "x"]);
    }

    #[test]
    fn test_empty_filter_shows_nothing() {
        let records = vec![alert("p", RescueStatus::Pending)];
        let view = filtered_sorted(&records, &StatusFilter::from_statuses([]));
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_list() {
        let repo = MemoryRepository::new(
            vec![alert("p", RescueStatus::Pending), alert("r", RescueStatus::Rescued)],
            vec![],
        );
        let mut directory = Directory::default();
        directory.load_all(&repo).await.expect("first load");
        assert_eq!(directory.records().len(), 2);
        let first_loaded = directory.loaded_at();

        repo.set_fail_loads(true);
        let result = directory.load_all(&repo).await;
        assert!(matches!(result, Err(RescueError::FetchFailed(_))));
        assert!(!directory.is_loading());
        assert_eq!(directory.records().len(), 2);
        assert_eq!(
            directory.error(),
            Some("Failed to fetch bird rescues. Please try again later.")
        );
        assert_eq!(directory.loaded_at(), first_loaded);

        // A later success clears the error
        repo.set_fail_loads(false);
        directory.load_all(&repo).await.expect("recovered");
        assert!(directory.error().is_none());
    }

    #[tokio::test]
    async fn test_first_load_failure_leaves_empty_list() {
        let repo = MemoryRepository::default();
        repo.set_fail_loads(true);
        let mut directory = Directory::default();
        assert!(directory.load_all(&repo).await.is_err());
        assert!(directory.records().is_empty());
        assert!(directory.error().is_some());
        assert!(directory.loaded_at().is_none());
    }

    #[test]
    fn test_loading_flag_spans_split_phase() {
        let mut directory = Directory::default();
        directory.begin_load();
        assert!(directory.is_loading());
        directory
            .finish_load(Ok(vec![alert("p", RescueStatus::Pending)]))
            .unwrap();
        assert!(!directory.is_loading());
        assert_eq!(directory.view().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let repo = MemoryRepository::new(
            vec![
                alert("a", RescueStatus::Rescued),
                alert("b", RescueStatus::Pending),
                alert("c", RescueStatus::Delivered),
                alert("d", RescueStatus::Pending),
            ],
            vec![],
        );
        let mut directory = Directory::default();
        directory.load_all(&repo).await.unwrap();
        let first = ids(&directory.view());
        directory.load_all(&repo).await.unwrap();
        let second = ids(&directory.view());
        assert_eq!(first, second);
        assert_eq!(first, vec!["b", "d", "a"]);
    }

    #[test]
    fn test_replace_record_and_lookup() {
        let mut directory = Directory::default();
        directory
            .finish_load(Ok(vec![alert("p", RescueStatus::Pending)]))
            .unwrap();

        let mut updated = alert("p", RescueStatus::InRoute);
        updated.assigned_volunteer = "Dana".to_string();
        assert!(directory.replace_record(updated));
        assert_eq!(directory.lookup("p").unwrap().status, RescueStatus::InRoute);
        assert!(!directory.replace_record(alert("zz", RescueStatus::Rescued)));
    }

    #[test]
    fn test_status_counts() {
        let mut directory = Directory::default();
        directory
            .finish_load(Ok(vec![
                alert("a", RescueStatus::Pending),
                alert("b", RescueStatus::Pending),
                alert("c", RescueStatus::Delivered),
            ]))
            .unwrap();
        let counts = directory.status_counts();
        assert_eq!(counts[0], (RescueStatus::Pending, 2));
        assert_eq!(counts[1], (RescueStatus::InRoute, 0));
        assert_eq!(counts[3], (RescueStatus::Delivered, 1));
    }

    #[test]
    fn test_inconsistent_assignments() {
        let roster = vec![Volunteer::new("v1", "Dana")];
        let mut ok = alert("ok", RescueStatus::InRoute);
        ok.eligible_volunteer_ids = vec!["v1".to_string()];
        ok.assigned_volunteer = "Dana".to_string();
        let mut stray = alert("stray", RescueStatus::InRoute);
        stray.assigned_volunteer = "Walk-in helper".to_string();

        let mut directory = Directory::default();
        directory.finish_load(Ok(vec![ok, stray])).unwrap();
        let flagged = directory.inconsistent_assignments(&roster);
        assert_eq!(ids(&flagged), vec!["stray"]);
    }

    fn status_from(n: u8) -> RescueStatus {
        RescueStatus::ALL[(n % 4) as usize]
    }

    proptest! {
        #[test]
        fn prop_filtered_sorted_is_exact_and_ordered(
            statuses in proptest::collection::vec(0u8..4, 0..40),
            mask in 0u8..16,
        ) {
            let records: Vec<RescueAlert> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| alert(&format!("r{}", i), status_from(*s)))
                .collect();
            let filter = StatusFilter::from_statuses(
                RescueStatus::ALL.into_iter().filter(|s| mask & (1 << s.order()) != 0),
            );

            let view = filtered_sorted(&records, &filter);

            // Exactly the matching records
            let expected = records.iter().filter(|r| filter.contains(r.status)).count();
            prop_assert_eq!(view.len(), expected);
            prop_assert!(view.iter().all(|r| filter.contains(r.status)));

            // Non-decreasing status, fetch order within a status
            for pair in view.windows(2) {
                prop_assert!(pair[0].status <= pair[1].status);
                if pair[0].status == pair[1].status {
                    let a: usize = pair[0].id[1..].parse().unwrap();
                    let b: usize = pair[1].id[1..].parse().unwrap();
                    prop_assert!(a < b);
                }
            }
        }
    }
}
