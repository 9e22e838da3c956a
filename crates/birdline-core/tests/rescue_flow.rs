//! End-to-end rescue flows against the in-memory store.

use std::sync::Arc;

use birdline_core::{
    MemoryRepository, RescueAlert, RescueDesk, RescueError, RescuePatch, RescueStatus,
    StatusFilter, TransitionGuard, TransitionOutcome, Volunteer,
};

fn roster() -> Vec<Volunteer> {
    vec![
        Volunteer::new("v1", "Dana Alvarez"),
        Volunteer::new("v2", "Lee Nguyen"),
        Volunteer::new("v3", "Sam Okafor"),
    ]
}

fn alert(id: &str, status: RescueStatus) -> RescueAlert {
    let mut alert = RescueAlert::new(id, format!("Bird {}", id), status);
    alert.eligible_volunteer_ids = vec!["v1".to_string(), "v2".to_string()];
    if status != RescueStatus::Pending {
        alert.assigned_volunteer = "Dana Alvarez".to_string();
    }
    alert
}

fn desk_with(records: Vec<RescueAlert>) -> (Arc<MemoryRepository>, RescueDesk) {
    let repo = Arc::new(MemoryRepository::new(records, roster()));
    let desk = RescueDesk::new(repo.clone(), StatusFilter::default(), TransitionGuard::LastWriterWins);
    (repo, desk)
}

#[tokio::test]
async fn accepting_assigns_volunteer_and_stays_open() {
    let (repo, mut desk) = desk_with(vec![alert("recA", RescueStatus::Pending)]);
    desk.refresh().await.unwrap();
    desk.select("recA").await.unwrap();

    assert_eq!(desk.advance().await.unwrap(), TransitionOutcome::FormOpened);
    let form = desk.workflow.form_mut().expect("form open");
    assert_eq!(form.options().len(), 2);
    assert!(form.select_by_name("Lee Nguyen"));

    desk.confirm_assignment().await.unwrap();

    assert_eq!(
        repo.updates(),
        vec![(
            "recA".to_string(),
            RescuePatch::status(RescueStatus::InRoute).with_volunteer("Lee Nguyen")
        )]
    );
    let selected = desk.workflow.selected().expect("selection stays open");
    assert_eq!(selected.status, RescueStatus::InRoute);
    assert_eq!(selected.assigned_volunteer, "Lee Nguyen");
    assert_eq!(
        desk.directory.lookup("recA").unwrap().status,
        RescueStatus::InRoute
    );
}

#[tokio::test]
async fn marking_rescued_returns_to_list_and_refetches() {
    let (repo, mut desk) = desk_with(vec![alert("recB", RescueStatus::InRoute)]);
    desk.refresh().await.unwrap();
    desk.select("recB").await.unwrap();

    let outcome = desk.advance().await.unwrap();

    assert!(matches!(outcome, TransitionOutcome::Applied { keep_open: false, .. }));
    assert_eq!(
        repo.updates(),
        vec![("recB".to_string(), RescuePatch::status(RescueStatus::Rescued))]
    );
    assert!(desk.workflow.selected().is_none());
    assert_eq!(repo.load_calls(), 2);
}

#[tokio::test]
async fn failed_load_keeps_previous_list() {
    let (repo, mut desk) = desk_with(vec![
        alert("rec1", RescueStatus::Pending),
        alert("rec2", RescueStatus::Rescued),
    ]);
    desk.refresh().await.unwrap();

    repo.set_fail_loads(true);
    let err = desk.refresh().await.unwrap_err();

    assert!(matches!(err, RescueError::FetchFailed(_)));
    assert!(!desk.directory.is_loading());
    assert_eq!(desk.directory.records().len(), 2);
    assert_eq!(
        desk.directory.error(),
        Some("Failed to fetch bird rescues. Please try again later.")
    );
}

#[tokio::test]
async fn delivered_filter_shows_only_delivered() {
    let records = RescueStatus::ALL
        .iter()
        .enumerate()
        .map(|(i, status)| alert(&format!("rec{}", i), *status))
        .collect();
    let (_repo, mut desk) = desk_with(records);
    desk.refresh().await.unwrap();

    desk.directory.set_filter(StatusFilter::only(RescueStatus::Delivered));
    let view = desk.directory.view();

    assert_eq!(view.len(), 1);
    assert_eq!(view[0].status, RescueStatus::Delivered);
}

#[tokio::test]
async fn same_status_keeps_store_order() {
    let (_repo, mut desk) = desk_with(vec![
        alert("B", RescueStatus::Pending),
        alert("A", RescueStatus::Pending),
    ]);
    desk.refresh().await.unwrap();

    let ids: Vec<&str> = desk.directory.view().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "A"]);
}

#[tokio::test]
async fn full_lifecycle_to_delivered() {
    let (repo, mut desk) = desk_with(vec![alert("recL", RescueStatus::Pending)]);
    desk.refresh().await.unwrap();
    desk.select("recL").await.unwrap();

    desk.advance().await.unwrap();
    desk.workflow.form_mut().unwrap().select(0);
    desk.confirm_assignment().await.unwrap();
    // Still selected after accepting
    desk.advance().await.unwrap();
    assert!(desk.workflow.selected().is_none());

    desk.select("recL").await.unwrap();
    desk.advance().await.unwrap();
    desk.select("recL").await.unwrap();
    assert!(desk.workflow.offered_action().is_none());
    assert_eq!(desk.advance().await.unwrap(), TransitionOutcome::Ignored);

    let statuses: Vec<Option<RescueStatus>> = repo.updates().iter().map(|(_, p)| p.status).collect();
    assert_eq!(
        statuses,
        vec![
            Some(RescueStatus::InRoute),
            Some(RescueStatus::Rescued),
            Some(RescueStatus::Delivered)
        ]
    );
}

#[tokio::test]
async fn guarded_accept_reports_conflict() {
    let repo = Arc::new(MemoryRepository::new(vec![alert("recC", RescueStatus::Pending)], roster()));
    let mut desk = RescueDesk::new(repo.clone(), StatusFilter::default(), TransitionGuard::RecheckStatus);
    desk.refresh().await.unwrap();
    desk.select("recC").await.unwrap();
    desk.advance().await.unwrap();
    desk.workflow.form_mut().unwrap().select_by_name("Dana Alvarez");

    repo.external_update(
        "recC",
        &RescuePatch::status(RescueStatus::InRoute).with_volunteer("Lee Nguyen"),
    );

    let err = desk.confirm_assignment().await.unwrap_err();
    assert!(matches!(err, RescueError::Conflict { .. }));
    assert_eq!(err.user_message(), "This rescue is already In Route with Lee Nguyen.");
    assert!(repo.updates().is_empty());
}
