use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RescueError, RescueResult};
use crate::models::{RescueAlert, RescuePatch, RescueStatus, RiskLevel, Skill, Volunteer};

use super::RescueRepository;

#[derive(Default)]
struct MemoryState {
    rescues: Vec<RescueAlert>,
    volunteers: Vec<Volunteer>,
    updates: Vec<(String, RescuePatch)>,
    load_calls: usize,
    fail_loads: bool,
    fail_updates: bool,
}

/// In-process store used by tests and `--demo` mode.
///
/// Every write is recorded so callers can assert exactly what would have been
/// sent to the hosted table.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new(rescues: Vec<RescueAlert>, volunteers: Vec<Volunteer>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rescues,
                volunteers,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Patches written so far, oldest first.
    pub fn updates(&self) -> Vec<(String, RescuePatch)> {
        self.state().updates.clone()
    }

    /// Number of `load_all` calls, successful or not.
    pub fn load_calls(&self) -> usize {
        self.state().load_calls
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.state().fail_loads = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.state().fail_updates = fail;
    }

    /// Change a record behind the application's back, as another volunteer's
    /// client would.
    pub fn external_update(&self, id: &str, patch: &RescuePatch) -> bool {
        let mut state = self.state();
        match state.rescues.iter_mut().find(|r| r.id == id) {
            Some(rescue) => {
                patch.apply_to(rescue);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<RescueAlert> {
        self.state().rescues.clone()
    }

    /// A small Des Moines-area data set for demo mode.
    pub fn demo() -> Self {
        let volunteers = vec![
            Volunteer::new("recVolDana", "Dana Alvarez"),
            Volunteer::new("recVolLee", "Lee Nguyen"),
            Volunteer::new("recVolSam", "Sam Okafor"),
            Volunteer::new("recVolRiley", "Riley Brandt"),
        ];

        let mut hawk = RescueAlert::new("recDemoHawk", "Red-tailed Hawk", RescueStatus::Pending);
        hawk.pickup = "4100 Grand Ave, Des Moines, IA".to_string();
        hawk.dropoff = "Iowa Bird Rehabilitation, Ankeny, IA".to_string();
        hawk.risk_level = Some(RiskLevel::Purple);
        hawk.skills = vec![Skill("Raptor handling".to_string())];
        hawk.eligible_volunteer_ids = vec!["recVolDana".to_string(), "recVolSam".to_string()];

        let mut goslings = RescueAlert::new("recDemoGeese", "Canada Goose goslings", RescueStatus::InRoute);
        goslings.pickup = "Gray's Lake Park, Des Moines, IA".to_string();
        goslings.dropoff = "Iowa Bird Rehabilitation, Ankeny, IA".to_string();
        goslings.risk_level = Some(RiskLevel::Yellow);
        goslings.eligible_volunteer_ids = vec!["recVolLee".to_string(), "recVolRiley".to_string()];
        goslings.assigned_volunteer = "Lee Nguyen".to_string();

        let mut robin = RescueAlert::new("recDemoRobin", "American Robin (fledgling)", RescueStatus::Pending);
        robin.pickup = "Water Works Park, Des Moines, IA".to_string();
        robin.dropoff = "Iowa Bird Rehabilitation, Ankeny, IA".to_string();
        robin.risk_level = Some(RiskLevel::Green);
        robin.eligible_volunteer_ids = vec![
            "recVolDana".to_string(),
            "recVolLee".to_string(),
            "recVolRiley".to_string(),
        ];

        let mut heron = RescueAlert::new("recDemoHeron", "Great Blue Heron", RescueStatus::Rescued);
        heron.pickup = "Saylorville Lake, Johnston, IA".to_string();
        heron.dropoff = "Iowa Bird Rehabilitation, Ankeny, IA".to_string();
        heron.risk_level = Some(RiskLevel::Red);
        heron.skills = vec![Skill("Eye protection".to_string()), Skill("Large bird".to_string())];
        heron.eligible_volunteer_ids = vec!["recVolSam".to_string()];
        heron.assigned_volunteer = "Sam Okafor".to_string();

        let mut swift = RescueAlert::new("recDemoSwift", "Chimney Swift", RescueStatus::Delivered);
        swift.pickup = "Ingersoll Ave, Des Moines, IA".to_string();
        swift.dropoff = "Iowa Bird Rehabilitation, Ankeny, IA".to_string();
        swift.risk_level = Some(RiskLevel::Green);
        swift.eligible_volunteer_ids = vec!["recVolRiley".to_string()];
        swift.assigned_volunteer = "Riley Brandt".to_string();

        Self::new(vec![goslings, hawk, swift, heron, robin], volunteers)
    }
}

#[async_trait]
impl RescueRepository for MemoryRepository {
    async fn load_all(&self) -> RescueResult<Vec<RescueAlert>> {
        let mut state = self.state();
        state.load_calls += 1;
        if state.fail_loads {
            return Err(RescueError::FetchFailed("network unreachable".to_string()));
        }
        Ok(state.rescues.clone())
    }

    async fn find_one(&self, id: &str) -> RescueResult<RescueAlert> {
        let state = self.state();
        if state.fail_loads {
            return Err(RescueError::FetchFailed("network unreachable".to_string()));
        }
        state
            .rescues
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| RescueError::FetchFailed(format!("Resource not found: {}", id)))
    }

    async fn update_fields(&self, id: &str, patch: &RescuePatch) -> RescueResult<RescueAlert> {
        let mut state = self.state();
        if state.fail_updates {
            return Err(RescueError::UpdateFailed("network unreachable".to_string()));
        }
        if patch.is_empty() {
            return Err(RescueError::UpdateFailed(format!("Empty update for record {}", id)));
        }
        state.updates.push((id.to_string(), patch.clone()));

        let rescue = state
            .rescues
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RescueError::UpdateFailed(format!("Resource not found: {}", id)))?;
        patch.apply_to(rescue);
        debug!(id, status = %rescue.status, "Updated in-memory rescue");
        Ok(rescue.clone())
    }

    async fn list_volunteers(&self) -> RescueResult<Vec<Volunteer>> {
        let state = self.state();
        if state.fail_loads {
            return Err(RescueError::FetchFailed("network unreachable".to_string()));
        }
        Ok(state.volunteers.clone())
    }
}
