use serde::{Deserialize, Serialize};

use super::volunteer::Volunteer;

/// Lifecycle of a rescue alert, in workflow order.
///
/// The derived `Ord` follows declaration order, which is the fixed sort order
/// used by the directory (pending cases first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RescueStatus {
    Pending,
    #[serde(rename = "In Route")]
    InRoute,
    Rescued,
    Delivered,
}

impl RescueStatus {
    /// Every status in workflow order.
    pub const ALL: [RescueStatus; 4] = [
        RescueStatus::Pending,
        RescueStatus::InRoute,
        RescueStatus::Rescued,
        RescueStatus::Delivered,
    ];

    /// Parse the label stored in the `VolunteerStatus` column.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(RescueStatus::Pending),
            "in route" => Some(RescueStatus::InRoute),
            "rescued" => Some(RescueStatus::Rescued),
            "delivered" => Some(RescueStatus::Delivered),
            _ => None,
        }
    }

    /// The label written back to the table.
    pub fn label(&self) -> &'static str {
        match self {
            RescueStatus::Pending => "Pending",
            RescueStatus::InRoute => "In Route",
            RescueStatus::Rescued => "Rescued",
            RescueStatus::Delivered => "Delivered",
        }
    }

    /// Position in the workflow (0 = Pending, 3 = Delivered).
    pub fn order(&self) -> usize {
        *self as usize
    }

    /// The status one step further along, or `None` for Delivered.
    pub fn next(&self) -> Option<Self> {
        match self {
            RescueStatus::Pending => Some(RescueStatus::InRoute),
            RescueStatus::InRoute => Some(RescueStatus::Rescued),
            RescueStatus::Rescued => Some(RescueStatus::Delivered),
            RescueStatus::Delivered => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for RescueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Rescue & transport handling level ("R&T Level" column). Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Green,
    Yellow,
    Red,
    Purple,
}

impl RiskLevel {
    /// Parse the full column label, e.g. "Purple: raptors".
    /// Only the color prefix is significant.
    pub fn from_label(label: &str) -> Option<Self> {
        let color = label.split(':').next().unwrap_or_default().trim();
        match color.to_ascii_lowercase().as_str() {
            "green" => Some(RiskLevel::Green),
            "yellow" => Some(RiskLevel::Yellow),
            "red" => Some(RiskLevel::Red),
            "purple" => Some(RiskLevel::Purple),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Green => "Green: songbirds & babies",
            RiskLevel::Yellow => "Yellow: geese, ducks and swans",
            RiskLevel::Red => "Red: herons, bats",
            RiskLevel::Purple => "Purple: raptors",
        }
    }
}

/// One "Technical Skills" tag required for a rescue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill(pub String);

impl Skill {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First attachment of the "Bird Photo" column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// One bird-rescue case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueAlert {
    pub id: String,
    pub species: String,
    pub pickup: String,
    pub dropoff: String,
    pub status: RescueStatus,
    pub risk_level: Option<RiskLevel>,
    pub skills: Vec<Skill>,
    /// Volunteer record ids allowed to take this rescue.
    pub eligible_volunteer_ids: Vec<String>,
    /// Empty when nobody has accepted the rescue yet.
    pub assigned_volunteer: String,
    pub photo: Option<Photo>,
}

impl RescueAlert {
    /// Minimal record with the given id, species and status.
    pub fn new(id: impl Into<String>, species: impl Into<String>, status: RescueStatus) -> Self {
        Self {
            id: id.into(),
            species: species.into(),
            pickup: String::new(),
            dropoff: String::new(),
            status,
            risk_level: None,
            skills: Vec::new(),
            eligible_volunteer_ids: Vec::new(),
            assigned_volunteer: String::new(),
            photo: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.assigned_volunteer.trim().is_empty()
    }

    /// Name shown in list and detail views.
    pub fn volunteer_display(&self) -> &str {
        if self.is_assigned() {
            &self.assigned_volunteer
        } else {
            "AVAILABLE"
        }
    }

    pub fn is_eligible(&self, volunteer_id: &str) -> bool {
        self.eligible_volunteer_ids.iter().any(|id| id == volunteer_id)
    }

    /// Whether the assigned name belongs to one of this record's eligible
    /// volunteers. Unassigned records are always consistent.
    ///
    /// The assignment column is free text, so another client can write a name
    /// that is not in the eligible set.
    pub fn assignment_is_consistent(&self, roster: &[Volunteer]) -> bool {
        if !self.is_assigned() {
            return true;
        }
        roster
            .iter()
            .filter(|v| self.is_eligible(&v.id))
            .any(|v| v.name == self.assigned_volunteer)
    }
}

/// Partial field update for one rescue. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescuePatch {
    pub status: Option<RescueStatus>,
    pub assigned_volunteer: Option<String>,
}

impl RescuePatch {
    pub fn status(status: RescueStatus) -> Self {
        Self {
            status: Some(status),
            assigned_volunteer: None,
        }
    }

    pub fn with_status(mut self, status: RescueStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_volunteer(mut self, name: impl Into<String>) -> Self {
        self.assigned_volunteer = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.assigned_volunteer.is_none()
    }

    /// Apply this patch to an in-memory copy.
    pub fn apply_to(&self, alert: &mut RescueAlert) {
        if let Some(status) = self.status {
            alert.status = status;
        }
        if let Some(ref name) = self.assigned_volunteer {
            alert.assigned_volunteer = name.clone();
        }
    }
}
