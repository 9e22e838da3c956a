use thiserror::Error;

use crate::models::RescueStatus;

/// Failures surfaced to the directory and workflow.
///
/// The `String` payloads carry diagnostic detail for the log; the UI shows
/// [`RescueError::user_message`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RescueError {
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Validation blocked: {0}")]
    ValidationBlocked(String),

    #[error("Rescue {id} is already {current} (volunteer: {volunteer})")]
    Conflict {
        id: String,
        current: RescueStatus,
        volunteer: String,
    },
}

pub type RescueResult<T> = std::result::Result<T, RescueError>;

impl RescueError {
    /// Build a `FetchFailed` from any error chain, keeping the full context.
    pub fn fetch(err: impl std::fmt::Display) -> Self {
        RescueError::FetchFailed(format!("{:#}", err))
    }

    /// Build an `UpdateFailed` from any error chain, keeping the full context.
    pub fn update(err: impl std::fmt::Display) -> Self {
        RescueError::UpdateFailed(format!("{:#}", err))
    }

    /// The single message shown to the volunteer.
    pub fn user_message(&self) -> String {
        match self {
            RescueError::FetchFailed(_) => {
                "Failed to fetch bird rescues. Please try again later.".to_string()
            }
            RescueError::UpdateFailed(_) => {
                "Failed to update rescue status. Please try again.".to_string()
            }
            RescueError::ValidationBlocked(reason) => reason.clone(),
            RescueError::Conflict {
                current, volunteer, ..
            } => {
                if volunteer.is_empty() {
                    format!("This rescue was changed to {} by someone else.", current)
                } else {
                    format!("This rescue is already {} with {}.", current, volunteer)
                }
            }
        }
    }
}
