//! Birdline core - rescue alert coordination for bird rescue volunteers.
//!
//! This crate holds everything that is not terminal UI:
//!
//! - `models`: rescue alerts, statuses, patches and volunteers
//! - `api`: the Airtable REST client and field mapping
//! - `repository`: the storage trait plus Airtable and in-memory stores
//! - `directory`: the loaded list with its status filter and ordering
//! - `workflow`: the selected rescue and its forward transitions
//! - `desk`: directory + workflow + repository in one place
//! - `config`, `auth`: settings file and keychain token storage

pub mod api;
pub mod auth;
pub mod config;
pub mod desk;
pub mod directory;
pub mod error;
pub mod models;
pub mod repository;
pub mod workflow;

pub use config::Config;
pub use desk::RescueDesk;
pub use directory::{filtered_sorted, Directory, StatusFilter};
pub use error::{RescueError, RescueResult};
pub use models::{RescueAlert, RescuePatch, RescueStatus, RiskLevel, Volunteer};
pub use repository::{AirtableRepository, MemoryRepository, RescueRepository};
pub use workflow::{
    eligible_volunteers, execute_write, AssignmentForm, PendingWrite, TransitionAction,
    TransitionGuard, TransitionOutcome, TransitionPlan, Workflow,
};
