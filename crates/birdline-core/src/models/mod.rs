//! Data models for rescue coordination.
//!
//! - `RescueAlert`: one bird in need of pickup and transport
//! - `RescueStatus`: the four-step lifecycle of an alert
//! - `RescuePatch`: a partial field update written back to the table
//! - `Volunteer`: a roster member who can be assigned to a rescue

pub mod rescue;
pub mod volunteer;

pub use rescue::{Photo, RescueAlert, RescuePatch, RescueStatus, RiskLevel, Skill};
pub use volunteer::Volunteer;
