//! Storage abstraction for rescue alerts and the volunteer roster.
//!
//! The directory and workflow only talk to a [`RescueRepository`], so the
//! hosted table service can be swapped for the in-memory store in tests and
//! demo mode.

pub mod airtable;
pub mod memory;

use async_trait::async_trait;

use crate::error::RescueResult;
use crate::models::{RescueAlert, RescuePatch, Volunteer};

pub use airtable::AirtableRepository;
pub use memory::MemoryRepository;

#[async_trait]
pub trait RescueRepository: Send + Sync {
    /// Every rescue alert in the store, in store order.
    async fn load_all(&self) -> RescueResult<Vec<RescueAlert>>;

    /// A single alert by id.
    async fn find_one(&self, id: &str) -> RescueResult<RescueAlert>;

    /// Write the patched fields of one alert and return the stored result.
    /// Fields the patch leaves unset are not touched.
    async fn update_fields(&self, id: &str, patch: &RescuePatch) -> RescueResult<RescueAlert>;

    /// The whole volunteer roster, in store order.
    async fn list_volunteers(&self) -> RescueResult<Vec<Volunteer>>;
}
