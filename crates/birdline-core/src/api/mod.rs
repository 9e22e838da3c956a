//! REST API client module for the hosted Airtable base.
//!
//! This module provides the `ApiClient` for listing, fetching, updating and
//! creating table rows, and the column mapping that turns rows into
//! `RescueAlert` and `Volunteer` models.
//!
//! Requests authenticate with a personal access token sent as a bearer token.

pub mod client;
pub mod error;
pub mod fields;

pub use client::{ApiClient, RecordUpdate, TableRecord};
pub use error::ApiError;
