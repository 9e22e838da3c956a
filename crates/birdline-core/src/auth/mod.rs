//! Access token storage.
//!
//! The Airtable token is read from `AIRTABLE_ACCESS_TOKEN` when set and
//! otherwise from the OS keychain via `CredentialStore`.

pub mod credentials;

pub use credentials::CredentialStore;
