use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "birdline";

/// Airtable access tokens kept in the OS keychain, one per base.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the access token for a base in the OS keychain
    pub fn store_token(base_id: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, base_id)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store access token in keychain")?;
        Ok(())
    }

    /// Retrieve the access token for a base from the OS keychain
    pub fn get_token(base_id: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, base_id)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve access token from keychain")
    }

    /// Delete the stored token for a base
    pub fn delete(base_id: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, base_id)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete access token from keychain")?;
        Ok(())
    }
}
