use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::api::{fields, ApiClient, RecordUpdate};
use crate::config::Config;
use crate::error::{RescueError, RescueResult};
use crate::models::{RescueAlert, RescuePatch, Volunteer};

use super::RescueRepository;

/// Repository backed by the hosted Airtable base.
#[derive(Clone)]
pub struct AirtableRepository {
    api: ApiClient,
    rescue_table: String,
    volunteer_table: String,
}

impl AirtableRepository {
    pub fn new(
        api: ApiClient,
        rescue_table: impl Into<String>,
        volunteer_table: impl Into<String>,
    ) -> Self {
        Self {
            api,
            rescue_table: rescue_table.into(),
            volunteer_table: volunteer_table.into(),
        }
    }

    /// Build a repository from resolved configuration and an access token.
    pub fn from_config(config: &Config, token: String) -> anyhow::Result<Self> {
        let api = ApiClient::new(config.require_base_id()?)?.with_token(token);
        Ok(Self::new(
            api,
            config.rescue_table.clone(),
            config.volunteer_table.clone(),
        ))
    }
}

#[async_trait]
impl RescueRepository for AirtableRepository {
    async fn load_all(&self) -> RescueResult<Vec<RescueAlert>> {
        let records = self.api.select_all(&self.rescue_table).await.map_err(|e| {
            error!(error = %format!("{:#}", e), table = %self.rescue_table, "Error fetching bird rescues");
            RescueError::fetch(e)
        })?;

        let total = records.len();
        let rescues: Vec<RescueAlert> = records.iter().filter_map(fields::rescue_from_record).collect();
        info!(total, usable = rescues.len(), "Loaded rescue alerts");
        Ok(rescues)
    }

    async fn find_one(&self, id: &str) -> RescueResult<RescueAlert> {
        let record = self.api.find(&self.rescue_table, id).await.map_err(|e| {
            error!(error = %format!("{:#}", e), id, "Error fetching bird rescue");
            RescueError::fetch(e)
        })?;

        fields::rescue_from_record(&record).ok_or_else(|| {
            RescueError::FetchFailed(format!("Record {} has an unrecognized status", id))
        })
    }

    async fn update_fields(&self, id: &str, patch: &RescuePatch) -> RescueResult<RescueAlert> {
        if patch.is_empty() {
            return Err(RescueError::UpdateFailed(format!("Empty update for record {}", id)));
        }

        let update = RecordUpdate {
            id: id.to_string(),
            fields: fields::patch_to_fields(patch),
        };
        debug!(id, fields = ?update.fields, "Updating rescue");

        let updated = self
            .api
            .update(&self.rescue_table, std::slice::from_ref(&update))
            .await
            .map_err(|e| {
                error!(error = %format!("{:#}", e), id, "Error updating Airtable");
                RescueError::update(e)
            })?;

        updated
            .iter()
            .find_map(fields::rescue_from_record)
            .ok_or_else(|| RescueError::UpdateFailed(format!("No usable record returned for {}", id)))
    }

    async fn list_volunteers(&self) -> RescueResult<Vec<Volunteer>> {
        let records = self.api.select_all(&self.volunteer_table).await.map_err(|e| {
            error!(error = %format!("{:#}", e), table = %self.volunteer_table, "Error fetching volunteers");
            RescueError::fetch(e)
        })?;

        Ok(records.iter().filter_map(fields::volunteer_from_record).collect())
    }
}
