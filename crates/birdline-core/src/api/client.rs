//! API client for the Airtable REST API.
//!
//! Tables are addressed by name within one base; records by their Airtable
//! record id. Requests are never retried: a 429 surfaces as
//! [`ApiError::RateLimited`] and the volunteer retries by hand.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the Airtable REST API
const API_BASE_URL: &str = "https://api.airtable.com/v0";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Records requested per page when listing a table (Airtable maximum).
const PAGE_SIZE: u32 = 100;

/// Records per PATCH/POST request (Airtable maximum).
const MAX_RECORDS_PER_WRITE: usize = 10;

/// Upper bound on pages fetched by `select_all`, guarding against a cursor
/// that never terminates.
const MAX_PAGES: usize = 500;

/// One row of an Airtable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Patch for one existing record. Fields not present are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NewRecord<'a> {
    fields: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct WriteRequest<R: Serialize> {
    records: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<TableRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    records: Vec<TableRecord>,
}

/// API client for one Airtable base.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    base_id: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the given base
    pub fn new(base_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
            base_id: base_id.into(),
            token: None,
        })
    }

    /// Point the client at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            base_id: self.base_id.clone(),
            token: Some(token),
        }
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    /// Build `{base_url}/{base_id}/{table}[/{record_id}]` with each segment
    /// percent-encoded (table names contain spaces).
    pub fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("API base URL cannot be a base: {}", self.base_url))?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .request(method.clone(), url.clone())
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Table Operations =====

    /// Fetch every record of a table, following the pagination cursor.
    pub async fn select_all(&self, table: &str) -> Result<Vec<TableRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut url = self.table_url(table, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &PAGE_SIZE.to_string());
                if let Some(ref cursor) = offset {
                    query.append_pair("offset", cursor);
                }
            }

            let parsed: ListResponse = self
                .get(url)
                .await
                .with_context(|| format!("Failed to list table '{}'", table))?;

            debug!(table, page, count = parsed.records.len(), "Fetched table page");
            records.extend(parsed.records);

            match parsed.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => return Ok(records),
            }
        }

        Err(ApiError::InvalidResponse(format!(
            "Table '{}' returned more than {} pages",
            table, MAX_PAGES
        ))
        .into())
    }

    /// Fetch a single record by id.
    pub async fn find(&self, table: &str, record_id: &str) -> Result<TableRecord> {
        let url = self.table_url(table, Some(record_id))?;
        self.get(url)
            .await
            .with_context(|| format!("Failed to fetch record {} from '{}'", record_id, table))
    }

    /// Patch existing records. Only the given fields are changed.
    pub async fn update(&self, table: &str, updates: &[RecordUpdate]) -> Result<Vec<TableRecord>> {
        let mut updated = Vec::with_capacity(updates.len());
        for chunk in updates.chunks(MAX_RECORDS_PER_WRITE) {
            let url = self.table_url(table, None)?;
            let body = WriteRequest {
                records: chunk.to_vec(),
            };
            let parsed: WriteResponse = self
                .send_json(Method::PATCH, url, &body)
                .await
                .with_context(|| format!("Failed to update {} record(s) in '{}'", chunk.len(), table))?;
            updated.extend(parsed.records);
        }
        Ok(updated)
    }

    /// Create new records from field maps.
    pub async fn create(&self, table: &str, rows: &[Map<String, Value>]) -> Result<Vec<TableRecord>> {
        let mut created = Vec::with_capacity(rows.len());
        for chunk in rows.chunks(MAX_RECORDS_PER_WRITE) {
            let url = self.table_url(table, None)?;
            let body = WriteRequest {
                records: chunk.iter().map(|fields| NewRecord { fields }).collect(),
            };
            let parsed: WriteResponse = self
                .send_json(Method::POST, url, &body)
                .await
                .with_context(|| format!("Failed to create {} record(s) in '{}'", chunk.len(), table))?;
            created.extend(parsed.records);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_url_encodes_table_name() {
        let client = ApiClient::new("appBirds123").expect("client");
        let url = client.table_url("Bird Alerts", None).unwrap();
        assert_eq!(url.as_str(), "https://api.airtable.com/v0/appBirds123/Bird%20Alerts");

        let url = client.table_url("Rescue and Transport Team", Some("recABC")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBirds123/Rescue%20and%20Transport%20Team/recABC"
        );
    }

    #[test]
    fn test_table_url_with_custom_base() {
        let client = ApiClient::new("appX")
            .expect("client")
            .with_base_url("http://localhost:8080/v0/");
        let url = client.table_url("Bird Alerts", Some("rec1")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v0/appX/Bird%20Alerts/rec1");
    }

    #[test]
    fn test_parse_list_response_with_offset() {
        let body = r#"{
            "records": [
                {"id": "rec1", "createdTime": "2024-05-01T12:00:00.000Z",
                 "fields": {"Type of Bird": "Robin", "VolunteerStatus": "Pending"}},
                {"id": "rec2", "createdTime": "2024-05-02T12:00:00.000Z", "fields": {}}
            ],
            "offset": "itrNext/rec2"
        }"#;
        let parsed: ListResponse = serde_json::from_str(body).expect("parse list");
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].fields["Type of Bird"], json!("Robin"));
        assert!(parsed.records[1].fields.is_empty());
        assert_eq!(parsed.offset.as_deref(), Some("itrNext/rec2"));
    }

    #[test]
    fn test_parse_last_page_without_offset() {
        let parsed: ListResponse = serde_json::from_str(r#"{"records": []}"#).expect("parse");
        assert!(parsed.records.is_empty());
        assert!(parsed.offset.is_none());
    }

    #[test]
    fn test_update_request_body_shape() {
        let mut fields = Map::new();
        fields.insert("VolunteerStatus".to_string(), json!("In Route"));
        fields.insert("CurrentVolunteer".to_string(), json!("Dana"));
        let body = WriteRequest {
            records: vec![RecordUpdate {
                id: "rec1".to_string(),
                fields,
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"records": [{"id": "rec1", "fields": {
                "VolunteerStatus": "In Route",
                "CurrentVolunteer": "Dana"
            }}]})
        );
    }

    #[test]
    fn test_create_request_body_has_no_id() {
        let mut fields = Map::new();
        fields.insert("Name".to_string(), json!("Dana"));
        let body = WriteRequest {
            records: vec![NewRecord { fields: &fields }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"records": [{"fields": {"Name": "Dana"}}]}));
    }

    #[test]
    fn test_auth_header_only_with_token() {
        let client = ApiClient::new("appX").expect("client");
        assert!(client.auth_headers().unwrap().get(header::AUTHORIZATION).is_none());

        let client = client.with_token("patSecret".to_string());
        let headers = client.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer patSecret");
        assert_eq!(client.base_id(), "appX");
    }
}
