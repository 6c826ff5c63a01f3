use async_trait::async_trait;
use reqwest::{header, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{RecordStore, UpsertAction};
use crate::error::{SettingsError, StoreError};
use crate::record::{NormalizedRecord, ISO_CODE_FIELD};
use crate::settings::AirtableSettings;

/// Airtable table keyed by the `ISO code` column.
pub struct AirtableStore {
    client: reqwest::Client,
    table_url: Url,
    token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RecordRef>,
}

#[derive(Deserialize)]
struct RecordRef {
    id: String,
}

#[derive(Serialize)]
struct FieldsBody<'a> {
    fields: &'a NormalizedRecord,
}

impl AirtableStore {
    pub fn new(settings: &AirtableSettings) -> Result<Self, SettingsError> {
        let mut table_url = Url::parse(&settings.api_url)
            .map_err(|e| SettingsError::Invalid(format!("api url {}: {}", settings.api_url, e)))?;
        table_url
            .path_segments_mut()
            .map_err(|_| SettingsError::Invalid(format!("api url {} cannot take a path", settings.api_url)))?
            .pop_if_empty()
            .push("v0")
            .push(&settings.base_id)
            .push(&settings.table_name);

        Ok(AirtableStore {
            client: reqwest::Client::new(),
            table_url,
            token: settings.api_token.clone(),
        })
    }

    /// Id of the first record whose `ISO code` matches.
    pub async fn find(&self, iso_code: &str) -> Result<Option<String>, StoreError> {
        let formula = iso_filter(iso_code);
        debug!("Searching Airtable: {} filterByFormula={}", self.table_url, formula);

        let resp = self
            .client
            .get(self.table_url.clone())
            .bearer_auth(&self.token)
            .query(&[("filterByFormula", formula.as_str()), ("maxRecords", "1")])
            .send()
            .await?;
        let list: ListResponse = check(resp).await?.json().await?;
        Ok(list.records.into_iter().next().map(|r| r.id))
    }

    async fn create(&self, record: &NormalizedRecord) -> Result<String, StoreError> {
        let resp = self
            .client
            .post(self.table_url.clone())
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&FieldsBody { fields: record })
            .send()
            .await?;
        let created: RecordRef = check(resp).await?.json().await?;
        Ok(created.id)
    }

    async fn update(&self, record_id: &str, record: &NormalizedRecord) -> Result<(), StoreError> {
        let mut url = self.table_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unexpected(format!("{} cannot take a record id", self.table_url)))?
            .push(record_id);

        let resp = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&FieldsBody { fields: record })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn upsert(&self, iso_code: &str, record: &NormalizedRecord) -> Result<UpsertAction, StoreError> {
        match self.find(iso_code).await? {
            Some(id) => {
                info!("Updating Airtable record for ISO code {} (Record ID: {})", iso_code, id);
                self.update(&id, record).await?;
                Ok(UpsertAction::Updated(id))
            }
            None => {
                info!("Creating new Airtable record for ISO code {}", iso_code);
                let id = self.create(record).await?;
                Ok(UpsertAction::Created(id))
            }
        }
    }
}

/// `{ISO code}='<value>'` with quotes and backslashes escaped.
fn iso_filter(iso_code: &str) -> String {
    let escaped = iso_code.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{}}}='{}'", ISO_CODE_FIELD, escaped)
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_url: &str) -> AirtableSettings {
        AirtableSettings {
            api_url: api_url.to_string(),
            base_id: "appXYZ".into(),
            table_name: "SMS Guidelines".into(),
            api_token: "tok".into(),
        }
    }

    #[test]
    fn table_url_encodes_table_name() {
        let store = AirtableStore::new(&settings("https://api.airtable.com")).unwrap();
        assert_eq!(
            store.table_url.as_str(),
            "https://api.airtable.com/v0/appXYZ/SMS%20Guidelines"
        );
    }

    #[test]
    fn rejects_unparseable_api_url() {
        assert!(AirtableStore::new(&settings("not a url")).is_err());
    }

    #[test]
    fn filter_formula_escapes_quotes() {
        assert_eq!(iso_filter("US"), "{ISO code}='US'");
        assert_eq!(iso_filter("C'D"), r"{ISO code}='C\'D'");
    }
}
