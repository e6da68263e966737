use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::backend_client::BackendClient;
use super::config_service::Config;
use super::http::{build_client, check_status};
use super::local_store::LocalStore;
use crate::error::{AppError, AppResult};
use crate::models::{IngestionForm, IngestionStatusRow, IngestionTrigger, NewIngestionRecord};

pub const SUBMITTED_MESSAGE: &str = "Data saved successfully!";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to save data. Please try again.";

/// Posts ingestion jobs to the worker that chunks and embeds a files container.
pub struct IngestionClient {
    client: Client,
    url: String,
}

impl IngestionClient {
    pub fn new(url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            config.inject_url()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub async fn trigger(&self, job: &IngestionTrigger) -> AppResult<()> {
        debug!(ingestion_id = %job.ingestion_id, "triggering ingestion");
        let response = self.client.post(&self.url).json(job).send().await?;
        check_status(response, "ingestion trigger").await?;
        Ok(())
    }
}

/// Applies an edit to the stored draft and returns it.
pub fn update_draft(
    store: &LocalStore,
    edit: impl FnOnce(&mut IngestionForm),
) -> AppResult<IngestionForm> {
    let mut draft = store.ingestion_form();
    edit(&mut draft);
    store.save_ingestion_form(&draft)?;
    Ok(draft)
}

/// Records the stored draft, starts the worker on it and clears the draft.
/// Returns the id of the new ingestion record.
pub async fn submit_ingestion(
    backend: &BackendClient,
    worker: &IngestionClient,
    store: &LocalStore,
) -> AppResult<String> {
    let user_id = store.form_state().user_id;
    if user_id <= 0 {
        return Err(AppError::NotAuthenticated(
            "User ID is not available.".to_string(),
        ));
    }

    let draft = store.ingestion_form();
    let created = backend
        .create_ingestion(&NewIngestionRecord {
            user_id,
            form: draft.clone(),
            updated_date_time: Utc::now(),
        })
        .await?;
    if created.id.is_empty() {
        return Err(AppError::Decode(
            "create data ingestion: missing record id".to_string(),
        ));
    }

    worker
        .trigger(&IngestionTrigger::new(&created.id, &draft))
        .await?;

    store.save_ingestion_form(&IngestionForm::default())?;
    info!(ingestion_id = %created.id, "ingestion submitted");
    Ok(created.id)
}

/// Every ingestion record, newest first, with its department name.
pub async fn ingestion_status(backend: &BackendClient) -> AppResult<Vec<IngestionStatusRow>> {
    let mut records = backend.list_ingestions().await?;
    records.sort_by(|a, b| b.updated_date_time.cmp(&a.updated_date_time));

    let mut department_ids: Vec<&str> = records
        .iter()
        .map(|r| r.department_id.as_str())
        .filter(|id| !id.is_empty())
        .collect();
    department_ids.sort_unstable();
    department_ids.dedup();

    let lookups = department_ids.iter().map(|id| async move {
        match backend.get_department(id).await {
            Ok(department) => Some((id.to_string(), department.name)),
            Err(e) => {
                warn!(department_id = %id, error = %e, "department lookup failed");
                None
            }
        }
    });
    let names: HashMap<String, String> = join_all(lookups).await.into_iter().flatten().collect();

    Ok(records
        .into_iter()
        .map(|record| IngestionStatusRow {
            department_name: names.get(&record.department_id).cloned(),
            record,
        })
        .collect())
}

pub async fn delete_ingestion(backend: &BackendClient, id: &str) -> AppResult<()> {
    backend.delete_ingestion(id).await?;
    info!(ingestion_id = %id, "ingestion record deleted");
    Ok(())
}
