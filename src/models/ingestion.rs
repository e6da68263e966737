use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStatus {
    Pending,
    Succeeded,
    Failed,
    Unknown(i64),
}

impl From<i64> for IngestionStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => IngestionStatus::Pending,
            1 => IngestionStatus::Succeeded,
            2 => IngestionStatus::Failed,
            other => IngestionStatus::Unknown(other),
        }
    }
}

/// Draft of the ingestion form, mirrored locally while it is edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IngestionForm {
    #[serde(default)]
    pub vector_store: String,
    #[serde(default)]
    pub vector_index: String,
    #[serde(default)]
    pub files_container: String,
    #[serde(default)]
    pub chunking_type: String,
    #[serde(rename = "embLLMType", default)]
    pub emb_llm_type: String,
    #[serde(rename = "embLLMName", default)]
    pub emb_llm_name: String,
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub status: i64,
}

/// Record sent to the backend when an ingestion is requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIngestionRecord {
    pub user_id: i64,
    #[serde(flatten)]
    pub form: IngestionForm,
    pub updated_date_time: DateTime<Utc>,
}

/// Payload of the ingestion worker trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionTrigger {
    pub ingestion_id: String,
    pub files_container: String,
    pub index_name: String,
    pub vector_store_name: String,
    pub chunking_type: String,
    pub embedding_type: String,
    pub embedding_model: String,
}

impl IngestionTrigger {
    pub fn new(ingestion_id: &str, form: &IngestionForm) -> Self {
        Self {
            ingestion_id: ingestion_id.to_string(),
            files_container: form.files_container.clone(),
            index_name: form.vector_index.clone(),
            vector_store_name: form.vector_store.clone(),
            chunking_type: form.chunking_type.clone(),
            embedding_type: form.emb_llm_type.clone(),
            embedding_model: form.emb_llm_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIngestionRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub department_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_store: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_index: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub files_container: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub chunking_type: String,
    #[serde(rename = "embLLMType", default, deserialize_with = "lenient::string")]
    pub emb_llm_type: String,
    #[serde(rename = "embLLMName", default, deserialize_with = "lenient::string")]
    pub emb_llm_name: String,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub status: i64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub updated_date_time: Option<DateTime<Utc>>,
}

impl DataIngestionRecord {
    pub fn status(&self) -> IngestionStatus {
        IngestionStatus::from(self.status)
    }

    /// Title and text shown when the user checks a finished ingestion.
    /// Pending or unknown records have nothing to show.
    pub fn status_message(&self) -> Option<(&'static str, String)> {
        match self.status() {
            IngestionStatus::Succeeded => {
                Some(("Success", "Data Ingestion Successfully Done!".to_string()))
            }
            IngestionStatus::Failed => Some((
                "Error",
                self.error
                    .as_deref()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or("Error during Data Ingestion.")
                    .to_string(),
            )),
            IngestionStatus::Pending | IngestionStatus::Unknown(_) => None,
        }
    }
}

/// Status table row: the record plus its resolved department name.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionStatusRow {
    pub record: DataIngestionRecord,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: i64, error: Option<&str>) -> DataIngestionRecord {
        serde_json::from_value(serde_json::json!({
            "id": 1, "status": status, "error": error
        }))
        .unwrap()
    }

    #[test]
    fn status_messages_follow_status_code() {
        assert_eq!(record(0, None).status_message(), None);
        assert_eq!(
            record(1, None).status_message().unwrap().1,
            "Data Ingestion Successfully Done!"
        );
        assert_eq!(
            record(2, Some("blob missing")).status_message().unwrap().1,
            "blob missing"
        );
        assert_eq!(
            record(2, None).status_message().unwrap().1,
            "Error during Data Ingestion."
        );
        assert_eq!(record(9, None).status(), IngestionStatus::Unknown(9));
    }

    #[test]
    fn new_record_flattens_form_fields() {
        let value = serde_json::to_value(NewIngestionRecord {
            user_id: 4,
            form: IngestionForm {
                vector_store: "Qdrant".into(),
                emb_llm_type: "AzureOpenAI".into(),
                ..Default::default()
            },
            updated_date_time: Utc::now(),
        })
        .unwrap();
        assert_eq!(value["userId"], 4);
        assert_eq!(value["vectorStore"], "Qdrant");
        assert_eq!(value["embLLMType"], "AzureOpenAI");
        assert!(value.get("updatedDateTime").is_some());
    }
}
