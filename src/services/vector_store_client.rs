use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::config_service::Config;
use super::http::{build_client, check_status};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreKind {
    Pinecone,
    Qdrant,
    AzureSearch,
}

impl VectorStoreKind {
    /// Maps the store name used in settings. Azure AI Search is selected
    /// under the vendor name `AzureOpenAI`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Pinecone" => Some(Self::Pinecone),
            "Qdrant" => Some(Self::Qdrant),
            "AzureOpenAI" => Some(Self::AzureSearch),
            _ => None,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Self::Pinecone => "pinecone/listindexes",
            Self::Qdrant => "qdrant/listcollection",
            Self::AzureSearch => "azuresearch/listindexes",
        }
    }
}

/// Client for the vector-store administration backend.
pub struct VectorStoreClient {
    client: Client,
    base_url: String,
}

impl VectorStoreClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            config.vectordb_url()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Index (or collection) names of a store. Unknown stores have none.
    pub async fn list_indexes(&self, store: &str) -> AppResult<Vec<String>> {
        let Some(kind) = VectorStoreKind::from_name(store) else {
            debug!(store, "no index listing for unknown vector store");
            return Ok(Vec::new());
        };
        let url = format!("{}/{}", self.base_url, kind.path());
        let response = self.client.post(&url).send().await?;
        let response = check_status(response, "vector store indexes").await?;
        let text = response.text().await?;
        parse_index_names(&text)
    }
}

/// Accepts `{"message":[{"name":..}]}` (possibly wrapped in a JSON string)
/// or a plain array of names.
pub fn parse_index_names(text: &str) -> AppResult<Vec<String>> {
    let mut value: Value = serde_json::from_str(text.trim())
        .map_err(|e| AppError::Decode(format!("vector store indexes: {}", e)))?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|e| AppError::Decode(format!("vector store indexes: {}", e)))?;
    }
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("message") {
            Some(Value::Array(items)) => items,
            _ => return Err(AppError::Decode("vector store indexes: no message list".into())),
        },
        _ => return Err(AppError::Decode("vector store indexes: unexpected shape".into())),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_each_listing_shape() {
        let wrapped = json!(json!({"message": [{"name": "a"}, {"name": "b"}]}).to_string());
        assert_eq!(parse_index_names(&wrapped.to_string()).unwrap(), vec!["a", "b"]);
        assert_eq!(
            parse_index_names(r#"{"message":[{"name":"c"}]}"#).unwrap(),
            vec!["c"]
        );
        assert_eq!(parse_index_names(r#"["x","y"]"#).unwrap(), vec!["x", "y"]);
        assert!(parse_index_names("{}").is_err());
    }

    #[tokio::test]
    async fn routes_each_store_to_its_listing_endpoint() {
        let server = MockServer::start();
        let qdrant = server.mock(|when, then| {
            when.method(POST).path("/qdrant/listcollection");
            then.status(200)
                .json_body(json!(json!({"message": [{"name": "docs"}]}).to_string()));
        });
        let azure = server.mock(|when, then| {
            when.method(POST).path("/azuresearch/listindexes");
            then.status(200).json_body(json!(["hrindex"]));
        });

        let client = VectorStoreClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.list_indexes("Qdrant").await.unwrap(), vec!["docs"]);
        assert_eq!(client.list_indexes("AzureOpenAI").await.unwrap(), vec!["hrindex"]);
        assert!(client.list_indexes("Chroma").await.unwrap().is_empty());
        qdrant.assert_calls(1);
        azure.assert_calls(1);
    }
}
