use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::config_service::Config;
use super::http::build_client;
use crate::error::{AppError, AppResult};
use crate::models::{format_temperature, FormState};

/// Reply used when the inference answer carries no `message`.
pub const EMPTY_REPLY_MESSAGE: &str = "No data in indexes";
/// Reply used when the inference answer is not JSON at all.
pub const INVALID_FORMAT_MESSAGE: &str = "Error: Invalid response format";

const AZURE_VENDOR: &str = "AzureOpenAI";

/// Request body of the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub user_id: String,
    pub user_sessionid: String,
    pub department: String,
    pub user_query: String,
    pub embedding_mode: String,
    pub embedding_model: String,
    pub vector_store: String,
    pub index_name: String,
    pub llm_type: String,
    pub llm_model: String,
    pub vartikgpt_temp: String,
    pub max_tokens: u32,
    pub caching_enabled: Option<bool>,
    pub routing_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_deployment: Option<String>,
}

impl InferenceRequest {
    /// Builds the request from the settings mirror. Azure deployments are
    /// addressed by model name, so the model doubles as the deployment.
    pub fn from_settings(
        user_id: i64,
        session_id: &str,
        query: &str,
        settings: &FormState,
        caching_enabled: Option<bool>,
        routing_enabled: Option<bool>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_sessionid: session_id.to_string(),
            department: settings.department_name.clone(),
            user_query: query.to_string(),
            embedding_mode: settings.emb_llm_vendor.clone(),
            embedding_model: settings.emb_llm_model.clone(),
            vector_store: settings.vector_store.clone(),
            index_name: settings.vector_index.clone(),
            llm_type: settings.llm_vendor.clone(),
            llm_model: settings.llm_model.clone(),
            vartikgpt_temp: format!("{:.1}", format_temperature(settings.temp)),
            max_tokens: settings.max_tokens,
            caching_enabled,
            routing_enabled,
            llm_deployment: (settings.llm_vendor == AZURE_VENDOR)
                .then(|| settings.llm_model.clone()),
        }
    }
}

/// Answer of the inference endpoint as shown in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    /// The body held no JSON document.
    InvalidFormat,
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) => text,
            Reply::InvalidFormat => INVALID_FORMAT_MESSAGE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InferenceReply {
    #[serde(default)]
    message: Option<Value>,
}

/// Client for the inference endpoint, which answers in plain text that
/// contains a JSON document.
pub struct InferenceClient {
    client: Client,
    url: String,
}

impl InferenceClient {
    pub fn new(url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            config.chat_url()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Sends a query. Non-2xx answers are `Server` errors; a 2xx answer
    /// always yields a displayable reply.
    pub async fn ask(&self, request: &InferenceRequest) -> AppResult<Reply> {
        debug!(session = %request.user_sessionid, "inference request");
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/plain")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Server {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let text = response.text().await?;
        Ok(reply_from_text(&text))
    }
}

fn embedded_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Extracts the reply `message` from a text body holding JSON. The body may
/// also be a JSON string wrapping the document.
pub fn reply_from_text(text: &str) -> Reply {
    match parse_reply(text) {
        Some(reply) => Reply::Answer(
            reply
                .message
                .and_then(|m| match m {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .unwrap_or_else(|| EMPTY_REPLY_MESSAGE.to_string()),
        ),
        None => {
            warn!("inference response is not in JSON format");
            Reply::InvalidFormat
        }
    }
}

fn parse_reply(text: &str) -> Option<InferenceReply> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            Value::String(inner) => parse_reply(&inner),
            _ => None,
        };
    }
    embedded_json()
        .find(trimmed)
        .and_then(|m| serde_json::from_str(m.as_str()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings() -> FormState {
        FormState {
            department_name: "HR".into(),
            llm_vendor: "AzureOpenAI".into(),
            llm_model: "gpt-4o".into(),
            emb_llm_vendor: "AzureOpenAI".into(),
            emb_llm_model: "ada".into(),
            vector_store: "Qdrant".into(),
            vector_index: "hr".into(),
            temp: 0.25,
            max_tokens: 800,
            ..Default::default()
        }
    }

    #[test]
    fn request_carries_settings_and_azure_deployment() {
        let request =
            InferenceRequest::from_settings(4, "s-1", "hello", &settings(), Some(true), None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["user_id"], "4");
        assert_eq!(value["vartikgpt_temp"], "0.3");
        assert_eq!(value["llm_deployment"], "gpt-4o");
        assert_eq!(value["index_name"], "hr");
        assert_eq!(value["caching_enabled"], true);
        assert!(value["routing_enabled"].is_null());

        let mut other = settings();
        other.llm_vendor = "OpenAI".into();
        let value = serde_json::to_value(InferenceRequest::from_settings(
            4, "s-1", "hello", &other, None, None,
        ))
        .unwrap();
        assert!(value.get("llm_deployment").is_none());
    }

    #[test]
    fn reply_text_variants() {
        let text = |body: &str| reply_from_text(body).text().to_string();
        assert_eq!(text(r#"{"message":"hi there"}"#), "hi there");
        assert_eq!(text(r#""{\"message\":\"wrapped\"}""#), "wrapped");
        assert_eq!(text("result: {\"message\":\"inline\"} done"), "inline");
        assert_eq!(text("{}"), EMPTY_REPLY_MESSAGE);
        assert_eq!(reply_from_text("plain words"), Reply::InvalidFormat);
        assert_eq!(text("plain words"), INVALID_FORMAT_MESSAGE);
    }

    #[tokio::test]
    async fn non_success_status_is_a_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(500).body("exploded");
        });
        let client =
            InferenceClient::new(&format!("{}/chat", server.base_url()), Duration::from_secs(5))
                .unwrap();
        let request = InferenceRequest::from_settings(1, "s", "q", &settings(), None, None);
        let err = client.ask(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn success_returns_the_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat")
                .header("accept", "text/plain")
                .json_body_includes(json!({"user_query": "q"}).to_string());
            then.status(200)
                .header("content-type", "text/plain")
                .body(json!({"message": "answer"}).to_string());
        });
        let client =
            InferenceClient::new(&format!("{}/chat", server.base_url()), Duration::from_secs(5))
                .unwrap();
        let request = InferenceRequest::from_settings(1, "s", "q", &settings(), None, None);
        assert_eq!(client.ask(&request).await.unwrap(), Reply::Answer("answer".into()));
        mock.assert_calls(1);
    }
}
