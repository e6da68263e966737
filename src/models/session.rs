use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

pub const DEFAULT_LLM_VENDOR: &str = "AzureOpenAI";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMB_LLM_VENDOR: &str = "AzureOpenAI";
pub const DEFAULT_EMB_LLM_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHUNKING_TYPE: &str = "Semantic";
pub const DEFAULT_VECTOR_STORE: &str = "AzureOpenAI";
pub const DEFAULT_VECTOR_INDEX: &str = "hrindex";
pub const DEFAULT_MAX_TOKENS: u32 = 6450;

/// Remote session record: the user's active model and vector-store
/// configuration plus the chat continuity token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub admin: bool,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub cache_enabled: bool,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub routing_enabled: bool,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub temp: f64,
    #[serde(default, deserialize_with = "lenient::u32")]
    pub max_tokens: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub llm_vendor: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub llm_model: String,
    #[serde(rename = "embLLMVendor", default, deserialize_with = "lenient::string")]
    pub emb_llm_vendor: String,
    #[serde(rename = "embLLMModel", default, deserialize_with = "lenient::string")]
    pub emb_llm_model: String,
    #[serde(rename = "uniqueuserId", default, deserialize_with = "lenient::string")]
    pub unique_user_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub chunking_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_store: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_index: String,
    #[serde(default)]
    pub updated_date_time: Option<DateTime<Utc>>,
}

impl Session {
    /// Session created for a user signing in for the first time.
    pub fn with_defaults(user_id: i64, unique_user_id: &str) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            admin: false,
            cache_enabled: false,
            routing_enabled: false,
            temp: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            llm_vendor: DEFAULT_LLM_VENDOR.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            emb_llm_vendor: DEFAULT_EMB_LLM_VENDOR.to_string(),
            emb_llm_model: DEFAULT_EMB_LLM_MODEL.to_string(),
            unique_user_id: unique_user_id.to_string(),
            chunking_type: DEFAULT_CHUNKING_TYPE.to_string(),
            vector_store: DEFAULT_VECTOR_STORE.to_string(),
            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
            updated_date_time: Some(Utc::now()),
        }
    }
}

/// Subset of session fields edited from the parameter panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionParameters {
    pub llm_vendor: String,
    pub llm_model: String,
    pub temp: f64,
    pub max_tokens: u32,
    pub vector_store: String,
    pub vector_index: String,
}

/// Response of the session-rotation endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdResponse {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: String,
}

/// Rounds to one decimal place. Out-of-range values pass through untouched.
pub fn format_temperature(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}

/// Parses the leading decimal number of `raw` and formats it to one decimal.
/// Unparseable input becomes `0.0`.
pub fn parse_temperature(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let mut seen_dot = false;
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| match c {
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            '-' | '+' => *i == 0,
            c => c.is_ascii_digit(),
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    format_temperature(trimmed[..end].parse().unwrap_or(0.0))
}

/// Parses the leading integer of `raw`. Unparseable or negative input becomes `0`.
pub fn parse_max_tokens(raw: &str) -> u32 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u64>()
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_session_record() {
        let session: Session = serde_json::from_str(
            r#"{
                "sessionId": "abc",
                "userId": 7,
                "admin": false,
                "cacheEnabled": "true",
                "routingEnabled": false,
                "temp": "0.5",
                "maxTokens": 6450,
                "llmVendor": "AzureOpenAI",
                "llmModel": "gpt-4o",
                "embLLMVendor": "AzureOpenAI",
                "embLLMModel": "text-embedding-ada-002",
                "chunkingType": "Semantic",
                "vectorStore": "Qdrant",
                "vectorIndex": "hr",
                "updatedDateTime": "2024-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(session.session_id, "abc");
        assert_eq!(session.user_id, 7);
        assert!(session.cache_enabled);
        assert_eq!(session.temp, 0.5);
        assert_eq!(session.emb_llm_model, "text-embedding-ada-002");
        assert!(session.updated_date_time.is_some());
    }

    #[test]
    fn serializes_backend_field_names() {
        let value = serde_json::to_value(Session::with_defaults(3, "oid-1")).unwrap();
        assert_eq!(value["userId"], 3);
        assert_eq!(value["embLLMVendor"], DEFAULT_EMB_LLM_VENDOR);
        assert_eq!(value["uniqueuserId"], "oid-1");
        assert_eq!(value["maxTokens"], DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn numeric_fields_are_formatted_not_range_checked() {
        assert_eq!(parse_temperature("0.74"), 0.7);
        assert_eq!(parse_temperature("1.96"), 2.0);
        assert_eq!(parse_temperature("abc"), 0.0);
        assert_eq!(parse_temperature("0.3xyz"), 0.3);
        assert_eq!(parse_temperature("0.3.5"), 0.3);
        assert_eq!(parse_temperature("1..2"), 1.0);
        assert_eq!(parse_max_tokens("812.9"), 812);
        assert_eq!(parse_max_tokens("-5"), 0);
        assert_eq!(parse_max_tokens(""), 0);
        assert_eq!(format_temperature(f64::NAN), 0.0);
    }
}
