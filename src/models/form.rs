use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::lenient;
use super::session::{format_temperature, Session, SessionParameters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DepartmentRef {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

/// Local mirror of the active user's form and session settings.
///
/// Written on every settings change and reconciled against the remote
/// session on load. Nothing keeps it consistent with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "uniqueAzureId", default, deserialize_with = "lenient::string")]
    pub unique_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub department_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub department_name: String,
    #[serde(default)]
    pub departments: Vec<DepartmentRef>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub admin: bool,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub cache_enabled: bool,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub routing_enabled: bool,
    #[serde(default, deserialize_with = "lenient::string")]
    pub llm_vendor: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub llm_model: String,
    #[serde(rename = "embLLMVendor", default, deserialize_with = "lenient::string")]
    pub emb_llm_vendor: String,
    #[serde(rename = "embLLMModel", default, deserialize_with = "lenient::string")]
    pub emb_llm_model: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub chunking_type: String,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub temp: f64,
    #[serde(default, deserialize_with = "lenient::u32")]
    pub max_tokens: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_store: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub vector_index: String,
}

impl FormState {
    /// Overlays a remote session onto the form. Identity fields stay local.
    pub fn apply_session(&mut self, session: &Session) {
        if !session.session_id.is_empty() {
            self.session_id = session.session_id.clone();
        }
        self.admin = session.admin;
        self.cache_enabled = session.cache_enabled;
        self.routing_enabled = session.routing_enabled;
        self.llm_vendor = session.llm_vendor.clone();
        self.llm_model = session.llm_model.clone();
        self.emb_llm_vendor = session.emb_llm_vendor.clone();
        self.emb_llm_model = session.emb_llm_model.clone();
        self.chunking_type = session.chunking_type.clone();
        self.temp = format_temperature(session.temp);
        self.max_tokens = session.max_tokens;
        self.vector_store = session.vector_store.clone();
        self.vector_index = session.vector_index.clone();
    }

    /// Session payload for a save, stamped with the current time.
    pub fn to_session(&self) -> Session {
        Session {
            session_id: self.session_id.clone(),
            user_id: self.user_id,
            admin: self.admin,
            cache_enabled: self.cache_enabled,
            routing_enabled: self.routing_enabled,
            temp: format_temperature(self.temp),
            max_tokens: self.max_tokens,
            llm_vendor: self.llm_vendor.clone(),
            llm_model: self.llm_model.clone(),
            emb_llm_vendor: self.emb_llm_vendor.clone(),
            emb_llm_model: self.emb_llm_model.clone(),
            unique_user_id: self.unique_id.clone(),
            chunking_type: self.chunking_type.clone(),
            vector_store: self.vector_store.clone(),
            vector_index: self.vector_index.clone(),
            updated_date_time: Some(Utc::now()),
        }
    }

    pub fn parameters(&self) -> SessionParameters {
        SessionParameters {
            llm_vendor: self.llm_vendor.clone(),
            llm_model: self.llm_model.clone(),
            temp: format_temperature(self.temp),
            max_tokens: self.max_tokens,
            vector_store: self.vector_store.clone(),
            vector_index: self.vector_index.clone(),
        }
    }

    pub fn apply_parameters(&mut self, params: &SessionParameters) {
        self.llm_vendor = params.llm_vendor.clone();
        self.llm_model = params.llm_model.clone();
        self.temp = format_temperature(params.temp);
        self.max_tokens = params.max_tokens;
        self.vector_store = params.vector_store.clone();
        self.vector_index = params.vector_index.clone();
    }

    pub fn has_user(&self) -> bool {
        self.user_id > 0
    }
}

/// Identity blob kept after sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AccountProfile {
    pub fn is_signed_in(&self) -> bool {
        !self.unique_id.is_empty() && self.access_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_a_session_keeps_identity_fields() {
        let mut form = FormState {
            user_id: 9,
            name: "Ana".into(),
            department_name: "HR".into(),
            ..Default::default()
        };
        let session = Session {
            session_id: "s-1".into(),
            temp: 0.66,
            max_tokens: 100,
            llm_vendor: "OpenAI".into(),
            ..Default::default()
        };
        form.apply_session(&session);
        assert_eq!(form.user_id, 9);
        assert_eq!(form.name, "Ana");
        assert_eq!(form.session_id, "s-1");
        assert_eq!(form.temp, 0.7);
        assert_eq!(form.llm_vendor, "OpenAI");
    }

    #[test]
    fn reads_legacy_mirror_with_string_numbers() {
        let form: FormState = serde_json::from_str(
            r#"{"userId":"12","temp":"0.3","maxTokens":"900","cacheEnabled":"true","uniqueAzureId":"oid"}"#,
        )
        .unwrap();
        assert_eq!(form.user_id, 12);
        assert_eq!(form.temp, 0.3);
        assert_eq!(form.max_tokens, 900);
        assert!(form.cache_enabled);
        assert_eq!(form.unique_id, "oid");
    }

    #[test]
    fn empty_mirror_reads_as_defaults() {
        let form: FormState = serde_json::from_str("{}").unwrap();
        assert_eq!(form, FormState::default());
        assert!(!form.has_user());
    }
}
