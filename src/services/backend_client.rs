use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::config_service::Config;
use super::http::{build_client, check_status, decode_json};
use crate::error::{AppError, AppResult};
use crate::models::{
    Category, ChatMessage, CreatedRecord, DataIngestionRecord, Department, ModelRef,
    NewDepartment, NewIngestionRecord, NewUser, Session, SessionIdResponse, SessionParameters,
    User, UserChatSession, VectorAssignment,
};

/// REST client for the application backend (users, departments, categories,
/// sessions, chat history, ingestion records and model catalogues).
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

fn seg(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            config.api_base_url()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> AppResult<reqwest::Response> {
        debug!(what, "backend request");
        let response = request.header("Accept", "application/json").send().await?;
        check_status(response, what).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> AppResult<T> {
        let response = self.send(self.client.get(self.url(path)), what).await?;
        decode_json(response, what).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> AppResult<T> {
        let response = self
            .send(self.client.post(self.url(path)).json(body), what)
            .await?;
        decode_json(response, what).await
    }

    /// Sends a body and ignores whatever the backend answers with.
    async fn write<B: Serialize + ?Sized>(
        &self,
        request: RequestBuilder,
        body: &B,
        what: &str,
    ) -> AppResult<reqwest::Response> {
        self.send(request.json(body), what).await
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user_by_unique_id(&self, unique_id: &str) -> AppResult<User> {
        self.get_json(&format!("User/unique/{}", seg(unique_id)), "user")
            .await
    }

    pub async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let value: Value = self.post_json("User", user, "create user").await?;
        User::from_create_response(value).map_err(|e| AppError::Decode(format!("create user: {}", e)))
    }

    pub async fn list_user_vectors(
        &self,
        user_id: i64,
        category_id: &str,
        vector_store: &str,
    ) -> AppResult<Vec<VectorAssignment>> {
        self.get_json(
            &format!(
                "User/user/{}/category/{}/vectors?type={}",
                user_id,
                seg(category_id),
                seg(vector_store)
            ),
            "user vectors",
        )
        .await
    }

    // ------------------------------------------------------------------
    // Departments and categories
    // ------------------------------------------------------------------

    pub async fn list_departments(&self) -> AppResult<Vec<Department>> {
        self.get_json("Department", "departments").await
    }

    pub async fn get_department(&self, department_id: &str) -> AppResult<Department> {
        self.get_json(&format!("Department/{}", seg(department_id)), "department")
            .await
    }

    /// Department id linked to a category. An empty answer means none exists.
    pub async fn department_id_by_category(&self, category_id: &str) -> AppResult<Option<String>> {
        let value: Value = self
            .get_json(
                &format!("Department/departmentIdByCategoryId/{}", seg(category_id)),
                "department by category",
            )
            .await?;
        Ok(id_from_value(&value))
    }

    pub async fn create_department(&self, department: &NewDepartment) -> AppResult<Department> {
        self.post_json("Department", department, "create department")
            .await
    }

    pub async fn update_department(
        &self,
        department_id: &str,
        department: &NewDepartment,
    ) -> AppResult<()> {
        let path = format!("Department/{}", seg(department_id));
        self.write(self.client.put(self.url(&path)), department, "update department")
            .await?;
        Ok(())
    }

    pub async fn delete_department(&self, department_id: &str) -> AppResult<()> {
        let path = format!("Department/{}", seg(department_id));
        self.send(self.client.delete(self.url(&path)), "delete department")
            .await?;
        Ok(())
    }

    pub async fn department_vector_indexes(&self, department_id: &str) -> AppResult<Vec<Value>> {
        self.get_json(
            &format!("VectorStore/department/{}", seg(department_id)),
            "department vector indexes",
        )
        .await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.get_json("Category", "categories").await
    }

    pub async fn search_categories(&self, name: &str) -> AppResult<Vec<Category>> {
        self.get_json(
            &format!("Category/search?name={}", seg(name)),
            "category search",
        )
        .await
    }

    pub async fn create_category(&self, name: &str) -> AppResult<Category> {
        self.post_json("Category", &serde_json::json!({ "name": name }), "create category")
            .await
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// The user's session. A `null` body is treated the same as a 404.
    pub async fn get_session_by_user_id(&self, user_id: i64) -> AppResult<Session> {
        let value: Value = self
            .get_json(&format!("Sessions/GetSessionByUserId/{}", user_id), "session")
            .await?;
        if value.is_null() {
            return Err(AppError::NotFound("session".to_string()));
        }
        serde_json::from_value(value).map_err(|e| AppError::Decode(format!("session: {}", e)))
    }

    /// Updates the user's session. Returns the stored record when the backend echoes it.
    pub async fn update_session_by_user_id(
        &self,
        user_id: i64,
        session: &Session,
    ) -> AppResult<Option<Session>> {
        let path = format!("Sessions/UpdateSessionByUserId/{}", user_id);
        let response = self
            .write(self.client.put(self.url(&path)), session, "update session")
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str::<Session>(&text).ok())
    }

    /// Creates a session. Returns the stored record when the backend echoes it.
    pub async fn create_session(&self, session: &Session) -> AppResult<Option<Session>> {
        let response = self
            .write(self.client.post(self.url("Sessions")), session, "create session")
            .await?;
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str::<Session>(&text).ok())
    }

    pub async fn update_session_parameters(
        &self,
        user_id: i64,
        params: &SessionParameters,
    ) -> AppResult<()> {
        let path = format!("Sessions/UpdateSessionByUserIdForParameters/{}", user_id);
        self.write(self.client.put(self.url(&path)), params, "update session parameters")
            .await?;
        Ok(())
    }

    /// Issues a fresh session id for the user (starts a new conversation).
    pub async fn rotate_session_id(&self, user_id: i64) -> AppResult<String> {
        let path = format!("Sessions/UpdateSessionIdByUserId/{}", user_id);
        let response = self
            .send(self.client.put(self.url(&path)), "rotate session id")
            .await?;
        let rotated: SessionIdResponse = decode_json(response, "rotate session id").await?;
        if rotated.session_id.is_empty() {
            return Err(AppError::Decode("rotate session id: empty session id".to_string()));
        }
        Ok(rotated.session_id)
    }

    // ------------------------------------------------------------------
    // Chat history
    // ------------------------------------------------------------------

    pub async fn chat_history(&self, session_id: &str) -> AppResult<Vec<ChatMessage>> {
        self.get_json(
            &format!("ChatHistory/session/{}", seg(session_id)),
            "chat history",
        )
        .await
    }

    pub async fn user_chat_sessions(&self, user_id: i64) -> AppResult<Vec<UserChatSession>> {
        self.get_json(&format!("ChatHistory/user/{}", user_id), "user chat sessions")
            .await
    }

    pub async fn append_chat_history(&self, message: &ChatMessage) -> AppResult<()> {
        self.write(self.client.post(self.url("ChatHistory")), message, "append chat history")
            .await?;
        Ok(())
    }

    /// Deletes a session's history. Only a 204 answer counts as deleted.
    pub async fn delete_chat_history(&self, session_id: &str) -> AppResult<bool> {
        let path = format!("ChatHistory/session/{}", seg(session_id));
        let response = self
            .send(
                self.client.delete(self.url(&path)).header("accept", "text/plain"),
                "delete chat history",
            )
            .await?;
        Ok(response.status() == StatusCode::NO_CONTENT)
    }

    // ------------------------------------------------------------------
    // Model catalogues
    // ------------------------------------------------------------------

    pub async fn llm_refs(&self) -> AppResult<Vec<ModelRef>> {
        self.get_json("LLMRef", "llm refs").await
    }

    pub async fn emb_llm_refs(&self) -> AppResult<Vec<ModelRef>> {
        self.get_json("EmbLLMRef", "embedding llm refs").await
    }

    // ------------------------------------------------------------------
    // Data ingestion
    // ------------------------------------------------------------------

    pub async fn list_ingestions(&self) -> AppResult<Vec<DataIngestionRecord>> {
        self.get_json("DataIngestion", "data ingestion").await
    }

    pub async fn create_ingestion(&self, record: &NewIngestionRecord) -> AppResult<CreatedRecord> {
        self.post_json("DataIngestion", record, "create data ingestion")
            .await
    }

    pub async fn delete_ingestion(&self, id: &str) -> AppResult<()> {
        let path = format!("DataIngestion/{}", seg(id));
        self.send(self.client.delete(self.url(&path)), "delete data ingestion")
            .await?;
        Ok(())
    }
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(id_from_value),
        Value::Object(map) => map.get("id").and_then(id_from_value),
        _ => None,
    }
}
