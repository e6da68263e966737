use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

use super::backend_client::BackendClient;
use super::inference_client::{InferenceClient, InferenceRequest, Reply};
use super::local_store::LocalStore;
use crate::error::{AppError, AppResult, GENERIC_FAILURE_MESSAGE};
use crate::models::{ChatEntry, ChatMessage, ChatRole, FormState, RecentChat};

/// Change observed on a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    Appended(ChatEntry),
    SessionSelected(Option<String>),
}

/// Ordered in-memory transcript of the conversation on screen, plus the
/// session it belongs to and the cache/routing flags sent with each message.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
    session_id: Option<String>,
    caching_enabled: Option<bool>,
    routing_enabled: Option<bool>,
    events: Option<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript that reports every change to `events`.
    pub fn with_events(events: mpsc::UnboundedSender<TranscriptEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn flags(&self) -> (Option<bool>, Option<bool>) {
        (self.caching_enabled, self.routing_enabled)
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.emit(TranscriptEvent::Appended(entry.clone()));
        self.entries.push(entry);
    }

    fn select(&mut self, session_id: Option<String>, entries: Vec<ChatEntry>) {
        self.session_id = session_id.clone();
        self.entries = entries;
        self.emit(TranscriptEvent::SessionSelected(session_id));
    }

    fn flags_from(&mut self, form: &FormState) {
        self.caching_enabled = Some(form.cache_enabled);
        self.routing_enabled = Some(form.routing_enabled);
    }

    fn emit(&self, event: TranscriptEvent) {
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is watching anymore.
            let _ = events.send(event);
        }
    }
}

pub struct ChatService {
    backend: BackendClient,
    inference: InferenceClient,
    store: LocalStore,
}

impl ChatService {
    pub fn new(backend: BackendClient, inference: InferenceClient, store: LocalStore) -> Self {
        Self {
            backend,
            inference,
            store,
        }
    }

    /// Sends `text` in the transcript's session. The user entry is appended
    /// before any request goes out; every failure after that appends exactly
    /// one fixed error entry. Blank input does nothing and returns `None`.
    pub async fn send_message(&self, transcript: &mut Transcript, text: &str) -> Option<ChatEntry> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        transcript.push(ChatEntry::user(text));

        let reply = match self.exchange(transcript, text).await {
            Ok(reply) => ChatEntry::assistant(reply.text()),
            Err(e) => {
                error!(error = %e, "chat request failed");
                ChatEntry::assistant(GENERIC_FAILURE_MESSAGE)
            }
        };
        transcript.push(reply.clone());
        Some(reply)
    }

    async fn exchange(&self, transcript: &mut Transcript, text: &str) -> AppResult<Reply> {
        let user_id = self.current_user_id().await?;
        let settings = self.store.form_state();

        let session_id = match transcript.session_id() {
            Some(id) => id.to_string(),
            None => {
                let id = self.backend.rotate_session_id(user_id).await?;
                debug!(session = %id, "started session");
                let entries = transcript.entries.clone();
                transcript.select(Some(id.clone()), entries);
                id
            }
        };
        let (caching_enabled, routing_enabled) = transcript.flags();

        let record = |role: ChatRole, message: &str| ChatMessage {
            id: None,
            user_id,
            session_id: session_id.clone(),
            role: role.as_wire().to_string(),
            message: message.to_string(),
            updated_date_time: Some(Utc::now()),
            caching_enabled,
            routing_enabled,
        };

        self.backend
            .append_chat_history(&record(ChatRole::User, text))
            .await?;

        let request = InferenceRequest::from_settings(
            user_id,
            &session_id,
            text,
            &settings,
            caching_enabled,
            routing_enabled,
        );
        let reply = self.inference.ask(&request).await?;

        if let Reply::Answer(answer) = &reply {
            if let Err(e) = self
                .backend
                .append_chat_history(&record(ChatRole::Assistant, answer))
                .await
            {
                warn!(error = %e, "failed to store assistant reply");
            }
        }
        Ok(reply)
    }

    async fn current_user_id(&self) -> AppResult<i64> {
        let account = self.store.account();
        if account.unique_id.is_empty() {
            return Err(AppError::NotAuthenticated("no signed-in account".to_string()));
        }
        Ok(self.backend.get_user_by_unique_id(&account.unique_id).await?.id)
    }

    /// Shows a stored session, or an empty transcript when `session_id` is
    /// `None`. Flags come from the newest history entry and fall back to the
    /// local settings when the history cannot be read.
    pub async fn open_session(
        &self,
        transcript: &mut Transcript,
        session_id: Option<&str>,
    ) -> AppResult<()> {
        let form = self.store.form_state();
        let Some(session_id) = session_id else {
            transcript.select(None, Vec::new());
            transcript.flags_from(&form);
            return Ok(());
        };

        match self.backend.chat_history(session_id).await {
            Ok(history) => {
                let entries = history.iter().map(ChatEntry::from).collect();
                transcript.select(Some(session_id.to_string()), entries);
                match history.iter().max_by_key(|m| m.updated_date_time) {
                    Some(newest) => {
                        transcript.caching_enabled = newest.caching_enabled;
                        transcript.routing_enabled = newest.routing_enabled;
                    }
                    None => transcript.flags_from(&form),
                }
                Ok(())
            }
            Err(e) => {
                warn!(session = session_id, error = %e, "chat history unavailable");
                transcript.select(Some(session_id.to_string()), Vec::new());
                transcript.flags_from(&form);
                Err(e)
            }
        }
    }

    /// Starts a new conversation under a freshly issued session id.
    pub async fn new_chat(&self, transcript: &mut Transcript) -> AppResult<String> {
        let user_id = self.current_user_id().await?;
        let session_id = self.backend.rotate_session_id(user_id).await?;
        transcript.select(Some(session_id.clone()), Vec::new());
        transcript.flags_from(&self.store.form_state());
        Ok(session_id)
    }

    pub async fn recent_chats(&self) -> AppResult<Vec<RecentChat>> {
        let account = self.store.account();
        recent_chats(&self.backend, &account.unique_id).await
    }

    pub async fn delete_chat(&self, session_id: &str) -> AppResult<bool> {
        delete_chat(&self.backend, session_id).await
    }
}

/// The user's sessions, each labelled by its newest user message, newest
/// first. Sessions whose history cannot be read or holds no user message
/// are left out.
pub async fn recent_chats(backend: &BackendClient, unique_id: &str) -> AppResult<Vec<RecentChat>> {
    if unique_id.is_empty() {
        return Err(AppError::NotAuthenticated("no signed-in account".to_string()));
    }
    let user = backend.get_user_by_unique_id(unique_id).await?;
    let sessions = backend.user_chat_sessions(user.id).await?;

    let mut seen = HashSet::new();
    let session_ids: Vec<String> = sessions
        .into_iter()
        .map(|s| s.session_id)
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    let histories = join_all(session_ids.iter().map(|id| backend.chat_history(id))).await;

    let mut chats: Vec<RecentChat> = session_ids
        .into_iter()
        .zip(histories)
        .filter_map(|(session_id, history)| {
            let history = match history {
                Ok(history) => history,
                Err(e) => {
                    warn!(session = %session_id, error = %e, "skipping unreadable session");
                    return None;
                }
            };
            history
                .into_iter()
                .filter(|m| m.chat_role() == ChatRole::User)
                .max_by_key(|m| m.updated_date_time)
                .map(|m| RecentChat {
                    session_id,
                    message: m.message,
                    timestamp: m.updated_date_time,
                })
        })
        .collect();

    chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(chats)
}

/// Deletes a session's history. `Ok(false)` when the backend answered
/// without confirming the deletion.
pub async fn delete_chat(backend: &BackendClient, session_id: &str) -> AppResult<bool> {
    let deleted = backend.delete_chat_history(session_id).await?;
    if !deleted {
        warn!(session = session_id, "chat deletion not confirmed");
    }
    Ok(deleted)
}

/// Background refresh of the recent-chats list. The newest result replaces
/// the previous one; dropping the poller stops it.
pub struct RecentChatsPoller {
    updates: watch::Receiver<Vec<RecentChat>>,
    handle: JoinHandle<()>,
}

impl RecentChatsPoller {
    pub fn spawn(backend: BackendClient, unique_id: String, every: Duration) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let period = every.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(period));
            while ticks.next().await.is_some() {
                match recent_chats(&backend, &unique_id).await {
                    Ok(chats) => {
                        if tx.send(chats).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "recent chats refresh failed"),
                }
            }
        });

        Self {
            updates: rx,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<RecentChat>> {
        self.updates.clone()
    }

    pub fn latest(&self) -> Vec<RecentChat> {
        self.updates.borrow().clone()
    }
}

impl Drop for RecentChatsPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountProfile, ASSISTANT_ROLE, USER_ROLE};
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        server: MockServer,
        store: LocalStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = LocalStore::new(dir.path()).unwrap();
            store
                .save_account(&AccountProfile {
                    unique_id: "oid-1".into(),
                    name: "Ana".into(),
                    access_token: Some("tok".into()),
                    ..Default::default()
                })
                .unwrap();
            store
                .save_form_state(&FormState {
                    user_id: 7,
                    department_name: "HR".into(),
                    llm_vendor: "AzureOpenAI".into(),
                    llm_model: "gpt-4o".into(),
                    cache_enabled: true,
                    ..Default::default()
                })
                .unwrap();
            Self {
                _dir: dir,
                server: MockServer::start(),
                store,
            }
        }

        fn backend(&self) -> BackendClient {
            BackendClient::new(&self.server.url("/api"), Duration::from_secs(5)).unwrap()
        }

        fn service(&self) -> ChatService {
            let inference =
                InferenceClient::new(&self.server.url("/chat"), Duration::from_secs(5)).unwrap();
            ChatService::new(self.backend(), inference, self.store.clone())
        }

        fn mock_user(&self) {
            self.server.mock(|when, then| {
                when.method(GET).path("/api/User/unique/oid-1");
                then.status(200).json_body(json!({"id": 7, "name": "Ana"}));
            });
        }
    }

    fn messages(transcript: &Transcript) -> Vec<(ChatRole, &str)> {
        transcript
            .entries()
            .iter()
            .map(|e| (e.role, e.message.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let fx = Fixture::new();
        let mut transcript = Transcript::new();
        assert!(fx.service().send_message(&mut transcript, "   \n").await.is_none());
        assert!(transcript.entries().is_empty());
    }

    #[tokio::test]
    async fn send_persists_both_turns_and_starts_a_session() {
        let fx = Fixture::new();
        fx.mock_user();
        let rotate = fx.server.mock(|when, then| {
            when.method(PUT).path("/api/Sessions/UpdateSessionIdByUserId/7");
            then.status(200).json_body(json!({"sessionId": "new-1"}));
        });
        let user_turn = fx.server.mock(|when, then| {
            when.method(POST)
                .path("/api/ChatHistory")
                .json_body_includes(json!({"role": USER_ROLE, "sessionId": "new-1"}).to_string());
            then.status(201);
        });
        let assistant_turn = fx.server.mock(|when, then| {
            when.method(POST)
                .path("/api/ChatHistory")
                .json_body_includes(json!({"role": ASSISTANT_ROLE, "message": "42"}).to_string());
            then.status(201);
        });
        let inference = fx.server.mock(|when, then| {
            when.method(POST)
                .path("/chat")
                .json_body_includes(
                    json!({"user_query": "question?", "user_sessionid": "new-1", "llm_deployment": "gpt-4o"})
                        .to_string(),
                );
            then.status(200).body(r#"{"message":"42"}"#);
        });

        let mut transcript = Transcript::new();
        let reply = fx
            .service()
            .send_message(&mut transcript, "  question?  ")
            .await
            .unwrap();

        assert_eq!(reply.message, "42");
        assert_eq!(transcript.session_id(), Some("new-1"));
        assert_eq!(
            messages(&transcript),
            vec![(ChatRole::User, "question?"), (ChatRole::Assistant, "42")]
        );
        rotate.assert_calls(1);
        user_turn.assert_calls(1);
        inference.assert_calls(1);
        assistant_turn.assert_calls(1);
    }

    #[tokio::test]
    async fn non_success_inference_appends_one_fixed_error() {
        let fx = Fixture::new();
        fx.mock_user();
        fx.server.mock(|when, then| {
            when.method(POST).path("/api/ChatHistory");
            then.status(201);
        });
        fx.server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(500).body("model unavailable");
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::with_events(tx);
        let service = fx.service();
        service
            .open_session(&mut transcript, Some("s-1"))
            .await
            .ok();
        service.send_message(&mut transcript, "hi").await;

        assert_eq!(
            messages(&transcript),
            vec![
                (ChatRole::User, "hi"),
                (ChatRole::Assistant, GENERIC_FAILURE_MESSAGE)
            ]
        );
        let mut appended = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TranscriptEvent::Appended(entry) = event {
                appended.push(entry.role);
            }
        }
        assert_eq!(appended, vec![ChatRole::User, ChatRole::Assistant]);
    }

    #[tokio::test]
    async fn failed_user_lookup_keeps_optimistic_entry() {
        let fx = Fixture::new();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/User/unique/oid-1");
            then.status(500);
        });
        let history = fx.server.mock(|when, then| {
            when.method(POST).path("/api/ChatHistory");
            then.status(201);
        });

        let mut transcript = Transcript::new();
        fx.service().send_message(&mut transcript, "hello").await;
        assert_eq!(
            messages(&transcript),
            vec![
                (ChatRole::User, "hello"),
                (ChatRole::Assistant, GENERIC_FAILURE_MESSAGE)
            ]
        );
        history.assert_calls(0);
    }

    #[tokio::test]
    async fn user_entry_is_visible_before_the_backend_answers() {
        let fx = Fixture::new();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/User/unique/oid-1");
            then.status(500).delay(Duration::from_millis(300));
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = fx.service();
        let task = tokio::spawn(async move {
            let mut transcript = Transcript::with_events(tx);
            service.send_message(&mut transcript, "early").await;
        });

        let first = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("user entry before the lookup finished")
            .unwrap();
        match first {
            TranscriptEvent::Appended(entry) => {
                assert_eq!(entry.role, ChatRole::User);
                assert_eq!(entry.message, "early");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unparseable_reply_shows_format_error_without_storing_it() {
        let fx = Fixture::new();
        fx.mock_user();
        let stored = fx.server.mock(|when, then| {
            when.method(POST).path("/api/ChatHistory");
            then.status(201);
        });
        fx.server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body("<html>gateway</html>");
        });

        let mut transcript = Transcript::new();
        let service = fx.service();
        service.open_session(&mut transcript, None).await.unwrap();
        transcript.session_id = Some("s-1".into());
        service.send_message(&mut transcript, "hi").await;

        assert_eq!(
            transcript.entries()[1].message,
            "Error: Invalid response format"
        );
        stored.assert_calls(1);
    }

    #[tokio::test]
    async fn open_session_reads_history_and_newest_flags() {
        let fx = Fixture::new();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/s-1");
            then.status(200).json_body(json!([
                {"role": "User", "message": "a", "updatedDateTime": "2024-05-01T10:00:00Z",
                 "cachingEnabled": true, "routingEnabled": true},
                {"role": "assistant", "message": "b", "updatedDateTime": "2024-05-01T10:00:05Z",
                 "cachingEnabled": false, "routingEnabled": true}
            ]));
        });

        let mut transcript = Transcript::new();
        fx.service()
            .open_session(&mut transcript, Some("s-1"))
            .await
            .unwrap();
        assert_eq!(
            messages(&transcript),
            vec![(ChatRole::User, "a"), (ChatRole::Assistant, "b")]
        );
        assert_eq!(transcript.flags(), (Some(false), Some(true)));
    }

    #[tokio::test]
    async fn unreadable_history_falls_back_to_local_flags() {
        let fx = Fixture::new();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/s-1");
            then.status(503);
        });

        let mut transcript = Transcript::new();
        let result = fx.service().open_session(&mut transcript, Some("s-1")).await;
        assert!(result.is_err());
        assert!(transcript.entries().is_empty());
        assert_eq!(transcript.flags(), (Some(true), Some(false)));
    }

    #[tokio::test]
    async fn recent_chats_use_newest_user_message() {
        let fx = Fixture::new();
        fx.mock_user();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/user/7");
            then.status(200).json_body(json!([
                {"sessionId": "old"}, {"sessionId": "new"}, {"sessionId": "old"}, {"sessionId": "bot-only"}
            ]));
        });
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/old");
            then.status(200).json_body(json!([
                {"role": "User", "message": "first", "updatedDateTime": "2024-01-01T00:00:00Z"},
                {"role": "User", "message": "second", "updatedDateTime": "2024-01-02T00:00:00Z"},
                {"role": "assistant", "message": "reply", "updatedDateTime": "2024-01-03T00:00:00Z"}
            ]));
        });
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/new");
            then.status(200).json_body(json!([
                {"role": "User", "message": "latest", "updatedDateTime": "2024-03-01T00:00:00Z"}
            ]));
        });
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/bot-only");
            then.status(200).json_body(json!([
                {"role": "assistant", "message": "hello", "updatedDateTime": "2024-04-01T00:00:00Z"}
            ]));
        });

        let chats = fx.service().recent_chats().await.unwrap();
        let labels: Vec<(&str, &str)> = chats
            .iter()
            .map(|c| (c.session_id.as_str(), c.message.as_str()))
            .collect();
        assert_eq!(labels, vec![("new", "latest"), ("old", "second")]);
    }

    #[tokio::test]
    async fn poller_publishes_and_stops_when_dropped() {
        let fx = Fixture::new();
        fx.mock_user();
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/user/7");
            then.status(200).json_body(json!([{"sessionId": "s-1"}]));
        });
        fx.server.mock(|when, then| {
            when.method(GET).path("/api/ChatHistory/session/s-1");
            then.status(200).json_body(json!([
                {"role": "User", "message": "ping", "updatedDateTime": "2024-01-01T00:00:00Z"}
            ]));
        });

        let poller =
            RecentChatsPoller::spawn(fx.backend(), "oid-1".into(), Duration::from_millis(50));
        let mut updates = poller.subscribe();
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(poller.latest()[0].message, "ping");

        drop(poller);
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while updates.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn delete_requires_no_content() {
        let fx = Fixture::new();
        fx.server.mock(|when, then| {
            when.method(DELETE).path("/api/ChatHistory/session/s-1");
            then.status(204);
        });
        assert!(fx.service().delete_chat("s-1").await.unwrap());
    }
}
