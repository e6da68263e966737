use tracing::error;

use crate::error::{AppError, AppResult};
use crate::models::Notice;
use crate::services::backend_client::BackendClient;
use crate::services::chat_service::ChatService;
use crate::services::config_service::{get_effective_config, Config};
use crate::services::identity_service::IdentityClient;
use crate::services::inference_client::InferenceClient;
use crate::services::ingestion_service::IngestionClient;
use crate::services::local_store::LocalStore;
use crate::services::vector_store_client::VectorStoreClient;

/// Effective configuration and local state shared by every command. Clients
/// are built on demand so a command only needs the endpoints it talks to.
pub struct AppContext {
    pub config: Config,
    pub store: LocalStore,
}

impl AppContext {
    pub fn load() -> AppResult<Self> {
        Ok(Self {
            config: get_effective_config()?,
            store: LocalStore::open_default()?,
        })
    }

    pub fn backend(&self) -> AppResult<BackendClient> {
        BackendClient::from_config(&self.config)
    }

    pub fn identity(&self) -> AppResult<IdentityClient> {
        IdentityClient::new(&self.config)
    }

    pub fn vector_stores(&self) -> AppResult<VectorStoreClient> {
        VectorStoreClient::from_config(&self.config)
    }

    pub fn ingestion_worker(&self) -> AppResult<IngestionClient> {
        IngestionClient::from_config(&self.config)
    }

    pub fn chat(&self) -> AppResult<ChatService> {
        Ok(ChatService::new(
            self.backend()?,
            InferenceClient::from_config(&self.config)?,
            self.store.clone(),
        ))
    }
}

pub(crate) fn show(notice: &Notice) {
    println!("{}", notice);
}

/// Logs a failed command and shows the fixed message for its error.
pub fn report_failure(command: &str, err: &AppError) {
    error!(command, error = %err, "command failed");
    show(&Notice::error(err.user_message()));
}
