pub mod backend_client;
pub mod chat_service;
pub mod config_service;
pub mod department_service;
pub mod export_service;
pub(crate) mod http;
pub mod identity_service;
pub mod inference_client;
pub mod ingestion_service;
pub mod local_store;
pub mod settings_service;
pub mod vector_store_client;
