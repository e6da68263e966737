mod context;
mod config;
mod auth;
mod settings;
mod chat;
mod export;
mod ingest;
mod departments;

pub use context::*;
pub use config::*;
pub use auth::*;
pub use settings::*;
pub use chat::*;
pub use export::*;
pub use ingest::*;
pub use departments::*;
