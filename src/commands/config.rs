use clap::Subcommand;

use super::context::show;
use crate::error::AppResult;
use crate::models::Notice;
use crate::services::config_service;
use crate::services::local_store::get_app_data_dir;

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration with environment overrides applied
    Show,
    /// Set one key (api-base-url, chat-url, inject-url, vectordb-url,
    /// graph-url, authority, client-id, scopes, request-timeout-secs,
    /// poll-interval-secs)
    Set { key: String, value: String },
    /// Print the data directory
    Path,
}

pub fn run_config(action: ConfigAction) -> AppResult<()> {
    match action {
        ConfigAction::Show => {
            let config = config_service::get_effective_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value } => {
            config_service::set_value(&key, &value)?;
            show(&Notice::success(format!("{} updated", key)));
        }
        ConfigAction::Path => println!("{}", get_app_data_dir()?.display()),
    }
    Ok(())
}
