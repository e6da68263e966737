use std::path::PathBuf;

use clap::Args;

use super::context::{show, AppContext};
use crate::error::{AppError, AppResult};
use crate::models::Notice;
use crate::services::chat_service::Transcript;
use crate::services::export_service::{
    default_file_name, export_transcript, ExportFormat, EMPTY_EXPORT_MESSAGE,
};
use crate::services::local_store::get_app_data_dir;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Session to export; defaults to the current one
    #[arg(long)]
    pub session: Option<String>,
    #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
    pub format: ExportFormat,
    /// Output file; defaults to ChatHistory_<date>.<ext> in the exports directory
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run_export(ctx: &AppContext, args: ExportArgs) -> AppResult<()> {
    let session_id = args
        .session
        .unwrap_or_else(|| ctx.store.form_state().session_id);
    if session_id.is_empty() {
        return Err(AppError::Export(EMPTY_EXPORT_MESSAGE.to_string()));
    }

    let mut transcript = Transcript::new();
    ctx.chat()?
        .open_session(&mut transcript, Some(&session_id))
        .await?;
    if transcript.entries().is_empty() {
        show(&Notice::info(EMPTY_EXPORT_MESSAGE));
        return Ok(());
    }

    let output = match args.output {
        Some(path) => path,
        None => get_exports_dir()?.join(default_file_name(args.format)),
    };

    // Printing to PDF drives a browser synchronously.
    let entries = transcript.entries().to_vec();
    let format = args.format;
    let path = output.clone();
    tokio::task::spawn_blocking(move || export_transcript(&entries, format, &path))
        .await
        .map_err(|e| AppError::Export(format!("export task failed: {}", e)))??;

    show(&Notice::success(format!("Exported to {}", output.display())));
    Ok(())
}

pub fn get_exports_dir() -> AppResult<PathBuf> {
    let exports_dir = get_app_data_dir()?.join("exports");
    if !exports_dir.exists() {
        std::fs::create_dir_all(&exports_dir)?;
    }
    Ok(exports_dir)
}
