use clap::{Args, Subcommand};
use tracing::error;

use super::context::{show, AppContext};
use crate::error::AppResult;
use crate::models::{IngestionStatus, Notice};
use crate::services::ingestion_service::{self, SUBMITTED_MESSAGE, SUBMIT_FAILED_MESSAGE};

#[derive(Debug, Subcommand)]
pub enum IngestAction {
    /// Edit the stored ingestion draft
    Draft(DraftEdits),
    /// Submit the stored draft and start the ingestion worker
    Submit,
    /// List ingestion records, newest first
    Status,
    /// Show the outcome of one ingestion
    Check { id: String },
    /// Delete an ingestion record
    Delete { id: String },
}

#[derive(Debug, Args)]
pub struct DraftEdits {
    #[arg(long)]
    pub vector_store: Option<String>,
    #[arg(long)]
    pub vector_index: Option<String>,
    #[arg(long)]
    pub files_container: Option<String>,
    #[arg(long)]
    pub chunking_type: Option<String>,
    #[arg(long)]
    pub emb_vendor: Option<String>,
    #[arg(long)]
    pub emb_model: Option<String>,
    #[arg(long)]
    pub department_id: Option<String>,
}

pub async fn run_ingest(ctx: &AppContext, action: IngestAction) -> AppResult<()> {
    match action {
        IngestAction::Draft(edits) => {
            let draft = ingestion_service::update_draft(&ctx.store, |d| {
                if let Some(v) = edits.vector_store {
                    d.vector_store = v;
                }
                if let Some(v) = edits.vector_index {
                    d.vector_index = v;
                }
                if let Some(v) = edits.files_container {
                    d.files_container = v;
                }
                if let Some(v) = edits.chunking_type {
                    d.chunking_type = v;
                }
                if let Some(v) = edits.emb_vendor {
                    d.emb_llm_type = v;
                }
                if let Some(v) = edits.emb_model {
                    d.emb_llm_name = v;
                }
                if let Some(v) = edits.department_id {
                    d.department_id = v;
                }
            })?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        IngestAction::Submit => {
            let submitted = ingestion_service::submit_ingestion(
                &ctx.backend()?,
                &ctx.ingestion_worker()?,
                &ctx.store,
            )
            .await;
            match submitted {
                Ok(id) => show(&Notice::success(format!("{} ({})", SUBMITTED_MESSAGE, id))),
                Err(e) => {
                    error!(error = %e, "ingestion submit failed");
                    show(&Notice::error(SUBMIT_FAILED_MESSAGE));
                }
            }
        }
        IngestAction::Status => {
            for row in ingestion_service::ingestion_status(&ctx.backend()?).await? {
                let record = &row.record;
                let status = match record.status() {
                    IngestionStatus::Pending => "running".to_string(),
                    IngestionStatus::Succeeded => "done".to_string(),
                    IngestionStatus::Failed => "failed".to_string(),
                    IngestionStatus::Unknown(code) => format!("status {}", code),
                };
                let when = record
                    .updated_date_time
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{:>6}  {:16}  {:12}  {}/{}  {}",
                    record.id,
                    when,
                    row.department_name.as_deref().unwrap_or("-"),
                    record.vector_store,
                    record.vector_index,
                    status
                );
            }
        }
        IngestAction::Check { id } => {
            let rows = ingestion_service::ingestion_status(&ctx.backend()?).await?;
            let Some(row) = rows.iter().find(|r| r.record.id == id) else {
                show(&Notice::error(format!("No ingestion record {}", id)));
                return Ok(());
            };
            match row.record.status_message() {
                Some((_, text)) if row.record.status() == IngestionStatus::Failed => {
                    show(&Notice::error(text))
                }
                Some((_, text)) => show(&Notice::success(text)),
                None => show(&Notice::info("Data ingestion is still running.")),
            }
        }
        IngestAction::Delete { id } => {
            ingestion_service::delete_ingestion(&ctx.backend()?, &id).await?;
            show(&Notice::success("Your record has been deleted."));
        }
    }
    Ok(())
}
