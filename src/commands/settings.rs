use clap::{Args, Subcommand};

use super::context::{show, AppContext};
use crate::error::{AppError, AppResult};
use crate::models::{parse_max_tokens, parse_temperature, FormState, ModelCatalog, Notice};
use crate::services::settings_service;

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the locally mirrored settings
    Show,
    /// Overlay the remote session onto the local settings
    Load,
    /// Edit settings and save them as the user's session
    Save(SaveArgs),
    /// Edit the chat parameters and write them through to the session
    Params(ParameterEdits),
    /// Choose a vector store and list the indexes available to the user
    VectorStore { name: String },
    /// List every index of a vector store
    Indexes { store: String },
    /// Re-resolve the account's user, department and session
    Sync,
}

#[derive(Debug, Args)]
pub struct ParameterEdits {
    #[arg(long)]
    pub vendor: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Formatted to one decimal
    #[arg(long)]
    pub temperature: Option<String>,
    #[arg(long)]
    pub max_tokens: Option<String>,
    #[arg(long)]
    pub vector_store: Option<String>,
    #[arg(long)]
    pub vector_index: Option<String>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    #[command(flatten)]
    pub parameters: ParameterEdits,
    #[arg(long)]
    pub emb_vendor: Option<String>,
    #[arg(long)]
    pub emb_model: Option<String>,
    #[arg(long)]
    pub chunking_type: Option<String>,
    #[arg(long)]
    pub cache: Option<bool>,
    #[arg(long)]
    pub routing: Option<bool>,
}

pub async fn run_settings(ctx: &AppContext, action: SettingsAction) -> AppResult<()> {
    match action {
        SettingsAction::Show => print_form(&ctx.store.form_state())?,
        SettingsAction::Load => {
            let user_id = ctx.store.form_state().user_id;
            if user_id <= 0 {
                return Err(AppError::NotAuthenticated("no user id in local settings".into()));
            }
            let form = settings_service::load_settings(&ctx.backend()?, &ctx.store, user_id).await;
            print_form(&form)?;
        }
        SettingsAction::Save(args) => save(ctx, args).await?,
        SettingsAction::Params(edits) => {
            let mut params = ctx.store.form_state().parameters();
            if let Some(vendor) = edits.vendor {
                if params.llm_vendor != vendor {
                    params.llm_model.clear();
                }
                params.llm_vendor = vendor;
            }
            if let Some(model) = edits.model {
                params.llm_model = model;
            }
            if let Some(raw) = edits.temperature {
                params.temp = parse_temperature(&raw);
            }
            if let Some(raw) = edits.max_tokens {
                params.max_tokens = parse_max_tokens(&raw);
            }
            if let Some(store) = edits.vector_store {
                params.vector_store = store;
            }
            if let Some(index) = edits.vector_index {
                params.vector_index = index;
            }

            let sent =
                settings_service::save_parameters(&ctx.backend()?, &ctx.store, &params).await?;
            if sent {
                show(&Notice::success("Parameters updated"));
            } else {
                show(&Notice::error("User ID not found in local storage"));
            }
        }
        SettingsAction::VectorStore { name } => {
            let selection = settings_service::select_vector_store(
                &ctx.backend()?,
                &ctx.vector_stores()?,
                &ctx.identity()?,
                &ctx.store,
                &name,
            )
            .await?;
            for index in &selection.indexes {
                println!("{}", index);
            }
            if let Some(notice) = &selection.notice {
                show(notice);
            }
        }
        SettingsAction::Indexes { store } => {
            for index in ctx.vector_stores()?.list_indexes(&store).await? {
                println!("{}", index);
            }
        }
        SettingsAction::Sync => {
            let form =
                settings_service::sync_profile(&ctx.backend()?, &ctx.identity()?, &ctx.store)
                    .await?;
            print_form(&form)?;
        }
    }
    Ok(())
}

async fn save(ctx: &AppContext, args: SaveArgs) -> AppResult<()> {
    let store = &ctx.store;
    let edits = args.parameters;
    if let Some(vendor) = &edits.vendor {
        settings_service::set_vendor(store, vendor)?;
    }
    if let Some(model) = &edits.model {
        settings_service::set_model(store, model)?;
    }
    if let Some(raw) = &edits.temperature {
        settings_service::set_temperature(store, raw)?;
    }
    if let Some(raw) = &edits.max_tokens {
        settings_service::set_max_tokens(store, raw)?;
    }
    if let Some(index) = &edits.vector_index {
        settings_service::set_vector_index(store, index)?;
    }

    let form = store.update_form_state(|form| {
        if let Some(vector_store) = edits.vector_store {
            form.vector_store = vector_store;
        }
        if let Some(vendor) = args.emb_vendor {
            form.emb_llm_vendor = vendor;
        }
        if let Some(model) = args.emb_model {
            form.emb_llm_model = model;
        }
        if let Some(chunking) = args.chunking_type {
            form.chunking_type = chunking;
        }
        if let Some(cache) = args.cache {
            form.cache_enabled = cache;
        }
        if let Some(routing) = args.routing {
            form.routing_enabled = routing;
        }
    })?;

    let outcome = settings_service::save_settings(&ctx.backend()?, store, &form).await?;
    show(&Notice::success(outcome.message()));
    Ok(())
}

fn print_form(form: &FormState) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(form)?);
    Ok(())
}

/// Prints the chat and embedding model catalogues.
pub async fn run_refs(ctx: &AppContext) -> AppResult<()> {
    let backend = ctx.backend()?;
    let (llms, embeddings) = tokio::try_join!(
        settings_service::llm_catalog(&backend),
        settings_service::emb_llm_catalog(&backend),
    )?;
    print_catalog("Chat models", &llms);
    print_catalog("Embedding models", &embeddings);
    Ok(())
}

fn print_catalog(heading: &str, catalog: &ModelCatalog) {
    println!("{}:", heading);
    for (vendor, models) in &catalog.vendors {
        println!("  {}: {}", vendor, models.join(", "));
    }
}
