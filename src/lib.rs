mod commands;
pub mod error;
pub mod models;
pub mod services;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use commands::*;
use error::{AppError, AppResult};

#[derive(Debug, Parser)]
#[command(name = "vartik", about = "Chat client for the Vartik retrieval assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Store a signed-in account and set up its user, department and session
    Login(LoginArgs),
    /// Forget the account and the local settings
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Session settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// List the chat and embedding model catalogues
    Refs,
    /// Conversations
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
    /// Export a conversation as doc, pdf or pptx
    Export(ExportArgs),
    /// Data ingestion
    Ingest {
        #[command(subcommand)]
        action: IngestAction,
    },
    /// Department administration
    Departments {
        #[command(subcommand)]
        action: DepartmentAction,
    },
    /// List the directory categories departments can be linked to
    Categories,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Config { .. } => "config",
            Command::Login(_) => "login",
            Command::Logout => "logout",
            Command::Whoami => "whoami",
            Command::Settings { .. } => "settings",
            Command::Refs => "refs",
            Command::Chat { .. } => "chat",
            Command::Export(_) => "export",
            Command::Ingest { .. } => "ingest",
            Command::Departments { .. } => "departments",
            Command::Categories => "categories",
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn dispatch(command: Command) -> AppResult<()> {
    let ctx = match command {
        Command::Config { action } => return run_config(action),
        _ => AppContext::load()?,
    };
    match command {
        Command::Config { .. } => Ok(()),
        Command::Login(args) => run_login(&ctx, args).await,
        Command::Logout => run_logout(&ctx),
        Command::Whoami => run_whoami(&ctx).await,
        Command::Settings { action } => run_settings(&ctx, action).await,
        Command::Refs => run_refs(&ctx).await,
        Command::Chat { action } => run_chat(&ctx, action).await,
        Command::Export(args) => run_export(&ctx, args).await,
        Command::Ingest { action } => run_ingest(&ctx, action).await,
        Command::Departments { action } => run_departments(&ctx, action).await,
        Command::Categories => run_categories(&ctx).await,
    }
}

/// Parses the command line and runs one command. Failures are reported and
/// the process still succeeds; only configuration problems exit non-zero.
pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let name = cli.command.name();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ AppError::Config(_)) => {
            report_failure(name, &e);
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            report_failure(name, &e);
            ExitCode::SUCCESS
        }
    }
}
