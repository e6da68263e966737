use std::time::Duration;

use clap::Subcommand;
use tokio::sync::mpsc;
use tracing::warn;

use super::context::{show, AppContext};
use crate::error::{AppError, AppResult};
use crate::models::{ChatEntry, Notice, RecentChat};
use crate::services::chat_service::{RecentChatsPoller, Transcript, TranscriptEvent};

#[derive(Debug, Subcommand)]
pub enum ChatAction {
    /// Send a message; starts a new session unless one is given
    Send {
        text: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Print a session's transcript
    History { session: String },
    /// Start a new conversation
    New,
    /// List recent conversations, newest first
    Recent,
    /// Delete a conversation's history
    Delete { session: String },
    /// Keep the recent conversations list refreshed until interrupted
    Watch,
}

pub async fn run_chat(ctx: &AppContext, action: ChatAction) -> AppResult<()> {
    match action {
        ChatAction::Send { text, session } => send(ctx, &text, session.as_deref()).await?,
        ChatAction::History { session } => {
            let mut transcript = Transcript::new();
            ctx.chat()?
                .open_session(&mut transcript, Some(&session))
                .await?;
            if transcript.entries().is_empty() {
                show(&Notice::info("No messages in this session."));
            }
            for entry in transcript.entries() {
                print_entry(entry);
            }
        }
        ChatAction::New => {
            let session_id = ctx.chat()?.new_chat(&mut Transcript::new()).await?;
            show(&Notice::success(format!("New chat {}", session_id)));
        }
        ChatAction::Recent => print_recent(&ctx.chat()?.recent_chats().await?),
        ChatAction::Delete { session } => {
            if ctx.chat()?.delete_chat(&session).await? {
                show(&Notice::success("Chat deleted"));
            } else {
                show(&Notice::info("The chat could not be deleted."));
            }
        }
        ChatAction::Watch => watch(ctx).await?,
    }
    Ok(())
}

/// Entries are printed as the transcript receives them, so the user's own
/// message shows before the reply arrives.
async fn send(ctx: &AppContext, text: &str, session: Option<&str>) -> AppResult<()> {
    let chat = ctx.chat()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transcript = Transcript::with_events(tx);

    if let Err(e) = chat.open_session(&mut transcript, session).await {
        warn!(error = %e, "continuing without the session history");
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let TranscriptEvent::Appended(entry) = event {
                print_entry(&entry);
            }
        }
    });

    if chat.send_message(&mut transcript, text).await.is_none() {
        show(&Notice::info("Nothing to send."));
    }
    let session_id = transcript.session_id().map(str::to_string);
    drop(transcript);
    let _ = printer.await;

    if let Some(session_id) = session_id {
        println!("session: {}", session_id);
    }
    Ok(())
}

async fn watch(ctx: &AppContext) -> AppResult<()> {
    let account = ctx.store.account();
    if account.unique_id.is_empty() {
        return Err(AppError::NotAuthenticated("no signed-in account".into()));
    }
    let poller = RecentChatsPoller::spawn(
        ctx.backend()?,
        account.unique_id,
        Duration::from_secs(ctx.config.poll_interval_secs),
    );
    let mut updates = poller.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_recent(&poller.latest());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_entry(entry: &ChatEntry) {
    println!("{}: {}", entry.role.label(), entry.message);
}

fn print_recent(chats: &[RecentChat]) {
    if chats.is_empty() {
        show(&Notice::info("No recent chats."));
    }
    for chat in chats {
        let when = chat
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  {:16}  {}", chat.session_id, when, chat.message);
    }
}
