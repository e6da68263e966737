use clap::Args;

use super::context::{show, AppContext};
use crate::error::AppResult;
use crate::models::Notice;
use crate::services::identity_service::{self, SignInGrant};
use crate::services::settings_service;

/// Tokens come from the identity provider's interactive sign-in.
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Directory object id of the account
    #[arg(long)]
    pub unique_id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long, env = "VARTIK_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
    #[arg(long, env = "VARTIK_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[arg(long)]
    pub expires_in: Option<i64>,
}

pub async fn run_login(ctx: &AppContext, args: LoginArgs) -> AppResult<()> {
    identity_service::sign_in(
        &ctx.store,
        SignInGrant {
            unique_id: args.unique_id,
            name: args.name,
            username: args.username,
            access_token: args.access_token,
            refresh_token: args.refresh_token,
            expires_in: args.expires_in,
        },
    )?;

    let form =
        settings_service::bootstrap_login(&ctx.backend()?, &ctx.identity()?, &ctx.store).await?;
    show(&Notice::success(format!(
        "Signed in as {} ({})",
        form.name, form.department_name
    )));
    Ok(())
}

pub fn run_logout(ctx: &AppContext) -> AppResult<()> {
    identity_service::sign_out(&ctx.store)?;
    show(&Notice::success("Signed out"));
    Ok(())
}

/// Shows the stored account, refreshing its access token when it expired.
pub async fn run_whoami(ctx: &AppContext) -> AppResult<()> {
    ctx.identity()?.get_valid_access_token(&ctx.store).await?;
    let account = ctx.store.account();
    let form = ctx.store.form_state();

    println!("name:        {}", account.name);
    if let Some(username) = &account.username {
        println!("username:    {}", username);
    }
    println!("unique id:   {}", account.unique_id);
    println!("user id:     {}", form.user_id);
    println!("department:  {} ({})", form.department_name, form.department_id);
    println!("session:     {}", form.session_id);
    Ok(())
}
