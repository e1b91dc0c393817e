//! Login, sign-up and logout.
//!
//! # Usage
//!
//! ```bash
//! crumb login -e ana@crumb.test          # password from CRUMB_PASSWORD
//! crumb register -u ana -e ana@crumb.test -n "Ana" -p s3cret
//! crumb oauth --access <token> --refresh <token>
//! crumb whoami
//! crumb logout
//! ```

use crumb_client::models::NewAccount;
use crumb_core::Email;
use secrecy::SecretString;
use tracing::info;

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub async fn login(ctx: &Context, email: &str, password: SecretString) -> CliResult {
    let identity = ctx.api.session().login(email, &password).await?;
    info!(user = %identity.id, "Logged in");
    output::message(&format!("Welcome, {}!", identity.display_name()));
    output::identity(&identity);
    Ok(())
}

pub async fn register(
    ctx: &Context,
    username: String,
    email: &str,
    name: String,
    password: SecretString,
) -> CliResult {
    let email = Email::parse(email).map_err(|e| CliError::Input(e.to_string()))?;
    let account = NewAccount {
        username,
        email,
        name,
        password,
    };
    let identity = ctx.api.session().register(&account).await?;
    output::message(&format!("Account created. Welcome, {}!", identity.display_name()));
    Ok(())
}

pub async fn oauth(ctx: &Context, access: String, refresh: Option<String>) -> CliResult {
    let identity = ctx.api.session().complete_oauth(access, refresh).await?;
    output::identity(&identity);
    Ok(())
}

pub async fn logout(ctx: &Context) -> CliResult {
    if !ctx.api.session().is_logged_in().await {
        output::message("Not logged in.");
        return Ok(());
    }
    ctx.api.session().logout().await;
    output::message("Logged out.");
    Ok(())
}

pub async fn whoami(ctx: &Context) -> CliResult {
    let identity = ctx
        .api
        .session()
        .identity()
        .await
        .ok_or(CliError::NotLoggedIn)?;
    output::identity(&identity);
    Ok(())
}
