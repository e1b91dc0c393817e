//! The logged-in user's own profile.

use crumb_client::Guard;
use crumb_client::models::ProfileUpdate;
use crumb_core::Email;

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub async fn show(ctx: &Context) -> CliResult {
    ctx.require(Guard::Authenticated).await?;
    let me = ctx.api.users().me().await?;
    output::user(&me);
    for (label, value) in [("phone", &me.phone), ("address", &me.address)] {
        if let Some(value) = value {
            output::message(&format!("  {label}: {value}"));
        }
    }
    Ok(())
}

pub async fn update(
    ctx: &Context,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
) -> CliResult {
    ctx.require(Guard::Authenticated).await?;
    let email = email
        .map(|raw| Email::parse(&raw))
        .transpose()
        .map_err(|e| CliError::Input(e.to_string()))?;
    let update = ProfileUpdate {
        name,
        email,
        phone,
        address,
    };
    if update.is_empty() {
        return Err(CliError::Input("nothing to update".to_string()));
    }
    let me = ctx.api.users().update_profile(&update).await?;
    output::message("Profile updated.");
    output::user(&me);
    Ok(())
}
