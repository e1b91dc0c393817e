//! Catalog browsing.

use crumb_core::BranchId;

use crate::context::Context;
use crate::error::CliResult;
use crate::output;

pub async fn products(ctx: &Context, branch: Option<BranchId>) -> CliResult {
    let products = ctx.api.products().list(branch).await?;
    output::products(&products);
    Ok(())
}

/// Offers on sale now, or every offer with `all`.
pub async fn offers(ctx: &Context, branch: Option<BranchId>, all: bool) -> CliResult {
    let offers = if all {
        ctx.api.offers().list(branch).await?.as_ref().clone()
    } else {
        ctx.api.offers().available(branch).await?
    };
    output::offers(&offers);
    Ok(())
}
