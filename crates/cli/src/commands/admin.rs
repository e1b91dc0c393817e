//! Administration commands.
//!
//! # Usage
//!
//! ```bash
//! crumb admin branches
//! crumb admin branch-create -n "Centro" -a "Av. Principal 100"
//! crumb admin users --branch 2
//! crumb admin user-create -u caja1 -e caja1@crumb.test -n "Caja" -r branch_admin -b 2 -p s3cret
//! crumb admin product-create -n "Pan de campo" --price 4.50 --stock 20 -b 1
//! crumb admin report --from 2026-03-01 --to 2026-03-31 --local
//! ```

use chrono::NaiveDate;
use crumb_client::models::{BranchInput, ProductInput, ReportQuery, UserInput};
use crumb_client::{Guard, SalesSummary};
use crumb_core::{BranchId, Email, Money, ProductId, Role, UserId};
use secrecy::SecretString;
use tracing::info;

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub async fn branches(ctx: &Context) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    output::branches(&ctx.api.branches().list().await?);
    Ok(())
}

pub async fn create_branch(
    ctx: &Context,
    name: String,
    address: String,
    phone: Option<String>,
) -> CliResult {
    ctx.require(Guard::GENERAL_ADMIN).await?;
    let branch = ctx
        .api
        .branches()
        .create(&BranchInput {
            name,
            address,
            phone,
            active: true,
        })
        .await?;
    info!(branch = %branch.id, "Branch created");
    output::branches(std::slice::from_ref(&branch));
    Ok(())
}

pub async fn delete_branch(ctx: &Context, id: BranchId) -> CliResult {
    ctx.require(Guard::GENERAL_ADMIN).await?;
    ctx.api.branches().delete(id).await?;
    output::message(&format!("Branch #{id} deleted."));
    Ok(())
}

pub async fn users(ctx: &Context, branch: Option<BranchId>) -> CliResult {
    ctx.require(Guard::GENERAL_ADMIN).await?;
    for user in ctx.api.users().list(branch).await? {
        output::user(&user);
    }
    Ok(())
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub branch: Option<BranchId>,
    pub password: SecretString,
}

pub async fn create_user(ctx: &Context, new: NewUser) -> CliResult {
    ctx.require(Guard::GENERAL_ADMIN).await?;
    if new.role == Role::BranchAdmin && new.branch.is_none() {
        return Err(CliError::Input(
            "branch admins need a branch (--branch)".to_string(),
        ));
    }
    let email = Email::parse(&new.email).map_err(|e| CliError::Input(e.to_string()))?;
    let user = ctx
        .api
        .users()
        .create(&UserInput {
            username: new.username,
            email,
            name: new.name,
            role: new.role,
            branch: new.branch,
            password: Some(new.password),
        })
        .await?;
    info!(user = %user.id, role = %user.role, "User created");
    output::user(&user);
    Ok(())
}

pub async fn delete_user(ctx: &Context, id: UserId) -> CliResult {
    let me = ctx.require(Guard::GENERAL_ADMIN).await?;
    if me.id == id {
        return Err(CliError::Input("refusing to delete your own account".to_string()));
    }
    ctx.api.users().delete(id).await?;
    output::message(&format!("User #{id} deleted."));
    Ok(())
}

pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: Option<u32>,
    pub category: Option<String>,
    pub branch: Option<BranchId>,
}

pub async fn create_product(ctx: &Context, new: NewProduct) -> CliResult {
    let me = ctx.require(Guard::ADMIN).await?;
    let branch = scoped_branch(me.role, me.branch, new.branch)
        .ok_or_else(|| CliError::Input("a branch is required (--branch)".to_string()))?;
    let product = ctx
        .api
        .products()
        .create(&ProductInput {
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            category: new.category,
            branch,
            active: true,
            image: None,
        })
        .await?;
    output::products(std::slice::from_ref(&product));
    Ok(())
}

pub async fn delete_product(ctx: &Context, id: ProductId) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    ctx.api.products().delete(id).await?;
    output::message(&format!("Product #{id} deleted."));
    Ok(())
}

/// Server sales report, optionally followed by the same figures computed
/// from the order list.
pub async fn report(
    ctx: &Context,
    from: NaiveDate,
    to: NaiveDate,
    branch: Option<BranchId>,
    local: bool,
) -> CliResult {
    let me = ctx.require(Guard::ADMIN).await?;
    if to < from {
        return Err(CliError::Input(format!("{to} is before {from}")));
    }
    let branch = scoped_branch(me.role, me.branch, branch);
    let report = ctx
        .api
        .reports()
        .sales(&ReportQuery { from, to, branch })
        .await?;
    output::sales_report(&report);

    if local {
        let orders = ctx
            .api
            .orders()
            .list(crumb_client::api::OrderFilter {
                branch,
                status: None,
            })
            .await?;
        let in_range: Vec<_> = orders
            .into_iter()
            .filter(|order| {
                let day = order.created_at.date_naive();
                from <= day && day <= to
            })
            .collect();
        output::message("Computed from orders:");
        output::summary(&SalesSummary::from_orders(&in_range));
    }
    Ok(())
}

/// Branch admins always act on their own branch.
fn scoped_branch(
    role: Role,
    own: Option<BranchId>,
    requested: Option<BranchId>,
) -> Option<BranchId> {
    match role {
        Role::BranchAdmin => own.or(requested),
        Role::Customer | Role::GeneralAdmin => requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_admins_are_scoped() {
        let own = Some(BranchId::new(2));
        let other = Some(BranchId::new(5));
        assert_eq!(scoped_branch(Role::BranchAdmin, own, other), own);
        assert_eq!(scoped_branch(Role::GeneralAdmin, own, other), other);
        assert_eq!(scoped_branch(Role::GeneralAdmin, None, None), None);
    }
}
