//! Crumb CLI - bakery storefront and administration from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (the password can also come from CRUMB_PASSWORD)
//! crumb login -e ana@crumb.test -p s3cret
//!
//! # Browse and fill the cart
//! crumb products --branch 1
//! crumb cart add 3 --qty 2
//!
//! # Order and follow it
//! crumb checkout --branch 1
//! crumb orders watch
//!
//! # Administration
//! crumb orders advance 42
//! crumb admin report --from 2026-03-01 --to 2026-03-31
//! ```
//!
//! # Environment Variables
//!
//! - `CRUMB_API_URL` - Base URL of the REST API (required)
//! - `CRUMB_STATE_DIR` - Where the session and carts are kept (default `.crumb`)
//! - `RUST_LOG` - Log filter (default `crumb=info`)
//! - `SENTRY_DSN` - Report errors to Sentry when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crumb_client::ClientConfig;
use crumb_core::{BranchId, Money, OfferId, OrderId, OrderStatus, ProductId, Role, UserId};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod context;
mod error;
mod output;

use context::Context;
use error::CliResult;

#[derive(Parser)]
#[command(name = "crumb")]
#[command(author, version, about = "Crumb bakery storefront CLI")]
struct Cli {
    /// Override `CRUMB_API_URL`
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "CRUMB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a customer account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long, env = "CRUMB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Install tokens from an OAuth redirect
    Oauth {
        #[arg(long)]
        access: String,

        #[arg(long)]
        refresh: Option<String>,
    },
    /// Forget the session and its cart
    Logout,
    /// Show who is logged in
    Whoami,
    /// List products
    Products {
        #[arg(short, long)]
        branch: Option<BranchId>,
    },
    /// List offers on sale
    Offers {
        #[arg(short, long)]
        branch: Option<BranchId>,

        /// Include inactive and expired offers
        #[arg(long)]
        all: bool,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Order the contents of the cart
    Checkout {
        #[arg(short, long)]
        branch: BranchId,

        /// Deliver to this address instead of picking up
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Track and handle orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Show or change your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Branch, user, product and report administration
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Add an offer
    AddOffer {
        offer: OfferId,

        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Set the quantity of a line (`product:3`, `offer:9`)
    Set { line: String, qty: u32 },
    /// Remove a line
    Remove { line: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrderAction {
    /// Your orders
    Mine,
    /// Orders of a branch (admins)
    List {
        #[arg(short, long)]
        branch: Option<BranchId>,

        #[arg(short, long)]
        status: Option<OrderStatus>,
    },
    /// Order details
    Show { id: OrderId },
    /// Move an order to its next status
    Advance { id: OrderId },
    /// Set an order's status
    SetStatus { id: OrderId, status: OrderStatus },
    /// Cancel an order
    Cancel { id: OrderId },
    /// Delete a delivered or cancelled order
    Delete { id: OrderId },
    /// Follow order statuses until Ctrl+C
    Watch {
        #[arg(short, long)]
        branch: Option<BranchId>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// List branches
    Branches,
    /// Open a branch
    BranchCreate {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        address: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Delete a branch
    BranchDelete { id: BranchId },
    /// List users
    Users {
        #[arg(short, long)]
        branch: Option<BranchId>,
    },
    /// Create a user
    UserCreate {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: String,
        /// `customer`, `branch_admin` or `general_admin`
        #[arg(short, long)]
        role: Role,
        #[arg(short, long)]
        branch: Option<BranchId>,
        #[arg(short, long, env = "CRUMB_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete a user
    UserDelete { id: UserId },
    /// Add a product
    ProductCreate {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long)]
        price: Money,
        #[arg(long)]
        stock: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(short, long)]
        branch: Option<BranchId>,
    },
    /// Delete a product
    ProductDelete { id: ProductId },
    /// Sales report for a date range
    Report {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(short, long)]
        branch: Option<BranchId>,
        /// Also aggregate the order list locally
        #[arg(long)]
        local: bool,
    },
}

/// Initialize Sentry error tracking.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Errors become Sentry events, info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO | tracing::Level::DEBUG => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn load_config(api_url: Option<&str>) -> CliResult<ClientConfig> {
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_lookup(|key| match (key, api_url) {
        ("CRUMB_API_URL", Some(url)) => Some(url.to_owned()),
        _ => std::env::var(key).ok(),
    })?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.api_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the subscriber
    let sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crumb=info,crumb_client=info,crumb_cli=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ClientConfig) -> CliResult {
    let ctx = Context::open(config).await?;

    match command {
        Commands::Login { email, password } => {
            commands::session::login(&ctx, &email, SecretString::from(password)).await?;
        }
        Commands::Register {
            username,
            email,
            name,
            password,
        } => {
            commands::session::register(&ctx, username, &email, name, SecretString::from(password))
                .await?;
        }
        Commands::Oauth { access, refresh } => {
            commands::session::oauth(&ctx, access, refresh).await?;
        }
        Commands::Logout => commands::session::logout(&ctx).await?,
        Commands::Whoami => commands::session::whoami(&ctx).await?,
        Commands::Products { branch } => commands::catalog::products(&ctx, branch).await?,
        Commands::Offers { branch, all } => commands::catalog::offers(&ctx, branch, all).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await?,
            CartAction::Add { product, qty } => commands::cart::add(&ctx, product, qty).await?,
            CartAction::AddOffer { offer, qty } => {
                commands::cart::add_offer(&ctx, offer, qty).await?;
            }
            CartAction::Set { line, qty } => commands::cart::set(&ctx, &line, qty).await?,
            CartAction::Remove { line } => commands::cart::remove(&ctx, &line).await?,
            CartAction::Clear => commands::cart::clear(&ctx).await?,
        },
        Commands::Checkout { branch, address } => {
            commands::cart::place_order(&ctx, branch, address).await?;
        }
        Commands::Orders { action } => match action {
            OrderAction::Mine => commands::orders::mine(&ctx).await?,
            OrderAction::List { branch, status } => {
                commands::orders::list(&ctx, branch, status).await?;
            }
            OrderAction::Show { id } => commands::orders::show(&ctx, id).await?,
            OrderAction::Advance { id } => commands::orders::advance(&ctx, id).await?,
            OrderAction::SetStatus { id, status } => {
                commands::orders::set_status(&ctx, id, status).await?;
            }
            OrderAction::Cancel { id } => commands::orders::cancel(&ctx, id).await?,
            OrderAction::Delete { id } => commands::orders::delete(&ctx, id).await?,
            OrderAction::Watch { branch } => commands::orders::watch(&ctx, branch).await?,
        },
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(&ctx).await?,
            ProfileAction::Update {
                name,
                email,
                phone,
                address,
            } => commands::profile::update(&ctx, name, email, phone, address).await?,
        },
        Commands::Admin { action } => run_admin(&ctx, action).await?,
    }
    Ok(())
}

async fn run_admin(ctx: &Context, action: AdminAction) -> CliResult {
    use commands::admin;

    match action {
        AdminAction::Branches => admin::branches(ctx).await,
        AdminAction::BranchCreate {
            name,
            address,
            phone,
        } => admin::create_branch(ctx, name, address, phone).await,
        AdminAction::BranchDelete { id } => admin::delete_branch(ctx, id).await,
        AdminAction::Users { branch } => admin::users(ctx, branch).await,
        AdminAction::UserCreate {
            username,
            email,
            name,
            role,
            branch,
            password,
        } => {
            admin::create_user(
                ctx,
                admin::NewUser {
                    username,
                    email,
                    name,
                    role,
                    branch,
                    password: SecretString::from(password),
                },
            )
            .await
        }
        AdminAction::UserDelete { id } => admin::delete_user(ctx, id).await,
        AdminAction::ProductCreate {
            name,
            description,
            price,
            stock,
            category,
            branch,
        } => {
            admin::create_product(
                ctx,
                admin::NewProduct {
                    name,
                    description,
                    price,
                    stock,
                    category,
                    branch,
                },
            )
            .await
        }
        AdminAction::ProductDelete { id } => admin::delete_product(ctx, id).await,
        AdminAction::Report {
            from,
            to,
            branch,
            local,
        } => admin::report(ctx, from, to, branch, local).await,
    }
}
