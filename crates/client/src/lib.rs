//! Crumb client library.
//!
//! Everything a Crumb front end needs besides drawing: the session with its
//! token refresh, the persisted cart, role guards, checkout, and typed
//! access to the bakery REST API.
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileStore::open(config.storage_path())?);
//! let api = Api::connect(&config, storage.clone()).await?;
//!
//! let identity = api.session().login("ana@crumb.test", &password).await?;
//! let mut cart = CartStore::open(storage, Some(identity.id))?;
//! cart.add(&product, 2)?;
//! let order = checkout(&api.orders(), &mut cart, branch, DeliveryMode::Pickup).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod models;
pub mod poll;
pub mod session;
pub mod storage;
pub mod summary;

pub use api::Api;
pub use cart::{CartLine, CartStore, LineKey};
pub use checkout::{CheckoutRequest, checkout};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use guard::{Access, Guard};
pub use http::ApiClient;
pub use poll::{PollHandle, spawn_poller};
pub use session::{Identity, SessionContext, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use summary::SalesSummary;
