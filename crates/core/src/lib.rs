//! Crumb Core - Shared domain types.
//!
//! This crate provides the types shared by every Crumb component:
//! - `client` - Session, cart, checkout and REST API access
//! - `cli` - The `crumb` command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no storage,
//! no HTTP clients. Order-status progression and role routing live here so
//! that every front end agrees on them.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, emails, roles and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
