//! Command implementations.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod profile;
pub mod session;
