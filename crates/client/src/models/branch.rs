//! Branch types.

use crumb_core::BranchId;
use serde::{Deserialize, Serialize};

use super::product::default_active;

/// A physical store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Payload for creating or replacing a branch.
#[derive(Debug, Clone, Serialize)]
pub struct BranchInput {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub active: bool,
}
