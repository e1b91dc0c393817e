//! Roles, order statuses and delivery modes.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0} (expected customer, branch_admin or general_admin)")]
pub struct ParseRoleError(pub String);

/// Error returned when an order status string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

/// Account role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shops, checks out and tracks their own orders.
    Customer,
    /// Manages products, offers and orders of a single branch.
    BranchAdmin,
    /// Manages every branch, its users and the sales reports.
    GeneralAdmin,
}

impl Role {
    /// All roles, in ascending privilege.
    pub const ALL: [Self; 3] = [Self::Customer, Self::BranchAdmin, Self::GeneralAdmin];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::BranchAdmin => "branch_admin",
            Self::GeneralAdmin => "general_admin",
        }
    }

    /// Whether this role may use the administration panels.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::BranchAdmin | Self::GeneralAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "cliente" => Ok(Self::Customer),
            "branch_admin" | "admin" => Ok(Self::BranchAdmin),
            "general_admin" | "admin_general" => Ok(Self::GeneralAdmin),
            other => Err(ParseRoleError(other.to_owned())),
        }
    }
}

/// Order lifecycle.
///
/// Orders move strictly forward through
/// `Received → Preparing → Ready → Delivered`. Any non-terminal order may
/// instead be `Cancelled`. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Received,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The single forward step from this status, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether moving from `self` to `target` follows the lifecycle.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Cancelled || self.next() == Some(target)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" => Ok(Self::Received),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}

/// How an order reaches the customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Collected at the branch counter.
    Pickup,
    /// Delivered to the given address.
    HomeDelivery {
        /// Street address for the courier.
        address: String,
    },
}

impl DeliveryMode {
    /// The delivery address, for home deliveries.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Pickup => None,
            Self::HomeDelivery { address } => Some(address),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_progression() {
        let mut status = OrderStatus::Received;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            assert!(status.can_transition_to(next));
            status = next;
            seen.push(status);
        }
        assert_eq!(
            seen,
            [
                OrderStatus::Received,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Delivered
            ]
        );
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!OrderStatus::Received.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Received.can_transition_to(OrderStatus::Received));
    }

    #[test]
    fn test_cancel_only_from_open_orders() {
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_role_parse_and_wire_names() {
        assert_eq!("general_admin".parse::<Role>().unwrap(), Role::GeneralAdmin);
        assert_eq!(" Customer ".parse::<Role>().unwrap(), Role::Customer);
        assert!("baker".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_string(&Role::BranchAdmin).unwrap(),
            "\"branch_admin\""
        );
    }

    #[test]
    fn test_delivery_mode_wire_format() {
        let mode = DeliveryMode::HomeDelivery {
            address: "Calle Mayor 1".to_string(),
        };
        let json = serde_json::to_value(&mode).unwrap();
        assert_eq!(json["mode"], "home_delivery");
        assert_eq!(json["address"], "Calle Mayor 1");
        assert_eq!(
            serde_json::to_value(DeliveryMode::Pickup).unwrap()["mode"],
            "pickup"
        );
    }
}
