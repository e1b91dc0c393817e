//! Server-computed sales reports.

use chrono::NaiveDate;
use crumb_core::{BranchId, Money};
use serde::{Deserialize, Serialize};

/// Date range and scope of a sales report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub branch: Option<BranchId>,
}

impl ReportQuery {
    /// Query string pairs, dates as `YYYY-MM-DD`.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("from", self.from.to_string()), ("to", self.to.to_string())];
        if let Some(branch) = self.branch {
            pairs.push(("branch", branch.to_string()));
        }
        pairs
    }
}

/// Units and revenue of one product over the report period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    pub name: String,
    pub units: u64,
    pub revenue: Money,
}

/// Orders and revenue of one branch over the report period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSales {
    pub branch: BranchId,
    #[serde(default)]
    pub name: String,
    pub orders: u64,
    pub revenue: Money,
}

/// Sales statistics for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub branch: Option<BranchId>,
    pub revenue: Money,
    pub orders: u64,
    #[serde(default)]
    pub by_product: Vec<ProductSales>,
    #[serde(default)]
    pub by_branch: Vec<BranchSales>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs() {
        let query = ReportQuery {
            from: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            branch: Some(BranchId::new(4)),
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("from", "2026-03-01".to_string()),
                ("to", "2026-03-31".to_string()),
                ("branch", "4".to_string()),
            ]
        );
    }
}
