//! `/reports` endpoints.

use tracing::instrument;

use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{ReportQuery, SalesReport};

/// Client for server-computed reports.
#[derive(Clone)]
pub struct ReportsApi {
    client: ApiClient,
}

impl ReportsApi {
    pub(crate) const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sales statistics for a date range.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(from = %query.from, to = %query.to))]
    pub async fn sales(&self, query: &ReportQuery) -> Result<SalesReport> {
        self.client
            .get(self.client.url("reports/sales", &query.to_pairs())?)
            .await
    }
}
