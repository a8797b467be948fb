use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::repo_types::User;
use crate::error::{ApiError, ApiResult};
use crate::reports::repo::ReportStore;
use crate::reports::repo_types::{EstimateQuery, NewReport, Report};

#[derive(Clone)]
pub struct ReportsService {
    reports: Arc<dyn ReportStore>,
}

impl ReportsService {
    pub fn new(reports: Arc<dyn ReportStore>) -> Self {
        Self { reports }
    }

    pub async fn create_estimate(&self, query: &EstimateQuery) -> ApiResult<Option<f64>> {
        let price = self.reports.estimate(query).await?;
        debug!(make = %query.make, model = %query.model, ?price, "estimate computed");
        Ok(price)
    }

    /// Files a report on behalf of `user`; it starts unapproved.
    pub async fn create(&self, report: NewReport, user: &User) -> ApiResult<Report> {
        let report = self.reports.create(report, user.id).await?;
        info!(report_id = report.id, user_id = user.id, "report created");
        Ok(report)
    }

    pub async fn change_approval(&self, id: i64, approved: bool) -> ApiResult<Report> {
        let report = self
            .reports
            .set_approval(id, approved)
            .await?
            .ok_or_else(|| ApiError::NotFound("report not found".into()))?;
        info!(report_id = report.id, approved, "report approval changed");
        Ok(report)
    }
}
