use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::reports::repo_types::{
    EstimateQuery, NewReport, Report, COMPARABLES, MAX_COORD_DELTA, MAX_YEAR_DELTA,
};

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create(&self, report: NewReport, user_id: i64) -> anyhow::Result<Report>;
    /// Sets the approval flag; `None` when the report does not exist.
    async fn set_approval(&self, id: i64, approved: bool) -> anyhow::Result<Option<Report>>;
    /// Average price of the closest approved comparables, if any.
    async fn estimate(&self, query: &EstimateQuery) -> anyhow::Result<Option<f64>>;
}

#[derive(Clone)]
pub struct PgReportStore {
    db: PgPool,
}

impl PgReportStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn create(&self, report: NewReport, user_id: i64) -> anyhow::Result<Report> {
        let row = sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (user_id, price, make, model, year, lng, lat, mileage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, price, make, model, year, lng, lat, mileage, approved, created_at
            "#,
        )
        .bind(user_id)
        .bind(report.price)
        .bind(report.make)
        .bind(report.model)
        .bind(report.year)
        .bind(report.lng)
        .bind(report.lat)
        .bind(report.mileage)
        .fetch_one(&self.db)
        .await
        .context("insert report")?;
        Ok(row)
    }

    async fn set_approval(&self, id: i64, approved: bool) -> anyhow::Result<Option<Report>> {
        let row = sqlx::query_as::<_, Report>(
            r#"
            UPDATE reports
               SET approved = $2
             WHERE id = $1
            RETURNING id, user_id, price, make, model, year, lng, lat, mileage, approved, created_at
            "#,
        )
        .bind(id)
        .bind(approved)
        .fetch_optional(&self.db)
        .await
        .context("update report approval")?;
        Ok(row)
    }

    async fn estimate(&self, q: &EstimateQuery) -> anyhow::Result<Option<f64>> {
        let price = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT AVG(price)::DOUBLE PRECISION
              FROM (
                    SELECT price
                      FROM reports
                     WHERE approved
                       AND LOWER(make) = LOWER($1)
                       AND LOWER(model) = LOWER($2)
                       AND ABS(lng - $3) <= $7
                       AND ABS(lat - $4) <= $7
                       AND ABS(year - $5) <= $8
                     ORDER BY ABS(mileage - $6) ASC
                     LIMIT $9
                   ) nearest
            "#,
        )
        .bind(&q.make)
        .bind(&q.model)
        .bind(q.lng)
        .bind(q.lat)
        .bind(q.year)
        .bind(q.mileage)
        .bind(MAX_COORD_DELTA)
        .bind(MAX_YEAR_DELTA)
        .bind(COMPARABLES as i64)
        .fetch_one(&self.db)
        .await
        .context("estimate price")?;
        Ok(price)
    }
}

#[derive(Default)]
struct ReportTable {
    rows: Vec<Report>,
    next_id: i64,
}

/// Process-local report store for tests and `STORE=memory` runs.
#[derive(Clone, Default)]
pub struct InMemoryReportStore {
    inner: Arc<RwLock<ReportTable>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn create(&self, report: NewReport, user_id: i64) -> anyhow::Result<Report> {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        let row = Report {
            id: table.next_id,
            user_id,
            price: report.price,
            make: report.make,
            model: report.model,
            year: report.year,
            lng: report.lng,
            lat: report.lat,
            mileage: report.mileage,
            approved: false,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn set_approval(&self, id: i64, approved: bool) -> anyhow::Result<Option<Report>> {
        let mut table = self.inner.write().await;
        Ok(table.rows.iter_mut().find(|r| r.id == id).map(|r| {
            r.approved = approved;
            r.clone()
        }))
    }

    async fn estimate(&self, q: &EstimateQuery) -> anyhow::Result<Option<f64>> {
        let table = self.inner.read().await;
        let mut candidates: Vec<&Report> = table.rows.iter().filter(|r| q.matches(r)).collect();
        candidates.sort_by_key(|r| (r.mileage - q.mileage).abs());

        let nearest = &candidates[..candidates.len().min(COMPARABLES)];
        if nearest.is_empty() {
            return Ok(None);
        }
        let total: i64 = nearest.iter().map(|r| r.price).sum();
        Ok(Some(total as f64 / nearest.len() as f64))
    }
}
