use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::reports::repo_types::{EstimateQuery, NewReport, Report};

const PRICE_RANGE: RangeInclusive<i64> = 0..=1_000_000;
const MILEAGE_RANGE: RangeInclusive<i64> = 0..=1_000_000;
const YEAR_RANGE: RangeInclusive<i32> = 1930..=2050;
const LNG_RANGE: RangeInclusive<f64> = -180.0..=180.0;
const LAT_RANGE: RangeInclusive<f64> = -90.0..=90.0;

fn check<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<(), ApiError> {
    if !range.contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {} and {}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

fn non_empty(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub price: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
}

impl TryFrom<CreateReportRequest> for NewReport {
    type Error = ApiError;

    fn try_from(r: CreateReportRequest) -> Result<Self, Self::Error> {
        check("price", r.price, &PRICE_RANGE)?;
        check("year", r.year, &YEAR_RANGE)?;
        check("lng", r.lng, &LNG_RANGE)?;
        check("lat", r.lat, &LAT_RANGE)?;
        check("mileage", r.mileage, &MILEAGE_RANGE)?;
        Ok(NewReport {
            price: r.price,
            make: non_empty("make", &r.make)?,
            model: non_empty("model", &r.model)?,
            year: r.year,
            lng: r.lng,
            lat: r.lat,
            mileage: r.mileage,
        })
    }
}

/// Query string of `GET /reports`.
#[derive(Debug, Deserialize)]
pub struct GetEstimateRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
}

impl TryFrom<GetEstimateRequest> for EstimateQuery {
    type Error = ApiError;

    fn try_from(q: GetEstimateRequest) -> Result<Self, Self::Error> {
        check("year", q.year, &YEAR_RANGE)?;
        check("lng", q.lng, &LNG_RANGE)?;
        check("lat", q.lat, &LAT_RANGE)?;
        check("mileage", q.mileage, &MILEAGE_RANGE)?;
        Ok(EstimateQuery {
            make: non_empty("make", &q.make)?,
            model: non_empty("model", &q.model)?,
            year: q.year,
            lng: q.lng,
            lat: q.lat,
            mileage: q.mileage,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproveReportRequest {
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub price: Option<f64>,
}

/// Outward shape of a report.
#[derive(Debug, Serialize)]
pub struct ReportDto {
    pub id: i64,
    pub price: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
    pub approved: bool,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Report> for ReportDto {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            price: r.price,
            make: r.make,
            model: r.model,
            year: r.year,
            lng: r.lng,
            lat: r.lat,
            mileage: r.mileage,
            approved: r.approved,
            user_id: r.user_id,
            created_at: r.created_at,
        }
    }
}
