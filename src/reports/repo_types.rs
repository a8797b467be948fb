use sqlx::FromRow;
use time::OffsetDateTime;

/// Report record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub id: i64,
    pub user_id: i64, // submitter
    pub price: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
    pub approved: bool, // only approved reports feed estimates
    pub created_at: OffsetDateTime,
}

/// Validated input for a new report.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub price: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
}

/// Description of the car to price.
#[derive(Debug, Clone)]
pub struct EstimateQuery {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub lng: f64,
    pub lat: f64,
    pub mileage: i64,
}

/// Comparables must sit within these distances of the query.
pub const MAX_COORD_DELTA: f64 = 5.0;
pub const MAX_YEAR_DELTA: i32 = 3;
/// How many comparables, nearest by mileage, are averaged.
pub const COMPARABLES: usize = 3;

impl EstimateQuery {
    pub fn matches(&self, r: &Report) -> bool {
        r.approved
            && r.make.to_lowercase() == self.make.to_lowercase()
            && r.model.to_lowercase() == self.model.to_lowercase()
            && (r.lng - self.lng).abs() <= MAX_COORD_DELTA
            && (r.lat - self.lat).abs() <= MAX_COORD_DELTA
            && (r.year - self.year).abs() <= MAX_YEAR_DELTA
    }
}
