use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,                    // numeric user ID
    pub email: String,              // unique, normalized email
    pub password: String,           // hex(salt).hex(key), never exposed
    pub admin: bool,                // may approve reports
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Fields a user may change. `password` is already encoded.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
}
