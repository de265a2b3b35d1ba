/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Money amounts in the currency's minor unit (kobo for NGN, cents for USD).
pub type MinorUnits = i64;
