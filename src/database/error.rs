use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::json;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject, reply::Response, Reply};

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// SQLSTATEs after which the whole transaction can simply be run again:
/// `serialization_failure` and `deadlock_detected`.
const RETRYABLE_STATES: &[&str] = &["40001", "40P01"];

#[derive(Debug)]
pub struct QueryError {
    info: String,
    code: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info, code: None }
    }

    pub fn with_code(info: String, code: Option<String>) -> Self {
        Self { info, code }
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code()
            .is_some_and(|code| RETRYABLE_STATES.contains(&code))
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let code = e.code().map(|code| code.into_owned());
                Self::with_code(
                    format!("{} ({})", e.message(), code.as_deref().unwrap_or_default()),
                    code,
                )
            }
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for QueryError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::new(format!("Migration failed: {value}"))
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Not found.")]
    NotFound,

    #[error("Invalid input: {0:?}")]
    Validation(FieldErrors),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl Reject for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        ApiError::Query(QueryError::from(value))
    }
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    /// Unique `(owner, name)` violation reported against the `name` field.
    pub fn duplicate_name(kind: &str) -> Self {
        Self::validation("name", format!("{kind} with this name already exists."))
    }

    /// A deadlock or serialization failure: nothing was written and the same
    /// transaction may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Query(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Query(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_response(&self) -> Response {
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Query(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                log::error!("Request failed: {self}");
                json!({ "detail": "Internal server error." })
            }
            e => json!({ "detail": e.to_string() }),
        };

        warp::reply::with_status(warp::reply::json(&body), self.status()).into_response()
    }
}
