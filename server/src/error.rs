use std::convert::Infallible;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::reply::{self, Reply, Response};
use warp::Rejection;

use crate::store::StoreError;
use crate::voting::Ineligible;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error: {}", self.message)
    }
}

impl Error for ValidationError {}

pub fn project_fields_missing(missing: &[&str]) -> ValidationError {
    ValidationError {
        message: format!("project requires {}", missing.join(", ")),
    }
}

pub fn project_field_too_long(field: &str, max: usize, len: usize) -> ValidationError {
    ValidationError {
        message: format!("project {field} must be at most {max} characters, got {len}"),
    }
}

pub fn score_out_of_range(dimension: &str, limits: RangeInclusive<i32>, score: i32) -> ValidationError {
    ValidationError {
        message: format!("{dimension} score must be between {} and {}, got {score}", limits.start(), limits.end()),
    }
}

pub fn scores_required() -> ValidationError {
    ValidationError {
        message: String::from("rubric scores are required for every vote"),
    }
}

pub fn period_fields_missing() -> ValidationError {
    ValidationError {
        message: String::from("voting period requires startTime and endTime"),
    }
}

pub fn period_range_invalid(start: &DateTime<Utc>, end: &DateTime<Utc>) -> ValidationError {
    ValidationError {
        message: format!("voting period must end after it starts, got {start} to {end}"),
    }
}

pub fn period_activation_conflict() -> ValidationError {
    ValidationError {
        message: String::from("another voting period was activated at the same time, retry the request"),
    }
}

pub fn project_already_listed(name: &str, team_name: &str) -> ValidationError {
    ValidationError {
        message: format!("project {name:?} by team {team_name:?} is already listed"),
    }
}

pub fn anonymous_withdrawal() -> ValidationError {
    ValidationError {
        message: String::from("votes cast without a voter identity cannot be withdrawn"),
    }
}

pub fn role_unknown(role: &str) -> ValidationError {
    ValidationError {
        message: format!("unknown user role {role:?}"),
    }
}

/// Every failure a request can end in. Handlers return it through `?` and
/// [`recover`] turns it into a JSON body with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Admin access required")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ineligible(#[from] Ineligible),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Failed to {action}")]
    Internal {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::Ineligible(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wraps a store failure with the action that was being attempted, for `map_err`.
    pub fn store(action: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Internal { action, source }
    }
}

// warp's blanket `From<T: Reject>` turns it into a `Rejection` for `?`
impl Reject for ApiError {}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

fn error_reply(code: StatusCode, message: String) -> Response {
    reply::with_status(reply::json(&ErrorBody { message }), code).into_response()
}

pub async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(err) = rejection.find::<ApiError>() {
        if let ApiError::Internal { source, .. } = err {
            error!(error = %source, "{err}");
        }
        return Ok(error_reply(err.status(), err.to_string()));
    }

    if rejection.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, String::from("Not found")));
    }
    if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, format!("Malformed request body: {err}")));
    }
    if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, err.to_string()));
    }
    if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, String::from("Request body too large")));
    }
    if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(error_reply(StatusCode::UNSUPPORTED_MEDIA_TYPE, String::from("Expected a JSON body")));
    }
    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed")));
    }

    warn!(?rejection, "unhandled rejection");
    Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, String::from("Internal server error")))
}
