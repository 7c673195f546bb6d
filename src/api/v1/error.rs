use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(rejection) = err.find::<ApiRejection>() {
        (rejection.code.clone(), rejection.message.clone())
    } else if err.find::<reject::MissingHeader>().is_some() {
        (ApiErrorCode::InvalidToken, "Missing Authorization header".to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (ApiErrorCode::BadRequest, e.to_string())
    } else if err.is_not_found() {
        (ApiErrorCode::RouteNotFound, "No such route".to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::RouteNotFound, "Method not allowed".to_string())
    } else {
        (
            ApiErrorCode::InternalError,
            format!("Unhandled error: {:?}", err),
        )
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), message));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Malformed request")]
    BadRequest,
    #[error("No such route")]
    RouteNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Relationship is not in the required state")]
    InvalidState,
    #[error("Cannot befriend yourself")]
    SelfReference,
    #[error("Too many concurrent updates, retry later")]
    RetryLater,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::BadRequest | ApiErrorCode::SelfReference => StatusCode::BAD_REQUEST,
            ApiErrorCode::RouteNotFound
            | ApiErrorCode::UserNotFound
            | ApiErrorCode::InvalidState => StatusCode::NOT_FOUND,
            ApiErrorCode::RetryLater => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rejection carrying an error code and a caller-facing message.
#[derive(Debug, Clone)]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiRejection {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiRejection {
        warn!("Internal error: {}", error);
        ApiRejection::from(ApiErrorCode::InternalError)
    }
}

impl reject::Reject for ApiRejection {}

impl From<ApiErrorCode> for ApiRejection {
    fn from(code: ApiErrorCode) -> Self {
        let message = code.to_string();
        ApiRejection { code, message }
    }
}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenInvalid => ApiRejection::from(ApiErrorCode::InvalidToken),
            AuthError::Store(e) => ApiRejection::internal(e),
        }
    }
}

impl From<FriendshipError> for ApiRejection {
    fn from(error: FriendshipError) -> Self {
        let code = match &error {
            FriendshipError::NotFound(_) => ApiErrorCode::UserNotFound,
            FriendshipError::InvalidState(_) => ApiErrorCode::InvalidState,
            FriendshipError::SelfReference => ApiErrorCode::SelfReference,
            FriendshipError::ConflictRetryExhausted(_) => ApiErrorCode::RetryLater,
            FriendshipError::PartialFailure { .. } => {
                error!(%error, "relationship update left partially applied");
                return ApiRejection::from(ApiErrorCode::InternalError);
            }
            FriendshipError::Store(e) => return ApiRejection::internal(e),
        };
        ApiRejection {
            code,
            message: error.to_string(),
        }
    }
}
