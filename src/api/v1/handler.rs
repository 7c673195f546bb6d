use super::error::*;
use crate::application_port::FriendshipService;
use crate::domain_model::{PairState, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub target_id: UserId,
}

pub async fn request_friendship(
    user_id: UserId,
    body: FriendRequestBody,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = friendship_service
        .request_friendship(user_id, body.target_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestBody {
    pub requester_id: UserId,
}

pub async fn accept_friendship(
    user_id: UserId,
    body: PendingRequestBody,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = friendship_service
        .accept_friendship(user_id, body.requester_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

pub async fn deny_friendship(
    user_id: UserId,
    body: PendingRequestBody,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = friendship_service
        .deny_friendship(user_id, body.requester_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfollowBody {
    pub other_id: UserId,
}

pub async fn unfollow(
    user_id: UserId,
    body: UnfollowBody,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = friendship_service
        .unfollow(user_id, body.other_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

pub async fn list_relations(
    user_id: UserId,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let view = friendship_service
        .list_relations(user_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(view)))
}

#[derive(Debug, Serialize)]
pub struct RelationStateResponse {
    pub state: PairState,
}

pub async fn relation_state(
    other: UserId,
    user_id: UserId,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let state = friendship_service
        .relation_state(user_id, other)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RelationStateResponse { state })))
}
