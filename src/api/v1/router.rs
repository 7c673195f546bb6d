use super::error::*;
use super::handler;
use crate::application_port::AccessTokenVerifier;
use crate::domain_model::UserId;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let request = warp::post()
        .and(warp::path("friends"))
        .and(warp::path("request"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(warp::body::json())
        .and(with(server.friendship_service.clone()))
        .and_then(handler::request_friendship);

    let accept = warp::post()
        .and(warp::path("friends"))
        .and(warp::path("accept"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(warp::body::json())
        .and(with(server.friendship_service.clone()))
        .and_then(handler::accept_friendship);

    let deny = warp::post()
        .and(warp::path("friends"))
        .and(warp::path("deny"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(warp::body::json())
        .and(with(server.friendship_service.clone()))
        .and_then(handler::deny_friendship);

    let unfollow = warp::post()
        .and(warp::path("friends"))
        .and(warp::path("unfollow"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(warp::body::json())
        .and(with(server.friendship_service.clone()))
        .and_then(handler::unfollow);

    let list = warp::get()
        .and(warp::path("friends"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::list_relations);

    let state = warp::get()
        .and(warp::path("friends"))
        .and(warp::path::param::<UserId>())
        .and(warp::path("state"))
        .and(warp::path::end())
        .and(with_verification(server.token_verifier.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::relation_state);

    request.or(accept).or(deny).or(unfollow).or(list).or(state)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    token_verifier: Arc<dyn AccessTokenVerifier>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let token_verifier = token_verifier.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let user_id = token_verifier
                    .verify_token(token)
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)?;
                Ok(user_id)
            } else {
                Err(reject::custom(ApiRejection::from(ApiErrorCode::InvalidToken)))
            }
        }
    })
}
