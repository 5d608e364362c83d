use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use super::auth::{identity_claims, resolve_identity};
use super::{json_body, with_state, AppState, SharedState, VoteEvent};
use crate::error::{self, ApiError};
use crate::store::StoreError;
use crate::voting::{
    generate_token, EligibilityChecker, Id, IdentityClaims, Ineligible, NewVote, VoteRequest, WithdrawRequest,
};

pub fn routes(state: SharedState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let cast = warp::path!("votes")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(identity_claims(state.clone()))
        .and(json_body())
        .and_then(cast_vote);
    let withdraw = warp::path!("votes")
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(identity_claims(state.clone()))
        .and(json_body())
        .and_then(withdraw_vote);
    let eligibility = warp::path!("votes" / "eligibility")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(identity_claims(state))
        .and(warp::query::<EligibilityQuery>())
        .and_then(check_eligibility);
    let token = warp::path!("voter-token").and(warp::get()).map(|| {
        reply::json(&TokenResponse { token: generate_token() }).into_response()
    });

    cast.or(withdraw)
        .unify()
        .or(eligibility)
        .unify()
        .or(token)
        .unify()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityQuery {
    project_id: Id,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct WithdrawResponse {
    deleted: u64,
}

async fn ensure_project(state: &AppState, id: Id) -> Result<(), ApiError> {
    match state.store.get_project(id).await.map_err(ApiError::store("load project"))? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound("project")),
    }
}

/// The eligibility check can race a concurrent vote or project removal; the
/// table constraints settle both.
fn insert_error(err: StoreError) -> ApiError {
    match err {
        StoreError::UniqueViolation(_) => ApiError::from(Ineligible::DuplicateVote),
        StoreError::ForeignKeyViolation(_) => ApiError::NotFound("project"),
        other => ApiError::store("record vote")(other),
    }
}

async fn cast_vote(state: SharedState, claims: IdentityClaims, request: VoteRequest) -> Result<Response, Rejection> {
    let VoteRequest { project_id, scores, voter_token } = request;
    let identity = resolve_identity(&state, &claims.with_body_token(voter_token))?;
    let vote = NewVote::build(&identity, project_id, scores, state.config.scoring_mode).map_err(ApiError::from)?;
    ensure_project(&state, project_id).await?;

    EligibilityChecker::new(&*state.store)
        .can_vote(&identity, &project_id, Utc::now())
        .await
        .map_err(ApiError::store("check eligibility"))?
        .into_result()
        .map_err(ApiError::from)?;

    let vote = state.store.insert_vote(vote).await.map_err(insert_error)?;

    info!(vote = %vote.id, project = %project_id, "Vote recorded");
    debug!(voter = %identity, "vote identity");
    state.feed.publish(VoteEvent::Cast(project_id));
    Ok(reply::with_status(reply::json(&vote), StatusCode::CREATED).into_response())
}

async fn withdraw_vote(state: SharedState, claims: IdentityClaims, request: WithdrawRequest) -> Result<Response, Rejection> {
    let WithdrawRequest { project_id, voter_token } = request;
    let identity = resolve_identity(&state, &claims.with_body_token(voter_token))?;
    let voter = identity.key().ok_or_else(|| ApiError::from(error::anonymous_withdrawal()))?;

    EligibilityChecker::new(&*state.store)
        .can_withdraw(Utc::now())
        .await
        .map_err(ApiError::store("check eligibility"))?
        .into_result()
        .map_err(ApiError::from)?;

    let deleted = state
        .store
        .delete_votes(&voter, project_id)
        .await
        .map_err(ApiError::store("withdraw vote"))?;
    if deleted > 0 {
        info!(project = %project_id, deleted, "Vote withdrawn");
        state.feed.publish(VoteEvent::Withdrawn(project_id));
    }
    Ok(reply::json(&WithdrawResponse { deleted }).into_response())
}

async fn check_eligibility(state: SharedState, claims: IdentityClaims, query: EligibilityQuery) -> Result<Response, Rejection> {
    let identity = resolve_identity(&state, &claims)?;
    ensure_project(&state, query.project_id).await?;
    let eligibility = EligibilityChecker::new(&*state.store)
        .can_vote(&identity, &query.project_id, Utc::now())
        .await
        .map_err(ApiError::store("check eligibility"))?;
    Ok(reply::json(&eligibility).into_response())
}
