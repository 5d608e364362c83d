use std::convert::TryFrom;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use super::auth::require_admin;
use super::{json_body, with_state, SharedState};
use crate::error::{self, ApiError};
use crate::store::StoreError;
use crate::voting::{check_window, phase, Id, PeriodSettings, Phase, UnvalidatedPeriodSettings, User, VotingPeriod};

pub fn routes(state: SharedState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("voting-periods")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_periods);
    let current = warp::path!("voting-periods" / "current")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(current_period);
    let get = warp::path!("voting-periods" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_period);
    let create = warp::path!("voting-periods")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(require_admin(state.clone()))
        .and(json_body())
        .and_then(create_period);
    let update = warp::path!("voting-periods" / Id)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(require_admin(state.clone()))
        .and(json_body())
        .and_then(update_period);
    let delete = warp::path!("voting-periods" / Id)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(require_admin(state))
        .and_then(delete_period);

    // `current` must be tried before the `{id}` route
    list.or(current)
        .unify()
        .or(get)
        .unify()
        .or(create)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
}

/// Two periods activated at once trip the single-active index; the loser retries.
fn write_error(action: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |err| match err {
        StoreError::UniqueViolation(_) => error::period_activation_conflict().into(),
        other => ApiError::store(action)(other),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPeriod {
    period: Option<VotingPeriod>,
    phase: Phase,
    accepting_votes: bool,
}

async fn list_periods(state: SharedState) -> Result<Response, Rejection> {
    let periods = state.store.list_periods().await.map_err(ApiError::store("load voting periods"))?;
    Ok(reply::json(&periods).into_response())
}

async fn current_period(state: SharedState) -> Result<Response, Rejection> {
    let period = state.store.active_period().await.map_err(ApiError::store("load voting period"))?;
    let now = Utc::now();
    let body = CurrentPeriod {
        phase: phase(period.as_ref(), &now),
        accepting_votes: check_window(period.as_ref(), &now).is_ok(),
        period,
    };
    Ok(reply::json(&body).into_response())
}

async fn get_period(id: Id, state: SharedState) -> Result<Response, Rejection> {
    let period = state
        .store
        .get_period(id)
        .await
        .map_err(ApiError::store("load voting period"))?
        .ok_or(ApiError::NotFound("voting period"))?;
    Ok(reply::json(&period).into_response())
}

async fn create_period(state: SharedState, admin: User, body: UnvalidatedPeriodSettings) -> Result<Response, Rejection> {
    let settings = PeriodSettings::try_from(body).map_err(ApiError::from)?;
    let period = state
        .store
        .create_period(settings)
        .await
        .map_err(write_error("create voting period"))?;

    info!(
        period = %period.id,
        start = %period.start_time,
        end = %period.end_time,
        active = period.is_active,
        admin = %admin.id,
        "Voting period created"
    );
    Ok(reply::with_status(reply::json(&period), StatusCode::CREATED).into_response())
}

async fn update_period(id: Id, state: SharedState, admin: User, body: UnvalidatedPeriodSettings) -> Result<Response, Rejection> {
    let settings = PeriodSettings::try_from(body).map_err(ApiError::from)?;
    let period = state
        .store
        .update_period(id, settings)
        .await
        .map_err(write_error("update voting period"))?
        .ok_or(ApiError::NotFound("voting period"))?;

    info!(period = %id, active = period.is_active, admin = %admin.id, "Voting period updated");
    Ok(reply::json(&period).into_response())
}

async fn delete_period(id: Id, state: SharedState, admin: User) -> Result<Response, Rejection> {
    let removed = state.store.delete_period(id).await.map_err(ApiError::store("delete voting period"))?;
    if !removed {
        return Err(ApiError::NotFound("voting period").into());
    }

    info!(period = %id, admin = %admin.id, "Voting period deleted");
    Ok(reply::json(&serde_json::json!({ "message": "Voting period deleted" })).into_response())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::write_error;
    use crate::store::StoreError;
    use crate::voting::{IdentitySource, ScoringMode};
    use crate::web::routes;
    use crate::web::test_support::*;

    fn range(start_hours: i64, end_hours: i64) -> Value {
        let now = Utc::now();
        json!({
            "startTime": now + Duration::hours(start_hours),
            "endTime": now + Duration::hours(end_hours),
        })
    }

    #[tokio::test]
    async fn no_period_means_voting_closed() {
        let state = state(IdentitySource::User, ScoringMode::Rubric);
        let response = warp::test::request().path("/voting-periods/current").reply(&routes(state)).await;
        assert_eq!(
            body(StatusCode::OK, &response),
            json!({ "period": null, "phase": "noPeriod", "acceptingVotes": false })
        );
    }

    #[tokio::test]
    async fn activating_a_period_deactivates_the_rest() {
        let state = state(IdentitySource::User, ScoringMode::Rubric);
        let filter = routes(state.clone());

        let response = admin_request()
            .method("POST")
            .path("/voting-periods")
            .json(&range(-1, 1))
            .reply(&filter)
            .await;
        let first = body(StatusCode::CREATED, &response);
        assert_eq!(first["isActive"], true);

        let response = admin_request()
            .method("POST")
            .path("/voting-periods")
            .json(&range(24, 48))
            .reply(&filter)
            .await;
        let second = body(StatusCode::CREATED, &response);

        let response = warp::test::request().path("/voting-periods/current").reply(&filter).await;
        let current = body(StatusCode::OK, &response);
        assert_eq!(current["period"]["id"], second["id"]);
        assert_eq!(current["phase"], "scheduled");
        assert_eq!(current["acceptingVotes"], false);

        let first_id = first["id"].as_str().unwrap();
        let mut update = range(-1, 1);
        update["isActive"] = json!(true);
        let response = admin_request()
            .method("PUT")
            .path(&format!("/voting-periods/{first_id}"))
            .json(&update)
            .reply(&filter)
            .await;
        assert_eq!(body(StatusCode::OK, &response)["isActive"], true);

        let response = warp::test::request().path("/voting-periods").reply(&filter).await;
        let periods = body(StatusCode::OK, &response);
        let active: Vec<&Value> = periods.as_array().unwrap().iter().filter(|p| p["isActive"] == true).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], first["id"]);

        let response = warp::test::request().path("/voting-periods/current").reply(&filter).await;
        let current = body(StatusCode::OK, &response);
        assert_eq!(current["phase"], "active");
        assert_eq!(current["acceptingVotes"], true);
    }

    #[test]
    fn concurrent_activation_is_a_client_error() {
        let conflict = write_error("create voting period")(StoreError::UniqueViolation(String::from(
            "voting_periods_single_active",
        )));
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);
        assert!(conflict.to_string().contains("activated at the same time"));

        let broken = write_error("update voting period")(StoreError::Locked);
        assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(broken.to_string(), "Failed to update voting period");
    }

    #[tokio::test]
    async fn end_must_follow_start() {
        let state = state(IdentitySource::User, ScoringMode::Rubric);
        let response = admin_request()
            .method("POST")
            .path("/voting-periods")
            .json(&range(2, 1))
            .reply(&routes(state))
            .await;
        let message = body(StatusCode::BAD_REQUEST, &response)["message"].as_str().unwrap().to_string();
        assert!(message.contains("must end after it starts"));
    }

    #[tokio::test]
    async fn voters_cannot_manage_periods() {
        let state = state(IdentitySource::User, ScoringMode::Rubric);
        let response = warp::test::request()
            .method("POST")
            .path("/voting-periods")
            .header("x-user-id", uuid::Uuid::new_v4().to_string())
            .header("x-user-email", "voter@example.com")
            .json(&range(-1, 1))
            .reply(&routes(state))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_periods_are_not_found() {
        let state = state(IdentitySource::User, ScoringMode::Rubric);
        let filter = routes(state);
        let path = format!("/voting-periods/{}", uuid::Uuid::new_v4());

        let response = warp::test::request().path(&path).reply(&filter).await;
        assert_eq!(body(StatusCode::NOT_FOUND, &response)["message"], "voting period not found");

        let response = admin_request().method("DELETE").path(&path).reply(&filter).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
