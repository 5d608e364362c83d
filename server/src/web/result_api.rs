use serde::Deserialize;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use super::{feed, with_state, SharedState};
use crate::error::ApiError;
use crate::voting::{aggregate_results, Id};

pub fn routes(state: SharedState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let results = warp::path!("results")
        .and(warp::get())
        .and(warp::query::<ResultsQuery>())
        .and(with_state(state.clone()))
        .and_then(get_results);
    let stream = warp::path!("results" / "stream")
        .and(warp::get())
        .and(with_state(state))
        .and_then(feed::stream);

    results.or(stream).unify()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsQuery {
    #[serde(default)]
    project_id: Option<Id>,
}

async fn get_results(query: ResultsQuery, state: SharedState) -> Result<Response, Rejection> {
    let results = aggregate_results(&*state.store, query.project_id, state.config.scoring_mode)
        .await
        .map_err(ApiError::store("aggregate results"))?;
    if query.project_id.is_some() && results.is_empty() {
        return Err(ApiError::NotFound("project").into());
    }
    Ok(reply::json(&results).into_response())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warp::http::StatusCode;

    use crate::voting::{IdentitySource, NewVote, ProjectSettings, ScoringMode};
    use crate::web::routes;
    use crate::web::test_support::*;

    fn settings(name: &str) -> ProjectSettings {
        ProjectSettings {
            name: name.to_string(),
            team_name: String::from("Crows"),
            description: String::from("demo"),
            appeal_point: None,
            demo_url: None,
            image_url: Some(format!("https://img.example.com/{name}.png")),
        }
    }

    #[tokio::test]
    async fn count_mode_ranks_by_votes() {
        let state = state(IdentitySource::Anonymous, ScoringMode::Count);
        let quiet = state.store.create_project(settings("Quiet")).await.unwrap();
        let loud = state.store.create_project(settings("Loud")).await.unwrap();
        for _ in 0..2 {
            state
                .store
                .insert_vote(NewVote { voter: None, project_id: loud.id, scores: None })
                .await
                .unwrap();
        }

        let response = warp::test::request().path("/results").reply(&routes(state)).await;
        let results = body(StatusCode::OK, &response);
        assert_eq!(results[0]["name"], "Loud");
        assert_eq!(results[0]["voteCount"], 2);
        assert_eq!(results[0]["imageUrl"], "https://img.example.com/Loud.png");
        assert_eq!(results[1]["id"], json!(quiet.id));
        assert_eq!(results[1]["voteCount"], 0);
        assert_eq!(results[1]["totalScore"], 0.0);
    }

    #[tokio::test]
    async fn malformed_project_filter_is_a_bad_request() {
        let state = state(IdentitySource::Anonymous, ScoringMode::Count);
        let response = warp::test::request().path("/results?projectId=nope").reply(&routes(state)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
