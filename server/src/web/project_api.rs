use std::collections::HashMap;
use std::convert::TryFrom;

use tracing::info;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use super::auth::require_admin;
use super::{json_body, with_state, SharedState, VoteEvent};
use crate::error::{self, ApiError};
use crate::store::StoreError;
use crate::voting::{Id, ProjectSettings, ProjectWithVotes, UnvalidatedProjectSettings, User};

pub fn routes(state: SharedState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list = warp::path!("projects")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_projects);
    let get = warp::path!("projects" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_project);
    let create = warp::path!("projects")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(require_admin(state.clone()))
        .and(json_body())
        .and_then(create_project);
    let update = warp::path!("projects" / Id)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(require_admin(state.clone()))
        .and(json_body())
        .and_then(update_project);
    let delete = warp::path!("projects" / Id)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(require_admin(state))
        .and_then(delete_project);

    list.or(get)
        .unify()
        .or(create)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
}

/// Unique (name, team) clashes are the admin's mistake, not ours.
fn write_error(settings: &ProjectSettings, action: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    let name = settings.name.clone();
    let team_name = settings.team_name.clone();
    move |err| match err {
        StoreError::UniqueViolation(_) => error::project_already_listed(&name, &team_name).into(),
        other => ApiError::store(action)(other),
    }
}

async fn list_projects(state: SharedState) -> Result<Response, Rejection> {
    let projects = state.store.list_projects().await.map_err(ApiError::store("load projects"))?;
    let counts: HashMap<Id, i64> = state
        .store
        .tallies(None)
        .await
        .map_err(ApiError::store("load vote counts"))?
        .into_iter()
        .map(|tally| (tally.project_id, tally.vote_count))
        .collect();

    let listing: Vec<ProjectWithVotes> = projects
        .into_iter()
        .map(|project| {
            let vote_count = counts.get(&project.id).copied().unwrap_or(0);
            ProjectWithVotes { project, vote_count }
        })
        .collect();
    Ok(reply::json(&listing).into_response())
}

async fn get_project(id: Id, state: SharedState) -> Result<Response, Rejection> {
    let project = state
        .store
        .get_project(id)
        .await
        .map_err(ApiError::store("load project"))?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(reply::json(&project).into_response())
}

async fn create_project(state: SharedState, admin: User, body: UnvalidatedProjectSettings) -> Result<Response, Rejection> {
    let settings = ProjectSettings::try_from(body).map_err(ApiError::from)?;
    let on_error = write_error(&settings, "create project");
    let project = state.store.create_project(settings).await.map_err(on_error)?;

    info!(project = %project.id, name = %project.name, admin = %admin.id, "Project created");
    Ok(reply::with_status(reply::json(&project), StatusCode::CREATED).into_response())
}

async fn update_project(id: Id, state: SharedState, admin: User, body: UnvalidatedProjectSettings) -> Result<Response, Rejection> {
    let settings = ProjectSettings::try_from(body).map_err(ApiError::from)?;
    let on_error = write_error(&settings, "update project");
    let project = state
        .store
        .update_project(id, settings)
        .await
        .map_err(on_error)?
        .ok_or(ApiError::NotFound("project"))?;

    info!(project = %id, admin = %admin.id, "Project updated");
    Ok(reply::json(&project).into_response())
}

async fn delete_project(id: Id, state: SharedState, admin: User) -> Result<Response, Rejection> {
    let removed = state.store.delete_project(id).await.map_err(ApiError::store("delete project"))?;
    if !removed {
        return Err(ApiError::NotFound("project").into());
    }

    info!(project = %id, admin = %admin.id, "Project deleted");
    state.feed.publish(VoteEvent::ProjectRemoved(id));
    Ok(reply::json(&serde_json::json!({ "message": "Project deleted" })).into_response())
}
