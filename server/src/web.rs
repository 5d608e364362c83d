mod auth;
mod feed;
mod period_api;
mod project_api;
mod result_api;
mod vote_api;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;
use warp::{Filter, Rejection, Reply};

pub use feed::{VoteEvent, VoteFeed};

use crate::config::Config;
use crate::error;
use crate::store::Store;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub feed: VoteFeed,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> SharedState {
        Arc::new(AppState {
            store,
            config,
            feed: VoteFeed::new(),
        })
    }
}

pub fn with_state(state: SharedState) -> impl Filter<Extract = (SharedState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })));

    project_api::routes(state.clone())
        .or(period_api::routes(state.clone()))
        .or(vote_api::routes(state.clone()))
        .or(result_api::routes(state))
        .or(health)
        .recover(error::recover)
        .with(warp::trace::request())
}

/// Serves until ctrl-c.
pub async fn serve(state: SharedState, addr: SocketAddr) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    })?;
    info!(addr = %bound, "Listening");
    server.await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::Value;
    use uuid::Uuid;
    use warp::http::StatusCode;

    use super::{AppState, SharedState};
    use crate::config::{Config, StoreBackend};
    use crate::store::MemoryStore;
    use crate::voting::{IdentitySource, PeriodSettings, ScoringMode};

    pub const ADMIN_EMAIL: &str = "jane@example.com";

    pub fn config(identity_source: IdentitySource, scoring_mode: ScoringMode) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            identity_source,
            scoring_mode,
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            auth_user_header: String::from("x-user-id"),
            auth_email_header: String::from("x-user-email"),
            seed_demo_data: false,
        }
    }

    pub fn state(identity_source: IdentitySource, scoring_mode: ScoringMode) -> SharedState {
        AppState::new(Arc::new(MemoryStore::new()), config(identity_source, scoring_mode))
    }

    /// Opens a period around now.
    pub async fn open_voting(state: &SharedState) {
        let now = Utc::now();
        state
            .store
            .create_period(PeriodSettings {
                start_time: now - Duration::hours(1),
                end_time: now + Duration::hours(1),
                is_active: Some(true),
            })
            .await
            .unwrap();
    }

    pub fn admin_request() -> warp::test::RequestBuilder {
        warp::test::request()
            .header("x-user-id", Uuid::new_v4().to_string())
            .header("x-user-email", ADMIN_EMAIL)
    }

    pub fn body(status: StatusCode, response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        assert_eq!(response.status(), status, "body: {:?}", response.body());
        serde_json::from_slice(response.body()).unwrap()
    }
}
