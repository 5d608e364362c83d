use std::net::SocketAddr;

use tracing::{debug, warn};
use warp::http::HeaderMap;
use warp::{Filter, Rejection};

use super::{with_state, AppState, SharedState};
use crate::error::ApiError;
use crate::voting::{Id, IdentityClaims, IdentitySource, User, VoterIdentity};

pub const VOTER_TOKEN_HEADER: &str = "x-voter-token";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The identity provider in front of the server forwards the signed-in user
/// as a pair of headers. A user seen with an email is upserted so roles stay
/// current; a bare id must already be known.
async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some(raw_id) = header_value(headers, &state.config.auth_user_header) else {
        return Ok(None);
    };
    let id: Id = raw_id.parse().map_err(|_| {
        warn!(header = %state.config.auth_user_header, "malformed user id");
        ApiError::Unauthenticated
    })?;

    match header_value(headers, &state.config.auth_email_header) {
        Some(email) => {
            let admin = state.config.is_admin_email(email);
            let user = state
                .store
                .sync_user(id, email, admin)
                .await
                .map_err(ApiError::store("sync user"))?;
            debug!(user = %user.id, role = %user.role, "session user");
            Ok(Some(user))
        }
        None => state.store.get_user(id).await.map_err(ApiError::store("load user")),
    }
}

pub fn session_user(state: SharedState) -> impl Filter<Extract = (Option<User>,), Error = Rejection> + Clone {
    with_state(state)
        .and(warp::header::headers_cloned())
        .and_then(|state: SharedState, headers: HeaderMap| async move {
            resolve_user(&state, &headers).await.map_err(Rejection::from)
        })
}

pub fn authorize_admin(user: Option<User>) -> Result<User, ApiError> {
    match user {
        None => Err(ApiError::Unauthenticated),
        Some(user) if user.is_admin() => Ok(user),
        Some(user) => {
            warn!(user = %user.id, "admin route refused");
            Err(ApiError::Forbidden)
        }
    }
}

pub fn require_admin(state: SharedState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    session_user(state).and_then(|user: Option<User>| async move { authorize_admin(user).map_err(Rejection::from) })
}

/// Only the `user` source looks at the session; other sources ignore the
/// provider headers entirely.
pub fn identity_claims(state: SharedState) -> impl Filter<Extract = (IdentityClaims,), Error = Rejection> + Clone {
    with_state(state)
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and_then(|state: SharedState, headers: HeaderMap, peer: Option<SocketAddr>| async move {
            let user = match state.config.identity_source {
                IdentitySource::User => resolve_user(&state, &headers).await?,
                _ => None,
            };
            Ok::<_, Rejection>(IdentityClaims {
                user_id: user.map(|user| user.id),
                forwarded_for: header_value(&headers, FORWARDED_FOR_HEADER).map(String::from),
                peer,
                token: header_value(&headers, VOTER_TOKEN_HEADER).map(String::from),
            })
        })
}

/// Applies the configured identity source; no identity means 401.
pub fn resolve_identity(state: &AppState, claims: &IdentityClaims) -> Result<VoterIdentity, ApiError> {
    state
        .config
        .identity_source
        .resolve(claims)
        .ok_or(ApiError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use warp::http::StatusCode;

    use super::*;
    use crate::voting::{Role, ScoringMode};
    use crate::web::test_support::{self, ADMIN_EMAIL};

    fn user(role: Role) -> User {
        User::new(Id::new(), String::from("someone@example.com"), role)
    }

    #[test]
    fn admin_check_distinguishes_missing_from_forbidden() {
        assert!(matches!(authorize_admin(None), Err(ApiError::Unauthenticated)));
        assert!(matches!(authorize_admin(Some(user(Role::Voter))), Err(ApiError::Forbidden)));
        assert!(authorize_admin(Some(user(Role::Admin))).is_ok());
    }

    #[tokio::test]
    async fn listed_email_syncs_an_admin() {
        let state = test_support::state(IdentitySource::User, ScoringMode::Rubric);
        let id = Uuid::new_v4();
        let filter = session_user(state.clone());

        let user = warp::test::request()
            .header("x-user-id", id.to_string())
            .header("x-user-email", ADMIN_EMAIL)
            .filter(&filter)
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_admin());

        // later requests carrying only the id find the stored user
        let user = warp::test::request()
            .header("x-user-id", id.to_string())
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(user.map(|u| u.role), Some(Role::Admin));
    }

    #[tokio::test]
    async fn no_headers_means_no_user() {
        let state = test_support::state(IdentitySource::User, ScoringMode::Rubric);
        let user = warp::test::request().filter(&session_user(state)).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn malformed_user_id_is_unauthenticated() {
        let state = test_support::state(IdentitySource::User, ScoringMode::Rubric);
        let rejection = warp::test::request()
            .header("x-user-id", "not-a-uuid")
            .filter(&session_user(state))
            .await
            .unwrap_err();
        let err = rejection.find::<ApiError>().unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn claims_collect_token_and_forwarded_address() {
        let state = test_support::state(IdentitySource::Ip, ScoringMode::Rubric);
        let claims = warp::test::request()
            .header(VOTER_TOKEN_HEADER, "abc")
            .header(FORWARDED_FOR_HEADER, "203.0.113.9")
            .filter(&identity_claims(state.clone()))
            .await
            .unwrap();
        assert_eq!(claims.token.as_deref(), Some("abc"));
        let identity = resolve_identity(&state, &claims).unwrap();
        assert_eq!(identity.key().as_deref(), Some("ip:203.0.113.9"));
    }

    #[tokio::test]
    async fn non_user_sources_ignore_session_headers() {
        let state = test_support::state(IdentitySource::Token, ScoringMode::Rubric);
        let claims = warp::test::request()
            .header("x-user-id", "undefined")
            .header(VOTER_TOKEN_HEADER, "tok")
            .filter(&identity_claims(state.clone()))
            .await
            .unwrap();
        assert_eq!(claims.user_id, None);
        assert_eq!(resolve_identity(&state, &claims).unwrap(), VoterIdentity::Token(String::from("tok")));
    }

    #[tokio::test]
    async fn user_source_resolves_the_session() {
        let state = test_support::state(IdentitySource::User, ScoringMode::Rubric);
        let id = Uuid::new_v4();
        let claims = warp::test::request()
            .header("x-user-id", id.to_string())
            .header("x-user-email", "voter@example.com")
            .filter(&identity_claims(state.clone()))
            .await
            .unwrap();
        assert_eq!(resolve_identity(&state, &claims).unwrap(), VoterIdentity::User(Id(id)));

        let rejection = warp::test::request()
            .header("x-user-id", "undefined")
            .filter(&identity_claims(state))
            .await
            .unwrap_err();
        assert_eq!(rejection.find::<ApiError>().map(ApiError::status), Some(StatusCode::UNAUTHORIZED));
    }
}
