use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    constants::{SESSION_COOKIE, TOKEN_SCHEMES},
    error::ApiError,
    state::{with_state, AppState},
    store::{Store, StoreTx},
};

use super::jwt::{verify_jwt_session, SessionData};

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";
const MALFORMED_HEADER: &str = "Invalid token header.";
const UNKNOWN_USER: &str = "User not found.";

/// Extracts the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Result<&str, ApiError> {
    let mut parts = header.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if TOKEN_SCHEMES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(scheme)) =>
        {
            Ok(token)
        }
        _ => Err(ApiError::Unauthenticated(MALFORMED_HEADER)),
    }
}

/// Resolves the caller from a header or cookie token. The header wins when
/// both are present.
pub async fn authenticate<S: Store>(
    state: &AppState<S>,
    header: Option<&str>,
    cookie: Option<&str>,
) -> Result<SessionData, ApiError> {
    let token = match (header, cookie) {
        (Some(header), _) => bearer_token(header)?,
        (None, Some(cookie)) => cookie,
        (None, None) => return Err(ApiError::Unauthenticated(MISSING_CREDENTIALS)),
    };

    let session = verify_jwt_session(&state.keys, token)?;

    let mut tx = state.store.begin().await?;
    let user = tx
        .find_user(session.user_id)
        .await?
        .ok_or(ApiError::Unauthenticated(UNKNOWN_USER))?;

    Ok(SessionData::from(user))
}

pub fn with_session<S: Store>(
    state: Arc<AppState<S>>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_state(state)
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .and_then(
            |state: Arc<AppState<S>>, header: Option<String>, cookie: Option<String>| async move {
                authenticate(&state, header.as_deref(), cookie.as_deref())
                    .await
                    .map_err(|e| {
                        log::debug!("Rejected request: {e}");
                        warp::reject::custom(e)
                    })
            },
        )
}
