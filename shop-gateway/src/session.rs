//! Request identity: bearer tokens for users, a cookie for everyone else.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use shop_core::{Identity, SessionKey, UserId};
use tracing::{debug, warn};

use crate::{error::GatewayError, state::AppState};

/// The user behind a valid bearer token. Present in request extensions
/// only for authenticated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated(pub UserId);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

fn session_from_cookies(headers: &HeaderMap, name: &str) -> Option<SessionKey> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| SessionKey::parse(value).ok())
}

/// Resolves a bearer token, if one is sent. An unknown or expired token is
/// rejected rather than treated as anonymous.
///
/// # Errors
/// Returns 401 when the token does not authenticate.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if let Some(token) = bearer_token(request.headers()) {
        let user = state.store.authenticate(&token).await?;
        request.extensions_mut().insert(Authenticated(user));
    }
    Ok(next.run(request).await)
}

/// Attaches an [`Identity`] to cart and order requests. Anonymous callers
/// without a valid session cookie get a fresh key, returned in `Set-Cookie`.
pub async fn ensure_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let mut minted = None;
    let identity = match request.extensions().get::<Authenticated>() {
        Some(Authenticated(user)) => Identity::User(*user),
        None => match session_from_cookies(request.headers(), &state.session_cookie) {
            Some(key) => Identity::Anonymous(key),
            None => {
                let key = SessionKey::generate();
                minted = Some(key.clone());
                Identity::Anonymous(key)
            }
        },
    };
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    if let Some(key) = minted {
        let cookie = format!("{}={key}; Path=/; HttpOnly; SameSite=Lax", state.session_cookie);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                debug!("new anonymous session");
            }
            Err(e) => warn!(error = %e, "session cookie not set"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    map.append(*name, v);
                }
                Err(e) => panic!("bad header value: {e}"),
            }
        }
        map
    }

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer abc")])).as_deref(), Some("abc"));
        assert!(bearer_token(&headers(&[("authorization", "Basic abc")])).is_none());
        assert!(bearer_token(&headers(&[("authorization", "Bearer ")])).is_none());
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let key = SessionKey::generate();
        let cookie = format!("theme=dark; sessionid={key}; lang=uk");
        let found = session_from_cookies(&headers(&[("cookie", &cookie)]), "sessionid");
        assert_eq!(found, Some(key));
    }

    #[test]
    fn malformed_session_cookie_is_ignored() {
        let found = session_from_cookies(&headers(&[("cookie", "sessionid=../../etc")]), "sessionid");
        assert!(found.is_none());
    }
}
