use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use dashmap::DashMap;
use uuid::Uuid;
use crate::api::ApiError;

pub const SESSION_COOKIE: &str = "stylepins_session";

#[derive(Debug, Clone)]
struct Session {
    expires_at: Instant,
}

/// Server-side admin sessions keyed by an opaque token.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self) -> String {
        self.purge_expired();
        let token = Uuid::new_v4().simple().to_string();
        let session = Session { expires_at: Instant::now() + self.ttl };
        self.sessions.insert(token.clone(), session);
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let expired = match self.sessions.get(token) {
            Some(session) => session.expires_at <= Instant::now(),
            None => return false,
        };
        if expired {
            self.sessions.remove(token);
        }
        !expired
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.sessions.retain(|_, session| session.expires_at > now);
    }
}

/// An authenticated admin. Extracting it rejects the request with 401 before
/// the body is read.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);
        let token = session_tokens(&parts.headers)
            .into_iter()
            .find(|x| sessions.is_valid(x))
            .ok_or(ApiError::Unauthorized)?;
        Ok(Self { token })
    }
}

/// Candidate session tokens: the session cookie first, then an
/// `Authorization: Bearer` header. Either one may be stale.
pub fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let bearer = headers.get(AUTHORIZATION)
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|x| !x.is_empty());
    cookie_value(headers, SESSION_COOKIE)
        .into_iter()
        .chain(bearer)
        .map(|x| x.to_string())
        .collect()
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get_all(COOKIE)
        .iter()
        .filter_map(|x| x.to_str().ok())
        .flat_map(|x| x.split(';'))
        .filter_map(|x| x.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", SESSION_COOKIE, token, ttl.as_secs())
}

pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Compares without short-circuiting on the first differing byte.
pub fn check_password(candidate: &str, expected: &str) -> bool {
    let candidate = candidate.as_bytes();
    let expected = expected.as_bytes();
    if candidate.len() != expected.len() {
        return false;
    }
    candidate.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use super::*;

    #[test]
    fn sessions_expire_and_revoke() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create();
        assert!(store.is_valid(&token));
        assert!(!store.is_valid("unknown"));
        store.revoke(&token);
        assert!(!store.is_valid(&token));

        let expired = SessionStore::new(Duration::ZERO);
        let token = expired.create();
        assert!(!expired.is_valid(&token));
    }

    #[test]
    fn tokens_from_cookie_and_bearer() {
        let mut headers = HeaderMap::new();
        assert!(session_tokens(&headers).is_empty());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(session_tokens(&headers), vec!["abc"]);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; stylepins_session=xyz"));
        assert_eq!(session_tokens(&headers), vec!["xyz", "abc"]);

        headers.insert(COOKIE, HeaderValue::from_static("stylepins_session="));
        assert_eq!(session_tokens(&headers), vec!["abc"]);
    }

    #[tokio::test]
    async fn stale_cookie_does_not_hide_valid_bearer() {
        let store = SessionStore::new(Duration::from_secs(60));
        let stale = store.create();
        store.revoke(&stale);
        let valid = store.create();

        let request = axum::http::Request::builder()
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, stale))
            .header(AUTHORIZATION, format!("Bearer {}", valid))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let admin = AdminSession::from_request_parts(&mut parts, &store).await.unwrap();
        assert_eq!(admin.token, valid);

        store.revoke(&valid);
        assert!(AdminSession::from_request_parts(&mut parts, &store).await.is_err());
    }

    #[test]
    fn password_check() {
        assert!(check_password("secret", "secret"));
        assert!(!check_password("secreT", "secret"));
        assert!(!check_password("secret1", "secret"));
        assert!(!check_password("", "secret"));
    }

    #[test]
    fn cookie_strings() {
        let cookie = session_cookie("tok", Duration::from_secs(3600));
        assert_eq!(cookie, "stylepins_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600");
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
