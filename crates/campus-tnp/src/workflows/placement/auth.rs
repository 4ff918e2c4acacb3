use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::domain::Actor;
use super::response::ApiResponse;

/// Resolves a bearer token into the acting user. Issuance lives elsewhere.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Actor, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication token required")]
    MissingCredential,
    #[error("Invalid token payload")]
    MalformedCredential,
    #[error("Invalid or expired token")]
    UnknownCredential,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response =
            ApiResponse::<()>::failure(StatusCode::UNAUTHORIZED, self.to_string()).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        response
    }
}

/// Static token table, populated from the seed file.
#[derive(Default, Clone)]
pub struct TokenRegistry {
    tokens: Arc<RwLock<HashMap<String, Actor>>>,
}

impl TokenRegistry {
    pub fn register(&self, token: impl Into<String>, actor: Actor) {
        if let Ok(mut guard) = self.tokens.write() {
            guard.insert(token.into(), actor);
        }
    }
}

impl CredentialVerifier for TokenRegistry {
    fn verify(&self, token: &str) -> Result<Actor, AuthError> {
        let guard = self
            .tokens
            .read()
            .map_err(|_| AuthError::UnknownCredential)?;
        guard.get(token).cloned().ok_or(AuthError::UnknownCredential)
    }
}

fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedCredential)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingCredential),
    }
}

/// Rejects unauthenticated requests and stores the verified `Actor` in request extensions.
pub async fn require_bearer(
    State(verifier): State<Arc<dyn CredentialVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let actor = match bearer_token(&request).and_then(|token| verifier.verify(token)) {
        Ok(actor) => actor,
        Err(err) => {
            debug!(error = %err, "rejected request credentials");
            return err.into_response();
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::domain::Role;

    #[test]
    fn registry_resolves_known_tokens_only() {
        let registry = TokenRegistry::default();
        registry.register("tok-admin", Actor::new("admin-1", Role::Admin));

        let actor = registry.verify("tok-admin").expect("known token");
        assert_eq!(actor.role, Role::Admin);
        assert!(matches!(
            registry.verify("tok-other"),
            Err(AuthError::UnknownCredential)
        ));
    }

    #[test]
    fn bearer_scheme_is_required() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(axum::body::Body::empty())
            .expect("request builds");
        assert!(matches!(
            bearer_token(&request),
            Err(AuthError::MissingCredential)
        ));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer tok-1")
            .body(axum::body::Body::empty())
            .expect("request builds");
        assert_eq!(bearer_token(&request).expect("token"), "tok-1");
    }
}
