use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::AppError;

/// Gate for protected operations. Every failure is the same `Unauthorized`;
/// the reason only reaches the log.
pub fn authenticate(header: Option<&str>, keys: &JwtKeys) -> Result<Claims, AppError> {
    let Some(auth) = header else {
        warn!(reason = "missing", "rejected bearer credential");
        return Err(AppError::Unauthorized);
    };

    // Expect "Bearer <token>"
    let Some(token) = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
    else {
        warn!(reason = "scheme", "rejected bearer credential");
        return Err(AppError::Unauthorized);
    };

    keys.verify(token.trim()).map_err(|_| {
        warn!(reason = "invalid or expired", "rejected bearer credential");
        AppError::Unauthorized
    })
}

/// Decoded claims of the caller, available to protected handlers.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        authenticate(header, &keys).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::claims::TokenIdentity, state::AppState};

    fn keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    fn identity() -> TokenIdentity {
        TokenIdentity {
            username: "alice".into(),
            email: "alice@x.com".into(),
        }
    }

    fn assert_rejected(res: Result<Claims, AppError>) {
        assert!(matches!(res, Err(AppError::Unauthorized)));
    }

    #[test]
    fn accepts_valid_bearer() {
        let keys = keys();
        let id = Uuid::new_v4();
        let token = keys.issue(&identity(), id).unwrap();
        let claims = authenticate(Some(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn rejects_absent_malformed_and_expired_uniformly() {
        let keys = keys();
        let token = keys.issue(&identity(), Uuid::new_v4()).unwrap();

        assert_rejected(authenticate(None, &keys));
        assert_rejected(authenticate(Some(""), &keys));
        assert_rejected(authenticate(Some("Bearer "), &keys));
        assert_rejected(authenticate(Some("Bearer garbage"), &keys));
        assert_rejected(authenticate(Some(&format!("Basic {token}")), &keys));
        assert_rejected(authenticate(Some(&token), &keys));

        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let expired = keys
            .encode_claims(&Claims {
                sub: Uuid::new_v4(),
                username: "alice".into(),
                email: "alice@x.com".into(),
                iat: now - 7200,
                exp: now - 3600,
                iss: keys.issuer.clone(),
                aud: keys.audience.clone(),
            })
            .unwrap();
        assert_rejected(authenticate(Some(&format!("Bearer {expired}")), &keys));
    }

    #[test]
    fn accepts_exactly_what_verify_accepts() {
        let keys = keys();
        let good = keys.issue(&identity(), Uuid::new_v4()).unwrap();
        for token in [good.as_str(), "x.y.z", ""] {
            let guard = authenticate(Some(&format!("Bearer {token}")), &keys).is_ok();
            assert_eq!(guard, keys.verify(token).is_ok(), "token {token:?}");
        }
    }

    #[tokio::test]
    async fn extractor_attaches_claims() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let id = Uuid::new_v4();
        let token = keys.issue(&identity(), id).unwrap();
        let (mut parts, _) = Request::builder()
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();

        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_or_else(|_| panic!("guard should accept"));
        assert_eq!(claims.sub, id);
    }
}
