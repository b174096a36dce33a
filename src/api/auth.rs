// Caller identity.
//
// Token issuance and validation live in an upstream identity collaborator;
// by the time a request reaches this service the gateway has resolved the
// caller and injected their id as a header. This extractor only surfaces it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const IDENTITY_HEADER: &str = "x-user-id";

/// The authenticated caller, as asserted by the identity collaborator
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(IDENTITY_HEADER)
            .ok_or_else(|| AppError::Forbidden("missing caller identity".to_string()))?;

        let user_id = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| AppError::Invalid("malformed caller identity".to_string()))?;

        Ok(AuthenticatedUser(user_id))
    }
}
