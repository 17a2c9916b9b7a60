//! Bearer-token authentication against the users table.
//!
//! The guard chain is authenticate -> authorize -> dispatch: this module
//! authenticates (token -> [`CallerContext`]), the `pothole_map_access`
//! crate authorizes, and the handlers dispatch. Each stage is
//! independently testable.

use std::sync::Arc;

use actix_web::HttpRequest;
use pothole_map_access::{AccessError, CallerContext, TokenVerifier};
use pothole_map_database::RegistryStore;

/// Token verifier backed by the `users` table: the bearer token is an
/// opaque value resolved with a single lookup. Token issuance lives in
/// the credential service, not here.
pub struct DbTokenVerifier {
    store: Arc<dyn RegistryStore>,
}

impl DbTokenVerifier {
    /// Wraps the registry store.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl TokenVerifier for DbTokenVerifier {
    async fn verify(&self, token: &str) -> Result<CallerContext, AccessError> {
        let user = self
            .store
            .user_by_token(token)
            .await
            .map_err(|e| {
                log::error!("Token lookup failed: {e}");
                AccessError::Unauthorized
            })?
            .ok_or(AccessError::Unauthorized)?;

        let role = user.role.parse().map_err(|_| {
            log::error!("User {} carries unknown role {:?}", user.email, user.role);
            AccessError::Unauthorized
        })?;

        Ok(CallerContext {
            user_id: user.id,
            email: user.email,
            role,
            jurisdiction_area: user.jurisdiction_area,
        })
    }
}

/// Extracts the bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Resolves the caller when credentials are present and valid; `None`
/// otherwise. Listing endpoints use this: an invalid token degrades to
/// the unauthenticated view instead of failing the request.
pub async fn optional_caller(
    req: &HttpRequest,
    verifier: &Arc<dyn TokenVerifier>,
) -> Option<CallerContext> {
    let token = bearer_token(req)?;
    match verifier.verify(token).await {
        Ok(caller) => Some(caller),
        Err(e) => {
            log::debug!("Token verification failed: {e}");
            None
        }
    }
}

/// Resolves the caller or refuses with [`AccessError::Unauthorized`].
/// Mutation endpoints use this.
///
/// # Errors
///
/// Returns [`AccessError::Unauthorized`] when no valid bearer token is
/// presented.
pub async fn require_caller(
    req: &HttpRequest,
    verifier: &Arc<dyn TokenVerifier>,
) -> Result<CallerContext, AccessError> {
    let token = bearer_token(req).ok_or(AccessError::Unauthorized)?;
    verifier.verify(token).await
}
