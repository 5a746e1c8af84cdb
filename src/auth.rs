//! Staff sessions for the admin review workspace.
//!
//! A session is an explicit value resolved once per bearer token and handed
//! to every workspace operation; nothing reads a global "current user".

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, SessionError};
use crate::handlers::AppState;
use crate::store::LeadStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "app_role", rename_all = "lowercase")]
pub enum AppRole {
    Admin,
    Moderator,
    User,
}

impl AppRole {
    /// Highest-privilege role among those granted: admin > moderator > user.
    pub fn effective(roles: &[AppRole]) -> Option<AppRole> {
        [AppRole::Admin, AppRole::Moderator, AppRole::User]
            .into_iter()
            .find(|candidate| roles.contains(candidate))
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, AppRole::Admin | AppRole::Moderator)
    }
}

/// An authenticated caller and the role resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminSession {
    pub user_id: Uuid,
    pub role: Option<AppRole>,
}

impl AdminSession {
    /// Proof that this session may review leads.
    pub fn staff(&self) -> Result<StaffSession, SessionError> {
        match self.role {
            Some(role) if role.is_staff() => Ok(StaffSession {
                user_id: self.user_id,
                role,
            }),
            other => Err(SessionError::Forbidden(other)),
        }
    }
}

/// A session whose role is admin or moderator. Only constructible through
/// [`AdminSession::staff`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffSession {
    user_id: Uuid,
    role: AppRole,
}

impl StaffSession {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> AppRole {
        self.role
    }
}

/// Hex-encoded SHA-256 of a bearer token; the only form tokens are stored in.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves bearer tokens to sessions, caching each result for the session TTL.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn LeadStore>,
    cache: Cache<String, AdminSession>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn LeadStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(1_000)
                .build(),
        }
    }

    pub async fn resolve(&self, token: &str) -> Result<AdminSession, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let key = hash_token(token);
        if let Some(session) = self.cache.get(&key).await {
            return Ok(session);
        }

        let user_id = self
            .store
            .user_for_token(&key)
            .await?
            .ok_or(SessionError::UnknownToken)?;
        let roles = self.store.roles_for_user(user_id).await?;
        let session = AdminSession {
            user_id,
            role: AppRole::effective(&roles),
        };

        tracing::info!(
            "✓ Session resolved for user {} (role: {:?})",
            session.user_id,
            session.role
        );
        self.cache.insert(key, session.clone()).await;
        Ok(session)
    }

    /// Deletes the token and drops its cached session, so the next request
    /// carrying it is rejected.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let key = hash_token(token.trim());
        let removed = self.store.revoke_token(&key).await?;
        self.cache.invalidate(&key).await;

        if !removed {
            return Err(SessionError::UnknownToken);
        }
        tracing::info!("✓ Session token revoked");
        Ok(())
    }
}

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(SessionError::MissingToken)?;
        Ok(state.sessions.resolve(token).await?)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StaffSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = AdminSession::from_request_parts(parts, state).await?;
        Ok(session.staff()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeadStore;

    #[test]
    fn test_effective_role_priority() {
        assert_eq!(
            AppRole::effective(&[AppRole::User, AppRole::Admin]),
            Some(AppRole::Admin)
        );
        assert_eq!(
            AppRole::effective(&[AppRole::User, AppRole::Moderator]),
            Some(AppRole::Moderator)
        );
        assert_eq!(AppRole::effective(&[]), None);
    }

    #[test]
    fn test_only_admin_and_moderator_are_staff() {
        let user = AdminSession {
            user_id: Uuid::new_v4(),
            role: Some(AppRole::User),
        };
        assert!(matches!(user.staff(), Err(SessionError::Forbidden(_))));

        let moderator = AdminSession {
            user_id: Uuid::new_v4(),
            role: Some(AppRole::Moderator),
        };
        assert_eq!(moderator.staff().unwrap().role(), AppRole::Moderator);
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("secret");
        assert_eq!(a, hash_token("secret"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("other"));
    }

    #[tokio::test]
    async fn test_resolve_caches_the_session() {
        let store = Arc::new(MemoryLeadStore::new());
        let user_id = Uuid::new_v4();
        store.add_token("tok-1", user_id);
        store.grant_role(user_id, AppRole::Admin);

        let resolver = SessionResolver::new(store.clone(), Duration::from_secs(60));
        let first = resolver.resolve("tok-1").await.unwrap();
        assert_eq!(first.role, Some(AppRole::Admin));

        // Served from cache even though the store is now failing.
        store.set_fail_reads(true);
        let second = resolver.resolve("tok-1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = SessionResolver::new(store, Duration::from_secs(60));

        assert!(matches!(
            resolver.resolve("nope").await,
            Err(SessionError::UnknownToken)
        ));
        assert!(matches!(
            resolver.resolve("  ").await,
            Err(SessionError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected_despite_cache() {
        let store = Arc::new(MemoryLeadStore::new());
        let user_id = Uuid::new_v4();
        store.add_token("tok-2", user_id);
        store.grant_role(user_id, AppRole::Moderator);

        let resolver = SessionResolver::new(store, Duration::from_secs(60));
        resolver.resolve("tok-2").await.unwrap();

        resolver.revoke("tok-2").await.unwrap();
        assert!(matches!(
            resolver.resolve("tok-2").await,
            Err(SessionError::UnknownToken)
        ));
        assert!(matches!(
            resolver.revoke("tok-2").await,
            Err(SessionError::UnknownToken)
        ));
    }
}
