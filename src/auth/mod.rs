use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::COOKIE, http::request::Parts, http::HeaderMap};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{self, session, user, SessionModel, UserModel};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::AppState;

/// Name of the cookie carrying a platform (store owner) session token.
pub const PLATFORM_COOKIE: &str = "session_token";

/// Who a session authenticates as, and against which store.
///
/// Platform sessions belong to store owners and are valid across the
/// management API. Customer sessions are minted for exactly one store and
/// never cross over: the scope is part of the session row, so a token
/// issued for store A fails authentication on store B even if stolen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    Platform,
    Customer { store_id: Uuid },
}

impl SessionScope {
    pub fn kind(&self) -> session::SessionScopeKind {
        match self {
            Self::Platform => session::SessionScopeKind::Platform,
            Self::Customer { .. } => session::SessionScopeKind::Customer,
        }
    }

    pub fn store_id(&self) -> Option<Uuid> {
        match self {
            Self::Platform => None,
            Self::Customer { store_id } => Some(*store_id),
        }
    }

    /// Cookie name for this scope. Customer cookies embed the store id so
    /// a browser visiting two stores holds two independent cookies.
    pub fn cookie_name(&self) -> String {
        match self {
            Self::Platform => PLATFORM_COOKIE.to_string(),
            Self::Customer { store_id } => format!("customer_token_{}", store_id),
        }
    }
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("Failed to hash password: {}", e)))
}

/// Verifies a password against a stored Argon2 hash.
pub fn verify_password(hash: &str, password: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Extracts a named cookie value from the `Cookie` request header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let raw = header.to_str().ok()?;
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Builds a `Set-Cookie` value for a freshly issued session token.
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, token, max_age_secs
    )
}

/// Builds a `Set-Cookie` value that clears the named cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

/// Registration, login, and session-token authentication.
///
/// Tokens are opaque UUIDs stored server-side; authentication is a lookup
/// on `(token, scope, store_id)`, never on the token alone.
#[derive(Clone)]
pub struct SessionService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    session_ttl: Duration,
}

impl SessionService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, session_ttl_secs: i64) -> Self {
        Self {
            db,
            event_sender,
            session_ttl: Duration::seconds(session_ttl_secs),
        }
    }

    fn session_scope_condition(scope: SessionScope) -> Condition {
        let cond = Condition::all().add(session::Column::Scope.eq(scope.kind()));
        match scope.store_id() {
            Some(store_id) => cond.add(session::Column::StoreId.eq(store_id)),
            None => cond.add(session::Column::StoreId.is_null()),
        }
    }

    fn user_scope_condition(scope: SessionScope) -> Condition {
        match scope.store_id() {
            Some(store_id) => Condition::all().add(user::Column::StoreId.eq(store_id)),
            None => Condition::all().add(user::Column::StoreId.is_null()),
        }
    }

    /// Creates an account within the given scope.
    ///
    /// The same email may exist once per store and once at platform level;
    /// within a scope a duplicate registration is a conflict.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: Option<&str>,
        scope: SessionScope,
    ) -> Result<UserModel, ServiceError> {
        let email = email.trim().to_lowercase();

        let existing = entities::User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .filter(Self::user_scope_condition(scope))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.map(|s| s.to_string())),
            store_id: Set(scope.store_id()),
            created_at: Set(Utc::now()),
        };
        let user = user.insert(&*self.db).await?;

        info!(user_id = %user.id, "Registered new account");
        self.event_sender
            .send_or_log(Event::UserRegistered {
                user_id: user.id,
                store_id: user.store_id,
            })
            .await;

        Ok(user)
    }

    /// Verifies credentials and issues a fresh session for the scope.
    ///
    /// Failed lookups and failed password checks return the same error so
    /// the response does not reveal whether the email is registered.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        scope: SessionScope,
    ) -> Result<(UserModel, SessionModel), ServiceError> {
        let email = email.trim().to_lowercase();

        let user = entities::User::find()
            .filter(user::Column::Email.eq(email))
            .filter(Self::user_scope_condition(scope))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid email or password".to_string()))?;

        if !verify_password(&user.password_hash, password)? {
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let session = self.create_session(user.id, scope).await?;
        Ok((user, session))
    }

    /// Issues a new session token, replacing any existing session the user
    /// holds for the same scope. One live session per (user, scope).
    #[instrument(skip(self))]
    pub async fn create_session(
        &self,
        user_id: Uuid,
        scope: SessionScope,
    ) -> Result<SessionModel, ServiceError> {
        entities::Session::delete_many()
            .filter(session::Column::UserId.eq(user_id))
            .filter(Self::session_scope_condition(scope))
            .exec(&*self.db)
            .await?;

        let now = Utc::now();
        let session = session::ActiveModel {
            id: Set(Uuid::new_v4()),
            token: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id),
            scope: Set(scope.kind()),
            store_id: Set(scope.store_id()),
            created_at: Set(now),
            expires_at: Set(now + self.session_ttl),
        };
        let session = session.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::SessionCreated(session.id))
            .await;

        Ok(session)
    }

    /// Resolves a session token to its user, enforcing scope and expiry.
    #[instrument(skip(self, token))]
    pub async fn authenticate(
        &self,
        token: &str,
        scope: SessionScope,
    ) -> Result<UserModel, ServiceError> {
        let session = entities::Session::find()
            .filter(session::Column::Token.eq(token))
            .filter(Self::session_scope_condition(scope))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid session".to_string()))?;

        if session.expires_at <= Utc::now() {
            session.delete(&*self.db).await?;
            return Err(ServiceError::Unauthorized("Session expired".to_string()));
        }

        let user_id = session.user_id;
        entities::User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid session".to_string()))
    }

    /// Deletes the session behind a token. Unknown tokens are a no-op.
    #[instrument(skip(self, token))]
    pub async fn destroy_session(
        &self,
        token: &str,
        scope: SessionScope,
    ) -> Result<(), ServiceError> {
        entities::Session::delete_many()
            .filter(session::Column::Token.eq(token))
            .filter(Self::session_scope_condition(scope))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl.num_seconds()
    }
}

/// Authenticated store owner, extracted from the platform session cookie.
#[derive(Debug, Clone)]
pub struct OwnerIdentity {
    pub user: UserModel,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OwnerIdentity {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, PLATFORM_COOKIE)
            .ok_or_else(|| ServiceError::Unauthorized("Not logged in".to_string()))?;
        let user = state
            .services
            .sessions
            .authenticate(&token, SessionScope::Platform)
            .await?;
        Ok(Self { user })
    }
}

/// Authenticated customer of the store the request resolved to.
///
/// Tenant resolution runs first; the cookie name depends on the resolved
/// store, so a cookie minted for another store is simply never read.
#[derive(Debug, Clone)]
pub struct CustomerIdentity {
    pub user: UserModel,
    pub store: entities::StoreModel,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CustomerIdentity {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let store = state
            .services
            .tenants
            .resolve(&parts.headers, &parts.uri)
            .await?;
        let scope = SessionScope::Customer { store_id: store.id };
        let token = cookie_value(&parts.headers, &scope.cookie_name())
            .ok_or_else(|| ServiceError::Unauthorized("Not logged in".to_string()))?;
        let user = state.services.sessions.authenticate(&token, scope).await?;
        Ok(Self { user, store })
    }
}
