//! Password check guarding the cost-entry area.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::entities::cost_user::{self, Entity as CostUser};
use crate::errors::ServiceError;

pub const MSG_MISSING_FIELDS: &str = "Dados incompletos.";
pub const MSG_UNKNOWN_USER: &str = "Usuário não encontrado.";
pub const MSG_WRONG_PASSWORD: &str = "Senha incorreta.";
pub const MSG_AUTHORIZED: &str = "Login autorizado.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostLoginRequest {
    #[serde(default)]
    pub usuario: Option<String>,
    #[serde(default)]
    pub senha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLoginResponse {
    pub success: bool,
    pub message: String,
}

impl CostLoginResponse {
    pub fn authorized() -> Self {
        Self {
            success: true,
            message: MSG_AUTHORIZED.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingFields,
    #[error("unknown user")]
    UnknownUser,
    #[error("wrong password")]
    WrongPassword,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingFields => (StatusCode::BAD_REQUEST, MSG_MISSING_FIELDS),
            AuthError::UnknownUser => (StatusCode::UNAUTHORIZED, MSG_UNKNOWN_USER),
            AuthError::WrongPassword => (StatusCode::UNAUTHORIZED, MSG_WRONG_PASSWORD),
            AuthError::Service(err) => return err.into_response(),
        };
        (
            status,
            Json(CostLoginResponse {
                success: false,
                message: message.to_string(),
            }),
        )
            .into_response()
    }
}

/// Lookup of stored password hashes by user name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn password_hash(&self, user: &str) -> Result<Option<String>, ServiceError>;
}

/// Credentials kept in the `usuario_custos` table.
#[derive(Debug, Clone)]
pub struct SeaOrmCredentialStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCredentialStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates or replaces a user with a freshly hashed password.
    pub async fn create_user(&self, name: &str, password: &str) -> Result<(), ServiceError> {
        let password_hash = hash_password(password)?;
        let model = cost_user::ActiveModel {
            name: Set(name.to_string()),
            password_hash: Set(password_hash),
        };
        CostUser::insert(model)
            .on_conflict(
                OnConflict::column(cost_user::Column::Name)
                    .update_column(cost_user::Column::PasswordHash)
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        info!(user = name, "cost-entry user stored");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SeaOrmCredentialStore {
    async fn password_hash(&self, user: &str) -> Result<Option<String>, ServiceError> {
        let found = CostUser::find_by_id(user.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| ServiceError::storage(e.to_string()))?;
        Ok(found.map(|m| m.password_hash))
    }
}

/// Process-local credentials, used when running without a database.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, String>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, name: &str, password: &str) -> Result<(), ServiceError> {
        self.users.insert(name.to_string(), hash_password(password)?);
        Ok(())
    }

    /// Stores an already hashed password as is.
    pub fn insert_hash(&self, name: &str, password_hash: &str) {
        self.users.insert(name.to_string(), password_hash.to_string());
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn password_hash(&self, user: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.users.get(user).map(|h| h.value().clone()))
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
/// Rows seeded by the legacy tooling hold bcrypt hashes; new ones are argon2.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    if BCRYPT_PREFIXES
        .iter()
        .any(|prefix| stored_hash.starts_with(prefix))
    {
        return bcrypt::verify(password, stored_hash)
            .map_err(|e| ServiceError::HashError(e.to_string()));
    }
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
}

impl AuthService {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    pub async fn verify_cost_login(
        &self,
        request: CostLoginRequest,
    ) -> Result<CostLoginResponse, AuthError> {
        let (user, password) = match (request.usuario, request.senha) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            _ => return Err(AuthError::MissingFields),
        };

        let stored = self
            .credentials
            .password_hash(&user)
            .await?
            .ok_or_else(|| {
                warn!(user = %user, "cost-entry login for unknown user");
                AuthError::UnknownUser
            })?;

        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::InternalError(e.to_string()))??;

        if matches {
            info!(user = %user, "cost-entry login authorized");
            Ok(CostLoginResponse::authorized())
        } else {
            warn!(user = %user, "cost-entry login with wrong password");
            Err(AuthError::WrongPassword)
        }
    }
}
