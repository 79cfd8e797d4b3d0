use actix_session::{Session, SessionExt};
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error, HttpMessage,
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use uuid::Uuid;

use crate::{errors::AppError, models::UserRow, state::AppState};

pub const SESSION_USER_KEY: &str = "user_id";

/// The authenticated user, inserted into request extensions by the admin
/// guard and extracted by handlers via `web::ReqData<AuthUser>`.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub first_name: String,
    pub is_admin: bool,
}

impl From<&UserRow> for AuthUser {
    fn from(row: &UserRow) -> Self {
        Self {
            id: row.id.clone(),
            first_name: row.first_name.clone(),
            is_admin: row.is_admin(),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Store the user id in the cookie session.
pub fn login(session: &Session, user_id: &str) -> Result<(), AppError> {
    session
        .insert(SESSION_USER_KEY, user_id)
        .map_err(|err| AppError::Internal(format!("session write failed: {err}")))
}

pub fn logout(session: &Session) {
    session.purge();
}

/// The id of the logged-in user, if any.
pub fn session_user_id(session: &Session) -> Option<String> {
    session.get::<String>(SESSION_USER_KEY).unwrap_or(None)
}

/// Load the logged-in user's row, dropping stale session ids silently.
pub async fn fetch_session_user(
    session: &Session,
    pool: &sqlx::SqlitePool,
) -> Result<Option<UserRow>, AppError> {
    let Some(user_id) = session_user_id(session) else {
        return Ok(None);
    };
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ? LIMIT 1")
        .bind(&user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn authenticate_credentials(
    pool: &sqlx::SqlitePool,
    phone: &str,
    password: &str,
) -> Result<Option<UserRow>, AppError> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE phone = ? LIMIT 1")
        .bind(phone)
        .fetch_optional(pool)
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }

    Ok(Some(user))
}

/// Guard for the `/admin` scope. Fails closed with 403 before any handler
/// (and therefore any mutation) runs.
pub async fn admin_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody + 'static,
{
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("application state missing".to_string()))?;

    let session = req.get_session();
    let user = fetch_session_user(&session, &state.db).await?;

    match user {
        Some(user) if user.is_admin() => {
            req.extensions_mut().insert(AuthUser::from(&user));
            next.call(req).await
        }
        _ => Err(AppError::Forbidden.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("Passw0rd!").expect("hashing succeeds");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Passw0rd!", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn garbage_hashes_never_verify() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
