//! Email-confirmation registration flow.
//!
//! Registration data is staged in the cookie session, never in the users
//! table; a user row appears only after the correct code is entered within
//! the confirmation window. Uniqueness is re-checked at promotion time so
//! the slower of two concurrent registrations fails instead of duplicating
//! an account.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    errors::{is_unique_violation, AppError},
    models::UserRow,
    validate,
};

pub const PENDING_KEY: &str = "pending_registration";
pub const CONFIRM_WINDOW_MINUTES: i64 = 10;

/// Staged registration payload held in the session until confirmation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub confirmation_code: String,
    pub confirmation_sent_at: String,
}

/// Raw form input for the registration schema, shared by every path that
/// creates an account.
#[derive(Clone, Debug, Default)]
pub struct RegistrationInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Input that passed the schema: phone and email are canonical.
#[derive(Clone, Debug)]
pub struct ValidatedRegistration {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

pub fn validate(input: &RegistrationInput) -> Result<ValidatedRegistration, Vec<String>> {
    let mut errors = Vec::new();

    let first_name = input.first_name.trim();
    let last_name = input.last_name.trim();
    if let Err(msg) = validate::validate_name("First name", first_name) {
        errors.push(msg);
    }
    if let Err(msg) = validate::validate_name("Last name", last_name) {
        errors.push(msg);
    }

    let phone = match validate::normalize_phone(&input.phone) {
        Ok(phone) => phone,
        Err(msg) => {
            errors.push(msg);
            String::new()
        }
    };
    let email = match validate::normalize_email(&input.email) {
        Ok(email) => email,
        Err(msg) => {
            errors.push(msg);
            String::new()
        }
    };

    if let Err(msg) = validate::validate_password(&input.password) {
        errors.push(msg);
    } else if input.password != input.confirm_password {
        errors.push("Passwords do not match".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedRegistration {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone,
        email,
        password: input.password.clone(),
    })
}

/// Six decimal digits, zero padded.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Build the staged payload: hash the password, attach code and timestamp.
pub fn stage(
    input: ValidatedRegistration,
    code: String,
    now: DateTime<Utc>,
) -> Result<PendingRegistration, AppError> {
    let password_hash = hash_password(&input.password)
        .map_err(|err| AppError::Internal(format!("password hash failed: {err}")))?;
    Ok(PendingRegistration {
        first_name: input.first_name,
        last_name: input.last_name,
        phone: input.phone,
        email: input.email,
        password_hash,
        confirmation_code: code,
        confirmation_sent_at: now.to_rfc3339(),
    })
}

/// Give the staged payload a fresh code and timestamp for a resend.
pub fn refresh(pending: &mut PendingRegistration, code: String, now: DateTime<Utc>) {
    pending.confirmation_code = code;
    pending.confirmation_sent_at = now.to_rfc3339();
}

/// Promote the staged registration to a user row.
///
/// Fails with [`AppError::ExpiredCode`] outside the window,
/// [`AppError::CodeMismatch`] on a wrong code, and [`AppError::Duplicate`]
/// when another registration claimed the phone or email first.
pub async fn confirm(
    pool: &SqlitePool,
    pending: &PendingRegistration,
    code: &str,
    now: DateTime<Utc>,
) -> Result<UserRow, AppError> {
    let sent_at = DateTime::parse_from_rfc3339(&pending.confirmation_sent_at)
        .map_err(|err| AppError::Internal(format!("bad staged timestamp: {err}")))?
        .with_timezone(&Utc);

    if now > sent_at + Duration::minutes(CONFIRM_WINDOW_MINUTES) {
        return Err(AppError::ExpiredCode);
    }
    if code.trim() != pending.confirmation_code {
        return Err(AppError::CodeMismatch);
    }

    let mut tx = pool.begin().await?;

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE phone = ? OR email = ?")
        .bind(&pending.phone)
        .bind(&pending.email)
        .fetch_one(&mut *tx)
        .await?;
    if taken > 0 {
        return Err(AppError::Duplicate);
    }

    let user_id = new_id();
    let insert = sqlx::query(
        r#"INSERT INTO users
           (id, first_name, last_name, phone, email, password_hash,
            is_admin, email_confirmed, confirmation_code, confirmation_sent_at, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 0, 1, ?, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(&pending.first_name)
    .bind(&pending.last_name)
    .bind(&pending.phone)
    .bind(&pending.email)
    .bind(&pending.password_hash)
    .bind(&pending.confirmation_code)
    .bind(&pending.confirmation_sent_at)
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await;

    // The unique constraints are the backstop for registrations racing
    // between the count above and this insert.
    if let Err(err) = insert {
        if is_unique_violation(&err) {
            return Err(AppError::Duplicate);
        }
        return Err(err.into());
    }

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn input() -> RegistrationInput {
        RegistrationInput {
            first_name: "Ivan".to_string(),
            last_name: "Petrov".to_string(),
            phone: "8 (999) 123-45-67".to_string(),
            email: "Ivan@Mail.ru".to_string(),
            password: "Passw0rd".to_string(),
            confirm_password: "Passw0rd".to_string(),
        }
    }

    fn staged(now: DateTime<Utc>) -> PendingRegistration {
        let validated = validate(&input()).expect("valid input");
        stage(validated, "123456".to_string(), now).expect("staged")
    }

    #[test]
    fn validation_canonicalizes_phone_and_email() {
        let validated = validate(&input()).unwrap();
        assert_eq!(validated.phone, "+79991234567");
        assert_eq!(validated.email, "ivan@mail.ru");
    }

    #[test]
    fn validation_collects_field_errors() {
        let mut bad = input();
        bad.first_name = "i".to_string();
        bad.confirm_password = "Different1".to_string();
        let errors = validate(&bad).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn confirm_within_window_creates_exactly_one_user() {
        let pool = test_pool().await;
        let start = Utc::now();
        let pending = staged(start);

        let user = confirm(&pool, &pending, "123456", start + Duration::minutes(9))
            .await
            .expect("confirmation succeeds");
        assert_eq!(user.phone, "+79991234567");
        assert_eq!(user.email_confirmed, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn confirm_after_window_fails_and_creates_no_user() {
        let pool = test_pool().await;
        let start = Utc::now();
        let pending = staged(start);

        let result = confirm(&pool, &pending, "123456", start + Duration::minutes(11)).await;
        assert!(matches!(result, Err(AppError::ExpiredCode)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let pool = test_pool().await;
        let start = Utc::now();
        let pending = staged(start);

        let result = confirm(&pool, &pending, "999999", start + Duration::minutes(1)).await;
        assert!(matches!(result, Err(AppError::CodeMismatch)));
    }

    #[tokio::test]
    async fn second_confirmation_with_the_same_phone_is_a_duplicate() {
        let pool = test_pool().await;
        let start = Utc::now();
        let first = staged(start);
        let second = staged(start);

        confirm(&pool, &first, "123456", start + Duration::minutes(1))
            .await
            .expect("first confirmation");
        let result = confirm(&pool, &second, "123456", start + Duration::minutes(2)).await;
        assert!(matches!(result, Err(AppError::Duplicate)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn refresh_replaces_code_and_timestamp() {
        let start = Utc::now();
        let mut pending = staged(start);
        let later = start + Duration::minutes(5);
        refresh(&mut pending, "654321".to_string(), later);
        assert_eq!(pending.confirmation_code, "654321");
        assert_eq!(pending.confirmation_sent_at, later.to_rfc3339());
    }
}
