//! Retention sweeps over the ledger, discount and user tables.
//!
//! Each deletion runs as its own statement with its own commit; a failing
//! sweep is logged and the remaining sweeps still run.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::errors::AppError;

pub const EMAIL_ATTEMPT_RETENTION_DAYS: i64 = 30;
pub const UNCONFIRMED_USER_RETENTION_DAYS: i64 = 7;

/// Delete ledger rows older than the 30-day retention window.
pub async fn delete_stale_email_attempts(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let cutoff = (now - Duration::days(EMAIL_ATTEMPT_RETENTION_DAYS)).to_rfc3339();
    let result = sqlx::query("DELETE FROM email_attempts WHERE created_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete discounts whose expiry date has passed.
pub async fn delete_expired_discounts(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let today = now.date_naive().format("%Y-%m-%d").to_string();
    let result =
        sqlx::query("DELETE FROM discounts WHERE expires_at IS NOT NULL AND expires_at < ?")
            .bind(today)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// Delete unconfirmed accounts older than 7 days.
///
/// Registration stages in the session and only writes confirmed users, so
/// in normal operation this matches nothing; it guards against rows created
/// outside the flow (imports, manual inserts).
pub async fn delete_stale_unconfirmed_users(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let cutoff = (now - Duration::days(UNCONFIRMED_USER_RETENTION_DAYS)).to_rfc3339();
    let result = sqlx::query("DELETE FROM users WHERE email_confirmed = 0 AND created_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// The 30-day retention job: ledger rows, then unconfirmed users.
pub async fn run_retention_sweep(pool: &SqlitePool) {
    let now = Utc::now();
    match delete_stale_email_attempts(pool, now).await {
        Ok(deleted) if deleted > 0 => log::info!("Retention: purged {deleted} email attempts"),
        Ok(_) => log::debug!("Retention: no email attempts to purge"),
        Err(err) => log::error!("Retention: email attempt sweep failed: {err}"),
    }
    match delete_stale_unconfirmed_users(pool, now).await {
        Ok(deleted) if deleted > 0 => log::info!("Retention: purged {deleted} unconfirmed users"),
        Ok(_) => log::debug!("Retention: no unconfirmed users to purge"),
        Err(err) => log::error!("Retention: unconfirmed user sweep failed: {err}"),
    }
}

/// The hourly job: drop discounts past their expiry.
pub async fn run_discount_sweep(pool: &SqlitePool) {
    match delete_expired_discounts(pool, Utc::now()).await {
        Ok(deleted) if deleted > 0 => log::info!("Purged {deleted} expired discounts"),
        Ok(_) => log::debug!("No expired discounts to purge"),
        Err(err) => log::error!("Expired discount sweep failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::new_id;
    use crate::db::test_pool;

    async fn insert_attempt(pool: &SqlitePool, created_at: DateTime<Utc>) {
        sqlx::query(
            r#"INSERT INTO email_attempts
               (id, email, ip_address, user_agent, confirmation_code, sent_at, created_at)
               VALUES (?, 'a@mail.ru', '10.0.0.1', '', '123456', ?, ?)"#,
        )
        .bind(new_id())
        .bind(created_at.to_rfc3339())
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn retention_deletes_only_rows_past_the_window() {
        let pool = test_pool().await;
        let now = Utc::now();
        for days_ago in [35, 32, 25, 5, 0] {
            insert_attempt(&pool, now - Duration::days(days_ago)).await;
        }

        let deleted = delete_stale_email_attempts(&pool, now).await.unwrap();
        assert_eq!(deleted, 2);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_attempts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 3);

        // Idempotent: a second run has nothing left to delete.
        let deleted = delete_stale_email_attempts(&pool, now).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn expired_discounts_are_swept_and_open_ended_ones_kept() {
        let pool = test_pool().await;
        let now = Utc::now();
        let rows = [
            ("past", Some("2026-01-01")),
            ("future", Some("2030-01-01")),
            ("open-ended", None),
        ];
        for (title, expires_at) in rows {
            sqlx::query(
                r#"INSERT INTO discounts (id, title, description, is_active, expires_at, created_at)
                   VALUES (?, ?, '', 1, ?, ?)"#,
            )
            .bind(new_id())
            .bind(title)
            .bind(expires_at)
            .bind(now.to_rfc3339())
            .execute(&pool)
            .await
            .unwrap();
        }

        let deleted = delete_expired_discounts(&pool, now).await.unwrap();
        assert_eq!(deleted, 1);

        let titles: Vec<String> =
            sqlx::query_scalar("SELECT title FROM discounts ORDER BY title")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(titles, vec!["future".to_string(), "open-ended".to_string()]);
    }

    #[tokio::test]
    async fn unconfirmed_user_sweep_spares_confirmed_and_recent_accounts() {
        let pool = test_pool().await;
        let now = Utc::now();
        let rows = [
            ("old-unconfirmed", 0, 10),
            ("recent-unconfirmed", 0, 3),
            ("old-confirmed", 1, 10),
        ];
        for (email, confirmed, days_ago) in rows {
            sqlx::query(
                r#"INSERT INTO users
                   (id, first_name, last_name, phone, email, password_hash,
                    is_admin, email_confirmed, created_at)
                   VALUES (?, 'Ivan', 'Petrov', ?, ?, 'hash', 0, ?, ?)"#,
            )
            .bind(new_id())
            .bind(format!("+7999000{days_ago}{confirmed}"))
            .bind(email)
            .bind(confirmed)
            .bind((now - Duration::days(days_ago)).to_rfc3339())
            .execute(&pool)
            .await
            .unwrap();
        }

        let deleted = delete_stale_unconfirmed_users(&pool, now).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining: Vec<String> = sqlx::query_scalar("SELECT email FROM users ORDER BY email")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(
            remaining,
            vec![
                "old-confirmed".to_string(),
                "recent-unconfirmed".to_string()
            ]
        );
    }
}
