//! Confirmation-email rate limiting backed by the `email_attempts` ledger.
//!
//! Two independent caps: at most one send per email address per 10 minutes,
//! and at most 10 sends per IP address per rolling 24 hours. The check and
//! the ledger insert share one SQLite write transaction that the caller
//! commits only after the transport accepted the message, so a failed send
//! never counts against the caps and two overlapping requests cannot both
//! pass the check.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{auth::new_id, errors::AppError};

pub const EMAIL_WINDOW_MINUTES: i64 = 10;
pub const IP_WINDOW_HOURS: i64 = 24;
pub const IP_MAX_SENDS: i64 = 10;

/// An open transaction holding a reserved ledger row. [`commit`] after the
/// email went out; [`abort`] (or drop) rolls the reservation back.
///
/// [`commit`]: AttemptGuard::commit
/// [`abort`]: AttemptGuard::abort
#[derive(Debug)]
pub struct AttemptGuard {
    tx: Transaction<'static, Sqlite>,
}

impl AttemptGuard {
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn abort(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Check both caps and insert the attempt row, all in one transaction.
///
/// Returns [`AppError::RateLimited`] with a retry-after hint when a cap is
/// hit; otherwise the guard holding the uncommitted reservation.
pub async fn reserve_attempt(
    pool: &SqlitePool,
    email: &str,
    ip: &str,
    user_agent: &str,
    confirmation_code: &str,
    now: DateTime<Utc>,
) -> Result<AttemptGuard, AppError> {
    let mut tx = pool.begin().await?;

    let email_cutoff = (now - Duration::minutes(EMAIL_WINDOW_MINUTES)).to_rfc3339();
    let newest_for_email: Option<String> = sqlx::query_scalar(
        "SELECT MAX(sent_at) FROM email_attempts WHERE email = ? AND sent_at > ?",
    )
    .bind(email)
    .bind(&email_cutoff)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(newest) = newest_for_email {
        return Err(AppError::RateLimited {
            retry_after_secs: retry_after(&newest, Duration::minutes(EMAIL_WINDOW_MINUTES), now),
        });
    }

    let ip_cutoff = (now - Duration::hours(IP_WINDOW_HOURS)).to_rfc3339();
    let sends_from_ip: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM email_attempts WHERE ip_address = ? AND sent_at > ?",
    )
    .bind(ip)
    .bind(&ip_cutoff)
    .fetch_one(&mut *tx)
    .await?;

    if sends_from_ip >= IP_MAX_SENDS {
        let oldest_for_ip: Option<String> = sqlx::query_scalar(
            "SELECT MIN(sent_at) FROM email_attempts WHERE ip_address = ? AND sent_at > ?",
        )
        .bind(ip)
        .bind(&ip_cutoff)
        .fetch_one(&mut *tx)
        .await?;
        let retry_after_secs = oldest_for_ip
            .map(|oldest| retry_after(&oldest, Duration::hours(IP_WINDOW_HOURS), now))
            .unwrap_or(0);
        return Err(AppError::RateLimited { retry_after_secs });
    }

    sqlx::query(
        r#"INSERT INTO email_attempts
           (id, email, ip_address, user_agent, confirmation_code, sent_at, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(email)
    .bind(ip)
    .bind(user_agent)
    .bind(confirmation_code)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    Ok(AttemptGuard { tx })
}

/// Seconds until the attempt at `sent_at` leaves the window.
fn retry_after(sent_at: &str, window: Duration, now: DateTime<Utc>) -> i64 {
    DateTime::parse_from_rfc3339(sent_at)
        .map(|t| (t.with_timezone(&Utc) + window - now).num_seconds().max(0))
        .unwrap_or_else(|_| window.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn record(pool: &SqlitePool, email: &str, ip: &str, now: DateTime<Utc>) {
        let guard = reserve_attempt(pool, email, ip, "test-agent", "123456", now)
            .await
            .expect("attempt allowed");
        guard.commit().await.expect("commit");
    }

    #[tokio::test]
    async fn second_send_within_ten_minutes_is_denied() {
        let pool = test_pool().await;
        let start = Utc::now();
        record(&pool, "a@mail.ru", "10.0.0.1", start).await;

        let at_five = reserve_attempt(
            &pool,
            "a@mail.ru",
            "10.0.0.1",
            "test-agent",
            "654321",
            start + Duration::minutes(5),
        )
        .await;
        match at_five {
            Err(AppError::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 300);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        let at_eleven = reserve_attempt(
            &pool,
            "a@mail.ru",
            "10.0.0.1",
            "test-agent",
            "654321",
            start + Duration::minutes(11),
        )
        .await;
        assert!(at_eleven.is_ok());
    }

    #[tokio::test]
    async fn eleventh_send_from_one_ip_is_denied_regardless_of_email() {
        let pool = test_pool().await;
        let start = Utc::now();
        for i in 0..10 {
            record(
                &pool,
                &format!("user{i}@mail.ru"),
                "10.0.0.9",
                start + Duration::minutes(i * 20),
            )
            .await;
        }

        let eleventh = reserve_attempt(
            &pool,
            "fresh@mail.ru",
            "10.0.0.9",
            "test-agent",
            "000000",
            start + Duration::minutes(200),
        )
        .await;
        assert!(matches!(eleventh, Err(AppError::RateLimited { .. })));

        // A different IP is unaffected.
        let other_ip = reserve_attempt(
            &pool,
            "fresh@mail.ru",
            "10.0.0.10",
            "test-agent",
            "000000",
            start + Duration::minutes(200),
        )
        .await;
        assert!(other_ip.is_ok());
    }

    #[tokio::test]
    async fn aborted_attempt_does_not_count_against_the_caps() {
        let pool = test_pool().await;
        let now = Utc::now();

        let guard = reserve_attempt(&pool, "a@mail.ru", "10.0.0.1", "ua", "111111", now)
            .await
            .expect("first reservation");
        guard.abort().await.expect("rollback");

        // The rolled-back reservation left no ledger row, so an immediate
        // retry passes the per-email cap.
        let retry = reserve_attempt(&pool, "a@mail.ru", "10.0.0.1", "ua", "222222", now)
            .await
            .expect("retry allowed after rollback");
        retry.abort().await.expect("rollback");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_attempts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0, "no reservation survived the rollbacks");
    }
}
