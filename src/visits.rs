//! Per-day visit analytics: one row per identity per calendar day.

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, Error,
};
use actix_session::SessionExt;
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::{auth, errors::AppError, state::AppState};

/// Insert a visit row unless one already exists for the identity today.
/// Authenticated visitors dedup on (user, day); anonymous ones on
/// (ip, user agent, day). The partial unique indexes do the dedup work.
pub async fn record_visit(
    pool: &SqlitePool,
    user_id: Option<&str>,
    ip: &str,
    user_agent: &str,
    date: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO visits (id, user_id, ip, user_agent, date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth::new_id())
    .bind(user_id)
    .bind(ip)
    .bind(user_agent)
    .bind(date)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VisitStats {
    pub today: i64,
    pub month: i64,
    pub year: i64,
    pub today_users: i64,
    pub today_guests: i64,
}

pub async fn load_stats(pool: &SqlitePool, today: NaiveDate) -> Result<VisitStats, AppError> {
    let today_str = today.format("%Y-%m-%d").to_string();
    let first_of_month = format!("{:04}-{:02}-01", today.year(), today.month());
    let first_of_year = format!("{:04}-01-01", today.year());

    let count_today: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE date = ?")
        .bind(&today_str)
        .fetch_one(pool)
        .await?;
    let count_month: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE date >= ? AND date <= ?")
            .bind(&first_of_month)
            .bind(&today_str)
            .fetch_one(pool)
            .await?;
    let count_year: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE date >= ? AND date <= ?")
            .bind(&first_of_year)
            .bind(&today_str)
            .fetch_one(pool)
            .await?;
    let count_users: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM visits WHERE date = ? AND user_id IS NOT NULL",
    )
    .bind(&today_str)
    .fetch_one(pool)
    .await?;
    let count_guests: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE date = ? AND user_id IS NULL")
            .bind(&today_str)
            .fetch_one(pool)
            .await?;

    Ok(VisitStats {
        today: count_today,
        month: count_month,
        year: count_year,
        today_users: count_users,
        today_guests: count_guests,
    })
}

/// Middleware recording one visit per identity per day. Best effort: a
/// failed insert never blocks the request.
pub async fn track_visit<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody + 'static,
{
    if let Some(state) = req.app_data::<web::Data<AppState>>() {
        let user_id = auth::session_user_id(&req.get_session());
        let ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        if let Err(err) =
            record_visit(&state.db, user_id.as_deref(), &ip, &user_agent, &today).await
        {
            log::warn!("Visit tracking failed: {err}");
        }
    }

    next.call(req).await
}
