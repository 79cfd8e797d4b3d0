//! The service-request pipeline: Application -> Queue -> InService ->
//! CompletedService.
//!
//! Every forward transition copies the shared fields into the next stage's
//! table and deletes the source row inside one transaction, so a request
//! exists in exactly one stage at any point in time.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    errors::AppError,
    models::{ApplicationRow, CompletedServiceRow, InServiceRow, QueueRow, STATUS_IN_QUEUE},
};

/// Listing order for the admin tables. Most recent first by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Admin-supplied fields for the Queue -> InService transition.
#[derive(Clone, Debug, Default)]
pub struct ServiceIntake {
    pub estimated_completion: Option<String>,
    pub estimated_cost: Option<f64>,
    pub work_list: String,
    pub attachment: Option<String>,
}

/// Admin form cost field: empty means no value, anything else must parse.
pub fn parse_cost(raw: &str) -> Result<Option<f64>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(Some)
        .ok_or(AppError::InvalidCost)
}

pub async fn list_applications(
    pool: &SqlitePool,
    order: SortOrder,
) -> Result<Vec<ApplicationRow>, AppError> {
    let query = format!(
        "SELECT * FROM applications ORDER BY created_at {}",
        order.sql()
    );
    Ok(sqlx::query_as::<_, ApplicationRow>(&query)
        .fetch_all(pool)
        .await?)
}

pub async fn list_queue(pool: &SqlitePool, order: SortOrder) -> Result<Vec<QueueRow>, AppError> {
    let query = format!("SELECT * FROM queue ORDER BY moved_at {}", order.sql());
    Ok(sqlx::query_as::<_, QueueRow>(&query).fetch_all(pool).await?)
}

pub async fn list_in_service(
    pool: &SqlitePool,
    order: SortOrder,
) -> Result<Vec<InServiceRow>, AppError> {
    let query = format!("SELECT * FROM in_service ORDER BY moved_at {}", order.sql());
    Ok(sqlx::query_as::<_, InServiceRow>(&query)
        .fetch_all(pool)
        .await?)
}

pub async fn list_completed(
    pool: &SqlitePool,
    order: SortOrder,
) -> Result<Vec<CompletedServiceRow>, AppError> {
    let query = format!(
        "SELECT * FROM completed_service ORDER BY moved_at {}",
        order.sql()
    );
    Ok(sqlx::query_as::<_, CompletedServiceRow>(&query)
        .fetch_all(pool)
        .await?)
}

/// Accept an application: copy it into the queue and drop it from the
/// applications table. Returns the new queue id.
pub async fn confirm_application(
    pool: &SqlitePool,
    application_id: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    let application =
        sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = ?")
            .bind(application_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;

    let queue_id = new_id();
    sqlx::query(
        r#"INSERT INTO queue
           (id, application_id, name, phone, car_brand, car_model,
            desired_date, desired_time, status, comment, created_at, moved_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&queue_id)
    .bind(&application.id)
    .bind(&application.name)
    .bind(&application.phone)
    .bind(&application.car_brand)
    .bind(&application.car_model)
    .bind(&application.desired_date)
    .bind(&application.desired_time)
    .bind(STATUS_IN_QUEUE)
    .bind(&application.comment)
    .bind(&application.created_at)
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(&application.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(queue_id)
}

/// Assign a queued request to a bay: copy it into in_service with the
/// admin-supplied estimates and drop it from the queue.
pub async fn move_to_service(
    pool: &SqlitePool,
    queue_id: &str,
    intake: ServiceIntake,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    let entry = sqlx::query_as::<_, QueueRow>("SELECT * FROM queue WHERE id = ?")
        .bind(queue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

    let service_id = new_id();
    sqlx::query(
        r#"INSERT INTO in_service
           (id, queue_id, name, phone, car_brand, car_model,
            desired_date, desired_time, estimated_completion, estimated_cost,
            work_list, attachment, comment, created_at, moved_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&service_id)
    .bind(&entry.id)
    .bind(&entry.name)
    .bind(&entry.phone)
    .bind(&entry.car_brand)
    .bind(&entry.car_model)
    .bind(&entry.desired_date)
    .bind(&entry.desired_time)
    .bind(&intake.estimated_completion)
    .bind(intake.estimated_cost)
    .bind(&intake.work_list)
    .bind(&intake.attachment)
    .bind(&entry.comment)
    .bind(&entry.created_at)
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM queue WHERE id = ?")
        .bind(&entry.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(service_id)
}

/// Archive a finished job: copy it into completed_service and drop it from
/// in_service.
pub async fn complete_service(
    pool: &SqlitePool,
    service_id: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await?;

    let entry = sqlx::query_as::<_, InServiceRow>("SELECT * FROM in_service WHERE id = ?")
        .bind(service_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

    let completed_id = new_id();
    sqlx::query(
        r#"INSERT INTO completed_service
           (id, queue_id, name, phone, car_brand, car_model,
            desired_date, desired_time, estimated_completion, estimated_cost,
            work_list, attachment, comment, created_at, moved_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&completed_id)
    .bind(&entry.queue_id)
    .bind(&entry.name)
    .bind(&entry.phone)
    .bind(&entry.car_brand)
    .bind(&entry.car_model)
    .bind(&entry.desired_date)
    .bind(&entry.desired_time)
    .bind(&entry.estimated_completion)
    .bind(entry.estimated_cost)
    .bind(&entry.work_list)
    .bind(&entry.attachment)
    .bind(&entry.comment)
    .bind(&entry.created_at)
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM in_service WHERE id = ?")
        .bind(&entry.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(completed_id)
}

pub async fn delete_application(pool: &SqlitePool, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete_queue_entry(pool: &SqlitePool, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM queue WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Delete an in-service record. Returns the attachment name, if any, so the
/// caller can remove the file as well.
pub async fn delete_service_entry(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<String>, AppError> {
    let mut tx = pool.begin().await?;
    let attachment: Option<Option<String>> =
        sqlx::query_scalar("SELECT attachment FROM in_service WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(attachment) = attachment else {
        return Err(AppError::NotFound);
    };
    sqlx::query("DELETE FROM in_service WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(attachment)
}

/// Shared fields an admin may edit on any pre-completion stage.
#[derive(Clone, Debug)]
pub struct SharedFieldsUpdate {
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub desired_date: String,
    pub desired_time: String,
    pub comment: String,
}

pub async fn update_application(
    pool: &SqlitePool,
    id: &str,
    fields: &SharedFieldsUpdate,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"UPDATE applications
           SET name = ?, phone = ?, car_brand = ?, car_model = ?,
               desired_date = ?, desired_time = ?, comment = ?
           WHERE id = ?"#,
    )
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.car_brand)
    .bind(&fields.car_model)
    .bind(&fields.desired_date)
    .bind(&fields.desired_time)
    .bind(&fields.comment)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn update_queue_entry(
    pool: &SqlitePool,
    id: &str,
    fields: &SharedFieldsUpdate,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"UPDATE queue
           SET name = ?, phone = ?, car_brand = ?, car_model = ?,
               desired_date = ?, desired_time = ?, comment = ?
           WHERE id = ?"#,
    )
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.car_brand)
    .bind(&fields.car_model)
    .bind(&fields.desired_date)
    .bind(&fields.desired_time)
    .bind(&fields.comment)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Update an in-service record's details. When `attachment` carries a new
/// name, the previous one is returned so the caller can delete the file.
pub async fn update_service_entry(
    pool: &SqlitePool,
    id: &str,
    fields: &SharedFieldsUpdate,
    estimated_completion: Option<String>,
    estimated_cost: Option<f64>,
    work_list: String,
    attachment: Option<String>,
) -> Result<Option<String>, AppError> {
    let mut tx = pool.begin().await?;

    let current: Option<Option<String>> =
        sqlx::query_scalar("SELECT attachment FROM in_service WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(current) = current else {
        return Err(AppError::NotFound);
    };

    let (next_attachment, replaced) = match attachment {
        Some(new_name) => (Some(new_name), current),
        None => (current, None),
    };

    sqlx::query(
        r#"UPDATE in_service
           SET name = ?, phone = ?, car_brand = ?, car_model = ?,
               desired_date = ?, desired_time = ?, comment = ?,
               estimated_completion = ?, estimated_cost = ?, work_list = ?, attachment = ?
           WHERE id = ?"#,
    )
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.car_brand)
    .bind(&fields.car_model)
    .bind(&fields.desired_date)
    .bind(&fields.desired_time)
    .bind(&fields.comment)
    .bind(&estimated_completion)
    .bind(estimated_cost)
    .bind(&work_list)
    .bind(&next_attachment)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(replaced)
}

/// Append a timestamped note to a record's comment field.
pub async fn append_comment(
    pool: &SqlitePool,
    table: CommentTarget,
    id: &str,
    note: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let note = note.trim();
    if note.is_empty() {
        return Err(AppError::Validation(vec![
            "Comment cannot be empty".to_string()
        ]));
    }
    let stamped = format!("[{}]: {note}", now.format("%d.%m.%Y %H:%M"));

    let query = match table {
        CommentTarget::Application => {
            r#"UPDATE applications
               SET comment = CASE WHEN comment = '' THEN ? ELSE comment || char(10) || ? END
               WHERE id = ?"#
        }
        CommentTarget::Queue => {
            r#"UPDATE queue
               SET comment = CASE WHEN comment = '' THEN ? ELSE comment || char(10) || ? END
               WHERE id = ?"#
        }
    };

    let result = sqlx::query(query)
        .bind(&stamped)
        .bind(&stamped)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub enum CommentTarget {
    Application,
    Queue,
}
