use actix_web::{web, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::new_id,
    errors::AppError,
    models::{ApplicationRow, DiscountRow, ServicePriceRow, STATUS_NEW},
    state::AppState,
    templates::render,
    validate,
};

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    discounts: Vec<DiscountView>,
}

#[derive(Clone, Debug)]
struct DiscountView {
    title: String,
    description: String,
    expires_at: String,
    has_expiry: bool,
}

#[derive(Template)]
#[template(path = "discounts.html")]
struct DiscountsTemplate {
    discounts: Vec<DiscountView>,
}

#[derive(Clone, Debug)]
struct PriceView {
    service_name: String,
    description: String,
    price: String,
}

#[derive(Template)]
#[template(path = "prices.html")]
struct PricesTemplate {
    prices: Vec<PriceView>,
}

#[derive(Deserialize)]
struct BookingForm {
    name: String,
    phone: String,
    #[serde(rename = "carBrand")]
    car_brand: String,
    #[serde(rename = "carModel")]
    car_model: String,
    date: String,
    time: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/submit_application").route(web::post().to(submit_application)))
        .service(web::resource("/discounts").route(web::get().to(list_discounts)))
        .service(web::resource("/price").route(web::get().to(list_prices)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn home(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let discounts = fetch_active_discounts(&state).await?;
    Ok(render(HomeTemplate { discounts }))
}

/// Booking form submission. Answers JSON because the page posts it inline.
async fn submit_application(
    state: web::Data<AppState>,
    form: web::Form<BookingForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    match insert_application(&state, form).await {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Application submitted successfully!"
        }))),
        Err(AppError::Validation(messages)) => Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": messages.join(" ")
        }))),
        Err(err) => Err(err),
    }
}

pub(super) struct BookingFields {
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub date: String,
    pub time: String,
}

/// Validation shared by the web form and the mobile API.
pub(super) fn validate_booking(fields: BookingFields) -> Result<BookingFields, AppError> {
    let mut errors = Vec::new();

    let name = fields.name.trim().to_string();
    if name.is_empty() {
        errors.push("Name is required".to_string());
    }
    let phone = match validate::normalize_phone(&fields.phone) {
        Ok(phone) => phone,
        Err(msg) => {
            errors.push(msg);
            String::new()
        }
    };
    let car_brand = fields.car_brand.trim().to_string();
    if car_brand.is_empty() {
        errors.push("Car brand is required".to_string());
    }
    let car_model = fields.car_model.trim().to_string();
    if car_model.is_empty() {
        errors.push("Car model is required".to_string());
    }
    let date = fields.date.trim().to_string();
    if date.is_empty() {
        errors.push("Desired date is required".to_string());
    }
    let time = fields.time.trim().to_string();
    if time.is_empty() {
        errors.push("Desired time is required".to_string());
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    Ok(BookingFields {
        name,
        phone,
        car_brand,
        car_model,
        date,
        time,
    })
}

pub(super) async fn create_application(
    state: &AppState,
    fields: BookingFields,
    comment: &str,
) -> Result<ApplicationRow, AppError> {
    let fields = validate_booking(fields)?;
    let id = new_id();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO applications
           (id, name, phone, car_brand, car_model, desired_date, desired_time,
            status, comment, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.car_brand)
    .bind(&fields.car_model)
    .bind(&fields.date)
    .bind(&fields.time)
    .bind(STATUS_NEW)
    .bind(comment)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(row)
}

async fn insert_application(
    state: &AppState,
    form: BookingForm,
) -> Result<ApplicationRow, AppError> {
    create_application(
        state,
        BookingFields {
            name: form.name,
            phone: form.phone,
            car_brand: form.car_brand,
            car_model: form.car_model,
            date: form.date,
            time: form.time,
        },
        "",
    )
    .await
}

async fn list_discounts(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let discounts = fetch_active_discounts(&state).await?;
    Ok(render(DiscountsTemplate { discounts }))
}

async fn fetch_active_discounts(state: &AppState) -> Result<Vec<DiscountView>, AppError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        "SELECT * FROM discounts WHERE is_active = 1 ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let expires_at = row.expires_at.unwrap_or_default();
            DiscountView {
                title: row.title,
                description: row.description,
                has_expiry: !expires_at.is_empty(),
                expires_at,
            }
        })
        .collect())
}

async fn list_prices(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = sqlx::query_as::<_, ServicePriceRow>(
        "SELECT * FROM service_prices WHERE is_active = 1 ORDER BY service_name",
    )
    .fetch_all(&state.db)
    .await?;

    let prices = rows
        .into_iter()
        .map(|row| PriceView {
            service_name: row.service_name,
            description: row.description,
            price: format!("{:.2}", row.price),
        })
        .collect();

    Ok(render(PricesTemplate { prices }))
}
