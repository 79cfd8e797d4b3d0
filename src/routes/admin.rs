use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{admin_guard, new_id, AuthUser},
    errors::AppError,
    models::{DiscountRow, ServicePriceRow},
    pipeline::{self, CommentTarget, ServiceIntake, SharedFieldsUpdate, SortOrder},
    state::AppState,
    templates::render,
    visits,
};

#[derive(Clone, Debug)]
struct RequestView {
    id: String,
    name: String,
    phone: String,
    car: String,
    desired_date: String,
    desired_time: String,
    comment: String,
    created_at: String,
}

#[derive(Clone, Debug)]
struct QueueView {
    id: String,
    name: String,
    phone: String,
    car: String,
    desired_date: String,
    desired_time: String,
    comment: String,
    moved_at: String,
}

#[derive(Clone, Debug)]
struct ServiceView {
    id: String,
    name: String,
    phone: String,
    car: String,
    estimated_completion: String,
    estimated_cost: String,
    work_list: String,
    attachment: String,
    has_attachment: bool,
    comment: String,
    moved_at: String,
}

#[derive(Clone, Debug)]
struct DiscountView {
    id: String,
    title: String,
    description: String,
    active: bool,
    expires_at: String,
}

#[derive(Clone, Debug)]
struct PriceView {
    id: String,
    service_name: String,
    description: String,
    price: String,
    active: bool,
}

#[derive(Template)]
#[template(path = "admin_requests.html")]
struct AdminRequestsTemplate {
    admin_name: String,
    requests: Vec<RequestView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_queue.html")]
struct AdminQueueTemplate {
    admin_name: String,
    entries: Vec<QueueView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_service.html")]
struct AdminServiceTemplate {
    admin_name: String,
    entries: Vec<ServiceView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_completed.html")]
struct AdminCompletedTemplate {
    admin_name: String,
    entries: Vec<ServiceView>,
}

#[derive(Template)]
#[template(path = "admin_discounts.html")]
struct AdminDiscountsTemplate {
    admin_name: String,
    discounts: Vec<DiscountView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_prices.html")]
struct AdminPricesTemplate {
    admin_name: String,
    prices: Vec<PriceView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_visits.html")]
struct AdminVisitsTemplate {
    admin_name: String,
    today: i64,
    month: i64,
    year: i64,
    today_users: i64,
    today_guests: i64,
}

#[derive(Deserialize)]
struct ListQuery {
    sort: Option<String>,
}

#[derive(Deserialize)]
struct SharedFieldsForm {
    name: String,
    phone: String,
    car_brand: String,
    car_model: String,
    desired_date: String,
    desired_time: String,
    comment: Option<String>,
}

#[derive(Deserialize)]
struct CommentForm {
    comment: String,
}

#[derive(MultipartForm)]
struct ServiceIntakeForm {
    estimated_completion: Option<Text<String>>,
    estimated_cost: Option<Text<String>>,
    work_list: Option<Text<String>>,
    #[multipart(limit = "16MiB")]
    attachment: Option<TempFile>,
}

#[derive(MultipartForm)]
struct ServiceUpdateForm {
    name: Text<String>,
    phone: Text<String>,
    car_brand: Text<String>,
    car_model: Text<String>,
    desired_date: Text<String>,
    desired_time: Text<String>,
    comment: Option<Text<String>>,
    estimated_completion: Option<Text<String>>,
    estimated_cost: Option<Text<String>>,
    work_list: Option<Text<String>>,
    #[multipart(limit = "16MiB")]
    attachment: Option<TempFile>,
}

#[derive(Deserialize)]
struct DiscountForm {
    title: String,
    description: String,
    is_active: Option<String>,
    expires_at: Option<String>,
}

#[derive(Deserialize)]
struct PriceForm {
    service_name: String,
    description: Option<String>,
    price: String,
    is_active: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(from_fn(admin_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/requests").route(web::get().to(list_requests)))
            .service(
                web::resource("/request/update/{id}").route(web::post().to(update_request)),
            )
            .service(
                web::resource("/request/comment/{id}").route(web::post().to(comment_request)),
            )
            .service(
                web::resource("/request/confirm/{id}").route(web::post().to(confirm_request)),
            )
            .service(
                web::resource("/request/delete/{id}").route(web::post().to(delete_request)),
            )
            .service(web::resource("/queue").route(web::get().to(list_queue)))
            .service(web::resource("/queue/update/{id}").route(web::post().to(update_queue)))
            .service(web::resource("/queue/comment/{id}").route(web::post().to(comment_queue)))
            .service(
                web::resource("/queue/to_service/{id}").route(web::post().to(move_to_service)),
            )
            .service(web::resource("/queue/delete/{id}").route(web::post().to(delete_queue)))
            .service(web::resource("/service").route(web::get().to(list_service)))
            .service(web::resource("/service/update/{id}").route(web::post().to(update_service)))
            .service(
                web::resource("/service/complete/{id}").route(web::post().to(complete_service)),
            )
            .service(web::resource("/service/delete/{id}").route(web::post().to(delete_service)))
            .service(web::resource("/completed").route(web::get().to(list_completed)))
            .service(
                web::resource("/discounts")
                    .route(web::get().to(list_discounts))
                    .route(web::post().to(create_discount)),
            )
            .service(
                web::resource("/discounts/update/{id}").route(web::post().to(update_discount)),
            )
            .service(
                web::resource("/discounts/delete/{id}").route(web::post().to(delete_discount)),
            )
            .service(
                web::resource("/prices")
                    .route(web::get().to(list_prices))
                    .route(web::post().to(create_price)),
            )
            .service(web::resource("/prices/update/{id}").route(web::post().to(update_price)))
            .service(web::resource("/prices/delete/{id}").route(web::post().to(delete_price)))
            .service(web::resource("/visits").route(web::get().to(visit_stats))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/admin/requests"))
        .finish()
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location.to_string()))
        .finish()
}

// --- Requests (new applications) ---

async fn list_requests(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let order = SortOrder::from_query(query.sort.as_deref());
    Ok(render(requests_page(&state, &auth, order, Vec::new()).await?))
}

async fn requests_page(
    state: &AppState,
    auth: &AuthUser,
    order: SortOrder,
    errors: Vec<String>,
) -> Result<AdminRequestsTemplate, AppError> {
    let rows = pipeline::list_applications(&state.db, order).await?;
    let requests = rows
        .into_iter()
        .map(|row| RequestView {
            id: row.id,
            name: row.name,
            phone: row.phone,
            car: format!("{} {}", row.car_brand, row.car_model),
            desired_date: row.desired_date,
            desired_time: row.desired_time,
            comment: row.comment,
            created_at: row.created_at,
        })
        .collect();
    Ok(AdminRequestsTemplate {
        admin_name: auth.first_name.clone(),
        requests,
        errors,
    })
}

async fn update_request(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<SharedFieldsForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::update_application(&state.db, &id, &shared_fields(form.into_inner())).await?;
    Ok(redirect_to("/admin/requests"))
}

async fn comment_request(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::append_comment(
        &state.db,
        CommentTarget::Application,
        &id,
        &form.comment,
        Utc::now(),
    )
    .await?;
    Ok(redirect_to("/admin/requests"))
}

async fn confirm_request(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::confirm_application(&state.db, &id, Utc::now()).await?;
    Ok(redirect_to("/admin/queue"))
}

async fn delete_request(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::delete_application(&state.db, &id).await?;
    Ok(redirect_to("/admin/requests"))
}

// --- Queue ---

async fn list_queue(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let order = SortOrder::from_query(query.sort.as_deref());
    Ok(render(queue_page(&state, &auth, order, Vec::new()).await?))
}

async fn queue_page(
    state: &AppState,
    auth: &AuthUser,
    order: SortOrder,
    errors: Vec<String>,
) -> Result<AdminQueueTemplate, AppError> {
    let rows = pipeline::list_queue(&state.db, order).await?;
    let entries = rows
        .into_iter()
        .map(|row| QueueView {
            id: row.id,
            name: row.name,
            phone: row.phone,
            car: format!("{} {}", row.car_brand, row.car_model),
            desired_date: row.desired_date,
            desired_time: row.desired_time,
            comment: row.comment,
            moved_at: row.moved_at,
        })
        .collect();
    Ok(AdminQueueTemplate {
        admin_name: auth.first_name.clone(),
        entries,
        errors,
    })
}

async fn update_queue(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<SharedFieldsForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::update_queue_entry(&state.db, &id, &shared_fields(form.into_inner())).await?;
    Ok(redirect_to("/admin/queue"))
}

async fn comment_queue(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::append_comment(&state.db, CommentTarget::Queue, &id, &form.comment, Utc::now())
        .await?;
    Ok(redirect_to("/admin/queue"))
}

async fn move_to_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    MultipartForm(form): MultipartForm<ServiceIntakeForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let cost_input = form
        .estimated_cost
        .as_ref()
        .map(|text| text.as_str())
        .unwrap_or("");
    let estimated_cost = match pipeline::parse_cost(cost_input) {
        Ok(cost) => cost,
        Err(err) => {
            return Ok(render(
                queue_page(&state, &auth, SortOrder::Desc, err.form_messages()).await?,
            ));
        }
    };

    let attachment = store_attachment(&state, form.attachment.as_ref())?;

    let intake = ServiceIntake {
        estimated_completion: non_empty(form.estimated_completion),
        estimated_cost,
        work_list: form.work_list.map(|text| text.0).unwrap_or_default(),
        attachment,
    };

    pipeline::move_to_service(&state.db, &id, intake, Utc::now()).await?;
    Ok(redirect_to("/admin/service"))
}

async fn delete_queue(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::delete_queue_entry(&state.db, &id).await?;
    Ok(redirect_to("/admin/queue"))
}

// --- In service ---

async fn list_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let order = SortOrder::from_query(query.sort.as_deref());
    Ok(render(service_page(&state, &auth, order, Vec::new()).await?))
}

async fn service_page(
    state: &AppState,
    auth: &AuthUser,
    order: SortOrder,
    errors: Vec<String>,
) -> Result<AdminServiceTemplate, AppError> {
    let rows = pipeline::list_in_service(&state.db, order).await?;
    let entries = rows
        .into_iter()
        .map(|row| {
            let attachment = row.attachment.unwrap_or_default();
            ServiceView {
                id: row.id,
                name: row.name,
                phone: row.phone,
                car: format!("{} {}", row.car_brand, row.car_model),
                estimated_completion: row.estimated_completion.unwrap_or_default(),
                estimated_cost: row
                    .estimated_cost
                    .map(|cost| format!("{cost:.2}"))
                    .unwrap_or_default(),
                work_list: row.work_list,
                has_attachment: !attachment.is_empty(),
                attachment,
                comment: row.comment,
                moved_at: row.moved_at,
            }
        })
        .collect();
    Ok(AdminServiceTemplate {
        admin_name: auth.first_name.clone(),
        entries,
        errors,
    })
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    MultipartForm(form): MultipartForm<ServiceUpdateForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let cost_input = form
        .estimated_cost
        .as_ref()
        .map(|text| text.as_str())
        .unwrap_or("");
    let estimated_cost = match pipeline::parse_cost(cost_input) {
        Ok(cost) => cost,
        Err(err) => {
            return Ok(render(
                service_page(&state, &auth, SortOrder::Desc, err.form_messages()).await?,
            ));
        }
    };

    let attachment = store_attachment(&state, form.attachment.as_ref())?;

    let fields = SharedFieldsUpdate {
        name: form.name.0,
        phone: form.phone.0,
        car_brand: form.car_brand.0,
        car_model: form.car_model.0,
        desired_date: form.desired_date.0,
        desired_time: form.desired_time.0,
        comment: form.comment.map(|text| text.0).unwrap_or_default(),
    };

    let replaced = pipeline::update_service_entry(
        &state.db,
        &id,
        &fields,
        non_empty(form.estimated_completion),
        estimated_cost,
        form.work_list.map(|text| text.0).unwrap_or_default(),
        attachment,
    )
    .await?;

    if let Some(old) = replaced {
        state.uploads.remove(&old);
    }

    Ok(redirect_to("/admin/service"))
}

async fn complete_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    pipeline::complete_service(&state.db, &id, Utc::now()).await?;
    Ok(redirect_to("/admin/service"))
}

async fn delete_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let attachment = pipeline::delete_service_entry(&state.db, &id).await?;
    if let Some(name) = attachment {
        state.uploads.remove(&name);
    }
    Ok(redirect_to("/admin/service"))
}

// --- Completed archive ---

async fn list_completed(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let order = SortOrder::from_query(query.sort.as_deref());
    let rows = pipeline::list_completed(&state.db, order).await?;
    let entries = rows
        .into_iter()
        .map(|row| {
            let attachment = row.attachment.unwrap_or_default();
            ServiceView {
                id: row.id,
                name: row.name,
                phone: row.phone,
                car: format!("{} {}", row.car_brand, row.car_model),
                estimated_completion: row.estimated_completion.unwrap_or_default(),
                estimated_cost: row
                    .estimated_cost
                    .map(|cost| format!("{cost:.2}"))
                    .unwrap_or_default(),
                work_list: row.work_list,
                has_attachment: !attachment.is_empty(),
                attachment,
                comment: row.comment,
                moved_at: row.moved_at,
            }
        })
        .collect();
    Ok(render(AdminCompletedTemplate {
        admin_name: auth.first_name.clone(),
        entries,
    }))
}

// --- Discounts ---

async fn list_discounts(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    Ok(render(discounts_page(&state, &auth, Vec::new()).await?))
}

async fn discounts_page(
    state: &AppState,
    auth: &AuthUser,
    errors: Vec<String>,
) -> Result<AdminDiscountsTemplate, AppError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        "SELECT * FROM discounts ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    let discounts = rows
        .into_iter()
        .map(|row| DiscountView {
            id: row.id,
            title: row.title,
            description: row.description,
            active: row.is_active == 1,
            expires_at: row.expires_at.unwrap_or_default(),
        })
        .collect();
    Ok(AdminDiscountsTemplate {
        admin_name: auth.first_name.clone(),
        discounts,
        errors,
    })
}

fn discount_errors(form: &DiscountForm) -> Vec<String> {
    let mut errors = Vec::new();
    if form.title.trim().is_empty() {
        errors.push("Title is required".to_string());
    }
    if form.description.trim().is_empty() {
        errors.push("Description is required".to_string());
    }
    errors
}

async fn create_discount(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<DiscountForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let errors = discount_errors(&form);
    if !errors.is_empty() {
        return Ok(render(discounts_page(&state, &auth, errors).await?));
    }

    sqlx::query(
        r#"INSERT INTO discounts (id, title, description, is_active, expires_at, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(form.title.trim())
    .bind(form.description.trim())
    .bind(form.is_active.is_some() as i64)
    .bind(non_empty_str(form.expires_at))
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(redirect_to("/admin/discounts"))
}

async fn update_discount(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<DiscountForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let form = form.into_inner();
    let errors = discount_errors(&form);
    if !errors.is_empty() {
        return Ok(render(discounts_page(&state, &auth, errors).await?));
    }

    let result = sqlx::query(
        "UPDATE discounts SET title = ?, description = ?, is_active = ?, expires_at = ? WHERE id = ?",
    )
    .bind(form.title.trim())
    .bind(form.description.trim())
    .bind(form.is_active.is_some() as i64)
    .bind(non_empty_str(form.expires_at))
    .bind(&id)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(redirect_to("/admin/discounts"))
}

async fn delete_discount(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let result = sqlx::query("DELETE FROM discounts WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(redirect_to("/admin/discounts"))
}

// --- Service prices ---

async fn list_prices(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    Ok(render(prices_page(&state, &auth, Vec::new()).await?))
}

async fn prices_page(
    state: &AppState,
    auth: &AuthUser,
    errors: Vec<String>,
) -> Result<AdminPricesTemplate, AppError> {
    let rows = sqlx::query_as::<_, ServicePriceRow>(
        "SELECT * FROM service_prices ORDER BY service_name",
    )
    .fetch_all(&state.db)
    .await?;
    let prices = rows
        .into_iter()
        .map(|row| PriceView {
            id: row.id,
            service_name: row.service_name,
            description: row.description,
            price: format!("{:.2}", row.price),
            active: row.is_active == 1,
        })
        .collect();
    Ok(AdminPricesTemplate {
        admin_name: auth.first_name.clone(),
        prices,
        errors,
    })
}

fn parse_price_form(form: &PriceForm) -> Result<f64, Vec<String>> {
    let mut errors = Vec::new();
    if form.service_name.trim().is_empty() {
        errors.push("Service name is required".to_string());
    }
    let price = match form.price.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => price,
        _ => {
            errors.push("Price must be a non-negative number".to_string());
            0.0
        }
    };
    if errors.is_empty() {
        Ok(price)
    } else {
        Err(errors)
    }
}

async fn create_price(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<PriceForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let price = match parse_price_form(&form) {
        Ok(price) => price,
        Err(errors) => return Ok(render(prices_page(&state, &auth, errors).await?)),
    };

    sqlx::query(
        r#"INSERT INTO service_prices (id, service_name, description, price, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(form.service_name.trim())
    .bind(form.description.as_deref().unwrap_or("").trim())
    .bind(price)
    .bind(form.is_active.is_some() as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(redirect_to("/admin/prices"))
}

async fn update_price(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<PriceForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let form = form.into_inner();
    let price = match parse_price_form(&form) {
        Ok(price) => price,
        Err(errors) => return Ok(render(prices_page(&state, &auth, errors).await?)),
    };

    let result = sqlx::query(
        "UPDATE service_prices SET service_name = ?, description = ?, price = ?, is_active = ? WHERE id = ?",
    )
    .bind(form.service_name.trim())
    .bind(form.description.as_deref().unwrap_or("").trim())
    .bind(price)
    .bind(form.is_active.is_some() as i64)
    .bind(&id)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(redirect_to("/admin/prices"))
}

async fn delete_price(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let result = sqlx::query("DELETE FROM service_prices WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(redirect_to("/admin/prices"))
}

// --- Visit analytics ---

async fn visit_stats(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let stats = visits::load_stats(&state.db, Utc::now().date_naive()).await?;
    Ok(render(AdminVisitsTemplate {
        admin_name: auth.first_name.clone(),
        today: stats.today,
        month: stats.month,
        year: stats.year,
        today_users: stats.today_users,
        today_guests: stats.today_guests,
    }))
}

// --- Helpers ---

fn shared_fields(form: SharedFieldsForm) -> SharedFieldsUpdate {
    SharedFieldsUpdate {
        name: form.name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        car_brand: form.car_brand.trim().to_string(),
        car_model: form.car_model.trim().to_string(),
        desired_date: form.desired_date.trim().to_string(),
        desired_time: form.desired_time.trim().to_string(),
        comment: form.comment.unwrap_or_default(),
    }
}

fn non_empty(text: Option<Text<String>>) -> Option<String> {
    text.map(|value| value.0)
        .filter(|value| !value.trim().is_empty())
}

fn non_empty_str(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Save an uploaded work sheet if one was provided.
fn store_attachment(
    state: &AppState,
    upload: Option<&TempFile>,
) -> Result<Option<String>, AppError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    let name = upload.file_name.as_deref().unwrap_or("").trim();
    if name.is_empty() || upload.size == 0 {
        return Ok(None);
    }
    state.uploads.store(name, upload.file.path()).map(Some)
}

#[cfg(test)]
mod tests {
    use actix_session::{storage::CookieSessionStore, SessionMiddleware};
    use actix_web::{cookie::Key, http::StatusCode, test, web, App};

    use crate::state::AppState;

    #[actix_web::test]
    async fn admin_routes_fail_closed_without_an_admin_session() {
        let (_dir, state) = AppState::for_tests().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(SessionMiddleware::new(
                    CookieSessionStore::default(),
                    Key::generate(),
                ))
                .configure(super::configure),
        )
        .await;

        let listing = test::TestRequest::get().uri("/admin/requests").to_request();
        let response = test::call_service(&app, listing).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // A mutation is rejected before touching the database.
        let mutation = test::TestRequest::post()
            .uri("/admin/request/delete/some-id")
            .to_request();
        let response = test::call_service(&app, mutation).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
