use actix_session::Session;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth,
    errors::AppError,
    ratelimit,
    registration::{self, PendingRegistration, RegistrationInput, PENDING_KEY},
    state::AppState,
    templates::render,
    validate,
};

#[derive(Clone, Debug, Default)]
struct RegisterView {
    first_name: String,
    last_name: String,
    phone: String,
    email: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    form: RegisterView,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "confirm_email.html")]
struct ConfirmEmailTemplate {
    email: String,
    errors: Vec<String>,
    notice: String,
    has_notice: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    phone: String,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "account.html")]
struct AccountTemplate {
    first_name: String,
    last_name: String,
    phone: String,
    email: String,
    is_admin: bool,
}

#[derive(Deserialize)]
struct RegisterForm {
    first_name: String,
    last_name: String,
    phone: String,
    email: String,
    password: String,
    confirm_password: String,
}

#[derive(Deserialize)]
struct ConfirmForm {
    code: String,
}

#[derive(Deserialize)]
struct LoginForm {
    phone: String,
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/register")
            .route(web::get().to(show_register))
            .route(web::post().to(register)),
    )
    .service(
        web::resource("/confirm-email-page")
            .route(web::get().to(show_confirm))
            .route(web::post().to(confirm_by_form)),
    )
    .service(web::resource("/confirm-email/{code}").route(web::get().to(confirm_by_link)))
    .service(web::resource("/resend-confirmation-code").route(web::get().to(resend_code)))
    .service(
        web::resource("/login")
            .route(web::get().to(show_login))
            .route(web::post().to(login)),
    )
    .service(web::resource("/logout").route(web::get().to(logout)))
    .service(web::resource("/account").route(web::get().to(account)));
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location.to_string()))
        .finish()
}

async fn show_register(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if auth::fetch_session_user(&session, &state.db).await?.is_some() {
        return Ok(redirect_to("/account"));
    }
    Ok(render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
    }))
}

async fn register(
    session: Session,
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    if auth::fetch_session_user(&session, &state.db).await?.is_some() {
        return Ok(redirect_to("/account"));
    }

    let form = form.into_inner();
    let input = RegistrationInput {
        first_name: form.first_name,
        last_name: form.last_name,
        phone: form.phone,
        email: form.email,
        password: form.password,
        confirm_password: form.confirm_password,
    };

    let rerender = |input: &RegistrationInput, errors: Vec<String>| {
        render(RegisterTemplate {
            form: RegisterView {
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                phone: input.phone.clone(),
                email: input.email.clone(),
            },
            errors,
        })
    };

    let validated = match registration::validate(&input) {
        Ok(validated) => validated,
        Err(errors) => return Ok(rerender(&input, errors)),
    };

    // Reject already-taken contacts up front; confirmation re-checks.
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE phone = ? OR email = ?")
        .bind(&validated.phone)
        .bind(&validated.email)
        .fetch_one(&state.db)
        .await?;
    if taken > 0 {
        return Ok(rerender(&input, AppError::Duplicate.form_messages()));
    }

    let now = Utc::now();
    let code = registration::generate_code();
    let pending = registration::stage(validated, code, now)?;

    match send_gated(&state, &req, &pending, now).await {
        Ok(()) => {}
        Err(err @ (AppError::RateLimited { .. } | AppError::Transport(_))) => {
            return Ok(rerender(&input, err.form_messages()));
        }
        Err(err) => return Err(err),
    }

    session
        .insert(PENDING_KEY, &pending)
        .map_err(|err| AppError::Internal(format!("session write failed: {err}")))?;

    Ok(redirect_to("/confirm-email-page"))
}

/// Reserve a ledger row, send the confirmation mail, and commit the row
/// only when the transport accepted the message.
async fn send_gated(
    state: &AppState,
    req: &HttpRequest,
    pending: &PendingRegistration,
    now: chrono::DateTime<Utc>,
) -> Result<(), AppError> {
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

    let guard = ratelimit::reserve_attempt(
        &state.db,
        &pending.email,
        &ip,
        &user_agent,
        &pending.confirmation_code,
        now,
    )
    .await?;

    match state
        .mailer
        .send_confirmation(&pending.email, &pending.confirmation_code)
        .await
    {
        Ok(()) => guard.commit().await,
        Err(err) => {
            guard.abort().await?;
            Err(err)
        }
    }
}

async fn show_confirm(session: Session) -> Result<HttpResponse, AppError> {
    let Some(pending) = staged(&session) else {
        return Ok(redirect_to("/register"));
    };
    Ok(render(ConfirmEmailTemplate {
        email: pending.email,
        errors: Vec::new(),
        notice: String::new(),
        has_notice: false,
    }))
}

async fn confirm_by_form(
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ConfirmForm>,
) -> Result<HttpResponse, AppError> {
    finish_confirmation(session, state, &form.code).await
}

async fn confirm_by_link(
    session: Session,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let code = path.into_inner();
    finish_confirmation(session, state, &code).await
}

async fn finish_confirmation(
    session: Session,
    state: web::Data<AppState>,
    code: &str,
) -> Result<HttpResponse, AppError> {
    let Some(pending) = staged(&session) else {
        return Ok(redirect_to("/register"));
    };

    match registration::confirm(&state.db, &pending, code, Utc::now()).await {
        Ok(user) => {
            session.remove(PENDING_KEY);
            auth::login(&session, &user.id)?;
            Ok(redirect_to("/account"))
        }
        Err(err @ (AppError::ExpiredCode | AppError::CodeMismatch)) => {
            Ok(render(ConfirmEmailTemplate {
                email: pending.email,
                errors: err.form_messages(),
                notice: String::new(),
                has_notice: false,
            }))
        }
        Err(AppError::Duplicate) => {
            // Another registration claimed the contacts; the staging is no
            // longer usable.
            session.remove(PENDING_KEY);
            Ok(render(RegisterTemplate {
                form: RegisterView::default(),
                errors: AppError::Duplicate.form_messages(),
            }))
        }
        Err(err) => Err(err),
    }
}

async fn resend_code(
    session: Session,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let Some(mut pending) = staged(&session) else {
        return Ok(redirect_to("/register"));
    };

    let now = Utc::now();
    registration::refresh(&mut pending, registration::generate_code(), now);

    match send_gated(&state, &req, &pending, now).await {
        Ok(()) => {
            session
                .insert(PENDING_KEY, &pending)
                .map_err(|err| AppError::Internal(format!("session write failed: {err}")))?;
            Ok(render(ConfirmEmailTemplate {
                email: pending.email,
                errors: Vec::new(),
                notice: "A new confirmation code has been sent.".to_string(),
                has_notice: true,
            }))
        }
        Err(err @ (AppError::RateLimited { .. } | AppError::Transport(_))) => {
            Ok(render(ConfirmEmailTemplate {
                email: pending.email,
                errors: err.form_messages(),
                notice: String::new(),
                has_notice: false,
            }))
        }
        Err(err) => Err(err),
    }
}

fn staged(session: &Session) -> Option<PendingRegistration> {
    session.get::<PendingRegistration>(PENDING_KEY).unwrap_or(None)
}

async fn show_login(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if auth::fetch_session_user(&session, &state.db).await?.is_some() {
        return Ok(redirect_to("/account"));
    }
    Ok(render(LoginTemplate {
        phone: String::new(),
        errors: Vec::new(),
    }))
}

async fn login(
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();

    let phone = match validate::normalize_phone(&form.phone) {
        Ok(phone) => phone,
        Err(msg) => {
            return Ok(render(LoginTemplate {
                phone: form.phone,
                errors: vec![msg],
            }));
        }
    };

    let user = auth::authenticate_credentials(&state.db, &phone, &form.password).await?;
    let Some(user) = user else {
        return Ok(render(LoginTemplate {
            phone: form.phone,
            errors: vec!["Invalid phone number or password".to_string()],
        }));
    };

    auth::login(&session, &user.id)?;
    let target = if user.is_admin() { "/admin/requests" } else { "/account" };
    Ok(redirect_to(target))
}

async fn logout(session: Session) -> HttpResponse {
    auth::logout(&session);
    redirect_to("/")
}

async fn account(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = auth::fetch_session_user(&session, &state.db).await? else {
        return Ok(redirect_to("/login"));
    };
    Ok(render(AccountTemplate {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        phone: user.phone.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin(),
    }))
}
