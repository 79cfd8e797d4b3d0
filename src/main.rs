mod auth;
mod cleanup;
mod config;
mod db;
mod errors;
mod mailer;
mod models;
mod pipeline;
mod ratelimit;
mod registration;
mod routes;
mod scheduler;
mod state;
mod templates;
mod uploads;
mod validate;
mod visits;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware, middleware::from_fn, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::{
    config::AppConfig, mailer::Mailer, scheduler::Scheduler, state::AppState,
    uploads::UploadStore,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AppConfig::from_env();
    db::ensure_sqlite_dir(&cfg.database_url)?;

    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_admin(&pool, &cfg.admin).await?;

    let state = AppState {
        db: pool.clone(),
        mailer: Mailer::new(&cfg.mail, &cfg.base_url)?,
        uploads: UploadStore::new(&cfg.upload_dir)?,
        base_url: cfg.base_url.clone(),
    };

    let mut jobs = Scheduler::new(pool.clone());
    jobs.start();
    for job in jobs.list_jobs() {
        log::info!("Scheduled job {}: every {} seconds", job.name, job.interval_secs);
    }

    let session_key = session_key(&cfg.secret_key);
    let secure_cookies = cfg.base_url.starts_with("https://");

    let address = format!("0.0.0.0:{}", cfg.port);
    log::info!("Starting ADRAuto on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(from_fn(visits::track_visit))
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_name("adrauto_session".to_string())
                    .cookie_secure(secure_cookies)
                    .build(),
            )
            .configure(routes::public::configure)
            .configure(routes::auth::configure)
            .configure(routes::admin::configure)
            .configure(routes::api::configure)
    })
    .bind(address)?
    .run()
    .await?;

    jobs.stop().await;

    Ok(())
}

/// Key::derive_from panics below 32 bytes of material, so short secrets are
/// stretched by repetition.
fn session_key(secret: &str) -> Key {
    let secret = if secret.is_empty() { "adrauto-missing-secret" } else { secret };
    let mut material = secret.as_bytes().to_vec();
    if material.len() < 32 {
        log::warn!("SECRET_KEY is shorter than 32 bytes; consider a longer value.");
        while material.len() < 32 {
            material.extend_from_slice(secret.as_bytes());
        }
    }
    Key::derive_from(&material)
}
