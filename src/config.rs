use std::env;
use std::path::PathBuf;

/// Process configuration, read once at startup from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub secret_key: String,
    pub base_url: String,
    pub upload_dir: PathBuf,
    pub mail: MailConfig,
    pub admin: AdminSeed,
}

/// Outbound mail transport selection.
///
/// `SMTP_HOST` set selects the SMTP relay; otherwise mail is written to an
/// outbox directory, which keeps local development working without a relay.
#[derive(Debug, Clone)]
pub enum MailConfig {
    Smtp {
        host: String,
        port: u16,
        from: String,
        username: Option<String>,
        password: Option<String>,
    },
    File {
        dir: PathBuf,
        from: String,
    },
}

/// Bootstrap credentials for the seeded admin account.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "noreply@adrauto.local";
const DEFAULT_SECRET_KEY: &str = "insecure-dev-secret-key-change-me-in-production";

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/adrauto.db".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);
        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            log::warn!("SECRET_KEY not set. Using an insecure default. Set SECRET_KEY in production.");
            DEFAULT_SECRET_KEY.to_string()
        });
        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://127.0.0.1:{port}"));
        let upload_dir = PathBuf::from(
            env::var("UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".to_string()),
        );

        Self {
            database_url,
            port,
            secret_key,
            base_url,
            upload_dir,
            mail: MailConfig::from_env(),
            admin: AdminSeed::from_env(),
        }
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        let from = env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string());
        match env::var("SMTP_HOST") {
            Ok(host) => MailConfig::Smtp {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(DEFAULT_SMTP_PORT),
                from,
                username: env::var("SMTP_USER").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
            },
            Err(_) => MailConfig::File {
                dir: PathBuf::from(
                    env::var("MAIL_OUTBOX_DIR").unwrap_or_else(|_| "./data/outbox".to_string()),
                ),
                from,
            },
        }
    }
}

impl AdminSeed {
    fn from_env() -> Self {
        let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        if password == "admin" {
            log::warn!(
                "ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production."
            );
        }
        Self {
            first_name: env::var("ADMIN_FIRST_NAME").unwrap_or_else(|_| "Admin".to_string()),
            last_name: env::var("ADMIN_LAST_NAME").unwrap_or_else(|_| "Adrauto".to_string()),
            phone: env::var("ADMIN_PHONE").unwrap_or_else(|_| "+79990000000".to_string()),
            email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@adrauto.local".to_string()),
            password,
        }
    }
}
