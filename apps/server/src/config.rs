use std::env;

/// Process configuration, read once at startup.
///
/// Admin credentials are deliberately optional: with any of the three unset,
/// every admin endpoint answers 401 rather than the server refusing to boot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_secret: Option<String>,
    pub webapp_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:argan-spa.db?mode=rwc".into()),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_secret: env::var("ADMIN_SECRET").ok(),
            webapp_url: env::var("WEBAPP_URL").ok(),
        }
    }
}
