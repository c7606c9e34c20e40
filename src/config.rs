/// Brute-force lockout tuning for the login path.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Failed attempts before the credential locks.
    pub max_failed_attempts: i32,
    /// How long the lock holds, measured from the last failed attempt.
    pub block_duration_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        Ok(Self {
            database_url,
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse_or("APP_PORT", 8080),
            request_timeout_secs: env_parse_or("REQUEST_TIMEOUT_SECONDS", 3),
            auth: AuthConfig {
                max_failed_attempts: env_parse_or("PWD_MAX_ATTEMPTS", 5),
                block_duration_hours: env_parse_or("PWD_BLOCK_TIME_HOURS", 24),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
