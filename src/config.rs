use serde::Deserialize;

const DEFAULT_TTL_MINUTES: i64 = 60 * 24;
/// One year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres DSN. Unset means the in-memory credential store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "credvault".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "credvault-users".into()),
            ttl_minutes: ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        Ok(Self {
            database_url,
            database_max_connections,
            jwt,
        })
    }
}

/// Unset, unparsable or non-positive values fall back to the default;
/// anything above `MAX_TTL_MINUTES` is a startup error.
fn ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(minutes) = raw
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
    else {
        return Ok(DEFAULT_TTL_MINUTES);
    };
    if minutes > MAX_TTL_MINUTES {
        anyhow::bail!("JWT_TTL_MINUTES must be at most {MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}
