use std::net::SocketAddr;

use anyhow::{bail, Context};
use chrono::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("SCHOOL_BIND")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .context("SCHOOL_BIND is not a socket address")?;

        let max_connections = match var("SCHOOL_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .context("SCHOOL_DB_MAX_CONNECTIONS is not a number")?,
            None => 5,
        };

        let jwt_secret = match var("SCHOOL_JWT_SECRET") {
            Some(secret) => secret,
            None => bail!("SCHOOL_JWT_SECRET must be set"),
        };
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!(
                "SCHOOL_JWT_SECRET must be at least {} bytes long",
                MIN_SECRET_LEN
            );
        }

        let ttl_hours = match var("SCHOOL_SESSION_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .context("SCHOOL_SESSION_TTL_HOURS is not a number")?,
            None => 48,
        };
        if ttl_hours <= 0 {
            bail!("SCHOOL_SESSION_TTL_HOURS must be positive");
        }

        let cookie_secure = match var("SCHOOL_COOKIE_SECURE").as_deref() {
            None | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("SCHOOL_COOKIE_SECURE has invalid value `{}`", other),
        };

        let bootstrap_admin = match (var("SCHOOL_BOOTSTRAP_ADMIN"), var("SCHOOL_BOOTSTRAP_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => bail!("SCHOOL_BOOTSTRAP_ADMIN and SCHOOL_BOOTSTRAP_PASSWORD must be set together"),
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            max_connections,
            jwt_secret,
            session_ttl: Duration::hours(ttl_hours),
            cookie_name: var("SCHOOL_COOKIE_NAME").unwrap_or_else(|| "token".to_string()),
            cookie_secure,
            bootstrap_admin,
        })
    }
}
