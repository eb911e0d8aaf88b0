use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_LOG_FILTER: &str = "catalog=debug,axum=info,tower_http=info";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Deployment flavour. Only `Development` echoes internal error detail to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("development") | Some("dev") => Environment::Development,
            _ => Environment::Production,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub environment: Environment,
    pub upload_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: get("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "catalog".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "catalog-users".into()),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        let environment = Environment::parse(get("APP_ENV").as_deref());
        let upload_dir = get("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let host = get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match get("APP_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("APP_PORT is not a valid port: {}", raw))?,
            None => 8080,
        };

        let log = LogConfig {
            filter: get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
            json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };

        Ok(Self {
            database_url,
            jwt,
            environment,
            upload_dir,
            host,
            port,
            log,
        })
    }

    pub fn expose_error_details(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
