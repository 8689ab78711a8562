/// Configuration for the API server
///
/// Loaded once at startup from environment variables (and a `.env` file in
/// development). Everything else receives the parsed values by construction.
///
/// # Environment Variables
///
/// | Variable | Default |
/// |---|---|
/// | `API_HOST` | `0.0.0.0` |
/// | `API_PORT` | `3000` |
/// | `CORS_ORIGINS` | `*` (comma-separated list) |
/// | `PRODUCTION` | `false` (enables HSTS) |
/// | `STORE_BACKEND` | `postgres` (`postgres` or `memory`) |
/// | `DATABASE_URL` | required for `postgres` |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `STORE_TIMEOUT_MS` | `5000` |
/// | `JWT_SECRET` | required, at least 32 characters |
/// | `TOKEN_LIFETIME_HOURS` | `72` |
/// | `PASSWORD_HASH_MEMORY_KIB` | `65536` |
/// | `PASSWORD_HASH_ITERATIONS` | `3` |
/// | `PASSWORD_HASH_PARALLELISM` | `4` |
/// | `REVOKE_SESSIONS_ON_PASSWORD_CHANGE` | `false` |
/// | `AVATAR_MAX_BYTES` | `1048576` |
/// | `LOG_FORMAT` | `pretty` (`pretty` or `json`) |
///
/// # Example
///
/// ```no_run
/// use tasktrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tasktrack_shared::auth::password::HashParams;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub avatar: AvatarConfig,
    pub log_format: LogFormat,
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode adds Strict-Transport-Security
    pub production: bool,
}

/// Which storage backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL, required for the postgres backend
    pub database_url: Option<String>,

    pub max_connections: u32,

    /// Upper bound on any single store call
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    ///
    /// Must be at least 32 characters. Generate with `openssl rand -hex 32`.
    pub jwt_secret: String,

    pub token_lifetime: chrono::Duration,

    pub hash_params: HashParams,

    /// Sign out every device after a password change
    pub revoke_sessions_on_password_change: bool,
}

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    /// Largest accepted upload in bytes
    pub max_bytes: usize,
}

/// Log output style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// Reads `.env` first if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value fails
    /// to parse
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: StoreBackend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required for the postgres backend");
        }

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let lifetime_hours: i64 = parse_or(&lookup, "TOKEN_LIFETIME_HOURS", 72)?;
        if lifetime_hours <= 0 {
            anyhow::bail!("TOKEN_LIFETIME_HOURS must be positive");
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let defaults = HashParams::default();

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 3000)?,
                cors_origins,
                production: parse_or(&lookup, "PRODUCTION", false)?,
            },
            store: StoreConfig {
                backend,
                database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                timeout: Duration::from_millis(parse_or(&lookup, "STORE_TIMEOUT_MS", 5000)?),
            },
            auth: AuthConfig {
                jwt_secret,
                token_lifetime: chrono::Duration::hours(lifetime_hours),
                hash_params: HashParams {
                    memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
                    iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
                    parallelism: parse_or(
                        &lookup,
                        "PASSWORD_HASH_PARALLELISM",
                        defaults.parallelism,
                    )?,
                },
                revoke_sessions_on_password_change: parse_or(
                    &lookup,
                    "REVOKE_SESSIONS_ON_PASSWORD_CHANGE",
                    false,
                )?,
            },
            avatar: AvatarConfig {
                max_bytes: parse_or(&lookup, "AVATAR_MAX_BYTES", 1024 * 1024)?,
            },
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}
