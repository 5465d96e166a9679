use std::{env, fs, net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use crate::scoring::ScoringWeights;

const DEFAULT_DB_NAME: &str = "newagregator";

#[derive(Debug, Clone)]
pub struct Config {
    http_bind: SocketAddr,
    db_options: PgConnectOptions,
    db_max_connections: u32,
    db_min_connections: u32,
    db_acquire_timeout: Duration,
    db_max_lifetime: Duration,
    refresh_interval: Duration,
    queue_capacity: NonZeroUsize,
    scoring_weights: ScoringWeights,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Relevance Worker の設定値を読み込み、検証する。
    ///
    /// 接続先は `RELEVANCE_DB_DSN` が優先され、未設定の場合は `DB_HOST` / `DB_PORT` /
    /// `DB_LOGIN` / `DB_PASSWORD` から組み立てる。
    ///
    /// # Errors
    /// 必須の環境変数が不足している場合や、値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("RELEVANCE_HTTP_BIND", "0.0.0.0:9010")?;
        let db_options = database_options()?;

        // Pool sizing: small by default, min idle is half of max.
        let db_max_connections = parse_u32("RELEVANCE_DB_MAX_CONNECTIONS", 5)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "RELEVANCE_DB_MAX_CONNECTIONS",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }
        let db_min_connections =
            parse_u32("RELEVANCE_DB_MIN_CONNECTIONS", db_max_connections / 2)?
                .min(db_max_connections);
        let db_acquire_timeout = parse_duration_secs("RELEVANCE_DB_ACQUIRE_TIMEOUT_SECS", 30)?;
        let db_max_lifetime = parse_duration_secs("RELEVANCE_DB_MAX_LIFETIME_SECS", 300)?;

        let refresh_interval = parse_duration_secs("RELEVANCE_REFRESH_INTERVAL_SECS", 600)?;
        if refresh_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "RELEVANCE_REFRESH_INTERVAL_SECS",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }
        let queue_capacity = parse_non_zero_usize("RELEVANCE_QUEUE_CAPACITY", 1000)?;

        let scoring_weights = scoring_weights()?;

        Ok(Self {
            http_bind,
            db_options,
            db_max_connections,
            db_min_connections,
            db_acquire_timeout,
            db_max_lifetime,
            refresh_interval,
            queue_capacity,
            scoring_weights,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn db_options(&self) -> &PgConnectOptions {
        &self.db_options
    }

    #[must_use]
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    #[must_use]
    pub fn db_min_connections(&self) -> u32 {
        self.db_min_connections
    }

    #[must_use]
    pub fn db_acquire_timeout(&self) -> Duration {
        self.db_acquire_timeout
    }

    #[must_use]
    pub fn db_max_lifetime(&self) -> Duration {
        self.db_max_lifetime
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    #[must_use]
    pub fn queue_capacity(&self) -> NonZeroUsize {
        self.queue_capacity
    }

    #[must_use]
    pub fn scoring_weights(&self) -> ScoringWeights {
        self.scoring_weights
    }
}

fn database_options() -> Result<PgConnectOptions, ConfigError> {
    if let Ok(dsn) = env::var("RELEVANCE_DB_DSN") {
        return PgConnectOptions::from_str(&dsn).map_err(|error| ConfigError::Invalid {
            name: "RELEVANCE_DB_DSN",
            source: anyhow::Error::new(error),
        });
    }

    let host = env_var("DB_HOST")?;
    let port = parse_u16_required("DB_PORT")?;
    let user = env_var("DB_LOGIN")?;
    let password = env_or_file("DB_PASSWORD")?;
    let database = env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string());

    Ok(PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&user)
        .password(&password)
        .database(&database)
        .ssl_mode(PgSslMode::Disable))
}

fn scoring_weights() -> Result<ScoringWeights, ConfigError> {
    let defaults = ScoringWeights::default();
    let w1 = parse_f64("RELEVANCE_W1", defaults.w1())?;
    let w2 = parse_f64("RELEVANCE_W2", defaults.w2())?;
    let w3 = parse_f64("RELEVANCE_W3", defaults.w3())?;
    let w4 = parse_f64("RELEVANCE_W4", defaults.w4())?;
    let w5 = parse_f64("RELEVANCE_W5", defaults.w5())?;
    let phy = parse_f64("RELEVANCE_PHY", defaults.phy())?;

    ScoringWeights::new(w1, w2, w3, w4, w5, phy).map_err(|error| ConfigError::Invalid {
        name: "RELEVANCE_W1..RELEVANCE_W5/RELEVANCE_PHY",
        source: anyhow::Error::new(error),
    })
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

/// `{name}_FILE` (Docker Secrets) を優先し、なければ `{name}` を読む。
fn env_or_file(name: &'static str) -> Result<String, ConfigError> {
    let file_env = format!("{name}_FILE");
    if let Ok(path) = env::var(&file_env) {
        return fs::read_to_string(&path)
            .map(|content| content.trim().to_string())
            .map_err(|error| ConfigError::Invalid {
                name,
                source: anyhow::Error::new(error).context(format!("failed to read {path}")),
            });
    }
    env_var(name)
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_u16_required(name: &'static str) -> Result<u16, ConfigError> {
    env_var(name)?
        .parse::<u16>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}
