use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};

pub const DEFAULT_STATS_URL: &str = "https://fbref.com/en/comps/9/Premier-League-Stats";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2113,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    /// Linear backoff step: attempt `n` waits `n * backoff_secs` before retrying.
    pub backoff_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STATS_URL.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            referer: "https://fbref.com/".to_string(),
            request_timeout_secs: 25,
            max_attempts: 3,
            backoff_secs: 2,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Wait before retrying after failed attempt `attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_step().saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
        }
    }
}

impl ScheduleConfig {
    /// Never zero: a zero period would panic the ticker.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExporterConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub schedule: ScheduleConfig,
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl ExporterConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("EXPORTER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parsed_var::<u16>("EXPORTER_PORT") {
            config.server.port = port;
        }
        if let Ok(url) = env::var("FBREF_URL") {
            config.upstream.url = url;
        }
        if let Ok(user_agent) = env::var("SCRAPER_USER_AGENT") {
            config.upstream.user_agent = user_agent;
        }
        if let Some(timeout) = parsed_var::<u64>("SCRAPER_TIMEOUT_SECS") {
            config.upstream.request_timeout_secs = timeout;
        }
        if let Some(attempts) = parsed_var::<u32>("SCRAPER_MAX_ATTEMPTS") {
            config.upstream.max_attempts = attempts.max(1);
        }
        if let Some(backoff) = parsed_var::<u64>("SCRAPER_BACKOFF_SECS") {
            config.upstream.backoff_secs = backoff;
        }
        if let Some(interval) = parsed_var::<u64>("SCRAPE_INTERVAL_SECS") {
            config.schedule.interval_secs = interval.max(1);
        }

        config
    }
}
