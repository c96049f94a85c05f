use crate::error::{MirageError, Result};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Rendering engine configuration
    pub renderer: RendererConfig,
    /// Page fetch (retry/timeouts) configuration
    pub fetch: FetchConfig,
    /// Asset path configuration
    pub asset: AssetConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 8080)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Scheme advertised in rewritten URLs when no X-Forwarded-Proto is sent
    pub public_scheme: String,
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Remote DevTools endpoint; `None` launches a local headless browser
    pub remote_url: Option<String>,
    /// Maximum concurrently open rendering sessions
    pub max_sessions: usize,
    /// Seconds to wait for a free session before rejecting
    pub queue_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_attempts: u32,
    /// Initial backoff in milliseconds, doubled after every failed attempt
    pub backoff_ms: u64,
    /// DOM-ready bound in seconds
    pub navigation_timeout: u64,
    /// Network-idle bound in seconds
    pub idle_timeout: u64,
    /// Fixed wait in seconds once a challenge page is detected
    pub challenge_delay: u64,
    /// Network-idle bound in seconds after the challenge wait
    pub challenge_idle_timeout: u64,
    /// Total deadline in seconds across all attempts (0 = unbounded)
    pub deadline: u64,
}

#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Cache time-to-live in seconds
    pub cache_ttl: u64,
    /// Upstream request timeout in seconds
    pub timeout: u64,
    /// Maximum redirects followed for one asset
    pub max_redirects: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
            navigation_timeout: 30,
            idle_timeout: 10,
            challenge_delay: 5,
            challenge_idle_timeout: 15,
            deadline: 180,
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline > 0).then(|| Duration::from_secs(self.deadline))
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            server: ServerConfig {
                port: get_env_or("MIRAGE_PORT", "8080").parse().map_err(|_| {
                    MirageError::InvalidConfig("MIRAGE_PORT must be a valid port number".into())
                })?,
                host: get_env_or("MIRAGE_HOST", "0.0.0.0"),
                public_scheme: parse_scheme()?,
            },
            renderer: RendererConfig {
                remote_url: parse_renderer_url()?,
                max_sessions: get_env_or("RENDERER_MAX_SESSIONS", "8")
                    .parse::<usize>()
                    .map_err(|_| {
                        MirageError::InvalidConfig(
                            "RENDERER_MAX_SESSIONS must be a valid number".into(),
                        )
                    })?
                    .max(1),
                queue_timeout: get_env_or("RENDERER_QUEUE_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
            },
            fetch: FetchConfig {
                max_attempts: get_env_or("FETCH_MAX_ATTEMPTS", "3")
                    .parse::<u32>()
                    .unwrap_or(3)
                    .max(1),
                backoff_ms: get_env_or("FETCH_BACKOFF_MS", "1000")
                    .parse()
                    .unwrap_or(1000),
                navigation_timeout: get_env_or("FETCH_NAVIGATION_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
                idle_timeout: get_env_or("FETCH_IDLE_TIMEOUT", "10")
                    .parse()
                    .unwrap_or(10),
                challenge_delay: get_env_or("FETCH_CHALLENGE_DELAY", "5")
                    .parse()
                    .unwrap_or(5),
                challenge_idle_timeout: get_env_or("FETCH_CHALLENGE_IDLE_TIMEOUT", "15")
                    .parse()
                    .unwrap_or(15),
                deadline: get_env_or("FETCH_DEADLINE", "180").parse().unwrap_or(180),
            },
            asset: AssetConfig {
                cache_ttl: get_env_or("ASSET_CACHE_TTL", "3600")
                    .parse()
                    .map_err(|_| {
                        MirageError::InvalidConfig("ASSET_CACHE_TTL must be a valid number".into())
                    })?,
                timeout: get_env_or("ASSET_TIMEOUT", "10").parse().unwrap_or(10),
                max_redirects: get_env_or("ASSET_MAX_REDIRECTS", "5").parse().unwrap_or(5),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the listen address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_scheme() -> Result<String> {
    let scheme = get_env_or("MIRAGE_PUBLIC_SCHEME", "http").to_lowercase();
    match scheme.as_str() {
        "http" | "https" => Ok(scheme),
        other => Err(MirageError::InvalidConfig(format!(
            "MIRAGE_PUBLIC_SCHEME must be http or https, got {}",
            other
        ))),
    }
}

fn parse_renderer_url() -> Result<Option<String>> {
    let raw = env::var("RENDERER_URL").unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(raw).map_err(|e| {
        MirageError::InvalidConfig(format!("RENDERER_URL must be a valid URL: {}", e))
    })?;

    match url.scheme() {
        "ws" | "wss" | "http" | "https" => {}
        other => {
            return Err(MirageError::InvalidConfig(format!(
                "RENDERER_URL has unsupported scheme: {}",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(MirageError::InvalidConfig(
            "RENDERER_URL must include a host".into(),
        ));
    }

    Ok(Some(raw.to_string()))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "MIRAGE_PORT",
        "MIRAGE_HOST",
        "MIRAGE_PUBLIC_SCHEME",
        "RENDERER_URL",
        "RENDERER_MAX_SESSIONS",
        "RENDERER_QUEUE_TIMEOUT",
        "FETCH_MAX_ATTEMPTS",
        "FETCH_BACKOFF_MS",
        "FETCH_NAVIGATION_TIMEOUT",
        "FETCH_IDLE_TIMEOUT",
        "FETCH_CHALLENGE_DELAY",
        "FETCH_CHALLENGE_IDLE_TIMEOUT",
        "FETCH_DEADLINE",
        "ASSET_CACHE_TTL",
        "ASSET_TIMEOUT",
        "ASSET_MAX_REDIRECTS",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.public_scheme, "http");
        assert!(config.renderer.remote_url.is_none());
        assert_eq!(config.renderer.max_sessions, 8);

        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff(), Duration::from_secs(1));
        assert_eq!(config.fetch.navigation_timeout, 30);
        assert_eq!(config.fetch.idle_timeout, 10);
        assert_eq!(config.fetch.challenge_delay, 5);
        assert_eq!(config.fetch.challenge_idle_timeout, 15);
        assert_eq!(config.fetch.deadline(), Some(Duration::from_secs(180)));

        assert_eq!(config.asset.cache_ttl, 3600);
        assert_eq!(config.asset.timeout, 10);
        assert_eq!(config.asset.max_redirects, 5);
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("MIRAGE_PORT", "9000");
        env::set_var("MIRAGE_HOST", "127.0.0.1");
        env::set_var("MIRAGE_PUBLIC_SCHEME", "HTTPS");
        env::set_var("RENDERER_URL", "ws://chrome.internal:9222");
        env::set_var("RENDERER_MAX_SESSIONS", "0");
        env::set_var("FETCH_MAX_ATTEMPTS", "5");
        env::set_var("FETCH_DEADLINE", "0");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
        assert_eq!(config.server.public_scheme, "https");
        assert_eq!(
            config.renderer.remote_url.as_deref(),
            Some("ws://chrome.internal:9222")
        );
        // clamped to one
        assert_eq!(config.renderer.max_sessions, 1);
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.deadline(), None);
    }

    #[test]
    fn test_config_from_env_invalid_port() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("MIRAGE_PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, MirageError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_invalid_renderer_url() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("RENDERER_URL", "not a url");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, MirageError::InvalidConfig(_)));

        env::set_var("RENDERER_URL", "ftp://chrome.internal");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, MirageError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_invalid_scheme() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("MIRAGE_PUBLIC_SCHEME", "gopher");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, MirageError::InvalidConfig(_)));
    }
}
