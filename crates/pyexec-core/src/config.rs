//! Process-wide configuration, read once from the environment at startup.
//!
//! Every knob has a `PYEXEC_`-prefixed variable; the names are a deployment
//! contract. Values are immutable after startup - the engine and manager
//! receive the loaded struct and never consult the environment again.

use std::env;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub docker: DockerConfig,
    pub defaults: DefaultsConfig,
    pub consul: ConsulConfig,
    pub cleanup: CleanupConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Docker daemon connection and sandbox networking.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Unix socket path of the Docker daemon.
    pub socket: String,
    /// Network mode applied when a job leaves networking enabled.
    pub network_mode: String,
    pub dns_servers: Vec<String>,
}

/// Per-job defaults applied where a submission leaves a field unset.
#[derive(Debug, Clone)]
pub struct DefaultsConfig {
    pub timeout_seconds: u64,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub cpu_shares: u64,
    pub image: String,
}

/// Consul KV backend selection. `enabled` is derived from the address being
/// set at all; the in-memory store is used otherwise.
#[derive(Debug, Clone)]
pub struct ConsulConfig {
    pub address: String,
    pub token: Option<String>,
    pub key_prefix: String,
    pub enabled: bool,
}

/// Retention for terminal records.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                log_level: "info".to_string(),
            },
            docker: DockerConfig {
                socket: "/var/run/docker.sock".to_string(),
                network_mode: "host".to_string(),
                dns_servers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
            },
            defaults: DefaultsConfig {
                timeout_seconds: 300,
                memory_mb: 1024,
                disk_mb: 2048,
                cpu_shares: 1024,
                image: "python:3.12-slim".to_string(),
            },
            consul: ConsulConfig {
                address: "localhost:8500".to_string(),
                token: None,
                key_prefix: "python-executor".to_string(),
                enabled: false,
            },
            cleanup: CleanupConfig {
                ttl: Duration::from_secs(300),
            },
        }
    }
}

impl Config {
    /// Load configuration from `PYEXEC_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let base = Self::default();
        let consul_addr = env::var("PYEXEC_CONSUL_ADDR").ok().filter(|v| !v.is_empty());

        Self {
            server: ServerConfig {
                host: env_str("PYEXEC_HOST", &base.server.host),
                port: env_parse("PYEXEC_PORT", base.server.port),
                log_level: env_str("PYEXEC_LOG_LEVEL", &base.server.log_level),
            },
            docker: DockerConfig {
                socket: env_str("PYEXEC_DOCKER_SOCKET", &base.docker.socket),
                network_mode: env_str("PYEXEC_NETWORK_MODE", &base.docker.network_mode),
                dns_servers: env_list("PYEXEC_DNS_SERVERS", &base.docker.dns_servers),
            },
            defaults: DefaultsConfig {
                timeout_seconds: env_parse("PYEXEC_DEFAULT_TIMEOUT", base.defaults.timeout_seconds),
                memory_mb: env_parse("PYEXEC_DEFAULT_MEMORY_MB", base.defaults.memory_mb),
                disk_mb: env_parse("PYEXEC_DEFAULT_DISK_MB", base.defaults.disk_mb),
                cpu_shares: env_parse("PYEXEC_DEFAULT_CPU_SHARES", base.defaults.cpu_shares),
                image: env_str("PYEXEC_DEFAULT_IMAGE", &base.defaults.image),
            },
            consul: ConsulConfig {
                enabled: consul_addr.is_some(),
                address: consul_addr.unwrap_or(base.consul.address),
                token: env::var("PYEXEC_CONSUL_TOKEN").ok().filter(|v| !v.is_empty()),
                key_prefix: env_str("PYEXEC_CONSUL_PREFIX", &base.consul.key_prefix),
            },
            cleanup: CleanupConfig {
                ttl: Duration::from_secs(env_parse("PYEXEC_CLEANUP_TTL", 300)),
            },
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[String]) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => {
            let parts: Vec<String> = v
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.is_empty() {
                default.to_vec()
            } else {
                parts
            }
        }
        _ => default.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.defaults.timeout_seconds, 300);
        assert_eq!(cfg.defaults.memory_mb, 1024);
        assert_eq!(cfg.defaults.disk_mb, 2048);
        assert_eq!(cfg.defaults.cpu_shares, 1024);
        assert_eq!(cfg.defaults.image, "python:3.12-slim");
        assert_eq!(cfg.docker.network_mode, "host");
        assert_eq!(cfg.cleanup.ttl, Duration::from_secs(300));
        assert!(!cfg.consul.enabled);
    }

    #[test]
    fn env_overrides_apply() {
        // Process-global environment; keys are unique to this test.
        std::env::set_var("PYEXEC_DEFAULT_TIMEOUT", "42");
        std::env::set_var("PYEXEC_DNS_SERVERS", "1.1.1.1, 9.9.9.9");
        std::env::set_var("PYEXEC_CONSUL_ADDR", "consul:8500");
        let cfg = Config::from_env();
        assert_eq!(cfg.defaults.timeout_seconds, 42);
        assert_eq!(cfg.docker.dns_servers, vec!["1.1.1.1", "9.9.9.9"]);
        assert!(cfg.consul.enabled);
        assert_eq!(cfg.consul.address, "consul:8500");
        std::env::remove_var("PYEXEC_DEFAULT_TIMEOUT");
        std::env::remove_var("PYEXEC_DNS_SERVERS");
        std::env::remove_var("PYEXEC_CONSUL_ADDR");
    }

    #[test]
    fn unparseable_values_fall_back() {
        std::env::set_var("PYEXEC_PORT", "not-a-port");
        let cfg = Config::from_env();
        assert_eq!(cfg.server.port, 8080);
        std::env::remove_var("PYEXEC_PORT");
    }
}
