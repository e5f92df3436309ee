/// Configuration management for the Runway engine
///
/// Handles server binding, the engine database, queue concurrency, interpreter
/// binaries and trigger restoration. Every value can be overridden through an
/// environment variable for container deployment.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Job queue and worker pool configuration
    pub queues: QueueConfig,
    /// Interpreter process configuration
    pub sandbox: SandboxConfig,
    /// Trigger manager configuration
    pub triggers: TriggerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Engine database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding workflows, logs, triggers and jobs.
    /// ":memory:" keeps everything in process memory.
    pub path: String,
}

/// Worker pool sizing per named queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Workers consuming the immediate (manual + webhook) queue
    pub immediate_concurrency: usize,
    /// Workers consuming the scheduled (cron) queue
    pub scheduled_concurrency: usize,
    /// How often an idle worker re-checks for due jobs
    pub poll_interval_ms: u64,
}

/// Interpreter binaries and temp file location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub node_binary: String,
    pub python_binary: String,
    /// Directory for generated wrapper files
    pub temp_dir: PathBuf,
    /// Kill a child process that runs longer than this. None or 0 = wait forever.
    pub execution_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Re-schedule active cron rows and re-register webhooks on startup
    pub restore_on_startup: bool,
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

impl SandboxConfig {
    pub fn execution_timeout(&self) -> Option<Duration> {
        // 0 means no watchdog
        self.execution_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            immediate_concurrency: 5,
            scheduled_concurrency: 3,
            poll_interval_ms: 500,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            python_binary: "python3".to_string(),
            temp_dir: std::env::temp_dir(),
            execution_timeout_secs: None,
        }
    }
}

impl Config {
    /// Configuration for tests and embedding: in-memory database, defaults elsewhere
    pub fn in_memory() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            queues: QueueConfig::default(),
            sandbox: SandboxConfig::default(),
            triggers: TriggerConfig {
                restore_on_startup: true,
            },
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let queue_defaults = QueueConfig::default();
        let sandbox_defaults = SandboxConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("RUNWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("RUNWAY_PORT", 3004),
            },
            database: DatabaseConfig {
                path: std::env::var("RUNWAY_DATABASE")
                    .unwrap_or_else(|_| "data/runway.db".to_string()),
            },
            queues: QueueConfig {
                immediate_concurrency: env_or(
                    "RUNWAY_IMMEDIATE_CONCURRENCY",
                    queue_defaults.immediate_concurrency,
                ),
                scheduled_concurrency: env_or(
                    "RUNWAY_SCHEDULED_CONCURRENCY",
                    queue_defaults.scheduled_concurrency,
                ),
                poll_interval_ms: env_or("RUNWAY_QUEUE_POLL_MS", queue_defaults.poll_interval_ms),
            },
            sandbox: SandboxConfig {
                node_binary: std::env::var("RUNWAY_NODE_BIN")
                    .unwrap_or(sandbox_defaults.node_binary),
                python_binary: std::env::var("RUNWAY_PYTHON_BIN")
                    .unwrap_or(sandbox_defaults.python_binary),
                temp_dir: std::env::var("RUNWAY_TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(sandbox_defaults.temp_dir),
                execution_timeout_secs: std::env::var("RUNWAY_EXECUTION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            triggers: TriggerConfig {
                restore_on_startup: env_or("RUNWAY_RESTORE_TRIGGERS", true),
            },
        }
    }
}

/// Parse an environment variable, falling back to the default when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_concurrency_values() {
        let queues = QueueConfig::default();
        assert_eq!(queues.immediate_concurrency, 5);
        assert_eq!(queues.scheduled_concurrency, 3);
    }

    #[test]
    fn malformed_env_value_falls_back() {
        std::env::set_var("RUNWAY_TEST_BAD_PORT", "not-a-number");
        assert_eq!(env_or::<u16>("RUNWAY_TEST_BAD_PORT", 3004), 3004);
        std::env::set_var("RUNWAY_TEST_GOOD_PORT", "8080");
        assert_eq!(env_or::<u16>("RUNWAY_TEST_GOOD_PORT", 3004), 8080);
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let mut sandbox = SandboxConfig::default();
        sandbox.execution_timeout_secs = Some(0);
        assert!(sandbox.execution_timeout().is_none());
        sandbox.execution_timeout_secs = Some(5);
        assert_eq!(sandbox.execution_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn no_timeout_by_default() {
        assert!(SandboxConfig::default().execution_timeout().is_none());
        assert_eq!(Config::in_memory().database.path, ":memory:");
    }
}
