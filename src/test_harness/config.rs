//! Harness configuration
//!
//! Built once at start from the environment and CLI flags, then passed by
//! reference into the suite. Environment variables:
//!
//! | Variable                  | Default     |
//! |---------------------------|-------------|
//! | `MCSAPI_CS_TEST_IP`       | `localhost` |
//! | `MCSAPI_CS_TEST_PORT`     | `3306`      |
//! | `MCSAPI_CS_TEST_USER`     | `root`      |
//! | `MCSAPI_CS_TEST_PASSWORD` | (empty)     |
//! | `MCSAPI_CS_TEST_DATABASE` | `test`      |

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_HOST: &str = "MCSAPI_CS_TEST_IP";
pub const ENV_PORT: &str = "MCSAPI_CS_TEST_PORT";
pub const ENV_USER: &str = "MCSAPI_CS_TEST_USER";
pub const ENV_PASSWORD: &str = "MCSAPI_CS_TEST_PASSWORD";
pub const ENV_DATABASE: &str = "MCSAPI_CS_TEST_DATABASE";

/// Default importer timeout per case
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// Store connection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "test".to_string(),
        }
    }
}

impl StoreSettings {
    /// Build settings from a variable lookup, falling back to defaults
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup(ENV_PORT) {
            Some(raw) => match raw.trim().parse() {
                Ok(port) => port,
                Err(_) => {
                    log::warn!(
                        "Ignoring invalid {}='{}', using {}",
                        ENV_PORT,
                        raw,
                        defaults.port
                    );
                    defaults.port
                }
            },
            None => defaults.port,
        };

        Self {
            host: lookup(ENV_HOST).unwrap_or(defaults.host),
            port,
            user: lookup(ENV_USER).unwrap_or(defaults.user),
            password: lookup(ENV_PASSWORD).unwrap_or(defaults.password),
            database: lookup(ENV_DATABASE).unwrap_or(defaults.database),
        }
    }

    /// Build settings from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }
}

/// Bounded connection retry loop parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts (at least 1)
    pub attempts: u32,

    /// Pause between attempts
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

/// Docker actions to perform before connecting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfraSettings {
    /// Directory holding the docker-compose file
    pub compose_dir: Option<PathBuf>,

    /// Services to recreate before the run
    pub restart_services: Vec<String>,

    /// Resolve the store host from this container's IP address
    pub host_container: Option<String>,
}

impl InfraSettings {
    pub fn is_empty(&self) -> bool {
        self.restart_services.is_empty() && self.host_container.is_none()
    }
}

/// Complete configuration of one harness run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub store: StoreSettings,
    pub importer: PathBuf,
    pub test_root: PathBuf,
    pub case_filter: Option<String>,
    pub import_timeout: Duration,
    pub connect_retry: RetryPolicy,
    pub infra: InfraSettings,
}

impl HarnessConfig {
    /// Create a configuration with explicit store settings
    pub fn new(
        store: StoreSettings,
        importer: impl Into<PathBuf>,
        test_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            importer: importer.into(),
            test_root: test_root.into(),
            case_filter: None,
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
            connect_retry: RetryPolicy::default(),
            infra: InfraSettings::default(),
        }
    }

    /// Create a configuration with store settings read from the environment
    pub fn from_env(importer: impl Into<PathBuf>, test_root: impl Into<PathBuf>) -> Self {
        Self::new(StoreSettings::from_env(), importer, test_root)
    }

    /// Create a configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F, importer: impl Into<PathBuf>, test_root: impl Into<PathBuf>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(StoreSettings::from_vars(lookup), importer, test_root)
    }

    /// Restrict the run to a single case
    pub fn with_case_filter(mut self, name: impl Into<String>) -> Self {
        self.case_filter = Some(name.into());
        self
    }

    /// Set the default importer timeout
    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout;
        self
    }

    /// Set the connection retry policy
    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    pub fn with_infra(mut self, infra: InfraSettings) -> Self {
        self.infra = infra;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.store.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.store.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.store.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.store.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.store.database = database.into();
        self
    }
}
