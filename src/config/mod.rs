// Configuration management
use crate::arn::{make_role_arn, normalize_account_id};
use crate::error::{Result, SsoError};
use crate::models::{RoleChainConfig, SsoInstance};
use crate::url::UrlAction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_THREADS: usize = 5;
pub const DEFAULT_MAX_RETRY: u32 = 10;
pub const DEFAULT_MAX_BACKOFF_SECONDS: u64 = 5;
const DEFAULT_SSO_NAME: &str = "Default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Concurrent workers used when enumerating roles across accounts
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Retries after the first attempt for throttled SSO calls
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Upper bound in seconds for a single backoff sleep
    #[serde(default = "default_max_backoff")]
    pub max_backoff: u64,

    #[serde(default)]
    pub url_action: UrlAction,

    pub browser: Option<String>,

    /// Command used by the `exec` URL action, `%s` is replaced by the URL
    #[serde(default)]
    pub url_exec_command: Vec<String>,

    pub default_sso: Option<String>,

    /// Location of the JSON secure store
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub sso: BTreeMap<String, SsoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SsoConfig {
    pub start_url: String,
    pub region: String,

    /// Overrides `url_action` for the authentication step only
    pub auth_url_action: Option<UrlAction>,

    /// Keyed by account id
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    pub name: Option<String>,

    /// Keyed by role name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoleConfig {
    /// ARN of the role to assume this one from
    pub via: Option<String>,
    pub external_id: Option<String>,
    pub source_identity: Option<String>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_max_retry() -> u32 {
    DEFAULT_MAX_RETRY
}

fn default_max_backoff() -> u64 {
    DEFAULT_MAX_BACKOFF_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            max_retry: default_max_retry(),
            max_backoff: default_max_backoff(),
            url_action: UrlAction::default(),
            browser: None,
            url_exec_command: Vec::new(),
            default_sso: None,
            store_path: None,
            sso: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/ssocred (if env var is set)
    /// 2. ~/.config/ssocred (if ~/.config exists)
    /// 3. ~/.ssocred (fallback on Unix, doesn't create ~/.config)
    /// 4. Platform default on Windows
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("ssocred"));
        }

        #[cfg(unix)]
        {
            if let Some(home_dir) = dirs::home_dir() {
                let xdg_config = home_dir.join(".config");

                if xdg_config.exists() {
                    return Ok(xdg_config.join("ssocred"));
                }

                return Ok(home_dir.join(".ssocred"));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                return Ok(config_dir.join("ssocred"));
            }
        }

        Err(SsoError::ConfigError(
            "Could not determine config directory".to_string(),
        ))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location plus environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_file_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from an explicit path, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            tracing::debug!("Loading config from: {}", path.display());
            let contents = fs::read_to_string(path)
                .map_err(|e| SsoError::ConfigError(format!("Failed to read config file: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| SsoError::ConfigError(format!("Failed to parse config file: {}", e)))?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Config::default()
        };

        config.normalize()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(threads) = lookup("SSOCRED_THREADS") {
            self.threads = parse_override("SSOCRED_THREADS", &threads)?;
        }

        if let Some(max_retry) = lookup("SSOCRED_MAX_RETRY") {
            self.max_retry = parse_override("SSOCRED_MAX_RETRY", &max_retry)?;
        }

        if let Some(max_backoff) = lookup("SSOCRED_MAX_BACKOFF") {
            self.max_backoff = parse_override("SSOCRED_MAX_BACKOFF", &max_backoff)?;
        }

        if let (Some(start_url), Some(region)) =
            (lookup("AWS_SSO_START_URL"), lookup("AWS_SSO_REGION"))
        {
            tracing::debug!("Using AWS_SSO_START_URL from environment: {}", start_url);
            let name = self
                .default_sso
                .clone()
                .unwrap_or_else(|| DEFAULT_SSO_NAME.to_string());
            let entry = self.sso.entry(name).or_default();
            entry.start_url = start_url;
            entry.region = region;
        }

        if self.threads == 0 {
            self.threads = DEFAULT_THREADS;
        }

        Ok(())
    }

    /// Normalize account ids to their 12 digit form
    fn normalize(&mut self) -> Result<()> {
        for sso in self.sso.values_mut() {
            let accounts = std::mem::take(&mut sso.accounts);
            for (account_id, account) in accounts {
                let id = normalize_account_id(&account_id).map_err(|_| {
                    SsoError::ConfigError(format!("Invalid account id in config: {}", account_id))
                })?;
                if id != account_id {
                    tracing::debug!("Updating accountId {} -> {}", account_id, id);
                }
                sso.accounts.insert(id, account);
            }
        }
        Ok(())
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff)
    }

    /// Select an SSO instance by name, the configured default, or the only one present
    pub fn sso_instance(&self, name: Option<&str>) -> Result<(SsoInstance, &SsoConfig)> {
        let name = match name.or(self.default_sso.as_deref()) {
            Some(name) => name.to_string(),
            None if self.sso.len() == 1 => self.sso.keys().next().cloned().unwrap_or_default(),
            None if self.sso.contains_key(DEFAULT_SSO_NAME) => DEFAULT_SSO_NAME.to_string(),
            None => {
                return Err(SsoError::ConfigError(
                    "No SSO instance selected. Set default_sso in the config file or pass --sso"
                        .to_string(),
                ))
            }
        };

        let sso = self.sso.get(&name).ok_or_else(|| {
            SsoError::ConfigError(format!("SSO instance '{}' is not configured", name))
        })?;

        if sso.start_url.is_empty() || sso.region.is_empty() {
            return Err(SsoError::InvalidConfig(format!(
                "SSO instance '{}' requires start_url and region",
                name
            )));
        }

        Ok((
            SsoInstance {
                name,
                start_url: sso.start_url.clone(),
                region: sso.region.clone(),
            },
            sso,
        ))
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SsoError::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

impl SsoConfig {
    /// Collect the configured roles into a lookup keyed by role ARN
    pub fn role_chains(&self) -> Result<RoleChains> {
        let mut chains = RoleChains::default();
        for (account_id, account) in &self.accounts {
            for (role_name, role) in &account.roles {
                chains.insert(RoleChainConfig {
                    arn: make_role_arn(account_id, role_name)?,
                    via: role.via.clone().filter(|v| !v.is_empty()),
                    external_id: role.external_id.clone().filter(|v| !v.is_empty()),
                    source_identity: role.source_identity.clone().filter(|v| !v.is_empty()),
                });
            }
        }
        Ok(chains)
    }
}

/// Local role chaining configuration, keyed by role ARN
#[derive(Debug, Clone, Default)]
pub struct RoleChains {
    roles: HashMap<String, RoleChainConfig>,
}

impl RoleChains {
    pub fn insert(&mut self, role: RoleChainConfig) {
        self.roles.insert(role.arn.clone(), role);
    }

    pub fn get(&self, account_id: &str, role_name: &str) -> Option<&RoleChainConfig> {
        let arn = make_role_arn(account_id, role_name).ok()?;
        self.roles.get(&arn)
    }

    /// The `via` ARN for a role, if it must be chained
    pub fn via(&self, account_id: &str, role_name: &str) -> Option<&str> {
        self.get(account_id, role_name)
            .and_then(|role| role.via.as_deref())
    }

    /// Every configured role ARN
    pub fn arns(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(|arn| arn.as_str())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromIterator<RoleChainConfig> for RoleChains {
    fn from_iter<I: IntoIterator<Item = RoleChainConfig>>(iter: I) -> Self {
        let mut chains = RoleChains::default();
        for role in iter {
            chains.insert(role);
        }
        chains
    }
}
