// Persistence for client registrations, SSO tokens and role credentials
use crate::error::{Result, SsoError};
use crate::models::{AccessToken, ClientRegistration, RoleCredentials};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Key/value persistence the SSO core reads and writes.
///
/// Client registrations and tokens are keyed by [`SsoInstance::store_key`],
/// role credentials by role ARN.
///
/// [`SsoInstance::store_key`]: crate::models::SsoInstance::store_key
pub trait SecureStore: Send + Sync {
    fn save_register_client_data(&self, key: &str, client: &ClientRegistration) -> Result<()>;
    fn get_register_client_data(&self, key: &str) -> Result<ClientRegistration>;
    fn delete_register_client_data(&self, key: &str) -> Result<()>;

    fn save_create_token_response(&self, key: &str, token: &AccessToken) -> Result<()>;
    fn get_create_token_response(&self, key: &str) -> Result<AccessToken>;
    fn delete_create_token_response(&self, key: &str) -> Result<()>;

    fn save_role_credentials(&self, arn: &str, creds: &RoleCredentials) -> Result<()>;
    fn get_role_credentials(&self, arn: &str) -> Result<RoleCredentials>;
    fn delete_role_credentials(&self, arn: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(rename = "RegisterClient", default)]
    register_client: BTreeMap<String, ClientRegistration>,
    #[serde(rename = "CreateTokenResponse", default)]
    create_token_response: BTreeMap<String, AccessToken>,
    #[serde(rename = "RoleCredentials", default)]
    role_credentials: BTreeMap<String, RoleCredentials>,
}

/// Stores everything in a single JSON file readable only by the user
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonStore {
    /// Default location: ~/.ssocred/store.json
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| SsoError::CacheError("Could not determine home directory".to_string()))?
            .join(".ssocred")
            .join("store.json"))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| SsoError::CacheError(format!("Failed to read store file: {}", e)))?;
            if contents.trim().is_empty() {
                StoreData::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            tracing::debug!("No store file at {}, starting empty", path.display());
            StoreData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, data: &StoreData) -> Result<()> {
        if self.path.exists() {
            tracing::debug!("Saving store to {}", self.path.display());
        } else {
            tracing::info!("Creating new store file: {}", self.path.display());
        }
        if let Some(dir) = self.path.parent() {
            ensure_dir_exists(dir)?;
        }

        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, json)
            .map_err(|e| SsoError::CacheError(format!("Failed to write store file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StoreData),
    {
        let mut data = self.lock();
        f(&mut data);
        self.save(&data)
    }
}

fn ensure_dir_exists(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(SsoError::CacheError(format!(
            "{} exists and is not a directory",
            dir.display()
        )));
    }

    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

impl SecureStore for JsonStore {
    fn save_register_client_data(&self, key: &str, client: &ClientRegistration) -> Result<()> {
        self.update(|data| {
            data.register_client.insert(key.to_string(), client.clone());
        })
    }

    fn get_register_client_data(&self, key: &str) -> Result<ClientRegistration> {
        self.lock()
            .register_client
            .get(key)
            .cloned()
            .ok_or_else(|| SsoError::CacheError(format!("No RegisterClientData for {}", key)))
    }

    fn delete_register_client_data(&self, key: &str) -> Result<()> {
        self.update(|data| {
            data.register_client.remove(key);
        })
    }

    fn save_create_token_response(&self, key: &str, token: &AccessToken) -> Result<()> {
        self.update(|data| {
            data.create_token_response
                .insert(key.to_string(), token.clone());
        })
    }

    fn get_create_token_response(&self, key: &str) -> Result<AccessToken> {
        self.lock()
            .create_token_response
            .get(key)
            .cloned()
            .ok_or_else(|| SsoError::CacheError(format!("No CreateTokenResponse for {}", key)))
    }

    fn delete_create_token_response(&self, key: &str) -> Result<()> {
        self.update(|data| {
            data.create_token_response.remove(key);
        })
    }

    fn save_role_credentials(&self, arn: &str, creds: &RoleCredentials) -> Result<()> {
        self.update(|data| {
            data.role_credentials.insert(arn.to_string(), creds.clone());
        })
    }

    fn get_role_credentials(&self, arn: &str) -> Result<RoleCredentials> {
        self.lock()
            .role_credentials
            .get(arn)
            .cloned()
            .ok_or_else(|| SsoError::CacheError(format!("No RoleCredentials for ARN: {}", arn)))
    }

    fn delete_role_credentials(&self, arn: &str) -> Result<()> {
        self.update(|data| {
            data.role_credentials.remove(arn);
        })
    }
}
