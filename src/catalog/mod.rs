// Accounts and roles visible to the SSO user
use crate::arn::make_role_arn;
use crate::config::RoleChains;
use crate::error::Result;
use crate::gateway::RetryGateway;
use crate::models::{AccountInfo, RoleInfo};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Per-account entry in the role cache
#[derive(Debug, Clone)]
enum RoleSlot {
    Fetching,
    /// Complete list, possibly empty
    Ready(Vec<RoleInfo>),
}

/// Lazily enumerated, in-memory cache of accounts and their roles.
///
/// Accounts are fetched once per process. Roles are cached per account once
/// every page has been read.
pub struct RoleCatalog {
    gateway: Arc<RetryGateway>,
    chains: Arc<RoleChains>,
    accounts: OnceCell<Vec<AccountInfo>>,
    roles: RwLock<HashMap<String, RoleSlot>>,
}

impl RoleCatalog {
    pub fn new(gateway: Arc<RetryGateway>, chains: Arc<RoleChains>) -> Self {
        Self {
            gateway,
            chains,
            accounts: OnceCell::new(),
            roles: RwLock::new(HashMap::new()),
        }
    }

    /// Every account, in the order AWS returned them
    pub async fn get_accounts(&self) -> Result<Vec<AccountInfo>> {
        let accounts = self
            .accounts
            .get_or_try_init(|| async {
                let mut accounts: Vec<AccountInfo> = Vec::new();
                let mut next_token = None;

                loop {
                    let page = self.gateway.list_accounts(next_token).await?;
                    let offset = accounts.len();
                    accounts.extend(page.items.into_iter().enumerate().map(|(i, account)| {
                        AccountInfo {
                            id: offset + i,
                            ..account
                        }
                    }));

                    next_token = page.next_token;
                    if next_token.is_none() {
                        break;
                    }
                }

                tracing::debug!("Found {} accounts", accounts.len());
                Ok::<_, crate::error::SsoError>(accounts)
            })
            .await?;

        Ok(accounts.clone())
    }

    /// Roles assigned in `account`, with `via` filled in from local role chains
    pub async fn get_roles(&self, account: &AccountInfo) -> Result<Vec<RoleInfo>> {
        let account_id = &account.account_id;

        if let Some(RoleSlot::Ready(roles)) = self.roles.read().await.get(account_id) {
            return Ok(roles.clone());
        }

        self.roles
            .write()
            .await
            .entry(account_id.clone())
            .or_insert(RoleSlot::Fetching);

        let fetched = match self.fetch_roles(account).await {
            Ok(roles) => roles,
            Err(e) => {
                let mut roles = self.roles.write().await;
                if matches!(roles.get(account_id), Some(RoleSlot::Fetching)) {
                    roles.remove(account_id);
                }
                return Err(e);
            }
        };

        let mut roles = self.roles.write().await;
        let slot = roles
            .entry(account_id.clone())
            .or_insert(RoleSlot::Fetching);
        // A concurrent fetch of the same account filled the slot first
        if let RoleSlot::Ready(existing) = slot {
            return Ok(existing.clone());
        }
        *slot = RoleSlot::Ready(fetched.clone());
        Ok(fetched)
    }

    async fn fetch_roles(&self, account: &AccountInfo) -> Result<Vec<RoleInfo>> {
        let mut roles: Vec<RoleInfo> = Vec::new();
        let mut next_token = None;

        loop {
            let page = self
                .gateway
                .list_account_roles(&account.account_id, next_token)
                .await?;

            for role_name in page.items {
                roles.push(RoleInfo {
                    id: roles.len(),
                    account_id: account.account_id.clone(),
                    account_name: account.account_name.clone(),
                    email_address: account.email_address.clone(),
                    arn: make_role_arn(&account.account_id, &role_name)?,
                    via: self
                        .chains
                        .via(&account.account_id, &role_name)
                        .map(|via| via.to_string()),
                    role_name,
                });
            }

            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        tracing::debug!(
            "Found {} roles in account {}",
            roles.len(),
            account.account_id
        );
        Ok(roles)
    }

    /// Roles across all accounts, fetching up to `threads` accounts at a time.
    /// Sorted by account then role index.
    pub async fn get_all_roles(&self, threads: usize) -> Result<Vec<RoleInfo>> {
        let accounts = self.get_accounts().await?;

        let mut roles: Vec<RoleInfo> = stream::iter(accounts.iter())
            .map(|account| self.get_roles(account))
            .buffer_unordered(threads.max(1))
            .try_concat()
            .await?;

        roles.sort_by(|a, b| a.account_id.cmp(&b.account_id).then(a.id.cmp(&b.id)));
        Ok(roles)
    }
}
