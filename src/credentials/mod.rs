// Resolving account/role pairs to temporary IAM credentials
mod sts;

#[cfg(test)]
pub use sts::MockStsApi;
pub use sts::{AssumeRoleRequest, SdkStsClient, StsApi};

use crate::arn::{make_role_arn, parse_role_arn};
use crate::config::RoleChains;
use crate::error::{Result, SsoError};
use crate::gateway::RetryGateway;
use crate::models::RoleCredentials;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Gets credentials straight from SSO, or by walking the configured `via`
/// chain and calling AssumeRole from each intermediate role.
pub struct CredentialBroker {
    gateway: Arc<RetryGateway>,
    sts: Arc<dyn StsApi>,
    chains: Arc<RoleChains>,
}

impl CredentialBroker {
    pub fn new(gateway: Arc<RetryGateway>, sts: Arc<dyn StsApi>, chains: Arc<RoleChains>) -> Self {
        Self {
            gateway,
            sts,
            chains,
        }
    }

    pub async fn get_role_credentials(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials> {
        let mut visited = HashSet::new();
        self.resolve(account_id.to_string(), role_name.to_string(), &mut visited)
            .await
    }

    // `visited` holds every ARN on the chain walked by this call
    fn resolve<'a>(
        &'a self,
        account_id: String,
        role_name: String,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<RoleCredentials>> {
        async move {
            let arn = make_role_arn(&account_id, &role_name)?;
            let chain = self.chains.get(&account_id, &role_name);

            let Some(via) = chain.and_then(|c| c.via.as_deref()) else {
                tracing::debug!("Getting {} via SSO", arn);
                return self
                    .gateway
                    .get_role_credentials(&account_id, &role_name)
                    .await;
            };

            let (via_account, via_role) = parse_role_arn(via)?;
            let via_arn = make_role_arn(&via_account, &via_role)?;

            visited.insert(arn.clone());
            if visited.contains(&via_arn) {
                return Err(SsoError::RoleChainLoop { arn, via: via_arn });
            }

            tracing::debug!("Getting {} via {}", arn, via_arn);
            let via_creds = self
                .resolve(via_account.clone(), via_role.clone(), visited)
                .await?;

            let request = AssumeRoleRequest {
                role_arn: arn,
                role_session_name: format!("{}@{}", via_role, via_account),
                external_id: chain.and_then(|c| c.external_id.clone()),
                source_identity: chain.and_then(|c| c.source_identity.clone()),
            };
            self.sts.assume_role(&via_creds, &request).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockSsoApi;
    use crate::models::RoleChainConfig;
    use crate::testing::{gateway, role_credentials};

    const A: &str = "arn:aws:iam::000000000001:role/A";
    const B: &str = "arn:aws:iam::000000000002:role/B";

    fn chain(arn: &str, via: &str) -> RoleChainConfig {
        RoleChainConfig {
            arn: arn.to_string(),
            via: Some(via.to_string()),
            ..Default::default()
        }
    }

    fn broker(sso: MockSsoApi, sts: MockStsApi, chains: Vec<RoleChainConfig>) -> CredentialBroker {
        CredentialBroker::new(
            gateway(sso),
            Arc::new(sts),
            Arc::new(chains.into_iter().collect()),
        )
    }

    #[tokio::test]
    async fn test_direct_role_uses_sso_once() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .withf(|_, account, role| account == "111111111111" && role == "Foo")
            .times(1)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIAFOO")));
        let mut sts = MockStsApi::new();
        sts.expect_assume_role().times(0);

        let creds = broker(sso, sts, vec![])
            .get_role_credentials("111111111111", "Foo")
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIAFOO");
        assert_eq!(creds.role_name, "Foo");
    }

    #[tokio::test]
    async fn test_chained_role_assumes_from_via() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .withf(|_, account, role| account == "000000000001" && role == "A")
            .times(1)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIAA")));

        let mut sts = MockStsApi::new();
        sts.expect_assume_role()
            .withf(|caller, request| {
                caller.access_key_id == "AKIAA"
                    && request.role_arn == B
                    && request.role_session_name == "A@000000000001"
                    && request.external_id.as_deref() == Some("ext-123")
                    && request.source_identity.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(role_credentials("000000000002", "B", "AKIAB")));

        let mut b = chain(B, A);
        b.external_id = Some("ext-123".to_string());

        let creds = broker(sso, sts, vec![b])
            .get_role_credentials("000000000002", "B")
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIAB");
    }

    #[tokio::test]
    async fn test_two_hop_chain() {
        const C: &str = "arn:aws:iam::000000000003:role/C";

        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .times(1)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIAA")));

        let mut sts = MockStsApi::new();
        let mut seq = mockall::Sequence::new();
        sts.expect_assume_role()
            .withf(|caller, request| caller.access_key_id == "AKIAA" && request.role_arn == B)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(role_credentials("000000000002", "B", "AKIAB")));
        sts.expect_assume_role()
            .withf(|caller, request| {
                caller.access_key_id == "AKIAB"
                    && request.role_arn == C
                    && request.role_session_name == "B@000000000002"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(role_credentials("000000000003", "C", "AKIAC")));

        let creds = broker(sso, sts, vec![chain(B, A), chain(C, B)])
            .get_role_credentials("000000000003", "C")
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIAC");
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials().times(0);
        let mut sts = MockStsApi::new();
        sts.expect_assume_role().times(0);

        let err = broker(sso, sts, vec![chain(A, B), chain(B, A)])
            .get_role_credentials("000000000001", "A")
            .await
            .unwrap_err();

        match err {
            SsoError::RoleChainLoop { arn, via } => {
                assert_eq!(arn, B);
                assert_eq!(via, A);
            }
            other => panic!("expected RoleChainLoop, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_self_reference_is_a_cycle() {
        let sts = MockStsApi::new();
        let err = broker(MockSsoApi::new(), sts, vec![chain(A, A)])
            .get_role_credentials("1", "A")
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::RoleChainLoop { .. }));
    }

    #[tokio::test]
    async fn test_visited_set_is_per_call() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .times(2)
            .returning(|_, account, role| Ok(role_credentials(account, role, "AKIAA")));
        let mut sts = MockStsApi::new();
        sts.expect_assume_role()
            .times(2)
            .returning(|_, _| Ok(role_credentials("000000000002", "B", "AKIAB")));

        let broker = broker(sso, sts, vec![chain(B, A)]);
        broker
            .get_role_credentials("000000000002", "B")
            .await
            .unwrap();
        broker
            .get_role_credentials("000000000002", "B")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sso_errors_propagate() {
        let mut sso = MockSsoApi::new();
        sso.expect_get_role_credentials()
            .returning(|_, _, _| Err(SsoError::AwsSdk("GetRoleCredentials: ForbiddenException No access".to_string())));

        let gateway = Arc::new(RetryGateway::new(
            Arc::new(sso),
            crate::testing::authenticated_session(),
            crate::gateway::RetryPolicy::new(0, std::time::Duration::ZERO),
        ));
        let broker = CredentialBroker::new(gateway, Arc::new(MockStsApi::new()), Arc::default());

        let err = broker
            .get_role_credentials("111111111111", "Nope")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ForbiddenException"));
    }
}
