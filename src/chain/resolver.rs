//! Token contract resolution
//!
//! A scenario either names an existing token or gets a freshly deployed one.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::common::{Error, Result};

use super::{Address, ConfirmationWaiter, NonceManager, SharedChain, Transaction};

/// Token section of a scenario
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Reuse the token deployed at this address
    pub address: Option<Address>,
    /// Name for a newly deployed token
    pub name: Option<String>,
    /// Symbol for a newly deployed token
    pub symbol: Option<String>,
}

/// Generated name and symbol for a new test token
pub fn generated_token_identity(config: &TokenConfig) -> (String, String) {
    let token_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Local::now();
    let name = config.name.clone().unwrap_or_else(|| {
        format!(
            "Scenario Test Token {} {}",
            token_id,
            now.format("%Y-%m-%dT%H:%M")
        )
    });
    let symbol = config
        .symbol
        .clone()
        .unwrap_or_else(|| format!("T{}", &token_id[..3]));
    (name, symbol)
}

/// Finds or deploys the token contract a scenario runs against
pub struct ContractResolver {
    chain: SharedChain,
    nonces: Arc<NonceManager>,
    waiter: ConfirmationWaiter,
    timeout: Duration,
}

impl ContractResolver {
    pub fn new(
        chain: SharedChain,
        nonces: Arc<NonceManager>,
        waiter: ConfirmationWaiter,
        timeout: Duration,
    ) -> Self {
        Self {
            chain,
            nonces,
            waiter,
            timeout,
        }
    }

    /// Reuse the configured token, or deploy a new one and wait for it
    ///
    /// A configured address without contract code is an error rather than a
    /// reason to deploy.
    pub async fn resolve_or_deploy(&self, config: &TokenConfig) -> Result<Address> {
        if let Some(address) = &config.address {
            if !self.chain.has_code(address).await? {
                return Err(Error::ContractNotDeployed {
                    address: address.to_string(),
                    what: "Token".to_string(),
                });
            }
            tracing::debug!(address = %address, "Reusing token");
            return Ok(address.clone());
        }

        let (name, symbol) = generated_token_identity(config);
        tracing::debug!(name = %name, symbol = %symbol, "Deploying token");

        let from = self.nonces.account().address().clone();
        let tx = Transaction::deploy_token(from, name.clone(), symbol.clone());
        let id = self.nonces.submit(self.chain.as_ref(), tx).await?;
        self.waiter.wait(std::slice::from_ref(&id), self.timeout).await?;

        let address = self.chain.contract_address(&id).await?.ok_or_else(|| {
            Error::Chain(format!("Token deployment {} created no contract", id))
        })?;
        tracing::info!(address = %address, name = %name, symbol = %symbol, "Deployed token");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Account, ChainClient, MockChain};

    fn resolver(chain: Arc<MockChain>) -> ContractResolver {
        let account = Account::new(Address::parse(&format!("0x{:040x}", 1)).unwrap());
        let waiter = ConfirmationWaiter::with_intervals(
            chain.clone(),
            Duration::from_millis(10),
            Duration::from_secs(10),
        );
        ContractResolver::new(
            chain,
            Arc::new(NonceManager::new(account)),
            waiter,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_reuses_configured_token_with_code() {
        let chain = Arc::new(MockChain::new());
        let address = Address::parse(&format!("0x{:040x}", 0xabc)).unwrap();
        chain.deploy_code(&address);

        let config = TokenConfig {
            address: Some(address.clone()),
            ..Default::default()
        };
        assert_eq!(resolver(chain.clone()).resolve_or_deploy(&config).await.unwrap(), address);
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_configured_token_without_code_is_rejected() {
        let chain = Arc::new(MockChain::new());
        let config = TokenConfig {
            address: Some(Address::parse(&format!("0x{:040x}", 0xabc)).unwrap()),
            ..Default::default()
        };
        let err = resolver(chain).resolve_or_deploy(&config).await.unwrap_err();
        assert!(matches!(err, Error::ContractNotDeployed { .. }));
    }

    #[tokio::test]
    async fn test_deploys_when_no_address() {
        let chain = Arc::new(MockChain::with_confirmation_delay(2));
        let address = resolver(chain.clone())
            .resolve_or_deploy(&TokenConfig::default())
            .await
            .unwrap();
        assert!(chain.has_code(&address).await.unwrap());
        assert_eq!(chain.submitted().len(), 1);
    }

    #[test]
    fn test_generated_identity() {
        let (name, symbol) = generated_token_identity(&TokenConfig::default());
        assert!(name.starts_with("Scenario Test Token "));
        assert_eq!(symbol.len(), 4);
        assert!(symbol.starts_with('T'));

        let config = TokenConfig {
            name: Some("Custom".into()),
            symbol: Some("CST".into()),
            ..Default::default()
        };
        assert_eq!(
            generated_token_identity(&config),
            ("Custom".to_string(), "CST".to_string())
        );
    }
}
