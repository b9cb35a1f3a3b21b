//! Built-in leaf actions and conditions

use std::time::Duration;

use async_trait::async_trait;

use crate::chain::resolver::generated_token_identity;
use crate::chain::{Address, TokenConfig, Transaction};
use crate::engine::ActionContext;

use super::action::{Action, Condition};
use super::Failure;

/// Transfer tokens from the run account
#[derive(Debug, Clone)]
pub struct Transfer {
    pub to: Address,
    pub amount: u128,
    /// Token to use instead of the run's token
    pub token: Option<Address>,
}

#[async_trait]
impl Action for Transfer {
    fn kind(&self) -> &'static str {
        "transfer"
    }

    fn describe(&self) -> String {
        format!("Transfer {} to {}", self.amount, self.to)
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<String, Failure> {
        let token = ctx.token(self.token.as_ref())?;
        let tx = Transaction::token_transfer(
            ctx.account().address().clone(),
            token,
            self.to.clone(),
            self.amount,
        );
        let id = ctx.submit(tx).await?;
        Ok(format!("Transferred {} to {} in {}", self.amount, self.to, id))
    }
}

/// Mint tokens to the run account
#[derive(Debug, Clone)]
pub struct Mint {
    pub amount: u128,
    pub token: Option<Address>,
}

#[async_trait]
impl Action for Mint {
    fn kind(&self) -> &'static str {
        "mint"
    }

    fn describe(&self) -> String {
        format!("Mint {}", self.amount)
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<String, Failure> {
        let token = ctx.token(self.token.as_ref())?;
        let tx = Transaction::mint(ctx.account().address().clone(), token, self.amount);
        let id = ctx.submit(tx).await?;
        Ok(format!("Minted {} in {}", self.amount, id))
    }
}

/// Deploy an additional token contract
#[derive(Debug, Clone, Default)]
pub struct DeployToken {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[async_trait]
impl Action for DeployToken {
    fn kind(&self) -> &'static str {
        "deploy_token"
    }

    fn describe(&self) -> String {
        match &self.symbol {
            Some(symbol) => format!("Deploy token {}", symbol),
            None => "Deploy token".to_string(),
        }
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<String, Failure> {
        let (name, symbol) = generated_token_identity(&TokenConfig {
            address: None,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
        });
        let tx = Transaction::deploy_token(
            ctx.account().address().clone(),
            name.clone(),
            symbol.clone(),
        );
        ctx.submit(tx).await?;
        Ok(format!("Deployed {} ({})", name, symbol))
    }

    async fn confirmed(&self, ctx: &ActionContext, output: String) -> Result<String, Failure> {
        let Some(id) = ctx.pending().into_iter().next() else {
            return Ok(output);
        };
        match ctx.chain().contract_address(&id).await? {
            Some(address) => Ok(format!("{} at {}", output, address)),
            None => Err(Failure::action(format!(
                "Deployment {} created no contract",
                id
            ))),
        }
    }
}

/// Sleep for a fixed time
#[derive(Debug, Clone)]
pub struct Wait {
    pub duration: Duration,
}

#[async_trait]
impl Action for Wait {
    fn kind(&self) -> &'static str {
        "wait"
    }

    fn describe(&self) -> String {
        format!("Wait {:?}", self.duration)
    }

    async fn execute(&self, _ctx: &ActionContext) -> Result<String, Failure> {
        tokio::time::sleep(self.duration).await;
        Ok(format!("Waited {:?}", self.duration))
    }
}

/// Check that an address holds exactly the expected token balance
#[derive(Debug, Clone)]
pub struct AssertBalance {
    pub address: Address,
    pub expected: u128,
    pub token: Option<Address>,
}

#[async_trait]
impl Action for AssertBalance {
    fn kind(&self) -> &'static str {
        "assert_balance"
    }

    fn describe(&self) -> String {
        format!("Assert balance of {} is {}", self.address, self.expected)
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<String, Failure> {
        let token = ctx.token(self.token.as_ref())?;
        let actual = ctx.chain().token_balance(&token, &self.address).await?;
        if actual != self.expected {
            return Err(Failure::action(format!(
                "Unexpected balance for {}: expected {}, got {}",
                self.address, self.expected, actual
            )));
        }
        Ok(format!("Balance of {} is {}", self.address, actual))
    }
}

/// Comparison a [`BalanceCondition`] makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceBound {
    AtLeast(u128),
    Below(u128),
}

/// Holds when an address's token balance is within a bound
#[derive(Debug, Clone)]
pub struct BalanceCondition {
    pub address: Address,
    pub bound: BalanceBound,
    pub token: Option<Address>,
}

#[async_trait]
impl Condition for BalanceCondition {
    fn describe(&self) -> String {
        match self.bound {
            BalanceBound::AtLeast(amount) => format!("balance of {} >= {}", self.address, amount),
            BalanceBound::Below(amount) => format!("balance of {} < {}", self.address, amount),
        }
    }

    async fn holds(&self, ctx: &ActionContext) -> Result<bool, Failure> {
        let token = ctx.token(self.token.as_ref())?;
        let balance = ctx.chain().token_balance(&token, &self.address).await?;
        Ok(match self.bound {
            BalanceBound::AtLeast(amount) => balance >= amount,
            BalanceBound::Below(amount) => balance < amount,
        })
    }
}

/// Holds when contract code is deployed at an address
#[derive(Debug, Clone)]
pub struct HasCode {
    pub address: Address,
}

#[async_trait]
impl Condition for HasCode {
    fn describe(&self) -> String {
        format!("code at {}", self.address)
    }

    async fn holds(&self, ctx: &ActionContext) -> Result<bool, Failure> {
        Ok(ctx.chain().has_code(&self.address).await?)
    }
}
