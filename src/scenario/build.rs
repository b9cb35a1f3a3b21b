//! Conversion of scenario descriptions into task specs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::tasks::builtin::{
    AssertBalance, BalanceBound, BalanceCondition, DeployToken, HasCode, Mint, Transfer, Wait,
};
use crate::tasks::{Condition, RepeatPolicy, TaskSpec};

use super::config::{AmountValue, ConditionDescription, TaskDescription};

impl AmountValue {
    /// The amount as a token quantity
    pub fn to_quantity(&self) -> Result<u128> {
        match self {
            Self::Int(n) => Ok(u128::from(*n)),
            Self::Text(s) => s
                .trim()
                .replace('_', "")
                .parse()
                .map_err(|_| Error::malformed(format!("Invalid amount '{}'", s))),
        }
    }
}

/// Expands templates and turns descriptions into [`TaskSpec`]s
pub(crate) struct SpecBuilder<'a> {
    templates: &'a BTreeMap<String, TaskDescription>,
    /// Templates currently being expanded, outermost first
    expanding: Vec<&'a str>,
}

impl<'a> SpecBuilder<'a> {
    pub(crate) fn new(templates: &'a BTreeMap<String, TaskDescription>) -> Self {
        Self {
            templates,
            expanding: Vec::new(),
        }
    }

    pub(crate) fn build(&mut self, desc: &'a TaskDescription) -> Result<TaskSpec> {
        let spec = match desc {
            TaskDescription::Serial { name, tasks } => TaskSpec::Sequential {
                name: name.clone(),
                children: self.build_all(tasks)?,
            },
            TaskDescription::Parallel {
                name,
                max_concurrency,
                continue_on_error,
                tasks,
            } => TaskSpec::Parallel {
                name: name.clone(),
                children: self.build_all(tasks)?,
                max_concurrency: *max_concurrency,
                continue_on_error: *continue_on_error,
            },
            TaskDescription::Repeat {
                name,
                count,
                duration_secs,
                while_condition,
                task,
            } => TaskSpec::Repeat {
                name: name.clone(),
                policy: RepeatPolicy {
                    count: *count,
                    duration: duration_secs.map(Duration::from_secs),
                    condition: while_condition.as_ref().map(build_condition).transpose()?,
                },
                child: Box::new(self.build(task)?),
            },
            TaskDescription::Conditional { name, when, tasks } => TaskSpec::Conditional {
                name: name.clone(),
                condition: build_condition(when)?,
                children: self.build_all(tasks)?,
            },
            TaskDescription::Use { name, template } => {
                let spec = self.expand(template)?;
                match name {
                    Some(name) => spec.named(name.clone()),
                    None => spec,
                }
            }
            TaskDescription::Transfer {
                name,
                to,
                amount,
                token,
            } => leaf(
                name,
                Transfer {
                    to: to.clone(),
                    amount: nonzero(amount, "Transfer")?,
                    token: token.clone(),
                },
            ),
            TaskDescription::Mint {
                name,
                amount,
                token,
            } => leaf(
                name,
                Mint {
                    amount: nonzero(amount, "Mint")?,
                    token: token.clone(),
                },
            ),
            TaskDescription::DeployToken {
                name,
                token_name,
                symbol,
            } => leaf(
                name,
                DeployToken {
                    name: token_name.clone(),
                    symbol: symbol.clone(),
                },
            ),
            TaskDescription::Wait { name, seconds } => {
                let duration = Duration::try_from_secs_f64(*seconds).map_err(|_| {
                    Error::malformed(format!("Invalid wait of {} seconds", seconds))
                })?;
                leaf(name, Wait { duration })
            }
            TaskDescription::AssertBalance {
                name,
                address,
                expected,
                token,
            } => leaf(
                name,
                AssertBalance {
                    address: address.clone(),
                    expected: expected.to_quantity()?,
                    token: token.clone(),
                },
            ),
        };
        Ok(spec)
    }

    fn build_all(&mut self, descs: &'a [TaskDescription]) -> Result<Vec<TaskSpec>> {
        descs.iter().map(|d| self.build(d)).collect()
    }

    fn expand(&mut self, template: &'a str) -> Result<TaskSpec> {
        if self.expanding.contains(&template) {
            let mut chain = self.expanding.clone();
            chain.push(template);
            return Err(Error::malformed(format!(
                "Template cycle: {}",
                chain.join(" -> ")
            )));
        }
        let desc = self
            .templates
            .get(template)
            .ok_or_else(|| Error::malformed(format!("Unknown template '{}'", template)))?;

        self.expanding.push(template);
        let spec = self.build(desc);
        self.expanding.pop();
        spec
    }
}

fn leaf(name: &Option<String>, action: impl crate::tasks::Action + 'static) -> TaskSpec {
    match name {
        Some(name) => TaskSpec::leaf(action).named(name.clone()),
        None => TaskSpec::leaf(action),
    }
}

fn nonzero(amount: &AmountValue, what: &str) -> Result<u128> {
    match amount.to_quantity()? {
        0 => Err(Error::malformed(format!("{} amount must not be zero", what))),
        n => Ok(n),
    }
}

fn build_condition(desc: &ConditionDescription) -> Result<Arc<dyn Condition>> {
    let condition: Arc<dyn Condition> = match desc {
        ConditionDescription::BalanceAtLeast {
            address,
            amount,
            token,
        } => Arc::new(BalanceCondition {
            address: address.clone(),
            bound: BalanceBound::AtLeast(amount.to_quantity()?),
            token: token.clone(),
        }),
        ConditionDescription::BalanceBelow {
            address,
            amount,
            token,
        } => Arc::new(BalanceCondition {
            address: address.clone(),
            bound: BalanceBound::Below(amount.to_quantity()?),
            token: token.clone(),
        }),
        ConditionDescription::HasCode { address } => Arc::new(HasCode {
            address: address.clone(),
        }),
    };
    Ok(condition)
}
