//! Scenario files
//!
//! A scenario is a YAML document describing the task tree to run. Loading
//! only checks syntax; [`Scenario::to_spec`] expands templates and checks
//! leaf parameters, and [`crate::tasks::TaskTree::build`] checks structure.

mod build;
pub mod config;

use std::path::Path;

use crate::common::{Error, Result};
use crate::tasks::{TaskSpec, TaskTree};

pub use config::{AmountValue, ConditionDescription, Scenario, ScenarioSettings, TaskDescription};

impl Scenario {
    /// Load and parse a scenario file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ScenarioParse(e.to_string()))
    }

    /// Expand templates and convert the root into a task spec
    pub fn to_spec(&self) -> Result<TaskSpec> {
        let spec = build::SpecBuilder::new(&self.templates).build(&self.root)?;
        // An unnamed root takes the scenario's name
        Ok(match spec {
            TaskSpec::Leaf { name: None, .. }
            | TaskSpec::Sequential { name: None, .. }
            | TaskSpec::Parallel { name: None, .. }
            | TaskSpec::Repeat { name: None, .. }
            | TaskSpec::Conditional { name: None, .. } => spec.named(self.name.clone()),
            named => named,
        })
    }

    /// Build and validate the task tree
    pub fn build_tree(&self) -> Result<TaskTree> {
        TaskTree::build(self.to_spec()?)
    }
}
