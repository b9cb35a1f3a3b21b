//! Building and navigating the task tree

use std::sync::Arc;

use crate::common::{Error, Result};

use super::action::{Action, Condition};
use super::node::{RepeatPolicy, TaskId, TaskKind, TaskNode, TaskSnapshot};

/// Validated-on-build description of a task subtree
///
/// This is what a scenario file is converted into, and what tests build
/// directly when they need custom actions.
#[derive(Debug, Clone)]
pub enum TaskSpec {
    Leaf {
        name: Option<String>,
        action: Arc<dyn Action>,
    },
    Sequential {
        name: Option<String>,
        children: Vec<TaskSpec>,
    },
    Parallel {
        name: Option<String>,
        children: Vec<TaskSpec>,
        max_concurrency: Option<usize>,
        continue_on_error: bool,
    },
    Repeat {
        name: Option<String>,
        policy: RepeatPolicy,
        child: Box<TaskSpec>,
    },
    Conditional {
        name: Option<String>,
        condition: Arc<dyn Condition>,
        children: Vec<TaskSpec>,
    },
}

impl TaskSpec {
    pub fn leaf(action: impl Action + 'static) -> Self {
        Self::Leaf {
            name: None,
            action: Arc::new(action),
        }
    }

    pub fn sequential(children: Vec<TaskSpec>) -> Self {
        Self::Sequential {
            name: None,
            children,
        }
    }

    pub fn parallel(children: Vec<TaskSpec>) -> Self {
        Self::Parallel {
            name: None,
            children,
            max_concurrency: None,
            continue_on_error: false,
        }
    }

    pub fn repeat(policy: RepeatPolicy, child: TaskSpec) -> Self {
        Self::Repeat {
            name: None,
            policy,
            child: Box::new(child),
        }
    }

    pub fn conditional(condition: impl Condition + 'static, children: Vec<TaskSpec>) -> Self {
        Self::Conditional {
            name: None,
            condition: Arc::new(condition),
            children,
        }
    }

    /// Give the task an explicit name
    pub fn named(mut self, new_name: impl Into<String>) -> Self {
        let slot = match &mut self {
            Self::Leaf { name, .. }
            | Self::Sequential { name, .. }
            | Self::Parallel { name, .. }
            | Self::Repeat { name, .. }
            | Self::Conditional { name, .. } => name,
        };
        *slot = Some(new_name.into());
        self
    }
}

/// The task hierarchy of one run
///
/// The shape never changes after [`TaskTree::build`]. Every node's position
/// is recorded by id so parents and ancestors can be looked up without
/// back-pointers.
#[derive(Debug)]
pub struct TaskTree {
    root: TaskNode,
    /// Child-index path from the root, indexed by task id
    paths: Vec<Vec<usize>>,
}

impl TaskTree {
    /// Validate a spec and turn it into a tree
    pub fn build(spec: TaskSpec) -> Result<Self> {
        let mut paths = Vec::new();
        let root = build_node(spec, None, Vec::new(), &mut paths)?;
        Ok(Self { root, paths })
    }

    pub fn root(&self) -> &TaskNode {
        &self.root
    }

    /// Number of nodes, composites included
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn node(&self, id: TaskId) -> Option<&TaskNode> {
        let path = self.paths.get(id.0 as usize)?;
        path.iter()
            .try_fold(&self.root, |node, &index| node.children().get(index))
    }

    pub fn parent_of(&self, id: TaskId) -> Option<&TaskNode> {
        self.node(id)?.parent().and_then(|parent| self.node(parent))
    }

    /// Ids from the node's parent up to the root
    pub fn ancestors(&self, id: TaskId) -> Vec<TaskId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(node) = current {
            ancestors.push(node.id());
            current = self.parent_of(node.id());
        }
        ancestors
    }

    /// `root > group > task` style path of names
    pub fn breadcrumb(&self, id: TaskId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .filter_map(|a| self.node(a).map(TaskNode::name))
            .collect();
        names.reverse();
        if let Some(node) = self.node(id) {
            names.push(node.name());
        }
        names.join(" > ")
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.root.snapshot()
    }
}

fn build_node(
    spec: TaskSpec,
    parent: Option<TaskId>,
    path: Vec<usize>,
    paths: &mut Vec<Vec<usize>>,
) -> Result<TaskNode> {
    let id = TaskId(paths.len() as u32);
    paths.push(path.clone());

    let build_children = |children: Vec<TaskSpec>,
                          paths: &mut Vec<Vec<usize>>,
                          label: &str,
                          name: &str|
     -> Result<Vec<TaskNode>> {
        if children.is_empty() {
            return Err(Error::malformed(format!(
                "{} task '{}' has no children",
                label, name
            )));
        }
        children
            .into_iter()
            .enumerate()
            .map(|(i, child)| {
                let mut child_path = path.clone();
                child_path.push(i);
                build_node(child, Some(id), child_path, paths)
            })
            .collect()
    };

    let node = match spec {
        TaskSpec::Leaf { name, action } => {
            let name = name.unwrap_or_else(|| action.describe());
            TaskNode::new(id, parent, name, TaskKind::Leaf(action), Vec::new())
        }
        TaskSpec::Sequential { name, children } => {
            let name = name.unwrap_or_else(|| "serial".to_string());
            let children = build_children(children, paths, "Serial", &name)?;
            TaskNode::new(id, parent, name, TaskKind::Sequential, children)
        }
        TaskSpec::Parallel {
            name,
            children,
            max_concurrency,
            continue_on_error,
        } => {
            let name = name.unwrap_or_else(|| "parallel".to_string());
            if max_concurrency == Some(0) {
                return Err(Error::malformed(format!(
                    "Parallel task '{}' has a concurrency cap of zero",
                    name
                )));
            }
            let children = build_children(children, paths, "Parallel", &name)?;
            let kind = TaskKind::Parallel {
                max_concurrency,
                continue_on_error,
            };
            TaskNode::new(id, parent, name, kind, children)
        }
        TaskSpec::Repeat {
            name,
            policy,
            child,
        } => {
            let name = name.unwrap_or_else(|| "repeat".to_string());
            if !policy.is_bounded() {
                return Err(Error::malformed(format!(
                    "Repeat task '{}' needs a count, duration or while condition",
                    name
                )));
            }
            if policy.count == Some(0) {
                return Err(Error::malformed(format!(
                    "Repeat task '{}' has a count of zero",
                    name
                )));
            }
            let children = build_children(vec![*child], paths, "Repeat", &name)?;
            TaskNode::new(id, parent, name, TaskKind::Repeat(policy), children)
        }
        TaskSpec::Conditional {
            name,
            condition,
            children,
        } => {
            let name = name.unwrap_or_else(|| format!("if {}", condition.describe()));
            let children = build_children(children, paths, "Conditional", &name)?;
            TaskNode::new(id, parent, name, TaskKind::Conditional(condition), children)
        }
    };
    Ok(node)
}
