//! Rule definitions: capability triples of resource, scope and operation

use serde::{Deserialize, Serialize};

/// Resource type a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Organization,
    Collaboration,
    Task,
    Run,
    User,
}

/// Breadth of resource ownership a rule applies to, relative to the
/// principal's organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Organization,
    Collaboration,
    Global,
}

/// Operation a rule permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    View,
    Edit,
    Create,
    Delete,
}

/// A capability granting `operation` on `resource` at `scope`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub resource: Resource,
    pub scope: Scope,
    pub operation: Operation,
}

impl Rule {
    pub fn new(resource: Resource, scope: Scope, operation: Operation) -> Self {
        Self {
            resource,
            scope,
            operation,
        }
    }

    /// All operations on `resource` at global scope
    pub fn global_all(resource: Resource) -> Vec<Rule> {
        [
            Operation::View,
            Operation::Edit,
            Operation::Create,
            Operation::Delete,
        ]
        .into_iter()
        .map(|op| Rule::new(resource, Scope::Global, op))
        .collect()
    }
}
