//! Organization, collaboration and user model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Rule;

/// A participant entity that owns users and joins collaborations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A named grouping of organizations that jointly execute tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaboration {
    pub id: Uuid,
    pub name: String,
    pub organization_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Collaboration {
    pub fn new(name: impl Into<String>, organization_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            organization_ids,
            created_at: Utc::now(),
        }
    }

    /// Whether the given organization participates in this collaboration
    pub fn has_member(&self, org_id: Uuid) -> bool {
        self.organization_ids.contains(&org_id)
    }
}

/// A principal; belongs to exactly one organization and holds a rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub organization_id: Uuid,
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, organization_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            organization_id,
            rules: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Grant a rule; duplicate rules collapse by identity
    pub fn with_rule(mut self, rule: Rule) -> Self {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        for rule in rules {
            self = self.with_rule(rule);
        }
        self
    }
}
