//! Authorization evaluator
//!
//! Decides whether a principal's rule set permits an operation on a
//! resource, given the resource's owning organization and collaboration.
//! Read-only and deterministic; safe to call concurrently.

use uuid::Uuid;

use super::rules::{Operation, Resource, Scope};
use crate::member::User;

/// Ownership descriptor of the resource being checked
#[derive(Debug, Clone, Default)]
pub struct ResourceContext {
    /// Organization that owns the resource
    pub owner_org: Option<Uuid>,
    /// Member organizations of the resource's collaboration
    pub collaboration_members: Vec<Uuid>,
    /// Principal that directly created the resource, where applicable
    pub created_by: Option<Uuid>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(mut self, org_id: Uuid) -> Self {
        self.owner_org = Some(org_id);
        self
    }

    pub fn in_collaboration(mut self, member_org_ids: Vec<Uuid>) -> Self {
        self.collaboration_members = member_org_ids;
        self
    }

    pub fn created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

/// Returns true on the first rule of `user` that matches `resource` and
/// `operation` exactly and whose scope is satisfied by `ctx`
pub fn is_allowed(
    user: &User,
    operation: Operation,
    resource: Resource,
    ctx: &ResourceContext,
) -> bool {
    user.rules.iter().any(|rule| {
        rule.resource == resource
            && rule.operation == operation
            && scope_satisfied(rule.scope, user, ctx)
    })
}

fn scope_satisfied(scope: Scope, user: &User, ctx: &ResourceContext) -> bool {
    match scope {
        Scope::Global => true,
        Scope::Collaboration => ctx.collaboration_members.contains(&user.organization_id),
        Scope::Organization => ctx.owner_org == Some(user.organization_id),
        Scope::Own => {
            ctx.owner_org == Some(user.organization_id) && ctx.created_by == Some(user.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Rule;

    fn user_with(resource: Resource, scope: Scope, operation: Operation) -> User {
        User::new("tester", Uuid::new_v4()).with_rule(Rule::new(resource, scope, operation))
    }

    #[test]
    fn test_global_scope_matches_unrelated_org() {
        let user = user_with(Resource::Task, Scope::Global, Operation::View);
        let ctx = ResourceContext::new().owned_by(Uuid::new_v4());

        assert!(is_allowed(&user, Operation::View, Resource::Task, &ctx));
    }

    #[test]
    fn test_no_matching_rule_is_denied() {
        let user = user_with(Resource::Task, Scope::Global, Operation::View);
        let ctx = ResourceContext::new().owned_by(user.organization_id);

        // Wrong operation
        assert!(!is_allowed(&user, Operation::Delete, Resource::Task, &ctx));
        // Wrong resource
        assert!(!is_allowed(&user, Operation::View, Resource::Run, &ctx));
    }

    #[test]
    fn test_organization_scope_requires_same_org() {
        let user = user_with(Resource::Task, Scope::Organization, Operation::View);

        let own = ResourceContext::new().owned_by(user.organization_id);
        assert!(is_allowed(&user, Operation::View, Resource::Task, &own));

        let other = ResourceContext::new().owned_by(Uuid::new_v4());
        assert!(!is_allowed(&user, Operation::View, Resource::Task, &other));
    }

    #[test]
    fn test_collaboration_scope_requires_membership() {
        let user = user_with(Resource::Task, Scope::Collaboration, Operation::Delete);
        let partner = Uuid::new_v4();

        let member = ResourceContext::new()
            .owned_by(partner)
            .in_collaboration(vec![partner, user.organization_id]);
        assert!(is_allowed(&user, Operation::Delete, Resource::Task, &member));

        let outsider = ResourceContext::new()
            .owned_by(partner)
            .in_collaboration(vec![partner, Uuid::new_v4()]);
        assert!(!is_allowed(&user, Operation::Delete, Resource::Task, &outsider));
    }

    #[test]
    fn test_own_scope_requires_creator() {
        let user = user_with(Resource::Task, Scope::Own, Operation::Edit);

        let created = ResourceContext::new()
            .owned_by(user.organization_id)
            .created_by(user.id);
        assert!(is_allowed(&user, Operation::Edit, Resource::Task, &created));

        // Same org but created by somebody else
        let foreign = ResourceContext::new()
            .owned_by(user.organization_id)
            .created_by(Uuid::new_v4());
        assert!(!is_allowed(&user, Operation::Edit, Resource::Task, &foreign));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let org = Uuid::new_v4();
        let user = User::new("tester", org)
            .with_rule(Rule::new(Resource::Task, Scope::Own, Operation::View))
            .with_rule(Rule::new(Resource::Task, Scope::Global, Operation::View));

        // Own scope does not match, but the global rule does
        let ctx = ResourceContext::new().owned_by(Uuid::new_v4());
        assert!(is_allowed(&user, Operation::View, Resource::Task, &ctx));
    }
}
