//! IAM policy documents.

use super::LogicalId;
use serde::Serialize;

/// Actions needed to pull an image from ECR. `ecr:GetAuthorizationToken` has no resource-level
/// scoping, so these are granted on `*`.
pub const IMAGE_PULL_ACTIONS: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

/// Actions needed to ship container logs.
pub const LOG_ACTIONS: &[&str] = &["logs:CreateLogStream", "logs:PutLogEvents"];

/// Action needed to resolve secret-backed environment variables at launch.
pub const SECRET_READ_ACTIONS: &[&str] = &["secretsmanager:GetSecretValue"];

/// Session channel actions used by ECS Exec.
pub const SESSION_CHANNEL_ACTIONS: &[&str] = &[
    "ssmmessages:CreateControlChannel",
    "ssmmessages:CreateDataChannel",
    "ssmmessages:OpenControlChannel",
    "ssmmessages:OpenDataChannel",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
        }
    }
}

/// Resource a statement applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PolicyResource {
    /// Every resource (`*`)
    Any,
    /// The ARN of a node in the same graph
    Arn(LogicalId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<PolicyResource>,
}

impl Statement {
    /// Allows `actions` on `resources`.
    pub fn allow(actions: &[&str], resources: Vec<PolicyResource>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.resources.contains(&PolicyResource::Any)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// All actions granted by the document.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
    }

    /// Nodes whose ARNs appear in the document.
    pub fn references(&self) -> impl Iterator<Item = &LogicalId> {
        self.statements
            .iter()
            .flat_map(|s| s.resources.iter())
            .filter_map(|r| match r {
                PolicyResource::Arn(id) => Some(id),
                PolicyResource::Any => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_skip_wildcards() {
        let secret = LogicalId::new("CredsSecret");
        let document = PolicyDocument::new(vec![
            Statement::allow(IMAGE_PULL_ACTIONS, vec![PolicyResource::Any]),
            Statement::allow(
                SECRET_READ_ACTIONS,
                vec![PolicyResource::Arn(secret.clone())],
            ),
        ]);
        let refs: Vec<_> = document.references().collect();
        assert_eq!(refs, vec![&secret]);
        assert_eq!(document.actions().count(), 5);
        assert!(document.statements[0].is_wildcard());
        assert!(!document.statements[1].is_wildcard());
    }
}
