//! Error types for synthesis

use crate::graph::LogicalId;
use thiserror::Error;

/// Error type for synthesis
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing environment variable: {0}")]
    MissingVariable(&'static str),
    #[error("invalid task sizing: cpu={cpu} memory={memory}")]
    InvalidSizing { cpu: u32, memory: u32 },
    #[error("task count must be at least 1")]
    InvalidTaskCount,
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),
    #[error("network not found: {0}")]
    NetworkNotFound(String),
    #[error("network {0} has no private subnets")]
    NoPrivateSubnets(String),
    #[error("network {0} has no public subnets")]
    NoPublicSubnets(String),
    #[error("hosted zone not found: {0}")]
    HostedZoneNotFound(String),
    #[error("invalid logical id: {0}")]
    InvalidLogicalId(String),
    #[error("duplicate logical id: {0}")]
    DuplicateLogicalId(LogicalId),
    #[error("unknown node: {0}")]
    UnknownNode(LogicalId),
    #[error("{from} references missing node {to}")]
    DanglingReference { from: LogicalId, to: LogicalId },
    #[error("{from} reads field {field} of {secret}, which is not a field of a secret")]
    InvalidSecretReference {
        from: LogicalId,
        secret: LogicalId,
        field: String,
    },
    #[error("dependency cycle through {0}")]
    Cycle(LogicalId),
    #[error("override target {target} is not a {expected}")]
    InvalidOverrideTarget {
        target: LogicalId,
        expected: &'static str,
    },
    #[error("{0} is not a {1}")]
    UnexpectedKind(LogicalId, &'static str),
    #[error("{0} has no container")]
    MissingContainer(LogicalId),
    #[error("missing output: {0}")]
    MissingOutput(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "aws")]
    #[error("ssm error during {operation}: {source}")]
    AwsSsm {
        operation: &'static str,
        #[source]
        source: Box<aws_sdk_ssm::Error>,
    },
    #[cfg(feature = "aws")]
    #[error("ec2 error during {operation}: {source}")]
    AwsEc2 {
        operation: &'static str,
        #[source]
        source: Box<aws_sdk_ec2::Error>,
    },
    #[cfg(feature = "aws")]
    #[error("route53 error during {operation}: {source}")]
    AwsRoute53 {
        operation: &'static str,
        #[source]
        source: Box<aws_sdk_route53::Error>,
    },
}
