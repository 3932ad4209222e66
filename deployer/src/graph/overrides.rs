//! Fields that higher-level builders do not expose.
//!
//! Overrides are recorded while the graph is assembled and merged exactly once, after every
//! builder has run, so each low-level adjustment stays visible in [super::ResourceGraph::overrides].

use super::{resources::Resource, LogicalId};
use crate::Error;
use serde::Serialize;

/// A single low-level field to set on a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OverrideField {
    /// `EnableExecuteCommand` of an ECS service
    EnableExecuteCommand(bool),
}

impl OverrideField {
    pub(super) fn apply(&self, target: &LogicalId, resource: &mut Resource) -> Result<(), Error> {
        match self {
            Self::EnableExecuteCommand(enabled) => match resource {
                Resource::Service(service) => {
                    service.enable_execute_command = *enabled;
                    Ok(())
                }
                _ => Err(Error::InvalidOverrideTarget {
                    target: target.clone(),
                    expected: "service",
                }),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Override {
    pub target: LogicalId,
    pub field: OverrideField,
}
