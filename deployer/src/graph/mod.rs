//! A typed, acyclic description of the resources in a stack.
//!
//! Every node has a [LogicalId], a [Resource] describing its configuration, and a set of tags.
//! Edges come from two places:
//!
//! * references: a node that reads another node's value (an ARN, an id, a DNS name) depends
//!   on it, and
//! * explicit dependencies: edges recorded with [ResourceGraph::add_dependency] when no field
//!   reference forces the ordering.
//!
//! [ResourceGraph::validate] checks that every edge lands on a node of the graph, that secret
//! references name real secret fields, and that the graph is acyclic. The returned order is the
//! order in which a provisioning engine could create the resources one by one.

use crate::Error;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

pub mod policy;
mod overrides;
pub use overrides::{Override, OverrideField};
pub mod resources;
use resources::{
    CertificateSpec, Resource, ResourceKind, TargetGroupSpec, TaskDefinitionSpec,
    ValidatedCertificate,
};

/// Identifier of a node, unique within a graph. Alphanumeric only.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 255
            && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: LogicalId,
    pub resource: Resource,
    pub depends_on: BTreeSet<LogicalId>,
    pub tags: BTreeMap<String, String>,
}

impl Node {
    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// Nodes that must exist before this one.
    pub fn edges(&self) -> BTreeSet<&LogicalId> {
        self.resource
            .references()
            .into_iter()
            .chain(self.depends_on.iter())
            .collect()
    }
}

/// Value published by the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OutputValue {
    LoadBalancerDnsName(LogicalId),
}

impl OutputValue {
    pub fn reference(&self) -> &LogicalId {
        match self {
            Self::LoadBalancerDnsName(id) => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Output {
    pub description: String,
    pub value: OutputValue,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResourceGraph {
    nodes: BTreeMap<LogicalId, Node>,
    outputs: BTreeMap<String, Output>,
    #[serde(skip)]
    pending: Vec<Override>,
    overrides: Vec<Override>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id.
    pub fn add(&mut self, id: &str, resource: Resource) -> Result<LogicalId, Error> {
        let id = LogicalId::new(id);
        if !id.is_valid() {
            return Err(Error::InvalidLogicalId(id.0));
        }
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateLogicalId(id));
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                resource,
                depends_on: BTreeSet::new(),
                tags: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    /// Adds a certificate and returns the handle listeners must hold to use it.
    pub fn add_certificate(
        &mut self,
        id: &str,
        certificate: CertificateSpec,
    ) -> Result<ValidatedCertificate, Error> {
        let id = self.add(id, Resource::Certificate(certificate))?;
        Ok(ValidatedCertificate::new(id))
    }

    /// Records that `from` must be created after `to`, even though it reads nothing from it.
    pub fn add_dependency(&mut self, from: &LogicalId, to: &LogicalId) -> Result<(), Error> {
        if !self.nodes.contains_key(to) {
            return Err(Error::DanglingReference {
                from: from.clone(),
                to: to.clone(),
            });
        }
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| Error::UnknownNode(from.clone()))?;
        node.depends_on.insert(to.clone());
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, output: Output) {
        self.outputs.insert(name.to_string(), output);
    }

    /// Records a low-level field to set on `target` when overrides are merged.
    pub fn add_override(&mut self, target: &LogicalId, field: OverrideField) {
        self.pending.push(Override {
            target: target.clone(),
            field,
        });
    }

    /// Applies every recorded override, in the order they were added.
    pub fn merge_overrides(&mut self) -> Result<(), Error> {
        for pending in std::mem::take(&mut self.pending) {
            let node = self.nodes.get_mut(&pending.target).ok_or_else(|| {
                Error::InvalidOverrideTarget {
                    target: pending.target.clone(),
                    expected: "node",
                }
            })?;
            pending.field.apply(&pending.target, &mut node.resource)?;
            self.overrides.push(pending);
        }
        Ok(())
    }

    /// Overrides merged into the graph.
    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    /// Sets a tag on every node in the graph.
    pub fn tag(&mut self, key: &str, value: &str) {
        for node in self.nodes.values_mut() {
            node.tags.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.kind() == kind)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn task_definition(&self, id: &LogicalId) -> Result<&TaskDefinitionSpec, Error> {
        match self.nodes.get(id).map(|n| &n.resource) {
            Some(Resource::TaskDefinition(task)) => Ok(task),
            _ => Err(Error::UnexpectedKind(id.clone(), "task definition")),
        }
    }

    pub fn target_group_mut(&mut self, id: &LogicalId) -> Result<&mut TargetGroupSpec, Error> {
        match self.nodes.get_mut(id).map(|n| &mut n.resource) {
            Some(Resource::TargetGroup(group)) => Ok(group),
            _ => Err(Error::UnexpectedKind(id.clone(), "target group")),
        }
    }

    /// All `(dependent, dependency)` pairs.
    pub fn edges(&self) -> BTreeSet<(LogicalId, LogicalId)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.edges()
                    .into_iter()
                    .map(|to| (node.id.clone(), to.clone()))
            })
            .collect()
    }

    /// Ids and kinds of every node together with every edge. Two graphs with equal topology
    /// contain the same resources wired the same way, whatever their configuration.
    pub fn topology(&self) -> (BTreeMap<LogicalId, ResourceKind>, BTreeSet<(LogicalId, LogicalId)>) {
        let kinds = self
            .nodes
            .values()
            .map(|n| (n.id.clone(), n.kind()))
            .collect();
        (kinds, self.edges())
    }

    /// Checks references and acyclicity, returning the nodes in creation order.
    pub fn validate(&self) -> Result<Vec<LogicalId>, Error> {
        // Every edge must land on a node of this graph
        for node in self.nodes.values() {
            for to in node.edges() {
                if !self.nodes.contains_key(to) {
                    return Err(Error::DanglingReference {
                        from: node.id.clone(),
                        to: to.clone(),
                    });
                }
            }
        }
        for output in self.outputs.values() {
            let to = output.value.reference();
            if !matches!(
                self.nodes.get(to).map(|n| n.kind()),
                Some(ResourceKind::LoadBalancer)
            ) {
                return Err(Error::UnexpectedKind(to.clone(), "load balancer"));
            }
        }

        // Secret references must name a field of a secret
        for node in self.nodes.values() {
            let Resource::TaskDefinition(task) = &node.resource else {
                continue;
            };
            for secret_ref in task.containers.iter().flat_map(|c| c.secrets.values()) {
                let valid = match self.nodes.get(&secret_ref.secret).map(|n| &n.resource) {
                    Some(Resource::Secret(secret)) => secret.has_field(&secret_ref.field),
                    _ => false,
                };
                if !valid {
                    return Err(Error::InvalidSecretReference {
                        from: node.id.clone(),
                        secret: secret_ref.secret.clone(),
                        field: secret_ref.field.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm, always taking the smallest ready id so the order is deterministic
        let mut remaining: BTreeMap<&LogicalId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&LogicalId, Vec<&LogicalId>> = BTreeMap::new();
        for node in self.nodes.values() {
            let edges = node.edges();
            remaining.insert(&node.id, edges.len());
            for to in edges {
                dependents.entry(to).or_default().push(&node.id);
            }
        }
        let mut ready: BTreeSet<&LogicalId> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id.clone());
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(*dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
        if let Some((stuck, _)) = remaining.iter().find(|(_, count)| **count > 0) {
            return Err(Error::Cycle((*stuck).clone()));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resources::*;
    use std::time::Duration;

    fn network() -> Resource {
        Resource::Network(NetworkRef {
            vpc_id: "vpc-1".to_string(),
            private_subnets: vec!["subnet-a".to_string()],
            public_subnets: vec!["subnet-b".to_string()],
        })
    }

    fn security_group(network: &LogicalId) -> Resource {
        Resource::SecurityGroup(SecurityGroupSpec {
            network: network.clone(),
            description: "test".to_string(),
            allow_all_outbound: true,
            allow_all_ipv6_outbound: true,
            ingress: Vec::new(),
        })
    }

    fn task_definition(
        secret: &LogicalId,
        field: &str,
        logs: &LogicalId,
        role: &LogicalId,
    ) -> Resource {
        Resource::TaskDefinition(TaskDefinitionSpec {
            cpu: 256,
            memory: 512,
            architecture: CpuArchitecture::Arm64,
            execution_role: role.clone(),
            task_role: role.clone(),
            containers: vec![ContainerSpec {
                name: "app".to_string(),
                image: ImageSpec {
                    directory: ".".to_string(),
                    repository: "app".to_string(),
                    build_args: BTreeMap::new(),
                },
                environment: BTreeMap::new(),
                secrets: BTreeMap::from([(
                    "TOKEN".to_string(),
                    SecretRef {
                        secret: secret.clone(),
                        field: field.to_string(),
                    },
                )]),
                port_mapping: PortMapping {
                    container_port: 8080,
                    host_port: 8080,
                    protocol: Protocol::Tcp,
                },
                health_check: HealthCheck {
                    command: vec!["CMD".to_string()],
                    interval: Duration::from_secs(60),
                    retries: 3,
                    start_period: Duration::from_secs(60),
                    timeout: Duration::from_secs(5),
                },
                logging: LogConfiguration {
                    group: logs.clone(),
                    stream_prefix: "app".to_string(),
                },
                init_process_enabled: true,
            }],
        })
    }

    fn secret_graph(field: &str) -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        let param = graph
            .add(
                "token",
                Resource::Parameter(ParameterSpec {
                    no_echo: true,
                    default: "x".to_string(),
                }),
            )
            .unwrap();
        let secret = graph
            .add(
                "Secret",
                Resource::Secret(SecretSpec {
                    description: "test".to_string(),
                    fields: BTreeMap::from([("token".to_string(), param)]),
                    removal: RemovalPolicy::Destroy,
                }),
            )
            .unwrap();
        let role = graph
            .add(
                "Role",
                Resource::Role(RoleSpec {
                    purpose: RolePurpose::Execution,
                    service_principal: ECS_TASKS_PRINCIPAL.to_string(),
                }),
            )
            .unwrap();
        let logs = graph
            .add(
                "Logs",
                Resource::LogGroup(LogGroupSpec {
                    name: "/logs".to_string(),
                    retention_days: 7,
                    removal: RemovalPolicy::Destroy,
                }),
            )
            .unwrap();
        graph
            .add("TaskDef", task_definition(&secret, field, &logs, &role))
            .unwrap();
        graph
    }

    #[test]
    fn test_rejects_invalid_ids() {
        let mut graph = ResourceGraph::new();
        assert!(matches!(
            graph.add("not-valid", network()),
            Err(Error::InvalidLogicalId(_))
        ));
        assert!(matches!(
            graph.add("", network()),
            Err(Error::InvalidLogicalId(_))
        ));
        graph.add("Vpc", network()).unwrap();
        assert!(matches!(
            graph.add("Vpc", network()),
            Err(Error::DuplicateLogicalId(_))
        ));
    }

    #[test]
    fn test_order_respects_edges() {
        let mut graph = ResourceGraph::new();
        let vpc = graph.add("Vpc", network()).unwrap();
        let sg = graph.add("AGroup", security_group(&vpc)).unwrap();
        graph.add_dependency(&sg, &vpc).unwrap();
        let order = graph.validate().unwrap();
        assert_eq!(order, vec![vpc.clone(), sg.clone()]);
        assert!(graph.edges().contains(&(sg, vpc)));
    }

    #[test]
    fn test_dangling_reference() {
        let mut graph = ResourceGraph::new();
        graph
            .add("Group", security_group(&LogicalId::new("Missing")))
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(Error::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_dependency_on_missing_node() {
        let mut graph = ResourceGraph::new();
        let vpc = graph.add("Vpc", network()).unwrap();
        match graph.add_dependency(&vpc, &LogicalId::new("Missing")) {
            Err(Error::DanglingReference { from, to }) => {
                assert_eq!(from.as_str(), "Vpc");
                assert_eq!(to.as_str(), "Missing");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        match graph.add_dependency(&LogicalId::new("Missing"), &vpc) {
            Err(Error::UnknownNode(id)) => assert_eq!(id.as_str(), "Missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_cycle() {
        let mut graph = ResourceGraph::new();
        let vpc = graph.add("Vpc", network()).unwrap();
        let a = graph.add("A", security_group(&vpc)).unwrap();
        let b = graph.add("B", security_group(&vpc)).unwrap();
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &a).unwrap();
        assert!(matches!(graph.validate(), Err(Error::Cycle(_))));
    }

    #[test]
    fn test_secret_reference() {
        secret_graph("token").validate().unwrap();
        assert!(matches!(
            secret_graph("password").validate(),
            Err(Error::InvalidSecretReference { .. })
        ));
    }

    #[test]
    fn test_tag_applies_to_every_node() {
        let mut graph = secret_graph("token");
        graph.tag("tenant", "Abc");
        assert!(graph
            .nodes()
            .all(|n| n.tags.get("tenant").map(String::as_str) == Some("Abc")));
    }

    #[test]
    fn test_override_wrong_kind() {
        let mut graph = ResourceGraph::new();
        let vpc = graph.add("Vpc", network()).unwrap();
        graph.add_override(&vpc, OverrideField::EnableExecuteCommand(true));
        assert!(matches!(
            graph.merge_overrides(),
            Err(Error::InvalidOverrideTarget { .. })
        ));
        assert!(graph.overrides().is_empty());
    }

    #[test]
    fn test_certificate_handle() {
        let mut graph = ResourceGraph::new();
        let zone = graph
            .add(
                "Zone",
                Resource::HostedZone(HostedZoneRef {
                    zone_id: "Z1".to_string(),
                    zone_name: "example.com".to_string(),
                }),
            )
            .unwrap();
        let certificate = graph
            .add_certificate(
                "Cert",
                CertificateSpec {
                    domain_name: "proxy.example.com".to_string(),
                    validation: CertificateValidation::Dns { zone },
                },
            )
            .unwrap();
        assert_eq!(certificate.id().as_str(), "Cert");
        assert_eq!(
            graph.get(certificate.id()).map(|n| n.kind()),
            Some(ResourceKind::Certificate)
        );
    }
}
