//! Typed descriptions of every resource the graph can hold.

use super::{policy::PolicyDocument, LogicalId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt, time::Duration};

/// Service principal assumed by ECS tasks
pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Kind of a node, independent of its configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResourceKind {
    Network,
    HostedZone,
    Parameter,
    Secret,
    Cluster,
    Role,
    Policy,
    LogGroup,
    TaskDefinition,
    SecurityGroup,
    IngressRule,
    Certificate,
    LoadBalancer,
    TargetGroup,
    Listener,
    Service,
    AliasRecord,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happens to a resource when it leaves the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    Destroy,
}

/// A network resolved at synthesis time. Not owned by the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkRef {
    pub vpc_id: String,
    pub private_subnets: Vec<String>,
    pub public_subnets: Vec<String>,
}

/// A hosted zone resolved at synthesis time. Not owned by the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostedZoneRef {
    pub zone_id: String,
    pub zone_name: String,
}

/// A template parameter supplied when the stack is deployed.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub no_echo: bool,
    #[serde(skip)]
    pub default: String,
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = if self.no_echo { "<redacted>" } else { &self.default };
        f.debug_struct("ParameterSpec")
            .field("no_echo", &self.no_echo)
            .field("default", &default)
            .finish()
    }
}

/// A JSON secret whose fields are resolved from template parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecretSpec {
    pub description: String,
    /// Field name -> parameter holding its value
    pub fields: BTreeMap<String, LogicalId>,
    pub removal: RemovalPolicy,
}

impl SecretSpec {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// An ECS cluster placed in an imported network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    pub network: LogicalId,
}

/// Why a role exists. Execution and task roles are never merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RolePurpose {
    /// Assumed by the ECS agent to pull the image, ship logs and read secrets
    Execution,
    /// Assumed by the running container
    Task,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleSpec {
    pub purpose: RolePurpose,
    pub service_principal: String,
}

/// An inline policy attached to exactly one role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PolicySpec {
    pub role: LogicalId,
    pub document: PolicyDocument,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogGroupSpec {
    pub name: String,
    pub retention_days: u32,
    pub removal: RemovalPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CpuArchitecture {
    Arm64,
    X86_64,
}

impl CpuArchitecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "ARM64",
            Self::X86_64 => "X86_64",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Protocol {
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }
}

/// Image built from a local directory and pushed under a tag derived from its build inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageSpec {
    pub directory: String,
    pub repository: String,
    pub build_args: BTreeMap<String, String>,
}

impl ImageSpec {
    /// Hex-encoded SHA-256 over the build directory path and the build arguments.
    ///
    /// The contents of the directory are not hashed: a source change only yields a new tag
    /// together with a new `VCS_REF` or `BUILD_DATE`.
    pub fn tag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.directory.as_bytes());
        for (key, value) in &self.build_args {
            hasher.update([0]);
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
        }
        hex(&hasher.finalize())
    }
}

/// Converts bytes to a hexadecimal string.
fn hex(bytes: &[u8]) -> String {
    let mut hex = String::new();
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// A container environment variable resolved from a secret field at launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecretRef {
    pub secret: LogicalId,
    pub field: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

/// Probe run by the container runtime inside the task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub command: Vec<String>,
    pub interval: Duration,
    pub retries: u32,
    pub start_period: Duration,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogConfiguration {
    pub group: LogicalId,
    pub stream_prefix: String,
}

/// A container of a task definition. Exposes exactly one port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageSpec,
    pub environment: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, SecretRef>,
    pub port_mapping: PortMapping,
    pub health_check: HealthCheck,
    pub logging: LogConfiguration,
    pub init_process_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskDefinitionSpec {
    pub cpu: u32,
    pub memory: u32,
    pub architecture: CpuArchitecture,
    pub execution_role: LogicalId,
    pub task_role: LogicalId,
    pub containers: Vec<ContainerSpec>,
}

/// Inbound rule admitting a port from an IPv4 CIDR block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CidrIngress {
    pub cidr: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecurityGroupSpec {
    pub network: LogicalId,
    pub description: String,
    pub allow_all_outbound: bool,
    pub allow_all_ipv6_outbound: bool,
    pub ingress: Vec<CidrIngress>,
}

/// Inbound rule admitting a port from another security group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngressRuleSpec {
    pub group: LogicalId,
    pub source: LogicalId,
    pub port: u16,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CertificateValidation {
    /// Validated by records written into the hosted zone
    Dns { zone: LogicalId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificateSpec {
    pub domain_name: String,
    pub validation: CertificateValidation,
}

/// A certificate that is known to be validated by the time it is referenced.
///
/// Only [super::ResourceGraph::add_certificate] hands these out, so a listener holding one
/// cannot exist without the certificate (and its validation) preceding it in the graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidatedCertificate {
    id: LogicalId,
}

impl ValidatedCertificate {
    pub(super) fn new(id: LogicalId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &LogicalId {
        &self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub network: LogicalId,
    pub subnets: Vec<String>,
    pub security_group: LogicalId,
}

/// Probe run by the load balancer against each target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetHealthCheck {
    pub path: String,
    pub interval: Duration,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl Default for TargetHealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval: Duration::from_secs(30),
            healthy_threshold: 5,
            unhealthy_threshold: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetGroupSpec {
    pub network: LogicalId,
    pub port: u16,
    pub health_check: TargetHealthCheck,
    pub attributes: BTreeMap<String, String>,
}

impl TargetGroupSpec {
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn configure_health_check(&mut self, health_check: TargetHealthCheck) {
        self.health_check = health_check;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ApplicationProtocol {
    Http,
    Https,
}

impl ApplicationProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// TLS negotiation policy of an HTTPS listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SslPolicy {
    /// TLS 1.3 only, restricted ciphers
    Tls13Res,
}

impl SslPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tls13Res => "ELBSecurityPolicy-TLS13-1-2-Res-2021-06",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ListenerAction {
    Forward { target_group: LogicalId },
    Redirect { protocol: ApplicationProtocol, port: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListenerSpec {
    pub load_balancer: LogicalId,
    pub port: u16,
    pub protocol: ApplicationProtocol,
    pub certificate: Option<ValidatedCertificate>,
    pub ssl_policy: Option<SslPolicy>,
    pub action: ListenerAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapacityProviderStrategy {
    pub capacity_provider: String,
    pub weight: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CircuitBreaker {
    pub rollback: bool,
}

/// Binding of a container port to a target group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetBinding {
    pub container_name: String,
    pub container_port: u16,
    pub target_group: LogicalId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub cluster: LogicalId,
    pub task_definition: LogicalId,
    pub desired_count: u32,
    pub subnets: Vec<String>,
    pub assign_public_ip: bool,
    pub security_groups: Vec<LogicalId>,
    pub capacity_provider_strategies: Vec<CapacityProviderStrategy>,
    pub circuit_breaker: Option<CircuitBreaker>,
    pub health_check_grace_period: Option<Duration>,
    pub targets: Vec<TargetBinding>,
    pub(crate) enable_execute_command: bool,
}

impl ServiceSpec {
    /// Whether ECS Exec sessions into running tasks are allowed.
    ///
    /// Only settable through [super::OverrideField::EnableExecuteCommand].
    pub fn enable_execute_command(&self) -> bool {
        self.enable_execute_command
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RecordType {
    A,
    Aaaa,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AliasTarget {
    LoadBalancer(LogicalId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AliasRecordSpec {
    pub zone: LogicalId,
    pub record_name: String,
    pub record_type: RecordType,
    pub target: AliasTarget,
}

impl AliasRecordSpec {
    /// Builds the A and AAAA records for `record_name`. They are only ever created together.
    pub fn pair(zone: &LogicalId, record_name: &str, target: AliasTarget) -> [Self; 2] {
        [RecordType::A, RecordType::Aaaa].map(|record_type| Self {
            zone: zone.clone(),
            record_name: record_name.to_string(),
            record_type,
            target: target.clone(),
        })
    }
}

/// A node's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Resource {
    Network(NetworkRef),
    HostedZone(HostedZoneRef),
    Parameter(ParameterSpec),
    Secret(SecretSpec),
    Cluster(ClusterSpec),
    Role(RoleSpec),
    Policy(PolicySpec),
    LogGroup(LogGroupSpec),
    TaskDefinition(TaskDefinitionSpec),
    SecurityGroup(SecurityGroupSpec),
    IngressRule(IngressRuleSpec),
    Certificate(CertificateSpec),
    LoadBalancer(LoadBalancerSpec),
    TargetGroup(TargetGroupSpec),
    Listener(ListenerSpec),
    Service(ServiceSpec),
    AliasRecord(AliasRecordSpec),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Network(_) => ResourceKind::Network,
            Self::HostedZone(_) => ResourceKind::HostedZone,
            Self::Parameter(_) => ResourceKind::Parameter,
            Self::Secret(_) => ResourceKind::Secret,
            Self::Cluster(_) => ResourceKind::Cluster,
            Self::Role(_) => ResourceKind::Role,
            Self::Policy(_) => ResourceKind::Policy,
            Self::LogGroup(_) => ResourceKind::LogGroup,
            Self::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Self::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Self::IngressRule(_) => ResourceKind::IngressRule,
            Self::Certificate(_) => ResourceKind::Certificate,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::TargetGroup(_) => ResourceKind::TargetGroup,
            Self::Listener(_) => ResourceKind::Listener,
            Self::Service(_) => ResourceKind::Service,
            Self::AliasRecord(_) => ResourceKind::AliasRecord,
        }
    }

    /// Lookups resolved at synthesis time rather than resources owned by the stack.
    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HostedZone(_))
    }

    /// Nodes this resource reads a value from.
    pub fn references(&self) -> Vec<&LogicalId> {
        match self {
            Self::Network(_) | Self::HostedZone(_) | Self::Parameter(_) | Self::Role(_) => {
                Vec::new()
            }
            Self::LogGroup(_) => Vec::new(),
            Self::Secret(secret) => secret.fields.values().collect(),
            Self::Cluster(cluster) => vec![&cluster.network],
            Self::Policy(policy) => {
                let mut refs = vec![&policy.role];
                refs.extend(policy.document.references());
                refs
            }
            Self::TaskDefinition(task) => {
                let mut refs = vec![&task.execution_role, &task.task_role];
                for container in &task.containers {
                    refs.push(&container.logging.group);
                    refs.extend(container.secrets.values().map(|s| &s.secret));
                }
                refs
            }
            Self::SecurityGroup(group) => vec![&group.network],
            Self::IngressRule(rule) => vec![&rule.group, &rule.source],
            Self::Certificate(certificate) => match &certificate.validation {
                CertificateValidation::Dns { zone } => vec![zone],
            },
            Self::LoadBalancer(lb) => vec![&lb.network, &lb.security_group],
            Self::TargetGroup(group) => vec![&group.network],
            Self::Listener(listener) => {
                let mut refs = vec![&listener.load_balancer];
                if let Some(certificate) = &listener.certificate {
                    refs.push(certificate.id());
                }
                if let ListenerAction::Forward { target_group } = &listener.action {
                    refs.push(target_group);
                }
                refs
            }
            Self::Service(service) => {
                let mut refs = vec![&service.cluster, &service.task_definition];
                refs.extend(service.security_groups.iter());
                refs.extend(service.targets.iter().map(|t| &t.target_group));
                refs
            }
            Self::AliasRecord(record) => match &record.target {
                AliasTarget::LoadBalancer(lb) => vec![&record.zone, lb],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(commit: &str) -> ImageSpec {
        ImageSpec {
            directory: "./resources/app-proxy".to_string(),
            repository: "app-proxy".to_string(),
            build_args: BTreeMap::from([("VCS_REF".to_string(), commit.to_string())]),
        }
    }

    #[test]
    fn test_image_tag() {
        let tag = image("aaaaaaaa").tag();
        assert_eq!(tag.len(), 64);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tag, image("aaaaaaaa").tag());
        assert_ne!(tag, image("deadbeef").tag());
    }

    #[test]
    fn test_image_tag_covers_path() {
        let mut moved = image("aaaaaaaa");
        moved.directory = "./resources/other".to_string();
        assert_ne!(moved.tag(), image("aaaaaaaa").tag());
        assert_eq!(hex(&[0x00, 0x0f, 0xab]), "000fab");
    }

    #[test]
    fn test_alias_pair() {
        let zone = LogicalId::new("Zone");
        let lb = LogicalId::new("LB");
        let [a, aaaa] = AliasRecordSpec::pair(
            &zone,
            "proxy.example.com",
            AliasTarget::LoadBalancer(lb.clone()),
        );
        assert_eq!(a.record_type, RecordType::A);
        assert_eq!(aaaa.record_type, RecordType::Aaaa);
        assert_eq!(a.record_name, aaaa.record_name);
        assert_eq!(
            Resource::AliasRecord(a).references(),
            vec![&zone, &lb]
        );
    }

    #[test]
    fn test_imported() {
        let network = Resource::Network(NetworkRef {
            vpc_id: "vpc-1".to_string(),
            private_subnets: Vec::new(),
            public_subnets: Vec::new(),
        });
        assert!(network.is_imported());
        assert!(network.references().is_empty());
        let cluster = Resource::Cluster(ClusterSpec {
            network: LogicalId::new("ImportVPC"),
        });
        assert!(!cluster.is_imported());
        assert_eq!(cluster.kind(), ResourceKind::Cluster);
    }
}
