//! Resources of the App Proxy service.

use crate::{
    config::Config,
    context::Inputs,
    graph::{
        policy::{
            PolicyDocument, PolicyResource, Statement, IMAGE_PULL_ACTIONS, LOG_ACTIONS,
            SECRET_READ_ACTIONS, SESSION_CHANNEL_ACTIONS,
        },
        resources::{
            AliasRecordSpec, AliasTarget, CapacityProviderStrategy,
            CertificateSpec, CertificateValidation, CircuitBreaker, ClusterSpec, ContainerSpec,
            CpuArchitecture, HealthCheck, ImageSpec, LogConfiguration, LogGroupSpec,
            ParameterSpec, PolicySpec, PortMapping, Protocol, RecordType, RemovalPolicy, Resource,
            RolePurpose, RoleSpec, SecretRef, SecretSpec, SecurityGroupSpec, SslPolicy,
            TargetHealthCheck, TaskDefinitionSpec, ECS_TASKS_PRINCIPAL,
        },
        LogicalId, Output, OutputValue, OverrideField, ResourceGraph,
    },
    lookup::Lookup,
    naming::{log_path, record_name, vpc_parameter},
    pattern::{LoadBalancedFargateService, FARGATE},
    Error,
};
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, info};

/// Name of the proxy container
pub const CONTAINER_NAME: &str = "appproxy";

/// Port the proxy listens on inside the task
pub const CONTAINER_PORT: u16 = 8080;

/// Path answered by the proxy when it is ready
pub const HEALTH_PATH: &str = "/health";

/// Build context of the proxy image
pub const IMAGE_DIRECTORY: &str = "./resources/app-proxy";

/// Repository the proxy image is pushed to
pub const IMAGE_REPOSITORY: &str = "app-proxy";

/// Prefix of every log stream written by the proxy
pub const LOG_STREAM_PREFIX: &str = "DbxAppProxy";

/// Days container logs are kept
pub const LOG_RETENTION_DAYS: u32 = 7;

/// Name of the load balancer
pub const LOAD_BALANCER_NAME: &str = "AppProxyLB";

/// Target group attribute controlling how long draining targets keep connections
pub const DEREGISTRATION_DELAY_ATTRIBUTE: &str = "deregistration_delay.timeout_seconds";

/// Draining time before a deregistered target is removed
pub const DEREGISTRATION_DELAY: Duration = Duration::from_secs(10);

/// Field of the credentials secret holding the client id
pub const CLIENT_ID_FIELD: &str = "client_id";

/// Field of the credentials secret holding the client secret
pub const CLIENT_SECRET_FIELD: &str = "client_secret";

/// Name of the stack output exposing the load balancer endpoint
pub const ENDPOINT_OUTPUT: &str = "ProxyURI";

/// Builds the App Proxy graph for one tenant.
///
/// The graph holds the credentials secret, the cluster and task definition, the load-balanced
/// service with its certificate, and the A/AAAA alias records. Exec access to the running tasks
/// is enabled through an override merged after every builder has run.
pub fn build(inputs: &Inputs, config: &Config, lookup: &impl Lookup) -> Result<ResourceGraph, Error> {
    let tenant = &inputs.tenant;
    let mut graph = ResourceGraph::new();

    // Credentials are no-echo template parameters defaulting to the environment values. The
    // secret joins the parameters, so the values only appear as those defaults.
    let client_id = graph.add(
        "clientID",
        Resource::Parameter(ParameterSpec {
            no_echo: true,
            default: inputs.credentials.client_id.clone(),
        }),
    )?;
    let client_secret = graph.add(
        "clientSecret",
        Resource::Parameter(ParameterSpec {
            no_echo: true,
            default: inputs.credentials.client_secret.clone(),
        }),
    )?;
    let secret = graph.add(
        "CredsSecret",
        Resource::Secret(SecretSpec {
            description: "Databricks Service Principle Creds".to_string(),
            fields: BTreeMap::from([
                (CLIENT_ID_FIELD.to_string(), client_id),
                (CLIENT_SECRET_FIELD.to_string(), client_secret),
            ]),
            removal: RemovalPolicy::Destroy,
        }),
    )?;

    // Network
    let parameter = vpc_parameter(&tenant.tenant);
    let vpc_id = lookup.parameter(&parameter)?;
    let network_ref = lookup.network(&vpc_id)?;
    debug!(
        parameter = parameter.as_str(),
        vpc = vpc_id.as_str(),
        "resolved network"
    );
    let private_subnets = network_ref.private_subnets.clone();
    let public_subnets = network_ref.public_subnets.clone();
    let network = graph.add("ImportVPC", Resource::Network(network_ref))?;
    let cluster = graph.add(
        "Cluster",
        Resource::Cluster(ClusterSpec {
            network: network.clone(),
        }),
    )?;

    // Logs
    let log_group = graph.add(
        "LogGroup",
        Resource::LogGroup(LogGroupSpec {
            name: log_path(&tenant.tenant, &tenant.product, &tenant.environment),
            retention_days: LOG_RETENTION_DAYS,
            removal: RemovalPolicy::Destroy,
        }),
    )?;

    // Roles
    let execution_role = add_role(
        &mut graph,
        "TaskDefExecutionRole",
        RolePurpose::Execution,
        vec![
            Statement::allow(IMAGE_PULL_ACTIONS, vec![PolicyResource::Any]),
            Statement::allow(LOG_ACTIONS, vec![PolicyResource::Arn(log_group.clone())]),
            Statement::allow(SECRET_READ_ACTIONS, vec![PolicyResource::Arn(secret.clone())]),
        ],
    )?;
    let task_role = add_role(
        &mut graph,
        "TaskDefTaskRole",
        RolePurpose::Task,
        vec![Statement::allow(
            SESSION_CHANNEL_ACTIONS,
            vec![PolicyResource::Any],
        )],
    )?;

    // Task definition
    let build_args = BTreeMap::from([
        ("CADDY_VERSION".to_string(), config.versions.caddy.clone()),
        ("GO_VERSION".to_string(), config.versions.go.clone()),
        ("BUILD_DATE".to_string(), inputs.provenance.date.clone()),
        ("VCS_REF".to_string(), inputs.provenance.commit.clone()),
    ]);
    let secret_ref = |field: &str| SecretRef {
        secret: secret.clone(),
        field: field.to_string(),
    };
    let container = ContainerSpec {
        name: CONTAINER_NAME.to_string(),
        image: ImageSpec {
            directory: IMAGE_DIRECTORY.to_string(),
            repository: IMAGE_REPOSITORY.to_string(),
            build_args,
        },
        environment: BTreeMap::from([
            ("LOG_LEVEL".to_string(), "INFO".to_string()),
            (
                "DATABRICKS_WORKSPACE_URI".to_string(),
                tenant.workspace_uri.clone(),
            ),
            ("DATABRICKS_APP_URI".to_string(), tenant.app_uri.clone()),
        ]),
        secrets: BTreeMap::from([
            ("DATABRICKS_CLIENT_ID".to_string(), secret_ref(CLIENT_ID_FIELD)),
            (
                "DATABRICKS_CLIENT_SECRET".to_string(),
                secret_ref(CLIENT_SECRET_FIELD),
            ),
        ]),
        port_mapping: PortMapping {
            container_port: CONTAINER_PORT,
            host_port: CONTAINER_PORT,
            protocol: Protocol::Tcp,
        },
        health_check: HealthCheck {
            command: vec![
                "CMD-SHELL".to_string(),
                format!("curl -f http://localhost:{CONTAINER_PORT}{HEALTH_PATH} || exit 1"),
            ],
            interval: Duration::from_secs(60),
            retries: 3,
            start_period: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
        },
        logging: LogConfiguration {
            group: log_group,
            stream_prefix: LOG_STREAM_PREFIX.to_string(),
        },
        init_process_enabled: true,
    };
    let task_definition = graph.add(
        "TaskDef",
        Resource::TaskDefinition(TaskDefinitionSpec {
            cpu: config.task.cpu,
            memory: config.task.memory,
            architecture: CpuArchitecture::Arm64,
            execution_role,
            task_role,
            containers: vec![container],
        }),
    )?;

    // Service security group; ingress is added by the load-balanced service
    let security_group = graph.add(
        "SecurityGroup",
        Resource::SecurityGroup(SecurityGroupSpec {
            network: network.clone(),
            description: "Security group for the service".to_string(),
            allow_all_outbound: true,
            allow_all_ipv6_outbound: true,
            ingress: Vec::new(),
        }),
    )?;
    graph.add_dependency(&security_group, &network)?;

    // DNS and certificate
    let zone_ref = lookup.hosted_zone(&tenant.zone)?;
    let domain_name = record_name(&tenant.hostname, &zone_ref.zone_name);
    let zone = graph.add("Zone", Resource::HostedZone(zone_ref))?;
    let certificate = graph.add_certificate(
        "SiteCertificate",
        CertificateSpec {
            domain_name: domain_name.clone(),
            validation: CertificateValidation::Dns { zone: zone.clone() },
        },
    )?;

    // Service
    let service = LoadBalancedFargateService {
        cluster,
        task_definition,
        network,
        desired_count: config.task.count,
        security_groups: vec![security_group],
        capacity_provider_strategies: vec![CapacityProviderStrategy {
            capacity_provider: FARGATE.to_string(),
            weight: 1,
        }],
        circuit_breaker: Some(CircuitBreaker { rollback: true }),
        certificate,
        ssl_policy: SslPolicy::Tls13Res,
        task_subnets: private_subnets,
        load_balancer_subnets: public_subnets,
        load_balancer_name: LOAD_BALANCER_NAME.to_string(),
    }
    .build(&mut graph, "Service")?;

    // Target group tuning
    let target_group = graph.target_group_mut(&service.target_group)?;
    target_group.set_attribute(
        DEREGISTRATION_DELAY_ATTRIBUTE,
        DEREGISTRATION_DELAY.as_secs().to_string(),
    );
    target_group.configure_health_check(TargetHealthCheck {
        path: HEALTH_PATH.to_string(),
        interval: Duration::from_secs(30),
        healthy_threshold: 3,
        unhealthy_threshold: 6,
    });

    // Not exposed by the load-balanced service
    graph.add_override(&service.service, OverrideField::EnableExecuteCommand(true));

    // Records
    for record in AliasRecordSpec::pair(
        &zone,
        &domain_name,
        AliasTarget::LoadBalancer(service.load_balancer.clone()),
    ) {
        let id = match record.record_type {
            RecordType::A => "ProxyAliasRecordA",
            RecordType::Aaaa => "ProxyAliasRecordAAAA",
        };
        graph.add(id, Resource::AliasRecord(record))?;
    }

    graph.add_output(
        ENDPOINT_OUTPUT,
        Output {
            description: "The App Proxy Endpoint".to_string(),
            value: OutputValue::LoadBalancerDnsName(service.load_balancer),
        },
    );

    graph.merge_overrides()?;
    info!(
        tenant = tenant.tenant.as_str(),
        domain = domain_name.as_str(),
        resources = graph.len(),
        "built app proxy"
    );
    Ok(graph)
}

/// Adds a role assumed by ECS tasks along with its inline policy.
fn add_role(
    graph: &mut ResourceGraph,
    id: &str,
    purpose: RolePurpose,
    statements: Vec<Statement>,
) -> Result<LogicalId, Error> {
    let role = graph.add(
        id,
        Resource::Role(RoleSpec {
            purpose,
            service_principal: ECS_TASKS_PRINCIPAL.to_string(),
        }),
    )?;
    graph.add(
        &format!("{id}DefaultPolicy"),
        Resource::Policy(PolicySpec {
            role: role.clone(),
            document: PolicyDocument::new(statements),
        }),
    )?;
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{Credentials, Provenance, Target, TenantContext},
        graph::resources::{ApplicationProtocol, ListenerAction, ResourceKind},
        lookup::{Context, NetworkEntry},
    };

    fn inputs() -> Inputs {
        Inputs {
            tenant: TenantContext {
                tenant: "Abc".to_string(),
                environment: "Dev".to_string(),
                product: "DbxAppProxy".to_string(),
                workspace_uri: "https://ws".to_string(),
                app_uri: "https://app".to_string(),
                hostname: "proxy".to_string(),
                zone: "example.com".to_string(),
            },
            credentials: Credentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
            provenance: Provenance::default(),
            target: Target {
                account: None,
                region: "eu-west-1".to_string(),
            },
        }
    }

    fn context() -> Context {
        Context::default()
            .with_parameter("/Abc/baseline/network/vpc-id", "vpc-1")
            .with_network(
                "vpc-1",
                NetworkEntry {
                    private_subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
                    public_subnets: vec!["subnet-c".to_string(), "subnet-d".to_string()],
                },
            )
            .with_hosted_zone("example.com", "Z1")
    }

    fn service(graph: &ResourceGraph) -> &crate::graph::resources::ServiceSpec {
        match &graph.get(&LogicalId::new("Service")).unwrap().resource {
            Resource::Service(service) => service,
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn test_build() {
        let graph = build(&inputs(), &Config::default(), &context()).unwrap();
        graph.validate().unwrap();
        assert_eq!(graph.of_kind(ResourceKind::Listener).count(), 2);
        assert_eq!(graph.of_kind(ResourceKind::AliasRecord).count(), 2);
        assert_eq!(graph.of_kind(ResourceKind::Certificate).count(), 1);
        assert_eq!(graph.of_kind(ResourceKind::Role).count(), 2);

        let service = service(&graph);
        assert!(service.enable_execute_command());
        assert_eq!(service.desired_count, 2);
        assert_eq!(service.subnets, vec!["subnet-a", "subnet-b"]);
        assert_eq!(graph.overrides().len(), 1);
    }

    #[test]
    fn test_listeners() {
        let graph = build(&inputs(), &Config::default(), &context()).unwrap();
        for node in graph.of_kind(ResourceKind::Listener) {
            let Resource::Listener(listener) = &node.resource else {
                unreachable!();
            };
            match listener.port {
                443 => {
                    assert_eq!(
                        listener.certificate.as_ref().map(|c| c.id().as_str()),
                        Some("SiteCertificate")
                    );
                    assert_eq!(listener.ssl_policy, Some(SslPolicy::Tls13Res));
                }
                80 => assert_eq!(
                    listener.action,
                    ListenerAction::Redirect {
                        protocol: ApplicationProtocol::Https,
                        port: 443,
                    }
                ),
                port => panic!("unexpected listener port {port}"),
            }
        }
    }

    #[test]
    fn test_target_group_tuning() {
        let graph = build(&inputs(), &Config::default(), &context()).unwrap();
        let node = graph.of_kind(ResourceKind::TargetGroup).next().unwrap();
        let Resource::TargetGroup(group) = &node.resource else {
            unreachable!();
        };
        assert_eq!(group.port, CONTAINER_PORT);
        assert_eq!(group.health_check.path, HEALTH_PATH);
        assert_eq!(group.health_check.healthy_threshold, 3);
        assert_eq!(group.health_check.unhealthy_threshold, 6);
        assert_eq!(
            group
                .attributes
                .get(DEREGISTRATION_DELAY_ATTRIBUTE)
                .map(String::as_str),
            Some("10")
        );
    }

    #[test]
    fn test_roles_are_separate() {
        let graph = build(&inputs(), &Config::default(), &context()).unwrap();
        let task = graph.task_definition(&LogicalId::new("TaskDef")).unwrap();
        assert_ne!(task.execution_role, task.task_role);

        let actions = |id: &str| -> Vec<String> {
            match &graph.get(&LogicalId::new(id)).unwrap().resource {
                Resource::Policy(policy) => policy.document.actions().map(String::from).collect(),
                other => panic!("unexpected resource: {other:?}"),
            }
        };
        let execution = actions("TaskDefExecutionRoleDefaultPolicy");
        assert!(execution.iter().any(|a| a == "secretsmanager:GetSecretValue"));
        assert!(!execution.iter().any(|a| a.starts_with("ssmmessages:")));
        let task_actions = actions("TaskDefTaskRoleDefaultPolicy");
        assert_eq!(task_actions.len(), SESSION_CHANNEL_ACTIONS.len());
        assert!(task_actions.iter().all(|a| a.starts_with("ssmmessages:")));
    }

    #[test]
    fn test_secret_scoped_to_arn() {
        let graph = build(&inputs(), &Config::default(), &context()).unwrap();
        let Resource::Policy(policy) = &graph
            .get(&LogicalId::new("TaskDefExecutionRoleDefaultPolicy"))
            .unwrap()
            .resource
        else {
            unreachable!();
        };
        let statement = policy
            .document
            .statements
            .iter()
            .find(|s| s.actions.iter().any(|a| a == "secretsmanager:GetSecretValue"))
            .unwrap();
        assert_eq!(
            statement.resources,
            vec![PolicyResource::Arn(LogicalId::new("CredsSecret"))]
        );
    }

    #[test]
    fn test_missing_network() {
        let context = Context::default().with_hosted_zone("example.com", "Z1");
        assert!(matches!(
            build(&inputs(), &Config::default(), &context),
            Err(Error::ParameterNotFound(_))
        ));
    }

    #[test]
    fn test_missing_zone() {
        let mut context = context();
        context.hosted_zones.clear();
        assert!(matches!(
            build(&inputs(), &Config::default(), &context),
            Err(Error::HostedZoneNotFound(_))
        ));
    }
}
