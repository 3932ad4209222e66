//! A Fargate service behind an internet-facing application load balancer.
//!
//! [LoadBalancedFargateService] expands into the load balancer, its security group, a target
//! group, an HTTPS listener with an HTTP redirect and the ECS service itself. Like any
//! higher-level builder it exposes only the knobs most services need; anything else has to be
//! applied through an [crate::graph::OverrideField] on the node it returns.

use crate::{
    graph::{
        resources::{
            ApplicationProtocol, CapacityProviderStrategy, CidrIngress, CircuitBreaker,
            IngressRuleSpec, ListenerAction, ListenerSpec, LoadBalancerSpec, Resource,
            SecurityGroupSpec, ServiceSpec, SslPolicy, TargetBinding, TargetGroupSpec,
            TargetHealthCheck, ValidatedCertificate,
        },
        LogicalId, ResourceGraph,
    },
    Error,
};
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

/// Capacity provider running tasks on on-demand Fargate
pub const FARGATE: &str = "FARGATE";

/// Grace period before load balancer health checks count against a new task
pub const HEALTH_CHECK_GRACE_PERIOD: Duration = Duration::from_secs(60);

/// Options of a load-balanced Fargate service.
#[derive(Clone, Debug)]
pub struct LoadBalancedFargateService {
    pub cluster: LogicalId,
    pub task_definition: LogicalId,
    pub network: LogicalId,
    pub desired_count: u32,
    pub security_groups: Vec<LogicalId>,
    pub capacity_provider_strategies: Vec<CapacityProviderStrategy>,
    pub circuit_breaker: Option<CircuitBreaker>,
    pub certificate: ValidatedCertificate,
    pub ssl_policy: SslPolicy,
    pub task_subnets: Vec<String>,
    pub load_balancer_subnets: Vec<String>,
    pub load_balancer_name: String,
}

/// Nodes created for a load-balanced service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadBalancedService {
    pub service: LogicalId,
    pub load_balancer: LogicalId,
    pub load_balancer_security_group: LogicalId,
    pub target_group: LogicalId,
    pub listener: LogicalId,
    pub redirect_listener: LogicalId,
}

impl LoadBalancedFargateService {
    /// Adds the service to `graph`, naming every node after `id`.
    pub fn build(self, graph: &mut ResourceGraph, id: &str) -> Result<LoadBalancedService, Error> {
        // Route traffic to the first container of the task
        let (container_name, container_port) = {
            let task = graph.task_definition(&self.task_definition)?;
            let container = task
                .containers
                .first()
                .ok_or_else(|| Error::MissingContainer(self.task_definition.clone()))?;
            (
                container.name.clone(),
                container.port_mapping.container_port,
            )
        };

        // Load balancer and the group admitting public traffic
        let https = ApplicationProtocol::Https.default_port();
        let http = ApplicationProtocol::Http.default_port();
        let ingress = [https, http]
            .into_iter()
            .map(|port| CidrIngress {
                cidr: "0.0.0.0/0".to_string(),
                port,
            })
            .collect();
        let load_balancer_security_group = graph.add(
            &format!("{id}LBSecurityGroup"),
            Resource::SecurityGroup(SecurityGroupSpec {
                network: self.network.clone(),
                description: format!("Security group for load balancer {}", self.load_balancer_name),
                allow_all_outbound: true,
                allow_all_ipv6_outbound: true,
                ingress,
            }),
        )?;
        let load_balancer = graph.add(
            &format!("{id}LB"),
            Resource::LoadBalancer(LoadBalancerSpec {
                name: self.load_balancer_name.clone(),
                network: self.network.clone(),
                subnets: self.load_balancer_subnets,
                security_group: load_balancer_security_group.clone(),
            }),
        )?;
        let target_group = graph.add(
            &format!("{id}LBTargetGroup"),
            Resource::TargetGroup(TargetGroupSpec {
                network: self.network.clone(),
                port: container_port,
                health_check: TargetHealthCheck::default(),
                attributes: BTreeMap::new(),
            }),
        )?;

        // Listeners
        let listener = graph.add(
            &format!("{id}LBPublicListener"),
            Resource::Listener(ListenerSpec {
                load_balancer: load_balancer.clone(),
                port: https,
                protocol: ApplicationProtocol::Https,
                certificate: Some(self.certificate),
                ssl_policy: Some(self.ssl_policy),
                action: ListenerAction::Forward {
                    target_group: target_group.clone(),
                },
            }),
        )?;
        let redirect_listener = graph.add(
            &format!("{id}LBPublicRedirectListener"),
            Resource::Listener(ListenerSpec {
                load_balancer: load_balancer.clone(),
                port: http,
                protocol: ApplicationProtocol::Http,
                certificate: None,
                ssl_policy: None,
                action: ListenerAction::Redirect {
                    protocol: ApplicationProtocol::Https,
                    port: https,
                },
            }),
        )?;

        // Tasks only accept traffic from the load balancer
        for group in &self.security_groups {
            graph.add(
                &format!("{group}From{load_balancer_security_group}{container_port}"),
                Resource::IngressRule(IngressRuleSpec {
                    group: group.clone(),
                    source: load_balancer_security_group.clone(),
                    port: container_port,
                    description: format!("Load balancer to container port {container_port}"),
                }),
            )?;
        }

        // The service registers targets, so the listeners must be attached first
        let service = graph.add(
            id,
            Resource::Service(ServiceSpec {
                cluster: self.cluster,
                task_definition: self.task_definition,
                desired_count: self.desired_count,
                subnets: self.task_subnets,
                assign_public_ip: false,
                security_groups: self.security_groups,
                capacity_provider_strategies: self.capacity_provider_strategies,
                circuit_breaker: self.circuit_breaker,
                health_check_grace_period: Some(HEALTH_CHECK_GRACE_PERIOD),
                targets: vec![TargetBinding {
                    container_name,
                    container_port,
                    target_group: target_group.clone(),
                }],
                enable_execute_command: false,
            }),
        )?;
        graph.add_dependency(&service, &listener)?;
        graph.add_dependency(&service, &redirect_listener)?;
        debug!(
            service = service.as_str(),
            load_balancer = load_balancer.as_str(),
            "built load-balanced service"
        );

        Ok(LoadBalancedService {
            service,
            load_balancer,
            load_balancer_security_group,
            target_group,
            listener,
            redirect_listener,
        })
    }
}
