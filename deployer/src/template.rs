//! Render a [Stack] as an AWS CloudFormation template.
//!
//! Imported nodes (the network and the hosted zone) are resolved at synthesis time, so they are
//! not emitted as resources: references to them render as the literal ids they were resolved to
//! and explicit dependencies on them are dropped.

use crate::{
    graph::{
        policy::{PolicyDocument, PolicyResource},
        resources::{
            AliasRecordSpec, AliasTarget, CertificateSpec, CertificateValidation, CidrIngress,
            ContainerSpec, IngressRuleSpec, ListenerAction, ListenerSpec, LoadBalancerSpec,
            RemovalPolicy, Resource, ResourceKind, RoleSpec, SecretSpec, SecurityGroupSpec,
            ServiceSpec, TargetGroupSpec, TaskDefinitionSpec,
        },
        LogicalId, Node, OutputValue, ResourceGraph,
    },
    stack::Stack,
    Error,
};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Version of the template format
pub const FORMAT_VERSION: &str = "2010-09-09";

/// Version of the IAM policy language
pub const POLICY_VERSION: &str = "2012-10-17";

/// Renders `stack` as a CloudFormation template.
pub fn render(stack: &Stack) -> Result<Value, Error> {
    let renderer = Renderer {
        graph: &stack.graph,
    };
    let mut parameters = Map::new();
    let mut resources = Map::new();
    for id in &stack.order {
        let node = renderer.node(id)?;
        match &node.resource {
            Resource::Network(_) | Resource::HostedZone(_) => continue,
            Resource::Parameter(parameter) => {
                parameters.insert(
                    id.to_string(),
                    json!({
                        "Type": "String",
                        "NoEcho": parameter.no_echo,
                        "Default": parameter.default,
                    }),
                );
            }
            _ => {
                resources.insert(id.to_string(), renderer.resource(node)?);
            }
        }
    }

    let mut outputs = Map::new();
    for (name, output) in stack.graph.outputs() {
        let value = match &output.value {
            OutputValue::LoadBalancerDnsName(lb) => get_att(lb, "DNSName"),
        };
        outputs.insert(
            name.clone(),
            json!({ "Description": output.description, "Value": value }),
        );
    }
    debug!(
        stack = stack.id.as_str(),
        parameters = parameters.len(),
        resources = resources.len(),
        outputs = outputs.len(),
        "rendered template"
    );

    Ok(json!({
        "AWSTemplateFormatVersion": FORMAT_VERSION,
        "Description": format!("App Proxy service ({})", stack.id),
        "Parameters": parameters,
        "Resources": resources,
        "Outputs": outputs,
    }))
}

fn reference(id: &LogicalId) -> Value {
    json!({ "Ref": id.as_str() })
}

fn get_att(id: &LogicalId, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [id.as_str(), attribute] })
}

fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

fn cloudformation_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Network => "AWS::EC2::VPC",
        ResourceKind::HostedZone => "AWS::Route53::HostedZone",
        ResourceKind::Parameter => "AWS::CloudFormation::Parameter",
        ResourceKind::Secret => "AWS::SecretsManager::Secret",
        ResourceKind::Cluster => "AWS::ECS::Cluster",
        ResourceKind::Role => "AWS::IAM::Role",
        ResourceKind::Policy => "AWS::IAM::Policy",
        ResourceKind::LogGroup => "AWS::Logs::LogGroup",
        ResourceKind::TaskDefinition => "AWS::ECS::TaskDefinition",
        ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
        ResourceKind::IngressRule => "AWS::EC2::SecurityGroupIngress",
        ResourceKind::Certificate => "AWS::CertificateManager::Certificate",
        ResourceKind::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
        ResourceKind::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
        ResourceKind::Listener => "AWS::ElasticLoadBalancingV2::Listener",
        ResourceKind::Service => "AWS::ECS::Service",
        ResourceKind::AliasRecord => "AWS::Route53::RecordSet",
    }
}

/// Whether resources of `kind` accept a `Tags` property.
pub fn is_taggable(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Secret
            | ResourceKind::Cluster
            | ResourceKind::Role
            | ResourceKind::LogGroup
            | ResourceKind::TaskDefinition
            | ResourceKind::SecurityGroup
            | ResourceKind::Certificate
            | ResourceKind::LoadBalancer
            | ResourceKind::TargetGroup
            | ResourceKind::Service
    )
}

struct Renderer<'a> {
    graph: &'a ResourceGraph,
}

impl Renderer<'_> {
    fn node(&self, id: &LogicalId) -> Result<&Node, Error> {
        self.graph
            .get(id)
            .ok_or_else(|| Error::UnknownNode(id.clone()))
    }

    /// A reference to `id`, or the literal it was resolved to when `id` is imported.
    fn id_of(&self, id: &LogicalId) -> Result<Value, Error> {
        Ok(match &self.node(id)?.resource {
            Resource::Network(network) => json!(network.vpc_id),
            Resource::HostedZone(zone) => json!(zone.zone_id),
            _ => reference(id),
        })
    }

    fn arn_of(&self, id: &LogicalId) -> Result<Value, Error> {
        Ok(match self.node(id)?.kind() {
            // Ref of a secret or a listener is already its ARN
            ResourceKind::Secret
            | ResourceKind::LoadBalancer
            | ResourceKind::TargetGroup
            | ResourceKind::Listener
            | ResourceKind::Certificate => reference(id),
            _ => get_att(id, "Arn"),
        })
    }

    fn resource(&self, node: &Node) -> Result<Value, Error> {
        let kind = node.kind();
        let mut properties = match &node.resource {
            Resource::Network(_) | Resource::HostedZone(_) | Resource::Parameter(_) => {
                return Err(Error::UnexpectedKind(node.id.clone(), "stack resource"))
            }
            Resource::Secret(secret) => self.secret(secret),
            Resource::Cluster(_) => Map::new(),
            Resource::Role(role) => self.role(role),
            Resource::Policy(policy) => {
                let mut properties = Map::new();
                properties.insert("PolicyName".into(), json!(node.id.as_str()));
                properties.insert(
                    "PolicyDocument".into(),
                    self.policy_document(&policy.document)?,
                );
                properties.insert("Roles".into(), json!([reference(&policy.role)]));
                properties
            }
            Resource::LogGroup(group) => {
                let mut properties = Map::new();
                properties.insert("LogGroupName".into(), json!(group.name));
                properties.insert("RetentionInDays".into(), json!(group.retention_days));
                properties
            }
            Resource::TaskDefinition(task) => self.task_definition(&node.id, task)?,
            Resource::SecurityGroup(group) => self.security_group(group)?,
            Resource::IngressRule(rule) => self.ingress_rule(rule),
            Resource::Certificate(certificate) => self.certificate(certificate)?,
            Resource::LoadBalancer(lb) => self.load_balancer(lb),
            Resource::TargetGroup(group) => self.target_group(group)?,
            Resource::Listener(listener) => self.listener(listener)?,
            Resource::Service(service) => self.service(service),
            Resource::AliasRecord(record) => self.alias_record(record)?,
        };
        if is_taggable(kind) && !node.tags.is_empty() {
            let tags: Vec<Value> = node
                .tags
                .iter()
                .map(|(key, value)| json!({ "Key": key, "Value": value }))
                .collect();
            properties.insert("Tags".into(), json!(tags));
        }

        let mut resource = Map::new();
        resource.insert("Type".into(), json!(cloudformation_type(kind)));
        resource.insert("Properties".into(), Value::Object(properties));

        // Dependencies on imported nodes are satisfied before synthesis
        let mut depends_on = Vec::new();
        for to in &node.depends_on {
            if !self.node(to)?.resource.is_imported() {
                depends_on.push(json!(to.as_str()));
            }
        }
        if !depends_on.is_empty() {
            resource.insert("DependsOn".into(), json!(depends_on));
        }

        let removal = match &node.resource {
            Resource::Secret(secret) => Some(secret.removal),
            Resource::LogGroup(group) => Some(group.removal),
            _ => None,
        };
        if let Some(removal) = removal {
            let policy = match removal {
                RemovalPolicy::Destroy => "Delete",
            };
            resource.insert("DeletionPolicy".into(), json!(policy));
            resource.insert("UpdateReplacePolicy".into(), json!(policy));
        }
        Ok(Value::Object(resource))
    }

    fn secret(&self, secret: &SecretSpec) -> Map<String, Value> {
        // {"field":"<value>",...} with each value taken from its parameter at deploy time
        let mut parts = Vec::new();
        let mut prefix = String::from("{");
        for (i, (field, parameter)) in secret.fields.iter().enumerate() {
            if i > 0 {
                prefix.push(',');
            }
            prefix.push_str(&format!("\"{field}\":\""));
            parts.push(json!(prefix));
            parts.push(reference(parameter));
            prefix = String::from("\"");
        }
        prefix.push('}');
        parts.push(json!(prefix));

        let mut properties = Map::new();
        properties.insert("Description".into(), json!(secret.description));
        properties.insert("SecretString".into(), join(parts));
        properties
    }

    fn role(&self, role: &RoleSpec) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert(
            "AssumeRolePolicyDocument".into(),
            json!({
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": role.service_principal },
                }],
            }),
        );
        properties
    }

    fn policy_document(&self, document: &PolicyDocument) -> Result<Value, Error> {
        let mut statements = Vec::new();
        for statement in &document.statements {
            let mut resources = Vec::new();
            for resource in &statement.resources {
                resources.push(match resource {
                    PolicyResource::Any => json!("*"),
                    PolicyResource::Arn(id) => self.arn_of(id)?,
                });
            }
            let resource = match resources.len() {
                1 => resources.remove(0),
                _ => json!(resources),
            };
            let action = match statement.actions.as_slice() {
                [action] => json!(action),
                actions => json!(actions),
            };
            statements.push(json!({
                "Action": action,
                "Effect": statement.effect.as_str(),
                "Resource": resource,
            }));
        }
        Ok(json!({ "Version": POLICY_VERSION, "Statement": statements }))
    }

    fn container(&self, container: &ContainerSpec) -> Value {
        let image = format!(
            "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}:{}",
            container.image.repository,
            container.image.tag()
        );
        let environment: Vec<Value> = container
            .environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();
        let secrets: Vec<Value> = container
            .secrets
            .iter()
            .map(|(name, secret)| {
                json!({
                    "Name": name,
                    "ValueFrom": join(vec![
                        reference(&secret.secret),
                        json!(format!(":{}::", secret.field)),
                    ]),
                })
            })
            .collect();
        let health = &container.health_check;
        let port = &container.port_mapping;
        json!({
            "Name": container.name,
            "Essential": true,
            "Image": { "Fn::Sub": image },
            "Environment": environment,
            "Secrets": secrets,
            "PortMappings": [{
                "ContainerPort": port.container_port,
                "HostPort": port.host_port,
                "Protocol": port.protocol.as_str(),
            }],
            "HealthCheck": {
                "Command": health.command,
                "Interval": health.interval.as_secs(),
                "Retries": health.retries,
                "StartPeriod": health.start_period.as_secs(),
                "Timeout": health.timeout.as_secs(),
            },
            "LinuxParameters": { "InitProcessEnabled": container.init_process_enabled },
            "LogConfiguration": {
                "LogDriver": "awslogs",
                "Options": {
                    "awslogs-group": reference(&container.logging.group),
                    "awslogs-stream-prefix": container.logging.stream_prefix,
                    "awslogs-region": { "Ref": "AWS::Region" },
                },
            },
        })
    }

    fn task_definition(
        &self,
        id: &LogicalId,
        task: &TaskDefinitionSpec,
    ) -> Result<Map<String, Value>, Error> {
        let containers: Vec<Value> = task.containers.iter().map(|c| self.container(c)).collect();
        let mut properties = Map::new();
        properties.insert("Family".into(), json!(id.as_str()));
        properties.insert("ContainerDefinitions".into(), json!(containers));
        properties.insert("Cpu".into(), json!(task.cpu.to_string()));
        properties.insert("Memory".into(), json!(task.memory.to_string()));
        properties.insert("NetworkMode".into(), json!("awsvpc"));
        properties.insert("RequiresCompatibilities".into(), json!(["FARGATE"]));
        properties.insert(
            "RuntimePlatform".into(),
            json!({
                "CpuArchitecture": task.architecture.as_str(),
                "OperatingSystemFamily": "LINUX",
            }),
        );
        properties.insert(
            "ExecutionRoleArn".into(),
            self.arn_of(&task.execution_role)?,
        );
        properties.insert("TaskRoleArn".into(), self.arn_of(&task.task_role)?);
        Ok(properties)
    }

    fn security_group(&self, group: &SecurityGroupSpec) -> Result<Map<String, Value>, Error> {
        let mut egress = Vec::new();
        if group.allow_all_outbound {
            egress.push(json!({
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1",
            }));
        }
        if group.allow_all_ipv6_outbound {
            egress.push(json!({
                "CidrIpv6": "::/0",
                "Description": "Allow all outbound ipv6 traffic by default",
                "IpProtocol": "-1",
            }));
        }
        if egress.is_empty() {
            // An empty egress list would allow everything
            egress.push(json!({
                "CidrIp": "255.255.255.255/32",
                "Description": "Disallow all traffic",
                "FromPort": 252,
                "IpProtocol": "icmp",
                "ToPort": 86,
            }));
        }
        let ingress: Vec<Value> = group
            .ingress
            .iter()
            .map(|CidrIngress { cidr, port }| {
                json!({
                    "CidrIp": cidr,
                    "Description": format!("Allow from {cidr}:{port}"),
                    "FromPort": port,
                    "IpProtocol": "tcp",
                    "ToPort": port,
                })
            })
            .collect();

        let mut properties = Map::new();
        properties.insert("GroupDescription".into(), json!(group.description));
        properties.insert("VpcId".into(), self.id_of(&group.network)?);
        properties.insert("SecurityGroupEgress".into(), json!(egress));
        if !ingress.is_empty() {
            properties.insert("SecurityGroupIngress".into(), json!(ingress));
        }
        Ok(properties)
    }

    fn ingress_rule(&self, rule: &IngressRuleSpec) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("GroupId".into(), get_att(&rule.group, "GroupId"));
        properties.insert(
            "SourceSecurityGroupId".into(),
            get_att(&rule.source, "GroupId"),
        );
        properties.insert("IpProtocol".into(), json!("tcp"));
        properties.insert("FromPort".into(), json!(rule.port));
        properties.insert("ToPort".into(), json!(rule.port));
        properties.insert("Description".into(), json!(rule.description));
        properties
    }

    fn certificate(&self, certificate: &CertificateSpec) -> Result<Map<String, Value>, Error> {
        let mut properties = Map::new();
        properties.insert("DomainName".into(), json!(certificate.domain_name));
        match &certificate.validation {
            CertificateValidation::Dns { zone } => {
                properties.insert("ValidationMethod".into(), json!("DNS"));
                properties.insert(
                    "DomainValidationOptions".into(),
                    json!([{
                        "DomainName": certificate.domain_name,
                        "HostedZoneId": self.id_of(zone)?,
                    }]),
                );
            }
        }
        Ok(properties)
    }

    fn load_balancer(&self, lb: &LoadBalancerSpec) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("Name".into(), json!(lb.name));
        properties.insert("Type".into(), json!("application"));
        properties.insert("Scheme".into(), json!("internet-facing"));
        properties.insert("Subnets".into(), json!(lb.subnets));
        properties.insert(
            "SecurityGroups".into(),
            json!([get_att(&lb.security_group, "GroupId")]),
        );
        properties.insert(
            "LoadBalancerAttributes".into(),
            json!([{ "Key": "deletion_protection.enabled", "Value": "false" }]),
        );
        properties
    }

    fn target_group(&self, group: &TargetGroupSpec) -> Result<Map<String, Value>, Error> {
        let attributes: Vec<Value> = group
            .attributes
            .iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect();
        let health = &group.health_check;
        let mut properties = Map::new();
        properties.insert("Port".into(), json!(group.port));
        properties.insert("Protocol".into(), json!("HTTP"));
        properties.insert("TargetType".into(), json!("ip"));
        properties.insert("VpcId".into(), self.id_of(&group.network)?);
        properties.insert("HealthCheckPath".into(), json!(health.path));
        properties.insert(
            "HealthCheckIntervalSeconds".into(),
            json!(health.interval.as_secs()),
        );
        properties.insert(
            "HealthyThresholdCount".into(),
            json!(health.healthy_threshold),
        );
        properties.insert(
            "UnhealthyThresholdCount".into(),
            json!(health.unhealthy_threshold),
        );
        if !attributes.is_empty() {
            properties.insert("TargetGroupAttributes".into(), json!(attributes));
        }
        Ok(properties)
    }

    fn listener(&self, listener: &ListenerSpec) -> Result<Map<String, Value>, Error> {
        let action = match &listener.action {
            ListenerAction::Forward { target_group } => json!({
                "Type": "forward",
                "TargetGroupArn": self.arn_of(target_group)?,
            }),
            ListenerAction::Redirect { protocol, port } => json!({
                "Type": "redirect",
                "RedirectConfig": {
                    "Protocol": protocol.as_str(),
                    "Port": port.to_string(),
                    "StatusCode": "HTTP_301",
                },
            }),
        };
        let mut properties = Map::new();
        properties.insert(
            "LoadBalancerArn".into(),
            self.arn_of(&listener.load_balancer)?,
        );
        properties.insert("Port".into(), json!(listener.port));
        properties.insert("Protocol".into(), json!(listener.protocol.as_str()));
        if let Some(certificate) = &listener.certificate {
            properties.insert(
                "Certificates".into(),
                json!([{ "CertificateArn": self.arn_of(certificate.id())? }]),
            );
        }
        if let Some(policy) = listener.ssl_policy {
            properties.insert("SslPolicy".into(), json!(policy.as_str()));
        }
        properties.insert("DefaultActions".into(), json!([action]));
        Ok(properties)
    }

    fn service(&self, service: &ServiceSpec) -> Map<String, Value> {
        let strategies: Vec<Value> = service
            .capacity_provider_strategies
            .iter()
            .map(|s| json!({ "CapacityProvider": s.capacity_provider, "Weight": s.weight }))
            .collect();
        let mut deployment = json!({ "MaximumPercent": 200, "MinimumHealthyPercent": 50 });
        if let Some(breaker) = service.circuit_breaker {
            deployment["DeploymentCircuitBreaker"] =
                json!({ "Enable": true, "Rollback": breaker.rollback });
        }
        let targets: Vec<Value> = service
            .targets
            .iter()
            .map(|t| {
                json!({
                    "ContainerName": t.container_name,
                    "ContainerPort": t.container_port,
                    "TargetGroupArn": reference(&t.target_group),
                })
            })
            .collect();
        let security_groups: Vec<Value> = service
            .security_groups
            .iter()
            .map(|g| get_att(g, "GroupId"))
            .collect();
        let assign_public_ip = if service.assign_public_ip {
            "ENABLED"
        } else {
            "DISABLED"
        };

        let mut properties = Map::new();
        properties.insert("Cluster".into(), reference(&service.cluster));
        properties.insert("TaskDefinition".into(), reference(&service.task_definition));
        properties.insert("DesiredCount".into(), json!(service.desired_count));
        if !strategies.is_empty() {
            properties.insert("CapacityProviderStrategy".into(), json!(strategies));
        }
        properties.insert("DeploymentConfiguration".into(), deployment);
        properties.insert(
            "EnableExecuteCommand".into(),
            json!(service.enable_execute_command()),
        );
        if let Some(grace) = service.health_check_grace_period {
            properties.insert(
                "HealthCheckGracePeriodSeconds".into(),
                json!(grace.as_secs()),
            );
        }
        properties.insert("LoadBalancers".into(), json!(targets));
        properties.insert(
            "NetworkConfiguration".into(),
            json!({
                "AwsvpcConfiguration": {
                    "AssignPublicIp": assign_public_ip,
                    "SecurityGroups": security_groups,
                    "Subnets": service.subnets,
                },
            }),
        );
        properties
    }

    fn alias_record(&self, record: &AliasRecordSpec) -> Result<Map<String, Value>, Error> {
        let target = match &record.target {
            AliasTarget::LoadBalancer(lb) => json!({
                "DNSName": join(vec![json!("dualstack."), get_att(lb, "DNSName")]),
                "HostedZoneId": get_att(lb, "CanonicalHostedZoneID"),
            }),
        };
        let mut properties = Map::new();
        properties.insert("Name".into(), json!(format!("{}.", record.record_name)));
        properties.insert("Type".into(), json!(record.record_type.as_str()));
        properties.insert("HostedZoneId".into(), self.id_of(&record.zone)?);
        properties.insert("AliasTarget".into(), target);
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        context::{Credentials, Inputs, Provenance, Target, TenantContext},
        lookup::{Context, NetworkEntry},
        stack::compose,
    };

    fn stack() -> Stack {
        let inputs = Inputs {
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
                client_secret: "hunter2".to_string(),
            },
            provenance: Provenance::default(),
            target: Target {
                account: None,
                region: "eu-west-1".to_string(),
            },
        };
        let context = Context::default()
            .with_parameter("/Abc/baseline/network/vpc-id", "vpc-1")
            .with_network(
                "vpc-1",
                NetworkEntry {
                    private_subnets: vec!["subnet-a".to_string()],
                    public_subnets: vec!["subnet-b".to_string()],
                },
            )
            .with_hosted_zone("example.com", "Z1");
        compose(&inputs, &Config::default(), &context).unwrap()
    }

    #[test]
    fn test_imported_nodes_are_literals() {
        let template = render(&stack()).unwrap();
        let resources = template["Resources"].as_object().unwrap();
        assert!(!resources.contains_key("ImportVPC"));
        assert!(!resources.contains_key("Zone"));
        assert_eq!(
            template["Resources"]["SecurityGroup"]["Properties"]["VpcId"],
            json!("vpc-1")
        );
        assert_eq!(
            template["Resources"]["ProxyAliasRecordA"]["Properties"]["HostedZoneId"],
            json!("Z1")
        );

        // The security group's explicit dependency is on the network, which is never rendered
        assert!(template["Resources"]["SecurityGroup"]
            .get("DependsOn")
            .is_none());
        assert_eq!(
            template["Resources"]["Service"]["DependsOn"],
            json!(["ServiceLBPublicListener", "ServiceLBPublicRedirectListener"])
        );
    }

    #[test]
    fn test_tags() {
        let template = render(&stack()).unwrap();
        for (id, resource) in template["Resources"].as_object().unwrap() {
            let tags = &resource["Properties"]["Tags"];
            match resource["Type"].as_str().unwrap() {
                "AWS::IAM::Policy"
                | "AWS::EC2::SecurityGroupIngress"
                | "AWS::ElasticLoadBalancingV2::Listener"
                | "AWS::Route53::RecordSet" => assert!(tags.is_null(), "{id} is tagged"),
                _ => assert_eq!(
                    tags,
                    &json!([
                        { "Key": "environment", "Value": "Dev" },
                        { "Key": "product", "Value": "DbxAppProxy" },
                        { "Key": "tenant", "Value": "Abc" },
                    ]),
                    "{id} is missing tags"
                ),
            }
        }
    }

    #[test]
    fn test_credentials_only_in_parameter_defaults() {
        let mut template = render(&stack()).unwrap();
        let secret = serde_json::to_string(&template["Resources"]["CredsSecret"]).unwrap();
        assert!(secret.contains(r#"{"Ref":"clientSecret"}"#));
        assert_eq!(
            template["Parameters"]["clientSecret"],
            json!({ "Type": "String", "NoEcho": true, "Default": "hunter2" })
        );

        // Nothing outside the parameter defaults carries the value
        let parameters = template
            .as_object_mut()
            .unwrap()
            .remove("Parameters")
            .unwrap();
        assert_eq!(
            serde_json::to_string(&parameters)
                .unwrap()
                .matches("hunter2")
                .count(),
            1
        );
        assert!(!serde_json::to_string(&template).unwrap().contains("hunter2"));
        assert_eq!(
            template["Resources"]["CredsSecret"]["DeletionPolicy"],
            json!("Delete")
        );
    }

    #[test]
    fn test_service() {
        let template = render(&stack()).unwrap();
        let service = &template["Resources"]["Service"]["Properties"];
        assert_eq!(service["EnableExecuteCommand"], json!(true));
        assert_eq!(
            service["DeploymentConfiguration"]["DeploymentCircuitBreaker"],
            json!({ "Enable": true, "Rollback": true })
        );
        assert_eq!(
            service["NetworkConfiguration"]["AwsvpcConfiguration"]["AssignPublicIp"],
            json!("DISABLED")
        );
        assert_eq!(
            template["Outputs"]["ProxyURI"]["Value"],
            json!({ "Fn::GetAtt": ["ServiceLB", "DNSName"] })
        );
    }

    #[test]
    fn test_container_secrets() {
        let template = render(&stack()).unwrap();
        let container =
            &template["Resources"]["TaskDef"]["Properties"]["ContainerDefinitions"][0];
        assert_eq!(
            container["Secrets"][0],
            json!({
                "Name": "DATABRICKS_CLIENT_ID",
                "ValueFrom": { "Fn::Join": ["", [{ "Ref": "CredsSecret" }, ":client_id::"]] },
            })
        );
        assert_eq!(container["PortMappings"][0]["ContainerPort"], json!(8080));
    }
}
