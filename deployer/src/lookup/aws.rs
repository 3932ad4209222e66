//! Resolve lookups against AWS (SSM, EC2 and Route 53).

use super::{Context, HostedZoneEntry, NetworkEntry};
use crate::{
    naming::{normalize_zone, vpc_parameter},
    Error,
};
use aws_config::{retry::RetryConfig, BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::{types::Filter, Client as Ec2Client};
use aws_sdk_route53::Client as Route53Client;
use aws_sdk_ssm::Client as SsmClient;
use std::time::Duration;
use tracing::{debug, info};

/// Tag written by CDK-built networks to mark a subnet's role
pub const SUBNET_TYPE_TAG: &str = "aws-cdk:subnet-type";

/// Prefix Route 53 puts in front of hosted zone ids
const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

/// Role of a subnet in its network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubnetKind {
    /// Routes to an internet gateway
    Public,
    /// Routes out through a NAT
    Private,
    /// No route out of the network
    Isolated,
}

/// Classifies a subnet from its `aws-cdk:subnet-type` tag, falling back to whether it assigns
/// public addresses on launch.
pub fn classify(subnet_type: Option<&str>, map_public_ip_on_launch: bool) -> SubnetKind {
    match subnet_type {
        Some("Public") => SubnetKind::Public,
        Some("Isolated") => SubnetKind::Isolated,
        Some(_) => SubnetKind::Private,
        None if map_public_ip_on_launch => SubnetKind::Public,
        None => SubnetKind::Private,
    }
}

async fn load_config(region: Region) -> SdkConfig {
    let retry = RetryConfig::adaptive()
        .with_max_attempts(10)
        .with_initial_backoff(Duration::from_millis(500))
        .with_max_backoff(Duration::from_secs(30));
    aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .retry_config(retry)
        .load()
        .await
}

/// Reads a string parameter from SSM Parameter Store.
pub async fn get_parameter(client: &SsmClient, name: &str) -> Result<String, Error> {
    let output = client
        .get_parameter()
        .name(name)
        .send()
        .await
        .map_err(|e| {
            let e = e.into_service_error();
            if e.is_parameter_not_found() {
                Error::ParameterNotFound(name.to_string())
            } else {
                Error::AwsSsm {
                    operation: "GetParameter",
                    source: Box::new(aws_sdk_ssm::Error::from(e)),
                }
            }
        })?;
    output
        .parameter()
        .and_then(|p| p.value())
        .map(str::to_string)
        .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
}

/// Lists the private and public subnets of a network, ordered by availability zone.
pub async fn describe_network(client: &Ec2Client, vpc_id: &str) -> Result<NetworkEntry, Error> {
    let mut private = Vec::new();
    let mut public = Vec::new();
    let mut pages = client
        .describe_subnets()
        .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
        .into_paginator()
        .send();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| Error::AwsEc2 {
            operation: "DescribeSubnets",
            source: Box::new(aws_sdk_ec2::Error::from(e.into_service_error())),
        })?;
        for subnet in page.subnets() {
            let Some(id) = subnet.subnet_id() else {
                continue;
            };
            let subnet_type = subnet
                .tags()
                .iter()
                .find(|t| t.key() == Some(SUBNET_TYPE_TAG))
                .and_then(|t| t.value());
            let kind = classify(
                subnet_type,
                subnet.map_public_ip_on_launch().unwrap_or(false),
            );
            let az = subnet.availability_zone().unwrap_or_default().to_string();
            debug!(subnet = id, az = az.as_str(), ?kind, "found subnet");
            match kind {
                SubnetKind::Public => public.push((az, id.to_string())),
                SubnetKind::Private => private.push((az, id.to_string())),
                SubnetKind::Isolated => {}
            }
        }
    }
    if private.is_empty() && public.is_empty() {
        return Err(Error::NetworkNotFound(vpc_id.to_string()));
    }
    private.sort();
    public.sort();
    Ok(NetworkEntry {
        private_subnets: private.into_iter().map(|(_, id)| id).collect(),
        public_subnets: public.into_iter().map(|(_, id)| id).collect(),
    })
}

/// Finds the public hosted zone serving `domain`.
pub async fn find_hosted_zone(
    client: &Route53Client,
    domain: &str,
) -> Result<HostedZoneEntry, Error> {
    let domain = normalize_zone(domain);
    let output = client
        .list_hosted_zones_by_name()
        .dns_name(domain)
        .send()
        .await
        .map_err(|e| Error::AwsRoute53 {
            operation: "ListHostedZonesByName",
            source: Box::new(aws_sdk_route53::Error::from(e.into_service_error())),
        })?;
    let wanted = format!("{domain}.");
    let zone = output
        .hosted_zones()
        .iter()
        .filter(|z| !z.config().map(|c| c.private_zone()).unwrap_or(false))
        .find(|z| z.name() == wanted)
        .ok_or_else(|| Error::HostedZoneNotFound(domain.to_string()))?;
    Ok(HostedZoneEntry {
        id: zone.id().trim_start_matches(HOSTED_ZONE_PREFIX).to_string(),
        name: domain.to_string(),
    })
}

/// Resolves every lookup needed to synthesize the stack of `tenant`.
pub async fn resolve(region: &str, tenant: &str, zone: &str) -> Result<Context, Error> {
    let config = load_config(Region::new(region.to_string())).await;
    let ssm = SsmClient::new(&config);
    let ec2 = Ec2Client::new(&config);
    let route53 = Route53Client::new(&config);
    info!(region, tenant, zone, "resolving lookups");

    // The network id and the hosted zone are independent
    let name = vpc_parameter(tenant);
    let (vpc_id, hosted_zone) = tokio::try_join!(
        get_parameter(&ssm, &name),
        find_hosted_zone(&route53, zone)
    )?;
    info!(vpc = vpc_id.as_str(), "resolved network id");
    info!(
        zone = hosted_zone.name.as_str(),
        id = hosted_zone.id.as_str(),
        "resolved hosted zone"
    );

    let network = describe_network(&ec2, &vpc_id).await?;
    info!(
        vpc = vpc_id.as_str(),
        private = network.private_subnets.len(),
        public = network.public_subnets.len(),
        "resolved subnets"
    );

    let mut context = Context::default()
        .with_parameter(&name, &vpc_id)
        .with_network(&vpc_id, network);
    context
        .hosted_zones
        .insert(hosted_zone.name.clone(), hosted_zone);
    Ok(context)
}
