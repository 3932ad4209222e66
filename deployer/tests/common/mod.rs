use appproxy_deployer::{
    context::Inputs,
    lookup::{Context, NetworkEntry},
};
use std::collections::HashMap;

pub const VPC_ID: &str = "vpc-0123";
pub const ZONE_ID: &str = "Z123";

/// Inputs read from `pairs` on top of the variables every run needs.
pub fn inputs(pairs: &[(&str, &str)]) -> Inputs {
    let mut vars: HashMap<String, String> = [
        ("TENANT", "Abc"),
        ("PRODUCT", "DbxAppProxy"),
        ("ENVIRONMENT", "Dev"),
        ("WORKSPACE_URI", "https://ws"),
        ("APP_URI", "https://app"),
        ("HOSTNAME_PREFIX", "proxy"),
        ("ZONE", "example.com"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in pairs {
        vars.insert(k.to_string(), v.to_string());
    }
    Inputs::from_vars(|key| vars.get(key).cloned()).unwrap()
}

/// A context resolving the network of `tenant` and the `example.com` zone.
pub fn context(tenant: &str) -> Context {
    Context::default()
        .with_parameter(&format!("/{tenant}/baseline/network/vpc-id"), VPC_ID)
        .with_network(
            VPC_ID,
            NetworkEntry {
                private_subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
                public_subnets: vec!["subnet-c".to_string(), "subnet-d".to_string()],
            },
        )
        .with_hosted_zone("example.com.", ZONE_ID)
}
