//! Values resolved before synthesis.
//!
//! The graph builder never calls AWS. It reads the network id, subnets and hosted zone through
//! [Lookup], which is usually backed by a [Context] persisted by the `lookup` subcommand. Keeping
//! the results on disk makes synthesis repeatable: the same context always yields the same
//! template.

use crate::{
    graph::resources::{HostedZoneRef, NetworkRef},
    naming::normalize_zone,
    Error,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, path::Path};
use tracing::debug;

cfg_if::cfg_if! {
    if #[cfg(feature = "aws")] {
        pub mod aws;
    }
}

/// Source of synthesis-time lookups.
pub trait Lookup {
    /// Reads a string parameter by name.
    fn parameter(&self, name: &str) -> Result<String, Error>;

    /// Resolves a network and its subnets by id.
    fn network(&self, vpc_id: &str) -> Result<NetworkRef, Error>;

    /// Resolves a hosted zone by domain name.
    fn hosted_zone(&self, domain: &str) -> Result<HostedZoneRef, Error>;
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkEntry {
    pub private_subnets: Vec<String>,
    pub public_subnets: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HostedZoneEntry {
    pub id: String,
    pub name: String,
}

/// Lookup results, keyed the way they are queried.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkEntry>,
    #[serde(default)]
    pub hosted_zones: BTreeMap<String, HostedZoneEntry>,
}

impl Context {
    /// Loads a context from a YAML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let context = serde_yaml::from_reader(file)?;
        debug!(path = ?path, "loaded lookup context");
        Ok(context)
    }

    /// Writes the context to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        debug!(path = ?path, "saved lookup context");
        Ok(())
    }

    /// Adds every entry of `other`, replacing entries with the same key.
    pub fn extend(&mut self, other: Context) {
        self.parameters.extend(other.parameters);
        self.networks.extend(other.networks);
        self.hosted_zones.extend(other.hosted_zones);
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_network(mut self, vpc_id: &str, network: NetworkEntry) -> Self {
        self.networks.insert(vpc_id.to_string(), network);
        self
    }

    pub fn with_hosted_zone(mut self, domain: &str, id: &str) -> Self {
        let domain = normalize_zone(domain).to_string();
        self.hosted_zones.insert(
            domain.clone(),
            HostedZoneEntry {
                id: id.to_string(),
                name: domain,
            },
        );
        self
    }
}

impl Lookup for Context {
    fn parameter(&self, name: &str) -> Result<String, Error> {
        self.parameters
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ParameterNotFound(name.to_string()))
    }

    fn network(&self, vpc_id: &str) -> Result<NetworkRef, Error> {
        let entry = self
            .networks
            .get(vpc_id)
            .ok_or_else(|| Error::NetworkNotFound(vpc_id.to_string()))?;
        if entry.private_subnets.is_empty() {
            return Err(Error::NoPrivateSubnets(vpc_id.to_string()));
        }
        if entry.public_subnets.is_empty() {
            return Err(Error::NoPublicSubnets(vpc_id.to_string()));
        }
        Ok(NetworkRef {
            vpc_id: vpc_id.to_string(),
            private_subnets: entry.private_subnets.clone(),
            public_subnets: entry.public_subnets.clone(),
        })
    }

    fn hosted_zone(&self, domain: &str) -> Result<HostedZoneRef, Error> {
        let domain = normalize_zone(domain);
        let entry = self
            .hosted_zones
            .get(domain)
            .ok_or_else(|| Error::HostedZoneNotFound(domain.to_string()))?;
        Ok(HostedZoneRef {
            zone_id: entry.id.clone(),
            zone_name: normalize_zone(&entry.name).to_string(),
        })
    }
}
