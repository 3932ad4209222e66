//! Inputs read from the process environment.

use crate::Error;
use std::fmt;

/// Region used when `CDK_DEFAULT_REGION` is not set
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Placeholder used for credentials that were not supplied
pub const UNSET: &str = "unset";

/// Identity of the deployment and the upstreams the proxy fronts.
///
/// Created once per synthesis run and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant: String,
    pub environment: String,
    pub product: String,
    pub workspace_uri: String,
    pub app_uri: String,
    pub hostname: String,
    pub zone: String,
}

/// Service principal used by the proxy to mint workspace tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Build provenance stamped into the proxy image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub date: String,
    pub commit: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            date: "19700101".to_string(),
            commit: "aaaaaaaa".to_string(),
        }
    }
}

/// Account and region the stack is deployed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub account: Option<String>,
    pub region: String,
}

/// Everything synthesis needs from outside the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inputs {
    pub tenant: TenantContext,
    pub credentials: Credentials,
    pub provenance: Provenance,
    pub target: Target,
}

impl Inputs {
    /// Reads inputs from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Reads inputs through `var`, applying the documented defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let required = |key: &'static str| var(key).ok_or(Error::MissingVariable(key));
        let tenant = TenantContext {
            tenant: or("TENANT", "Abc"),
            product: or("PRODUCT", "DbxAppProxy"),
            environment: or("ENVIRONMENT", "Dev"),
            workspace_uri: or("WORKSPACE_URI", "https://localhost"),
            app_uri: or("APP_URI", "https://localhost"),
            hostname: required("HOSTNAME_PREFIX")?,
            zone: required("ZONE")?,
        };
        let defaults = Provenance::default();
        Ok(Self {
            tenant,
            credentials: Credentials {
                client_id: or("SERVICE_PRINCIPLE_CLIENT_ID", UNSET),
                client_secret: or("SERVICE_PRINCIPLE_CLIENT_SECRET", UNSET),
            },
            provenance: Provenance {
                date: or("DATE", &defaults.date),
                commit: or("COMMIT", &defaults.commit),
            },
            target: Target {
                account: var("CDK_DEFAULT_ACCOUNT"),
                region: or("CDK_DEFAULT_REGION", DEFAULT_REGION),
            },
        })
    }
}
