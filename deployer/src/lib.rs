//! Synthesize the App Proxy service topology for CloudFormation.
//!
//! The App Proxy is a TLS-terminating reverse proxy (running as a Fargate task behind an
//! internet-facing application load balancer) that fronts a Databricks workspace API. This
//! crate builds the complete resource graph for one tenant/product/environment and renders it
//! as a CloudFormation template. It never talks to CloudFormation itself: creating, updating and
//! rolling back the live resources is left to the provisioning engine.
//!
//! # Flow
//!
//! 1. [context::Inputs] is read from the process environment.
//! 2. Synthesis-time lookups (network id, subnets, hosted zone) are resolved through a
//!    [lookup::Lookup] (usually a [lookup::Context] persisted by the `lookup` subcommand).
//! 3. [stack::compose] derives the stack identifier, builds the graph with [proxy::build],
//!    tags every node and validates the result.
//! 4. [template::render] emits the CloudFormation template.
//!
//! # Usage
//!
//! ```sh
//! export TENANT=Abc PRODUCT=DbxAppProxy ENVIRONMENT=Dev
//! export HOSTNAME_PREFIX=proxy ZONE=example.com
//! deployer lookup --context context.yaml
//! deployer synth --context context.yaml --output synth.out
//! ```

pub mod config;
pub mod context;
mod error;
pub use error::Error;
pub mod graph;
pub mod lookup;
pub mod naming;
pub mod pattern;
pub mod proxy;
pub mod stack;
pub mod template;

cfg_if::cfg_if! {
    if #[cfg(feature = "aws")] {
        pub use lookup::aws::resolve;
    }
}

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
