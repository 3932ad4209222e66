//! Compose the App Proxy stack for one tenant/product/environment.

use crate::{
    config::Config,
    context::{Inputs, Target},
    graph::{
        resources::{Resource, ResourceKind},
        LogicalId, Output, ResourceGraph,
    },
    lookup::Lookup,
    naming::stack_id,
    proxy::{self, ENDPOINT_OUTPUT},
    Error,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Tag identifying the tenant owning a resource
pub const TENANT_TAG: &str = "tenant";

/// Tag identifying the deployment environment of a resource
pub const ENVIRONMENT_TAG: &str = "environment";

/// Tag identifying the product a resource belongs to
pub const PRODUCT_TAG: &str = "product";

/// A validated stack, ready to render.
#[derive(Clone, Debug)]
pub struct Stack {
    pub id: String,
    pub target: Target,
    pub tags: BTreeMap<String, String>,
    pub graph: ResourceGraph,
    /// The published load balancer endpoint
    pub output: Output,
    /// Nodes in creation order
    pub order: Vec<LogicalId>,
}

/// Summary of a synthesized stack, written next to the template.
#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    pub stack: String,
    pub account: Option<String>,
    pub region: String,
    pub tags: BTreeMap<String, String>,
    pub resources: usize,
    pub template: String,
    /// Images the template expects to find in their repositories, keyed by container
    pub images: BTreeMap<String, ImageManifest>,
}

/// Inputs an external build step needs to produce an image referenced by the template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageManifest {
    pub directory: String,
    pub repository: String,
    pub tag: String,
    pub build_args: BTreeMap<String, String>,
}

impl Stack {
    /// File name of the rendered template.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.id)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            stack: self.id.clone(),
            account: self.target.account.clone(),
            region: self.target.region.clone(),
            tags: self.tags.clone(),
            resources: self
                .graph
                .nodes()
                .filter(|n| !n.resource.is_imported() && n.kind() != ResourceKind::Parameter)
                .count(),
            template: self.template_file(),
            images: self.images(),
        }
    }

    fn images(&self) -> BTreeMap<String, ImageManifest> {
        let mut images = BTreeMap::new();
        for node in self.graph.of_kind(ResourceKind::TaskDefinition) {
            let Resource::TaskDefinition(task) = &node.resource else {
                continue;
            };
            for container in &task.containers {
                let image = &container.image;
                images.insert(
                    container.name.clone(),
                    ImageManifest {
                        directory: image.directory.clone(),
                        repository: image.repository.clone(),
                        tag: image.tag(),
                        build_args: image.build_args.clone(),
                    },
                );
            }
        }
        images
    }
}

/// Builds, tags and validates the stack described by `inputs`.
pub fn compose(inputs: &Inputs, config: &Config, lookup: &impl Lookup) -> Result<Stack, Error> {
    config.validate()?;
    let tenant = &inputs.tenant;
    let id = stack_id(&tenant.tenant, &tenant.product, &tenant.environment);
    info!(
        stack = id.as_str(),
        account = ?inputs.target.account,
        region = inputs.target.region.as_str(),
        "composing stack"
    );

    let mut graph = proxy::build(inputs, config, lookup)?;
    let tags = BTreeMap::from([
        (TENANT_TAG.to_string(), tenant.tenant.clone()),
        (ENVIRONMENT_TAG.to_string(), tenant.environment.clone()),
        (PRODUCT_TAG.to_string(), tenant.product.clone()),
    ]);
    for (key, value) in &tags {
        graph.tag(key, value);
    }

    let order = graph.validate()?;
    let output = graph
        .outputs()
        .get(ENDPOINT_OUTPUT)
        .cloned()
        .ok_or_else(|| Error::MissingOutput(ENDPOINT_OUTPUT))?;
    info!(
        stack = id.as_str(),
        resources = order.len(),
        overrides = graph.overrides().len(),
        "validated stack"
    );
    Ok(Stack {
        id,
        target: inputs.target.clone(),
        tags,
        graph,
        output,
        order,
    })
}
