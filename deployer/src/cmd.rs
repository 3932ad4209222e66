//! Subcommands of the deployer CLI.

use appproxy_deployer::{
    config::Config, context::Inputs, lookup::Context, resolve, stack::compose, template::render,
    Error,
};
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::info;

/// Resolve synthesis-time lookups against AWS
pub const LOOKUP_CMD: &str = "lookup";

/// Render the CloudFormation template
pub const SYNTH_CMD: &str = "synth";

/// Context file used when `--context` is not given
pub const DEFAULT_CONTEXT: &str = "context.yaml";

/// Output directory used when `--output` is not given
pub const DEFAULT_OUTPUT: &str = "synth.out";

/// Summary written next to the template
const MANIFEST_FILE: &str = "manifest.json";

/// Resource graph written when `--graph` is set
const GRAPH_FILE: &str = "graph.yaml";

/// Resolves every lookup for the tenant in the environment and merges the results into the
/// context file at `context_path`.
pub async fn lookup(context_path: &Path) -> Result<(), Error> {
    let inputs = Inputs::from_env()?;
    let resolved = resolve(
        &inputs.target.region,
        &inputs.tenant.tenant,
        &inputs.tenant.zone,
    )
    .await?;

    // Keep entries resolved for other tenants
    let mut context = if context_path.exists() {
        Context::load(context_path)?
    } else {
        Context::default()
    };
    context.extend(resolved);
    context.save(context_path)?;
    info!(path = ?context_path, "updated context");
    Ok(())
}

/// Synthesizes the stack for the tenant in the environment into `output`, returning its id.
pub fn synth(
    context_path: &Path,
    config_path: Option<&Path>,
    output: &Path,
    graph: bool,
) -> Result<String, Error> {
    let inputs = Inputs::from_env()?;
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let context = Context::load(context_path)?;
    let stack = compose(&inputs, &config, &context)?;
    let template = render(&stack)?;

    fs::create_dir_all(output)?;
    let template_path = output.join(stack.template_file());
    fs::write(&template_path, serde_json::to_vec_pretty(&template)?)?;
    fs::write(
        output.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&stack.manifest())?,
    )?;
    if graph {
        serde_yaml::to_writer(File::create(output.join(GRAPH_FILE))?, &stack.graph)?;
    }
    info!(
        stack = stack.id.as_str(),
        template = ?template_path,
        "synthesized stack"
    );
    Ok(stack.id)
}
