//! App Proxy Deployer CLI

use appproxy_deployer::crate_version;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::error;

mod cmd;

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Entrypoint for the App Proxy Deployer CLI
#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Define application
    let matches = Command::new("deployer")
        .version(crate_version())
        .about("Synthesize the App Proxy service topology for CloudFormation.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new(cmd::LOOKUP_CMD)
                .about("Resolve the network, subnets and hosted zone of the tenant and store them in the context file.")
                .arg(
                    Arg::new("context")
                        .long("context")
                        .default_value(cmd::DEFAULT_CONTEXT)
                        .help("Path to YAML context file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new(cmd::SYNTH_CMD)
                .about("Build the resource graph from the environment and write the CloudFormation template.")
                .arg(
                    Arg::new("context")
                        .long("context")
                        .default_value(cmd::DEFAULT_CONTEXT)
                        .help("Path to YAML context file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("Path to YAML file overriding version pins and task sizing")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .default_value(cmd::DEFAULT_OUTPUT)
                        .help("Directory the template and manifest are written to")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("graph")
                        .long("graph")
                        .help("Also write the resource graph as YAML")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Parse subcommands
    match matches.subcommand() {
        Some((cmd::LOOKUP_CMD, matches)) => {
            let context = matches.get_one::<PathBuf>("context").unwrap();
            if let Err(e) = cmd::lookup(context).await {
                error!(error=?e, "failed to resolve lookups");
            } else {
                return std::process::ExitCode::SUCCESS;
            }
        }
        Some((cmd::SYNTH_CMD, matches)) => {
            let context = matches.get_one::<PathBuf>("context").unwrap();
            let config = matches.get_one::<PathBuf>("config");
            let output = matches.get_one::<PathBuf>("output").unwrap();
            let graph = matches.get_flag("graph");
            match cmd::synth(context, config.map(PathBuf::as_path), output, graph) {
                Ok(stack) => {
                    println!("{stack}");
                    return std::process::ExitCode::SUCCESS;
                }
                Err(e) => {
                    error!(error=?e, "failed to synthesize stack");
                }
            }
        }
        Some((name, _)) => {
            error!(cmd = name, "invalid subcommand");
        }
        None => {
            error!("no subcommand provided");
        }
    }
    std::process::ExitCode::FAILURE
}
