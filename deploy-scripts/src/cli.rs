//! Definitions of CLI arguments and commands for deploy scripts

use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use ethers::providers::Middleware;

use crate::{
    commands::{deploy_contracts, deploy_factory, generate_args_template},
    constants::{DEPLOYMENTS_FILE, FACTORY_CONTRACT_NAME},
    errors::ScriptError,
};

/// Plan and submit factory-routed contract deployments
#[derive(Parser)]
pub struct Cli {
    /// Private key of the deployer
    // TODO: Better key management
    #[arg(short, long)]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long)]
    pub rpc_url: String,

    /// Path to the deployments file in which contract addresses are recorded
    #[arg(short, long, default_value = DEPLOYMENTS_FILE)]
    pub deployments_path: String,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deploy scripts
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the factory contract
    DeployFactory(DeployFactoryArgs),
    /// Plan and submit the batched contract deployments
    DeployContracts(DeployContractsArgs),
    /// Generate a fill-in deployment-args template
    GenerateArgsTemplate(GenerateArgsTemplateArgs),
}

impl Command {
    /// Dispatches to the selected command's implementation
    pub async fn run(
        self,
        client: Arc<impl Middleware + 'static>,
        deployments_path: &str,
    ) -> Result<(), ScriptError> {
        match self {
            Command::DeployFactory(args) => deploy_factory(args, client, deployments_path).await,
            Command::DeployContracts(args) => {
                deploy_contracts(args, client, deployments_path).await
            }
            Command::GenerateArgsTemplate(args) => generate_args_template(args),
        }
    }
}

/// Deploy the factory contract through which all managed deployments are
/// routed.
///
/// The factory is the only contract deployed directly from the signer; every
/// other contract is created by the factory itself, so its address must be
/// recorded before any deployment pass runs.
#[derive(Args)]
pub struct DeployFactoryArgs {
    /// Directory holding the compiler build-output files
    #[arg(short, long)]
    pub artifacts: PathBuf,

    /// Name of the factory contract in the build artifacts
    #[arg(short, long, default_value = FACTORY_CONTRACT_NAME)]
    pub contract: String,

    /// Directory holding the deployment-args document
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

/// Plan the deployment of every matching contract and submit the plan as a
/// single multicall through the factory.
///
/// Contracts are processed in listing order; the resulting calls must be
/// submitted in the order produced, since later calls reference addresses
/// derived from the factory's transaction count at earlier calls.
#[derive(Args)]
pub struct DeployContractsArgs {
    /// Directory holding the compiler build-output files
    #[arg(short, long)]
    pub artifacts: PathBuf,

    /// Optional flat deployment-list file used instead of artifact
    /// introspection for contract metadata
    #[arg(short = 'l', long)]
    pub deployment_list: Option<PathBuf>,

    /// Directory holding the deployment-args document
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Address of the factory; read from the deployments file when omitted
    #[arg(short, long)]
    pub factory_address: Option<String>,

    /// Restrict the pass to contracts tagged with this deploy group
    #[arg(short, long)]
    pub group: Option<String>,

    /// Restrict the pass to these group indices (repeatable)
    #[arg(short = 'i', long)]
    pub group_index: Vec<u32>,

    /// Folder in which deployment results are recorded
    #[arg(short, long)]
    pub output_folder: Option<PathBuf>,
}

/// Generate a deployment-args template with one named, empty-valued record
/// per constructor/initializer parameter of every compiled contract
#[derive(Args)]
pub struct GenerateArgsTemplateArgs {
    /// Directory holding the compiler build-output files
    #[arg(short, long)]
    pub artifacts: PathBuf,

    /// Directory the template is written into
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}
