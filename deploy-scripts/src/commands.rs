//! Implementations of the various deploy scripts

use std::{str::FromStr, sync::Arc};

use ethers::{
    contract::ContractFactory,
    providers::Middleware,
    types::{Address, Bytes},
};
use tracing::info;

use crate::{
    artifacts::{ArtifactStore, DeploymentList},
    cli::{DeployContractsArgs, DeployFactoryArgs, GenerateArgsTemplateArgs},
    config::DeploymentArgsConfig,
    constants::{DEPLOYMENTS_FILE, FACTORY_CONTRACT_KEY, NUM_DEPLOY_CONFIRMATIONS},
    errors::ScriptError,
    plan::{parse_tokens, PlanBuilder},
    solidity::DeploymentFactory,
    types::DeploymentPlan,
    utils::{parse_addr_from_deployments_file, write_deployed_address},
};

/// Deploys the factory contract itself from its build artifact and records
/// its address in the deployments file
pub async fn deploy_factory(
    args: DeployFactoryArgs,
    client: Arc<impl Middleware>,
    deployments_path: &str,
) -> Result<(), ScriptError> {
    let store = ArtifactStore::from_dir(&args.artifacts)?;
    let qualified_name = store.qualify(&args.contract)?;
    let artifact = store.artifact(&qualified_name)?;
    let bytecode = Bytes::from(store.creation_bytecode(&qualified_name)?);

    let config = DeploymentArgsConfig::read(args.config_dir.as_deref())?;
    let constructor_args = config.constructor_args(&qualified_name);
    let tokens = match artifact.abi.constructor.as_ref() {
        Some(constructor) => parse_tokens(&constructor.inputs, &constructor_args)?,
        None => vec![],
    };

    let factory = ContractFactory::new(artifact.abi.clone(), bytecode, client.clone());
    let contract = factory
        .deploy_tokens(tokens)
        .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?
        .confirmations(NUM_DEPLOY_CONFIRMATIONS)
        .send()
        .await
        .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

    let factory_address = contract.address();
    info!("factory deployed at {:#x}", factory_address);
    write_deployed_address(deployments_path, FACTORY_CONTRACT_KEY, factory_address)?;

    Ok(())
}

/// Builds the full deployment plan and submits it through the factory's
/// multicall entrypoint
pub async fn deploy_contracts(
    args: DeployContractsArgs,
    client: Arc<impl Middleware + 'static>,
    deployments_path: &str,
) -> Result<(), ScriptError> {
    let store = ArtifactStore::from_dir(&args.artifacts)?;
    let config = DeploymentArgsConfig::read(args.config_dir.as_deref())?;

    let factory_address = match args.factory_address.as_deref() {
        Some(address) => Address::from_str(address)
            .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?,
        None => parse_addr_from_deployments_file(deployments_path, FACTORY_CONTRACT_KEY)?,
    };
    let factory = DeploymentFactory::new(factory_address, client.clone());

    // the address predictions assume nothing else transacts from the
    // factory between this read and submission
    let tx_count = client
        .get_transaction_count(factory_address, None)
        .await
        .map_err(|e| ScriptError::NonceFetching(e.to_string()))?
        .as_u64();

    let group_indices =
        (!args.group_index.is_empty()).then(|| args.group_index.iter().copied().collect());
    let builder = PlanBuilder::new(factory_address, &store, &config, tx_count)
        .with_group(args.group.clone())
        .with_group_indices(group_indices)
        .with_output_folder(args.output_folder.clone());

    let plan = match args.deployment_list.as_deref() {
        Some(path) => {
            let list = DeploymentList::read(path)?;
            builder
                .build(&list.qualified_names(), &list, &factory)
                .await?
        }
        None => {
            builder
                .build(&store.qualified_names(), &store, &factory)
                .await?
        }
    };

    if plan.calls.is_empty() {
        info!("no batched calls to submit");
    } else {
        submit_plan(&factory, &plan).await?;
    }

    // statically instantiated contracts get their final addresses from the
    // factory's salt registry once the multicall has landed
    let mut deployed = Vec::with_capacity(plan.static_salts.len());
    for (name, salt) in &plan.static_salts {
        let address = factory
            .lookup(*salt)
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        deployed.push((name.clone(), address));
    }

    // predicted addresses land in the output folder when one is given,
    // otherwise in the shared deployments file
    let deployments_file = match args.output_folder.as_ref() {
        Some(folder) => {
            std::fs::create_dir_all(folder)
                .map_err(|e| ScriptError::WriteFile(e.to_string()))?;
            folder.join(DEPLOYMENTS_FILE).to_string_lossy().into_owned()
        }
        None => deployments_path.to_string(),
    };
    for (contract_key, address) in &plan.predicted {
        write_deployed_address(&deployments_file, contract_key, *address)?;
    }
    for (contract_key, address) in &deployed {
        write_deployed_address(&deployments_file, contract_key, *address)?;
    }
    info!(
        "planned through transaction count {}, immediate proxy gas {}",
        plan.tx_count, plan.cumulative_gas
    );

    Ok(())
}

/// Submits the plan's batched calls in one multicall transaction
async fn submit_plan<M: Middleware + 'static>(
    factory: &DeploymentFactory<M>,
    plan: &DeploymentPlan,
) -> Result<(), ScriptError> {
    let call = factory.multi_call(plan.calls.clone());
    let pending = call
        .send()
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
    let receipt = pending
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    match receipt {
        Some(receipt) => info!(
            "multicall submitted in tx {:#x}, gas used {}",
            receipt.transaction_hash,
            receipt.gas_used.unwrap_or_default()
        ),
        None => info!("multicall submitted, no receipt returned"),
    }
    Ok(())
}

/// Writes a fill-in deployment-args template for every contract in the
/// artifacts directory
pub fn generate_args_template(args: GenerateArgsTemplateArgs) -> Result<(), ScriptError> {
    let store = ArtifactStore::from_dir(&args.artifacts)?;
    let contracts = store.qualified_names();
    let template = DeploymentArgsConfig::template(&store, &contracts)?;
    let path = template.write(args.config_dir.as_deref())?;
    info!("deployment-args template written to {}", path.display());
    Ok(())
}
