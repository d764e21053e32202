//! Construction of the ordered deployment-call plan.
//!
//! Each contract is classified by its deploy type and encoded into the
//! factory calls that deploy it. Call order is a correctness requirement:
//! later calls reference addresses derived from the factory's transaction
//! count at the time earlier calls execute, so the running count advances
//! in lockstep with every creation call appended to the plan.

use std::{collections::BTreeSet, path::PathBuf};

use async_trait::async_trait;
use ethers::{
    abi::{
        token::{LenientTokenizer, Tokenizer},
        Abi, AbiEncode, Param, ParamType, Token,
    },
    providers::Middleware,
    types::{Address, Bytes, U256},
    utils::{format_bytes32_string, get_contract_address},
};
use tracing::{debug, info};

use crate::{
    artifacts::{ArtifactStore, ContractMetadataSource},
    config::DeploymentArgsConfig,
    constants::INITIALIZER_FN,
    errors::ScriptError,
    solidity::{
        DeployCreateCall, DeployProxyCall, DeployStaticCall, DeployTemplateCall,
        DeploymentFactory, UpgradeProxyCall,
    },
    types::{ContractDescriptor, DeployArgs, DeployType, DeploymentPlan},
};

/// The number of factory creation transactions a static deployment consumes
const STATIC_TX_SLOTS: u64 = 2;

/// The number of factory creation transactions an upgradeable deployment
/// consumes for address-prediction purposes
const UPGRADEABLE_TX_SLOTS: u64 = 2;

/// A capability for submitting an immediate, non-batched proxy deployment
/// and reporting the gas it used
#[async_trait]
pub trait ProxyDeployer {
    /// Deploys a proxy under the given salt, returning the gas used
    async fn deploy(&self, salt: [u8; 32]) -> Result<U256, ScriptError>;
}

#[async_trait]
impl<M: Middleware + 'static> ProxyDeployer for DeploymentFactory<M> {
    async fn deploy(&self, salt: [u8; 32]) -> Result<U256, ScriptError> {
        let call = self.deploy_proxy(salt);
        let pending = call
            .send()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let receipt = pending
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        Ok(receipt.and_then(|r| r.gas_used).unwrap_or_default())
    }
}

/// Derives a contract's fixed-width salt from its salt tag, falling back
/// to the contract name
pub fn bytes32_salt(descriptor: &ContractDescriptor) -> Result<[u8; 32], ScriptError> {
    format_bytes32_string(descriptor.salt_string())
        .map_err(|e| ScriptError::SaltDerivation(format!("{}: {}", descriptor.name, e)))
}

/// Tokenizes string argument values against the given ABI parameters,
/// positionally
pub fn parse_tokens(params: &[Param], values: &[String]) -> Result<Vec<Token>, ScriptError> {
    if params.len() != values.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "expected {} argument(s), got {}",
            params.len(),
            values.len()
        )));
    }
    params
        .iter()
        .zip(values)
        .map(|(param, value)| {
            tokenize_value(&param.kind, value).map_err(|e| {
                ScriptError::CalldataConstruction(format!(
                    "argument `{}`: {}",
                    param.name, e
                ))
            })
        })
        .collect()
}

/// Tokenizes one value, retrying hex-like parameter kinds with the `0x`
/// prefix stripped
fn tokenize_value(kind: &ParamType, value: &str) -> Result<Token, ethers::abi::Error> {
    match LenientTokenizer::tokenize(kind, value) {
        Ok(token) => Ok(token),
        Err(err) => {
            let hex_like = matches!(
                kind,
                ParamType::Address | ParamType::Bytes | ParamType::FixedBytes(_)
            );
            match (hex_like, value.strip_prefix("0x")) {
                (true, Some(stripped)) => LenientTokenizer::tokenize(kind, stripped),
                _ => Err(err),
            }
        }
    }
}

/// Encodes the `initialize` call for the given ABI and ordered argument
/// values
pub fn initializer_calldata(abi: &Abi, args: &[String]) -> Result<Bytes, ScriptError> {
    let initializer = abi
        .function(INITIALIZER_FN)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
    let tokens = parse_tokens(&initializer.inputs, args)?;
    initializer
        .encode_input(&tokens)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// Builds the per-contract encoder inputs from a resolved descriptor
pub fn resolve_deploy_args(
    store: &ArtifactStore,
    descriptor: &ContractDescriptor,
    factory_address: Address,
    output_folder: Option<PathBuf>,
) -> Result<DeployArgs, ScriptError> {
    let init_call_data = match descriptor.initializer_args.as_deref() {
        Some(args) => {
            let artifact = store.artifact(&descriptor.qualified_name)?;
            Some(initializer_calldata(&artifact.abi, args)?)
        }
        None => None,
    };
    let constructor_args = descriptor
        .has_constructor_args
        .then(|| descriptor.constructor_args.clone());

    Ok(DeployArgs {
        contract_name: descriptor.name.clone(),
        factory_address,
        init_call_data,
        constructor_args,
        output_folder,
    })
}

/// A contract's creation bytecode with its constructor arguments encoded
/// and appended
fn creation_code(
    store: &ArtifactStore,
    descriptor: &ContractDescriptor,
    constructor_args: &[String],
) -> Result<Bytes, ScriptError> {
    let artifact = store.artifact(&descriptor.qualified_name)?;
    let bytecode = store.creation_bytecode(&descriptor.qualified_name)?;
    match artifact.abi.constructor.as_ref() {
        Some(constructor) if !constructor.inputs.is_empty() => {
            let tokens = parse_tokens(&constructor.inputs, constructor_args)?;
            constructor
                .encode_input(bytecode, &tokens)
                .map(Bytes::from)
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
        }
        _ => Ok(Bytes::from(bytecode)),
    }
}

/// Encodes the two calls of a static deployment: deploy the template,
/// then instantiate it under the contract's salt
pub fn static_deployment_calls(
    store: &ArtifactStore,
    descriptor: &ContractDescriptor,
    args: &DeployArgs,
) -> Result<[Bytes; 2], ScriptError> {
    let deploy_code = creation_code(
        store,
        descriptor,
        args.constructor_args.as_deref().unwrap_or(&[]),
    )?;
    let salt = bytes32_salt(descriptor)?;
    let init_call_data = args.init_call_data.clone().unwrap_or_default();

    let deploy_template = DeployTemplateCall { deploy_code }.encode();
    let deploy_static = DeployStaticCall {
        salt,
        init_call_data,
    }
    .encode();
    Ok([deploy_template.into(), deploy_static.into()])
}

/// Encodes the three calls of an upgradeable deployment: deploy the logic
/// contract, deploy its proxy, then point the proxy at the address the
/// logic contract is predicted to receive
pub fn upgradeable_deployment_calls(
    store: &ArtifactStore,
    descriptor: &ContractDescriptor,
    args: &DeployArgs,
    logic_address: Address,
) -> Result<[Bytes; 3], ScriptError> {
    let deploy_code = creation_code(
        store,
        descriptor,
        args.constructor_args.as_deref().unwrap_or(&[]),
    )?;
    let salt = bytes32_salt(descriptor)?;
    let init_call_data = args.init_call_data.clone().unwrap_or_default();

    let deploy_create = DeployCreateCall { deploy_code }.encode();
    let deploy_proxy = DeployProxyCall { salt }.encode();
    let upgrade_proxy = UpgradeProxyCall {
        salt,
        new_impl: logic_address,
        init_call_data,
    }
    .encode();
    Ok([deploy_create.into(), deploy_proxy.into(), upgrade_proxy.into()])
}

/// Accumulates the ordered call plan for one planning pass.
///
/// The builder owns the running transaction count used to predict the
/// addresses of template and logic contracts; it is the only writer.
pub struct PlanBuilder<'a> {
    /// The address of the factory the deployments are routed through
    factory_address: Address,
    /// The compiled artifacts serving ABIs and bytecode
    store: &'a ArtifactStore,
    /// The externally supplied argument values
    config: &'a DeploymentArgsConfig,
    /// Where deployment results are recorded
    output_folder: Option<PathBuf>,
    /// The deploy-group filter, if any
    group: Option<String>,
    /// The group-index filter, if any
    group_indices: Option<BTreeSet<u32>>,
    /// The factory's predicted transaction count
    tx_count: u64,
    /// The accumulated calls, in submission order
    calls: Vec<Bytes>,
    /// Gas consumed by immediate proxy deployments
    cumulative_gas: U256,
    /// Predicted template/logic addresses
    predicted: Vec<(String, Address)>,
    /// Salts of the statically instantiated contracts
    static_salts: Vec<(String, [u8; 32])>,
}

impl<'a> PlanBuilder<'a> {
    /// Creates a builder starting from the factory's current transaction
    /// count
    pub fn new(
        factory_address: Address,
        store: &'a ArtifactStore,
        config: &'a DeploymentArgsConfig,
        start_tx_count: u64,
    ) -> Self {
        Self {
            factory_address,
            store,
            config,
            output_folder: None,
            group: None,
            group_indices: None,
            tx_count: start_tx_count,
            calls: vec![],
            cumulative_gas: U256::zero(),
            predicted: vec![],
            static_salts: vec![],
        }
    }

    /// Restricts the pass to contracts tagged with the given deploy group
    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }

    /// Restricts the pass to contracts whose group index is in the given set
    pub fn with_group_indices(mut self, group_indices: Option<BTreeSet<u32>>) -> Self {
        self.group_indices = group_indices;
        self
    }

    /// Sets the folder deployment results are recorded in
    pub fn with_output_folder(mut self, output_folder: Option<PathBuf>) -> Self {
        self.output_folder = output_folder;
        self
    }

    /// Builds the full ordered call plan for the listed contracts.
    ///
    /// Contracts are processed strictly in list order; any failure aborts
    /// the whole pass.
    pub async fn build<S: ContractMetadataSource, D: ProxyDeployer>(
        mut self,
        contracts: &[String],
        source: &S,
        deployer: &D,
    ) -> Result<DeploymentPlan, ScriptError> {
        for qualified_name in contracts {
            let mut descriptor = source.descriptor(qualified_name)?;
            if !descriptor.matches(self.group.as_deref(), self.group_indices.as_ref()) {
                debug!("skipping {} (filtered out)", qualified_name);
                continue;
            }
            self.config.resolve(&mut descriptor);
            info!("planning {} as {}", qualified_name, descriptor.deploy_type);
            if let Some(raw_record) = descriptor.raw_record.as_deref() {
                debug!("descriptor record: {}", raw_record);
            }

            let args = resolve_deploy_args(
                self.store,
                &descriptor,
                self.factory_address,
                self.output_folder.clone(),
            )?;
            match descriptor.deploy_type {
                DeployType::Static => {
                    let template_address =
                        get_contract_address(self.factory_address, self.tx_count);
                    let calls = static_deployment_calls(self.store, &descriptor, &args)?;
                    self.calls.extend(calls);
                    self.predicted
                        .push((format!("{}_template", descriptor.name), template_address));
                    self.static_salts
                        .push((descriptor.name.clone(), bytes32_salt(&descriptor)?));
                    self.tx_count += STATIC_TX_SLOTS;
                }
                DeployType::Upgradeable => {
                    let logic_address =
                        get_contract_address(self.factory_address, self.tx_count);
                    let calls = upgradeable_deployment_calls(
                        self.store,
                        &descriptor,
                        &args,
                        logic_address,
                    )?;
                    self.calls.extend(calls);
                    self.predicted
                        .push((format!("{}_logic", descriptor.name), logic_address));
                    self.tx_count += UPGRADEABLE_TX_SLOTS;
                }
                DeployType::ProxyOnly => {
                    let salt = bytes32_salt(&descriptor)?;
                    let gas = deployer.deploy(salt).await?;
                    debug!("proxy for {} used {} gas", descriptor.name, gas);
                    self.cumulative_gas += gas;
                }
            }
        }

        Ok(DeploymentPlan {
            calls: self.calls,
            tx_count: self.tx_count,
            cumulative_gas: self.cumulative_gas,
            predicted: self.predicted,
            static_salts: self.static_salts,
        })
    }
}
