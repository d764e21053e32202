//! End-to-end planning pass over on-disk fixtures

use std::{fs, sync::Mutex};

use async_trait::async_trait;
use deploy_scripts::{
    artifacts::{ArtifactStore, ContractMetadataSource, DeploymentList},
    config::DeploymentArgsConfig,
    errors::ScriptError,
    plan::{PlanBuilder, ProxyDeployer},
    solidity::{DeployStaticCall, UpgradeProxyCall},
};
use ethers::{
    abi::AbiDecode,
    types::{Address, U256},
    utils::{format_bytes32_string, get_contract_address},
};
use eyre::Result;

/// A build-output document with one contract per deploy strategy
const BUILD_INFO: &str = r#"{
    "output": {
        "contracts": {
            "contracts/Registry.sol": {
                "Registry": {
                    "abi": [
                        {
                            "type": "function",
                            "name": "initialize",
                            "inputs": [{ "name": "admin", "type": "address" }],
                            "outputs": [],
                            "stateMutability": "nonpayable"
                        }
                    ],
                    "devdoc": { "custom:deploy-type": "deployUpgradeable" },
                    "evm": { "bytecode": { "object": "0x60806040526004361060" } }
                }
            },
            "contracts/TokenVault.sol": {
                "TokenVault": {
                    "abi": [
                        {
                            "type": "constructor",
                            "inputs": [{ "name": "cap", "type": "uint256" }],
                            "stateMutability": "nonpayable"
                        }
                    ],
                    "devdoc": {
                        "custom:deploy-type": "deployStatic",
                        "custom:salt": "vault-v1"
                    },
                    "evm": { "bytecode": { "object": "6080604052348015600f57" } }
                }
            },
            "contracts/PriceFeed.sol": {
                "PriceFeed": {
                    "abi": [],
                    "devdoc": { "custom:deploy-type": "onlyProxy" },
                    "evm": { "bytecode": { "object": "0x6080" } }
                }
            }
        }
    }
}"#;

/// The same contracts as flat descriptor records, in deployment order
const DEPLOYMENT_LIST: &str = "\
contracts/TokenVault.sol:TokenVault:deployStatic:false:true
contracts/Registry.sol:Registry:deployUpgradeable:true:false
contracts/PriceFeed.sol:PriceFeed:onlyProxy:false:false
";

/// Externally supplied argument values for the fixture contracts
const DEPLOYMENT_ARGS: &str = r#"{
    "constructor": {
        "contracts/TokenVault.sol:TokenVault": [{ "cap": "1000" }]
    },
    "initializer": {
        "contracts/Registry.sol:Registry": [{ "admin": "0x00000000000000000000000000000000000000aa" }]
    }
}"#;

/// The gas the recording deployer reports per proxy deployment
const PROXY_GAS: u64 = 90_000;

/// A proxy deployer that records salts instead of sending transactions
#[derive(Default)]
struct RecordingDeployer {
    salts: Mutex<Vec<[u8; 32]>>,
}

#[async_trait]
impl ProxyDeployer for RecordingDeployer {
    async fn deploy(&self, salt: [u8; 32]) -> Result<U256, ScriptError> {
        self.salts.lock().unwrap().push(salt);
        Ok(U256::from(PROXY_GAS))
    }
}

#[tokio::test]
async fn full_pass_over_disk_fixtures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("build-info.json"), BUILD_INFO)?;
    fs::write(dir.path().join("deployment-list.txt"), DEPLOYMENT_LIST)?;
    let config_dir = dir.path().join("config");
    fs::create_dir(&config_dir)?;
    fs::write(config_dir.join("deploymentArgs.json"), DEPLOYMENT_ARGS)?;

    let store = ArtifactStore::from_dir(dir.path())?;
    let list = DeploymentList::read(&dir.path().join("deployment-list.txt"))?;
    let config = DeploymentArgsConfig::read(Some(&config_dir))?;

    // both metadata sources agree for every listed contract
    for qualified_name in list.qualified_names() {
        let from_store = store.descriptor(&qualified_name)?;
        let from_list = list.descriptor(&qualified_name)?;
        assert_eq!(from_store.deploy_type, from_list.deploy_type);
        assert_eq!(from_store.initializable, from_list.initializable);
        assert_eq!(
            from_store.has_constructor_args,
            from_list.has_constructor_args
        );
    }

    let factory: Address = "0x00000000000000000000000000000000000000ff".parse()?;
    let deployer = RecordingDeployer::default();
    let start_tx_count = 1;
    let plan = PlanBuilder::new(factory, &store, &config, start_tx_count)
        .build(&list.qualified_names(), &list, &deployer)
        .await?;

    // two calls for the static vault, three for the upgradeable registry,
    // none batched for the proxy-only feed
    assert_eq!(plan.calls.len(), 5);
    assert_eq!(plan.tx_count, start_tx_count + 4);

    // the flat list carries no salt tag, so the vault's salt falls back to
    // its contract name rather than the artifact's tag
    let deploy_static = DeployStaticCall::decode(&plan.calls[1])?;
    assert_eq!(deploy_static.salt, format_bytes32_string("TokenVault")?);

    // the registry's logic address is predicted two creations after the
    // starting count
    let upgrade_proxy = UpgradeProxyCall::decode(&plan.calls[4])?;
    assert_eq!(
        upgrade_proxy.new_impl,
        get_contract_address(factory, start_tx_count + 2)
    );

    assert_eq!(plan.cumulative_gas, U256::from(PROXY_GAS));
    assert_eq!(
        *deployer.salts.lock().unwrap(),
        vec![format_bytes32_string("PriceFeed")?]
    );

    Ok(())
}

#[test]
fn args_template_round_trips() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("build-info.json"), BUILD_INFO)?;

    let store = ArtifactStore::from_dir(dir.path())?;
    let template = DeploymentArgsConfig::template(&store, &store.qualified_names())?;
    let config_dir = dir.path().join("config");
    template.write(Some(&config_dir))?;

    let read_back = DeploymentArgsConfig::read(Some(&config_dir))?;
    assert_eq!(
        read_back.constructor_args("contracts/TokenVault.sol:TokenVault"),
        vec![String::new()]
    );
    assert!(read_back
        .initializer_args("contracts/Registry.sol:Registry")
        .is_some());

    Ok(())
}
