//! Constants used in the deploy scripts

/// The name of the initializer method looked up in a contract's ABI
pub const INITIALIZER_FN: &str = "initialize";

/// The prefix under which custom natspec tags appear in a contract's devdoc
pub const CUSTOM_TAG_PREFIX: &str = "custom:";

/// The natspec tag declaring a contract's deploy type
pub const DEPLOY_TYPE_TAG: &str = "deploy-type";

/// The natspec tag declaring a contract's deploy group
pub const DEPLOY_GROUP_TAG: &str = "deploy-group";

/// The natspec tag declaring a contract's position within its deploy group
pub const DEPLOY_GROUP_INDEX_TAG: &str = "deploy-group-index";

/// The natspec tag declaring an explicit salt for a contract
pub const SALT_TAG: &str = "salt";

/// The deploy-type tag value selecting the template-then-static strategy
pub const STATIC_DEPLOYMENT: &str = "deployStatic";

/// The deploy-type tag value selecting the logic-behind-proxy strategy
pub const UPGRADEABLE_DEPLOYMENT: &str = "deployUpgradeable";

/// The deploy-type tag value requesting only a proxy for a contract
/// whose logic is deployed elsewhere
pub const ONLY_PROXY: &str = "onlyProxy";

/// The extension of compiler build-output files in the artifacts directory
pub const ARTIFACT_EXTENSION: &str = "json";

/// The default directory holding the deployment configuration
pub const DEFAULT_CONFIG_DIR: &str = "deployment-config";

/// The file name of the deployment-args document inside the config directory
pub const DEPLOYMENT_ARGS_FILE: &str = "deploymentArgs.json";

/// The name of the factory contract in the build artifacts
pub const FACTORY_CONTRACT_NAME: &str = "DeploymentFactory";

/// The number of confirmations to wait for deployment transactions
pub const NUM_DEPLOY_CONFIRMATIONS: usize = 0;

/// The default file name under which deployed addresses are recorded
pub const DEPLOYMENTS_FILE: &str = "deployments.json";

/// The deployments key in the `deployments.json` file
pub const DEPLOYMENTS_KEY: &str = "deployments";

/// The factory contract key in the `deployments.json` file
pub const FACTORY_CONTRACT_KEY: &str = "factory_contract";
