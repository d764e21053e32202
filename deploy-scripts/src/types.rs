//! Type definitions used throughout the deploy scripts

use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

use ethers::types::{Address, Bytes, U256};

use crate::{
    constants::{ONLY_PROXY, STATIC_DEPLOYMENT, UPGRADEABLE_DEPLOYMENT},
    errors::ScriptError,
};

/// The strategy under which a contract is deployed through the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployType {
    /// Deploy an immutable template once, then instantiate it
    /// deterministically by salt
    Static,
    /// Deploy a freestanding logic contract and wire it behind a proxy
    Upgradeable,
    /// Only deploy a proxy; the logic contract is managed elsewhere
    ProxyOnly,
}

impl FromStr for DeployType {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATIC_DEPLOYMENT => Ok(DeployType::Static),
            UPGRADEABLE_DEPLOYMENT => Ok(DeployType::Upgradeable),
            ONLY_PROXY => Ok(DeployType::ProxyOnly),
            other => Err(ScriptError::UnknownDeployType(other.to_string())),
        }
    }
}

impl Display for DeployType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployType::Static => write!(f, "{}", STATIC_DEPLOYMENT),
            DeployType::Upgradeable => write!(f, "{}", UPGRADEABLE_DEPLOYMENT),
            DeployType::ProxyOnly => write!(f, "{}", ONLY_PROXY),
        }
    }
}

/// The deployment attributes of a single contract, assembled from one of
/// the metadata sources and completed with externally supplied arguments
/// before planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    /// The `path:name` identifier of the contract
    pub qualified_name: String,
    /// The bare contract name
    pub name: String,
    /// The strategy under which the contract is deployed
    pub deploy_type: DeployType,
    /// The rollout batch the contract belongs to, if tagged
    pub deploy_group: Option<String>,
    /// The contract's position within its deploy group, if tagged
    pub deploy_group_index: Option<u32>,
    /// An explicit salt tag; the contract name is used when absent
    pub salt: Option<String>,
    /// Whether the contract declares an `initialize` method
    pub initializable: bool,
    /// Whether the contract's constructor takes any arguments
    pub has_constructor_args: bool,
    /// Ordered constructor argument values, filled in by the resolver
    pub constructor_args: Vec<String>,
    /// Ordered initializer argument values, filled in by the resolver;
    /// `None` when the contract is not initializable
    pub initializer_args: Option<Vec<String>>,
    /// The flat descriptor record the contract was parsed from, if any
    pub raw_record: Option<String>,
}

impl ContractDescriptor {
    /// The string the contract's salt is derived from: the salt tag when
    /// present, the contract name otherwise
    pub fn salt_string(&self) -> &str {
        self.salt.as_deref().unwrap_or(&self.name)
    }

    /// Whether the contract passes the given group and group-index filters.
    ///
    /// A filter that is absent matches everything; a descriptor lacking a
    /// group or index only matches when the corresponding filter is absent.
    pub fn matches(&self, group: Option<&str>, indices: Option<&BTreeSet<u32>>) -> bool {
        if let Some(group) = group {
            if self.deploy_group.as_deref() != Some(group) {
                return false;
            }
        }
        if let Some(indices) = indices {
            match self.deploy_group_index {
                Some(index) if indices.contains(&index) => {}
                _ => return false,
            }
        }
        true
    }
}

/// The per-contract inputs consumed by the call encoders
#[derive(Debug, Clone)]
pub struct DeployArgs {
    /// The bare contract name
    pub contract_name: String,
    /// The address of the factory the deployment is routed through
    pub factory_address: Address,
    /// The ABI-encoded `initialize` call, when the contract is initializable
    pub init_call_data: Option<Bytes>,
    /// Ordered constructor argument values, when the constructor takes any
    pub constructor_args: Option<Vec<String>>,
    /// Where deployment results are recorded
    pub output_folder: Option<PathBuf>,
}

/// The accumulated output of one planning pass
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// The encoded factory calls, in submission order
    pub calls: Vec<Bytes>,
    /// The factory's predicted transaction count after the plan executes
    pub tx_count: u64,
    /// Gas consumed by immediate (non-batched) proxy deployments
    pub cumulative_gas: U256,
    /// Predicted template/logic contract addresses, keyed for the
    /// deployments file
    pub predicted: Vec<(String, Address)>,
    /// Salts of the statically instantiated contracts, resolved to
    /// addresses through the factory's registry after submission
    pub static_salts: Vec<(String, [u8; 32])>,
}

/// Splits a `path:name` contract identifier into its path and name parts
pub fn split_qualified_name(qualified_name: &str) -> Result<(&str, &str), ScriptError> {
    qualified_name
        .split_once(':')
        .filter(|(path, name)| !path.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            ScriptError::ArtifactParsing(format!(
                "malformed contract identifier `{}`, expected `path:name`",
                qualified_name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_type_parses_tag_values() {
        assert_eq!(
            "deployStatic".parse::<DeployType>().unwrap(),
            DeployType::Static
        );
        assert_eq!(
            "deployUpgradeable".parse::<DeployType>().unwrap(),
            DeployType::Upgradeable
        );
        assert_eq!(
            "onlyProxy".parse::<DeployType>().unwrap(),
            DeployType::ProxyOnly
        );
    }

    #[test]
    fn unknown_deploy_type_is_an_error() {
        let err = "deployWeird".parse::<DeployType>().unwrap_err();
        assert!(matches!(err, ScriptError::UnknownDeployType(s) if s == "deployWeird"));
    }

    #[test]
    fn deploy_type_displays_as_tag_value() {
        assert_eq!(DeployType::Upgradeable.to_string(), "deployUpgradeable");
    }

    #[test]
    fn qualified_name_splits_on_first_colon() {
        let (path, name) = split_qualified_name("contracts/Registry.sol:Registry").unwrap();
        assert_eq!(path, "contracts/Registry.sol");
        assert_eq!(name, "Registry");

        assert!(split_qualified_name("Registry").is_err());
        assert!(split_qualified_name(":Registry").is_err());
    }

    #[test]
    fn group_filters_are_membership_checks() {
        let descriptor = ContractDescriptor {
            qualified_name: "contracts/Vault.sol:Vault".to_string(),
            name: "Vault".to_string(),
            deploy_type: DeployType::Static,
            deploy_group: Some("core".to_string()),
            deploy_group_index: Some(1),
            salt: None,
            initializable: false,
            has_constructor_args: false,
            constructor_args: vec![],
            initializer_args: None,
            raw_record: None,
        };

        let ones: BTreeSet<u32> = [1].into_iter().collect();
        let twos: BTreeSet<u32> = [2].into_iter().collect();

        assert!(descriptor.matches(None, None));
        assert!(descriptor.matches(Some("core"), Some(&ones)));
        assert!(!descriptor.matches(Some("periphery"), None));
        assert!(!descriptor.matches(Some("core"), Some(&twos)));

        // descriptors without group metadata only match unfiltered passes
        let untagged = ContractDescriptor {
            deploy_group: None,
            deploy_group_index: None,
            ..descriptor
        };
        assert!(untagged.matches(None, None));
        assert!(!untagged.matches(Some("core"), None));
        assert!(!untagged.matches(None, Some(&ones)));
    }
}
