//! Reading and resolution of externally supplied deployment arguments.
//!
//! The deployment-args document maps a qualified contract name to an
//! ordered list of single-key `{name: value}` records, once for
//! constructor arguments and once for initializer arguments. Record order
//! is parameter order; the names are documentation only.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    artifacts::ArtifactStore,
    constants::{DEFAULT_CONFIG_DIR, DEPLOYMENT_ARGS_FILE, INITIALIZER_FN},
    errors::ScriptError,
    types::ContractDescriptor,
};

/// One named argument value; a single-key mapping in the document
type ArgRecord = BTreeMap<String, String>;

/// A section of the deployment-args document: contract name to ordered
/// argument records
type ArgSection = BTreeMap<String, Vec<ArgRecord>>;

/// The deployment-args document
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeploymentArgsConfig {
    /// Constructor arguments per contract
    #[serde(default)]
    pub constructor: ArgSection,
    /// Initializer arguments per contract
    #[serde(default)]
    pub initializer: ArgSection,
}

impl DeploymentArgsConfig {
    /// Reads the deployment-args document from the given config directory.
    ///
    /// A missing file is the empty config: contracts without external
    /// arguments are a normal case, not a failure.
    pub fn read(config_dir: Option<&Path>) -> Result<Self, ScriptError> {
        let path = Self::document_path(config_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(&path).map_err(|e| ScriptError::ReadFile(e.to_string()))?;
        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))
    }

    /// Writes the document into the given config directory, creating the
    /// directory if needed
    pub fn write(&self, config_dir: Option<&Path>) -> Result<PathBuf, ScriptError> {
        let path = Self::document_path(config_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScriptError::WriteFile(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ScriptError::WriteFile(e.to_string()))?;
        fs::write(&path, contents).map_err(|e| ScriptError::WriteFile(e.to_string()))?;
        Ok(path)
    }

    /// The on-disk location of the deployment-args document
    fn document_path(config_dir: Option<&Path>) -> PathBuf {
        config_dir
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_DIR))
            .join(DEPLOYMENT_ARGS_FILE)
    }

    /// Ordered constructor argument values for the named contract; empty
    /// when the contract has no entry
    pub fn constructor_args(&self, qualified_name: &str) -> Vec<String> {
        self.constructor
            .get(qualified_name)
            .map(|records| extract_args(records))
            .unwrap_or_default()
    }

    /// Ordered initializer argument values for the named contract, or
    /// `None` when the contract has no entry
    pub fn initializer_args(&self, qualified_name: &str) -> Option<Vec<String>> {
        self.initializer
            .get(qualified_name)
            .map(|records| extract_args(records))
    }

    /// Fills a descriptor's argument lists from the document.
    ///
    /// Arguments are only looked up for the parameters the contract
    /// actually declares.
    pub fn resolve(&self, descriptor: &mut ContractDescriptor) {
        descriptor.constructor_args = if descriptor.has_constructor_args {
            self.constructor_args(&descriptor.qualified_name)
        } else {
            vec![]
        };
        descriptor.initializer_args = if descriptor.initializable {
            Some(
                self.initializer_args(&descriptor.qualified_name)
                    .unwrap_or_default(),
            )
        } else {
            None
        };
    }

    /// Builds a fill-in template for the listed contracts: one named,
    /// empty-valued record per constructor/initializer parameter
    pub fn template(store: &ArtifactStore, contracts: &[String]) -> Result<Self, ScriptError> {
        let mut template = Self::default();
        for qualified_name in contracts {
            let artifact = store.artifact(qualified_name)?;
            if let Some(constructor) = artifact.abi.constructor.as_ref() {
                if !constructor.inputs.is_empty() {
                    template.constructor.insert(
                        qualified_name.clone(),
                        constructor.inputs.iter().map(|input| empty_record(&input.name)).collect(),
                    );
                }
            }
            if let Ok(initializer) = artifact.abi.function(INITIALIZER_FN) {
                template.initializer.insert(
                    qualified_name.clone(),
                    initializer.inputs.iter().map(|input| empty_record(&input.name)).collect(),
                );
            }
        }
        Ok(template)
    }
}

/// Keeps only the record values, in record order
fn extract_args(records: &[ArgRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.values().next().cloned())
        .collect()
}

/// A single-key record with an empty value, for templates
fn empty_record(name: &str) -> ArgRecord {
    let mut record = ArgRecord::new();
    record.insert(name.to_string(), String::new());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{tests::fixture_store, ContractMetadataSource};

    /// A deployment-args document covering both sections
    const ARGS_FIXTURE: &str = r#"{
        "constructor": {
            "C.sol:C": [{ "x": "1" }, { "y": "2" }]
        },
        "initializer": {
            "contracts/Registry.sol:Registry": [{ "admin": "0x00000000000000000000000000000000000000aa" }]
        }
    }"#;

    #[test]
    fn argument_values_keep_record_order() {
        let config: DeploymentArgsConfig = serde_json::from_str(ARGS_FIXTURE).unwrap();
        assert_eq!(config.constructor_args("C.sol:C"), vec!["1", "2"]);
    }

    #[test]
    fn absent_entries_resolve_to_empty() {
        let config: DeploymentArgsConfig = serde_json::from_str(ARGS_FIXTURE).unwrap();
        assert!(config.constructor_args("D.sol:D").is_empty());
        assert!(config.initializer_args("D.sol:D").is_none());
    }

    #[test]
    fn resolution_respects_declared_parameters() {
        let config: DeploymentArgsConfig = serde_json::from_str(ARGS_FIXTURE).unwrap();
        let store = fixture_store();

        let mut registry = store
            .descriptor("contracts/Registry.sol:Registry")
            .unwrap();
        config.resolve(&mut registry);
        assert!(registry.constructor_args.is_empty());
        assert_eq!(
            registry.initializer_args.as_deref(),
            Some(&["0x00000000000000000000000000000000000000aa".to_string()][..])
        );

        // an uninitializable contract never resolves initializer args
        let mut vault = store
            .descriptor("contracts/TokenVault.sol:TokenVault")
            .unwrap();
        config.resolve(&mut vault);
        assert_eq!(vault.initializer_args, None);
    }

    #[test]
    fn missing_document_is_the_empty_config() {
        let config =
            DeploymentArgsConfig::read(Some(Path::new("/nonexistent/config/dir"))).unwrap();
        assert!(config.constructor.is_empty());
        assert!(config.initializer.is_empty());
    }

    #[test]
    fn template_names_every_parameter() {
        let store = fixture_store();
        let contracts = vec![
            "contracts/Registry.sol:Registry".to_string(),
            "contracts/TokenVault.sol:TokenVault".to_string(),
        ];
        let template = DeploymentArgsConfig::template(&store, &contracts).unwrap();

        let vault = &template.constructor["contracts/TokenVault.sol:TokenVault"];
        assert_eq!(vault.len(), 1);
        assert_eq!(vault[0].get("cap").map(String::as_str), Some(""));

        let registry = &template.initializer["contracts/Registry.sol:Registry"];
        assert_eq!(registry.len(), 1);
        assert!(registry[0].contains_key("admin"));

        // the vault declares no initializer, so no entry is emitted
        assert!(!template
            .initializer
            .contains_key("contracts/TokenVault.sol:TokenVault"));
    }
}
