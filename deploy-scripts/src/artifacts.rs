//! Reading of compiler build output and flat deployment-list records.
//!
//! Both sources produce the same [`ContractDescriptor`] view of a contract;
//! the build output is authoritative, the flat list is a cheaper record of
//! the same attributes that avoids repeated artifact lookups.

use std::{collections::BTreeMap, fs, path::Path};

use ethers::abi::Abi;
use serde::Deserialize;

use crate::{
    constants::{
        ARTIFACT_EXTENSION, CUSTOM_TAG_PREFIX, DEPLOY_GROUP_INDEX_TAG, DEPLOY_GROUP_TAG,
        DEPLOY_TYPE_TAG, INITIALIZER_FN, SALT_TAG,
    },
    errors::ScriptError,
    types::{split_qualified_name, ContractDescriptor},
};

/// A single compiler build-output document, holding the compiled contracts
/// keyed by source path and contract name
#[derive(Debug, Deserialize)]
pub struct BuildInfo {
    /// The compiler output section
    pub output: BuildOutput,
}

/// The `output` section of a build-output document
#[derive(Debug, Deserialize)]
pub struct BuildOutput {
    /// Compiled contracts, keyed by source path then contract name
    pub contracts: BTreeMap<String, BTreeMap<String, ContractArtifact>>,
}

/// The compiled output of a single contract
#[derive(Debug, Deserialize)]
pub struct ContractArtifact {
    /// The contract's ABI
    pub abi: Abi,
    /// The contract's devdoc, holding the custom natspec tags
    #[serde(default)]
    pub devdoc: DevDoc,
    /// EVM-related compiler output
    #[serde(default)]
    pub evm: Option<EvmOutput>,
}

/// The devdoc section of a compiled contract
#[derive(Debug, Default, Deserialize)]
pub struct DevDoc {
    /// All devdoc entries; custom natspec tags appear under `custom:`-prefixed keys
    #[serde(flatten)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// The `evm` section of a compiled contract
#[derive(Debug, Deserialize)]
pub struct EvmOutput {
    /// The creation bytecode
    pub bytecode: Option<BytecodeOutput>,
}

/// The bytecode object of a compiled contract
#[derive(Debug, Deserialize)]
pub struct BytecodeOutput {
    /// Hex-encoded creation bytecode
    pub object: String,
}

/// A provider of [`ContractDescriptor`]s for qualified contract names
pub trait ContractMetadataSource {
    /// Returns the deployment attributes of the named contract
    fn descriptor(&self, qualified_name: &str) -> Result<ContractDescriptor, ScriptError>;
}

/// An in-memory index of compiled contracts, keyed by `path:name`
#[derive(Debug, Default)]
pub struct ArtifactStore {
    /// The compiled contracts, keyed by qualified name
    contracts: BTreeMap<String, ContractArtifact>,
}

impl ArtifactStore {
    /// Loads every build-output document in the given directory
    pub fn from_dir(dir: &Path) -> Result<Self, ScriptError> {
        let mut store = Self::default();
        let entries = fs::read_dir(dir).map_err(|e| ScriptError::ReadFile(e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| ScriptError::ReadFile(e.to_string()))?.path();
            if !path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
                continue;
            }
            let contents =
                fs::read_to_string(&path).map_err(|e| ScriptError::ReadFile(e.to_string()))?;
            let build_info: BuildInfo = serde_json::from_str(&contents).map_err(|e| {
                ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e))
            })?;
            store.insert_build_info(build_info);
        }
        Ok(store)
    }

    /// Indexes the contracts of one build-output document
    pub fn insert_build_info(&mut self, build_info: BuildInfo) {
        for (path, contracts) in build_info.output.contracts {
            for (name, artifact) in contracts {
                self.contracts.insert(format!("{}:{}", path, name), artifact);
            }
        }
    }

    /// All known qualified contract names, in deterministic order
    pub fn qualified_names(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    /// Resolves a bare contract name to its qualified `path:name` form
    pub fn qualify(&self, name: &str) -> Result<String, ScriptError> {
        self.contracts
            .keys()
            .find(|qualified| {
                split_qualified_name(qualified).is_ok_and(|(_, contract)| contract == name)
            })
            .cloned()
            .ok_or_else(|| {
                ScriptError::MetadataNotFound(format!("no build output for contract `{}`", name))
            })
    }

    /// The compiled output of the named contract
    pub fn artifact(&self, qualified_name: &str) -> Result<&ContractArtifact, ScriptError> {
        self.contracts.get(qualified_name).ok_or_else(|| {
            ScriptError::MetadataNotFound(format!(
                "no build output for contract `{}`",
                qualified_name
            ))
        })
    }

    /// The value of a custom natspec tag on the named contract.
    ///
    /// Absence is fatal: the caller asked for metadata the contract is
    /// required to carry.
    pub fn natspec_tag(&self, qualified_name: &str, tag: &str) -> Result<&str, ScriptError> {
        self.optional_natspec_tag(qualified_name, tag)?
            .ok_or_else(|| {
                ScriptError::MetadataNotFound(format!(
                    "failed to get natspec tag `{}` for `{}`",
                    tag, qualified_name
                ))
            })
    }

    /// The value of a custom natspec tag on the named contract, if present
    pub fn optional_natspec_tag(
        &self,
        qualified_name: &str,
        tag: &str,
    ) -> Result<Option<&str>, ScriptError> {
        let artifact = self.artifact(qualified_name)?;
        Ok(artifact
            .devdoc
            .tags
            .get(&format!("{}{}", CUSTOM_TAG_PREFIX, tag))
            .and_then(|value| value.as_str()))
    }

    /// The creation bytecode of the named contract
    pub fn creation_bytecode(&self, qualified_name: &str) -> Result<Vec<u8>, ScriptError> {
        let artifact = self.artifact(qualified_name)?;
        let object = artifact
            .evm
            .as_ref()
            .and_then(|evm| evm.bytecode.as_ref())
            .map(|bytecode| bytecode.object.as_str())
            .ok_or_else(|| {
                ScriptError::ArtifactParsing(format!(
                    "no creation bytecode for `{}`",
                    qualified_name
                ))
            })?;
        hex::decode(object.trim_start_matches("0x"))
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", qualified_name, e)))
    }

    /// Whether the named contract declares an `initialize` method
    pub fn is_initializable(&self, qualified_name: &str) -> Result<bool, ScriptError> {
        let artifact = self.artifact(qualified_name)?;
        Ok(artifact.abi.functions.contains_key(INITIALIZER_FN))
    }

    /// Whether the named contract's constructor takes any arguments
    pub fn has_constructor_args(&self, qualified_name: &str) -> Result<bool, ScriptError> {
        let artifact = self.artifact(qualified_name)?;
        Ok(artifact
            .abi
            .constructor
            .as_ref()
            .is_some_and(|constructor| !constructor.inputs.is_empty()))
    }
}

impl ContractMetadataSource for ArtifactStore {
    fn descriptor(&self, qualified_name: &str) -> Result<ContractDescriptor, ScriptError> {
        let (_, name) = split_qualified_name(qualified_name)?;
        let deploy_type = self.natspec_tag(qualified_name, DEPLOY_TYPE_TAG)?.parse()?;
        let deploy_group = self
            .optional_natspec_tag(qualified_name, DEPLOY_GROUP_TAG)?
            .map(str::to_string);
        let deploy_group_index = self
            .optional_natspec_tag(qualified_name, DEPLOY_GROUP_INDEX_TAG)?
            .map(|index| {
                index.parse::<u32>().map_err(|e| {
                    ScriptError::ArtifactParsing(format!(
                        "bad `{}` tag on `{}`: {}",
                        DEPLOY_GROUP_INDEX_TAG, qualified_name, e
                    ))
                })
            })
            .transpose()?;
        let salt = self
            .optional_natspec_tag(qualified_name, SALT_TAG)?
            .map(str::to_string);

        Ok(ContractDescriptor {
            qualified_name: qualified_name.to_string(),
            name: name.to_string(),
            deploy_type,
            deploy_group,
            deploy_group_index,
            salt,
            initializable: self.is_initializable(qualified_name)?,
            has_constructor_args: self.has_constructor_args(qualified_name)?,
            constructor_args: vec![],
            initializer_args: None,
            raw_record: None,
        })
    }
}

/// The number of colon-delimited fields in a flat descriptor record
const FLAT_RECORD_FIELDS: usize = 5;

/// An ordered list of flat descriptor records of the form
/// `path:name:deployType:initializableFlag:hasConstructorArgsFlag`
#[derive(Debug, Default)]
pub struct DeploymentList {
    /// Parsed descriptors, keyed by qualified name
    descriptors: BTreeMap<String, ContractDescriptor>,
    /// Qualified names in file order
    order: Vec<String>,
}

impl DeploymentList {
    /// Reads and parses a deployment-list file
    pub fn read(path: &Path) -> Result<Self, ScriptError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ScriptError::ReadFile(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parses deployment-list text, one record per line.
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut list = Self::default();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let descriptor = Self::parse_record(line).map_err(|e| {
                ScriptError::ArtifactParsing(format!("line {}: {}", line_number + 1, e))
            })?;
            list.order.push(descriptor.qualified_name.clone());
            list.descriptors
                .insert(descriptor.qualified_name.clone(), descriptor);
        }
        Ok(list)
    }

    /// Qualified contract names in file order
    pub fn qualified_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Parses one flat descriptor record
    fn parse_record(record: &str) -> Result<ContractDescriptor, ScriptError> {
        let fields: Vec<&str> = record.split(':').collect();
        if fields.len() != FLAT_RECORD_FIELDS {
            return Err(ScriptError::ArtifactParsing(format!(
                "expected {} fields in `{}`, got {}",
                FLAT_RECORD_FIELDS,
                record,
                fields.len()
            )));
        }

        let parse_flag = |field: &str, what: &str| {
            field.parse::<bool>().map_err(|_| {
                ScriptError::ArtifactParsing(format!("bad {} flag `{}` in `{}`", what, field, record))
            })
        };

        Ok(ContractDescriptor {
            qualified_name: format!("{}:{}", fields[0], fields[1]),
            name: fields[1].to_string(),
            deploy_type: fields[2].parse()?,
            deploy_group: None,
            deploy_group_index: None,
            salt: None,
            initializable: parse_flag(fields[3], "initializable")?,
            has_constructor_args: parse_flag(fields[4], "constructor-args")?,
            constructor_args: vec![],
            initializer_args: None,
            raw_record: Some(record.to_string()),
        })
    }
}

impl ContractMetadataSource for DeploymentList {
    fn descriptor(&self, qualified_name: &str) -> Result<ContractDescriptor, ScriptError> {
        self.descriptors.get(qualified_name).cloned().ok_or_else(|| {
            ScriptError::MetadataNotFound(format!(
                "no deployment-list record for `{}`",
                qualified_name
            ))
        })
    }
}
