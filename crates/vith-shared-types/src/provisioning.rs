use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SharedResult, SharedTypeError};

/// Raw provisioning entry as written in the project configuration:
/// a `type` tag plus free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ProvisioningSpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsibleStep {
    pub playbook: PathBuf,
    #[serde(default)]
    pub extra_vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellStep {
    pub script: String,
}

/// A provisioning step the provisioner knows how to run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningItem {
    Ansible(AnsibleStep),
    Shell(ShellStep),
}

impl ProvisioningItem {
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningItem::Ansible(_) => "ansible",
            ProvisioningItem::Shell(_) => "shell",
        }
    }

    /// Decode every spec, failing on the first unknown or malformed one.
    pub fn decode_all(specs: &[ProvisioningSpec]) -> SharedResult<Vec<ProvisioningItem>> {
        specs.iter().map(ProvisioningItem::try_from).collect()
    }
}

fn decode_params<T: DeserializeOwned>(spec: &ProvisioningSpec) -> SharedResult<T> {
    serde_json::from_value(Value::Object(spec.params.clone())).map_err(|e| {
        SharedTypeError::InvalidParameters {
            kind: spec.kind.clone(),
            reason: e.to_string(),
        }
    })
}

impl TryFrom<&ProvisioningSpec> for ProvisioningItem {
    type Error = SharedTypeError;

    fn try_from(spec: &ProvisioningSpec) -> SharedResult<Self> {
        match spec.kind.as_str() {
            "ansible" => Ok(ProvisioningItem::Ansible(decode_params(spec)?)),
            "shell" => Ok(ProvisioningItem::Shell(decode_params(spec)?)),
            other => Err(SharedTypeError::UnknownProvisioningKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Whether minimal OS preparation runs before provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Barebone {
    Force,
    Skip,
    /// Prepare only when the container was never provisioned.
    #[default]
    Auto,
}

impl Barebone {
    pub fn resolve(self, provisioned: bool) -> bool {
        match self {
            Barebone::Force => true,
            Barebone::Skip => false,
            Barebone::Auto => !provisioned,
        }
    }
}
