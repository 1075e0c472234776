use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod extract;

pub use config::ProvisionConfig;
pub use error::ProvisionError;

// --- Enums ---

/// How the public network is obtained for a run.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPolicy {
    Reuse,        // Look up by name, create only if absent
    CreateAlways, // Fresh timestamp-suffixed network every run
}

impl NetworkPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reuse" | "check-then-create" => Some(NetworkPolicy::Reuse),
            "create-always" | "always" => Some(NetworkPolicy::CreateAlways),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkPolicy::Reuse => "reuse",
            NetworkPolicy::CreateAlways => "create-always",
        }
    }
}

/// What rollback does with a network created during the failed run.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkCleanup {
    Preserve,
    Delete,
}

impl NetworkCleanup {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preserve" | "keep" => Some(NetworkCleanup::Preserve),
            "delete" => Some(NetworkCleanup::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkCleanup::Preserve => "preserve",
            NetworkCleanup::Delete => "delete",
        }
    }
}

/// Status values after which an LPAR will not change without operator action.
pub const TERMINAL_STATUSES: &[&str] = &["SHUTOFF", "STOPPED"];

pub fn is_terminal_status(status: &str) -> bool {
    let s = status.trim().to_ascii_uppercase();
    TERMINAL_STATUSES.iter().any(|t| *t == s)
}

// --- Provisioning request ---

/// Shape of the LPAR, as configured. Networks are resolved at runtime.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LparSpec {
    pub name: String,
    pub memory_gb: f64,
    pub processors: f64,
    pub proc_type: String,
    pub sys_type: String,
    pub image_id: String,
    pub deployment_type: String,
    pub key_pair_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    #[serde(rename = "networkID")]
    pub network_id: String,
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Body of the compute API create call. Built once per run and never mutated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProvisioningRequest {
    #[serde(rename = "serverName")]
    pub server_name: String,
    pub memory: f64,
    pub processors: f64,
    #[serde(rename = "procType")]
    pub proc_type: String,
    #[serde(rename = "sysType")]
    pub sys_type: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    #[serde(rename = "deploymentType")]
    pub deployment_type: String,
    #[serde(rename = "keyPairName", skip_serializing_if = "Option::is_none")]
    pub key_pair_name: Option<String>,
    pub networks: Vec<NetworkAttachment>,
}

impl ProvisioningRequest {
    pub fn new(spec: &LparSpec, networks: Vec<NetworkAttachment>) -> Self {
        Self {
            server_name: spec.name.clone(),
            memory: spec.memory_gb,
            processors: spec.processors,
            proc_type: spec.proc_type.clone(),
            sys_type: spec.sys_type.clone(),
            image_id: spec.image_id.clone(),
            deployment_type: spec.deployment_type.clone(),
            key_pair_name: spec.key_pair_name.clone(),
            networks,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain owned fields only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
