use anyhow::Result;
use async_trait::async_trait;

/// Control-plane and compute operations the provisioning pipeline needs from
/// the platform. All calls are awaited one at a time by the caller.
#[async_trait]
pub trait PowerProvider: Send + Sync {
    /// Establish an authenticated CLI session in `region`.
    async fn login(&self, api_key: &str, region: &str) -> Result<()>;
    async fn target_resource_group(&self, resource_group: &str) -> Result<()>;
    async fn target_workspace(&self, workspace_crn: &str) -> Result<()>;

    /// Exchange the credential for a bearer token at the identity service.
    /// Needed because instance creation goes over REST, not the CLI session.
    async fn exchange_token(&self, api_key: &str) -> Result<String>;

    async fn list_networks(&self) -> Result<Vec<inventory::NetworkSummary>>;

    /// Returns the raw JSON document; callers pick the id out of it since the
    /// key name varies.
    async fn create_network(&self, name: &str, net_type: &str) -> Result<serde_json::Value>;
    async fn delete_network(&self, network_id: &str) -> Result<()>;

    /// POST the create body. `Err` means the transport call itself failed.
    /// A completed call returns the raw body whatever the HTTP status.
    async fn create_instance(
        &self,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<inventory::RawResponse>;

    async fn get_instance(&self, instance_id: &str) -> Result<inventory::InstanceDetails>;
    async fn delete_instance(&self, instance_id: &str) -> Result<()>;
}

/// Downstream job-running service used by the chain trigger.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn target_resource_group(&self, resource_group: &str) -> Result<()>;
    async fn select_project(&self, project: &str) -> Result<()>;
    /// Submit a run of `job`; returns the raw JSON document.
    async fn submit_job(&self, job: &str) -> Result<serde_json::Value>;
}

pub mod inventory {
    use serde_json::Value;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct NetworkSummary {
        pub name: String,
        pub id: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct RawResponse {
        pub status: u16,
        pub body: String,
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct InstanceDetails {
        pub status: Option<String>,
        pub external_ip: Option<String>,
        pub raw: Value,
    }

    /// Accepts `{"networks": [...]}` or a bare array, each entry carrying
    /// `name` and `networkID` (or `id`).
    pub fn networks_from_json(doc: &Value) -> Vec<NetworkSummary> {
        let entries = doc
            .get("networks")
            .and_then(|v| v.as_array())
            .or_else(|| doc.as_array());
        let Some(entries) = entries else {
            return vec![];
        };
        entries
            .iter()
            .filter_map(|n| {
                let name = n.get("name").and_then(|v| v.as_str())?.to_string();
                let id = ["networkID", "id"]
                    .iter()
                    .find_map(|k| n.get(*k).and_then(|v| v.as_str()))
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string());
                Some(NetworkSummary { name, id })
            })
            .collect()
    }

    /// `status` plus the first non-empty `networks[].externalIP`.
    pub fn instance_details_from_json(doc: Value) -> InstanceDetails {
        let status = doc
            .get("status")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let external_ip = doc
            .get("networks")
            .and_then(|v| v.as_array())
            .and_then(|nets| {
                nets.iter().find_map(|n| {
                    n.get("externalIP")
                        .and_then(|v| v.as_str())
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                })
            });
        InstanceDetails {
            status,
            external_ip,
            raw: doc,
        }
    }

}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "ibm")]
pub mod ibm;
