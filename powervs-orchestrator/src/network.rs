use chrono::{DateTime, Utc};
use powervs_common::extract::{first_string, NETWORK_ID_STRATEGIES};
use powervs_common::{NetworkPolicy, ProvisionConfig, ProvisionError};
use powervs_providers::PowerProvider;
use tracing::info;

use crate::state_machine::RunState;

pub const PUBLIC_NET_TYPE: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredNetwork {
    pub id: String,
    pub name: String,
    pub created: bool,
}

/// Make sure a public network exists and return it.
///
/// - `reuse`: look up by exact name; the first match with a usable id wins
///   and no create call is made. Otherwise create one with that name.
/// - `create-always`: create `<name>-<UTC timestamp>` every run.
///
/// A created network is recorded in `state.created_network_id` so rollback
/// can decide what to do with it.
pub async fn ensure_public_network(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    state: &mut RunState,
) -> Result<EnsuredNetwork, ProvisionError> {
    let ensured = match cfg.network_policy {
        NetworkPolicy::Reuse => {
            let name = cfg.public_network_name.as_str();
            let existing = provider.list_networks().await.map_err(|e| ProvisionError::Network {
                message: format!("listing networks: {:#}", e),
                raw_response: None,
            })?;

            match existing
                .into_iter()
                .find(|n| n.name == name)
                .and_then(|n| n.id)
            {
                Some(id) => {
                    info!("♻️ Reusing public network '{}' ({})", name, id);
                    EnsuredNetwork {
                        id,
                        name: name.to_string(),
                        created: false,
                    }
                }
                None => create(provider, name, state).await?,
            }
        }
        NetworkPolicy::CreateAlways => {
            let name = timestamped_name(&cfg.public_network_name, Utc::now());
            create(provider, &name, state).await?
        }
    };

    state.network_id = Some(ensured.id.clone());
    Ok(ensured)
}

async fn create(
    provider: &dyn PowerProvider,
    name: &str,
    state: &mut RunState,
) -> Result<EnsuredNetwork, ProvisionError> {
    info!("🌐 Creating public network '{}'", name);
    let doc = provider
        .create_network(name, PUBLIC_NET_TYPE)
        .await
        .map_err(|e| ProvisionError::Network {
            message: format!("creating network '{}': {:#}", name, e),
            raw_response: None,
        })?;

    let id = first_string(&doc, NETWORK_ID_STRATEGIES).ok_or_else(|| ProvisionError::Network {
        message: format!("no network id in create response for '{}'", name),
        raw_response: Some(doc.to_string()),
    })?;

    info!("✅ Public network '{}' created: {}", name, id);
    state.created_network_id = Some(id.clone());
    Ok(EnsuredNetwork {
        id,
        name: name.to_string(),
        created: true,
    })
}

pub fn timestamped_name(base: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", base, now.format("%Y%m%d%H%M%S"))
}
