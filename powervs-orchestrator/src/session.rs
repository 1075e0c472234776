use powervs_common::{ProvisionConfig, ProvisionError};
use powervs_providers::PowerProvider;
use tracing::info;

use crate::state_machine::RunState;

/// Log in, set the resource-group and workspace targets, then fetch a bearer
/// token for the REST calls. Nothing here is retried: a bad credential will
/// not get better within one run.
pub async fn authenticate(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    state: &mut RunState,
) -> Result<(), ProvisionError> {
    if cfg.api_key.trim().is_empty() {
        return Err(ProvisionError::Config(
            "IBMCLOUD_API_KEY must be set".to_string(),
        ));
    }

    info!("🔐 Logging in to IBM Cloud (region {})", cfg.region);
    provider
        .login(&cfg.api_key, &cfg.region)
        .await
        .map_err(|e| ProvisionError::auth("login", format!("{:#}", e)))?;

    provider
        .target_resource_group(&cfg.resource_group)
        .await
        .map_err(|e| ProvisionError::auth("resource group targeting", format!("{:#}", e)))?;

    provider
        .target_workspace(&cfg.workspace_crn)
        .await
        .map_err(|e| ProvisionError::auth("workspace targeting", format!("{:#}", e)))?;

    let token = provider
        .exchange_token(&cfg.api_key)
        .await
        .map_err(|e| ProvisionError::auth("token exchange", format!("{:#}", e)))?;
    state.set_access_token(token);

    info!(
        "✅ Session ready: resource group '{}', workspace {}",
        cfg.resource_group, cfg.cloud_instance_id
    );
    Ok(())
}
