use std::env;
use std::sync::Arc;

use powervs_common::{ProvisionConfig, ProvisionError};
use powervs_providers::{JobRunner, PowerProvider};

/// Platform and downstream job service for one run.
pub struct Providers {
    pub power: Arc<dyn PowerProvider>,
    pub jobs: Arc<dyn JobRunner>,
}

pub struct ProviderManager;

impl ProviderManager {
    pub fn cli_binary() -> String {
        env::var("IBMCLOUD_CLI")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "ibmcloud".to_string())
    }

    pub fn get_providers(cfg: &ProvisionConfig) -> Result<Providers, ProvisionError> {
        match cfg.provider.as_str() {
            #[cfg(feature = "provider-ibm")]
            "ibm" => {
                use powervs_providers::ibm::{CodeEngineRunner, IbmPowerProvider, IbmSettings};

                let cli_binary = Self::cli_binary();
                let power = IbmPowerProvider::new(IbmSettings {
                    api_endpoint: cfg.api_endpoint.clone(),
                    cloud_instance_id: cfg.cloud_instance_id.clone(),
                    workspace_crn: cfg.workspace_crn.clone(),
                    api_version: cfg.api_version.clone(),
                    iam_token_url: cfg.iam_token_url.clone(),
                    http_timeout: cfg.http_timeout,
                    cli_binary: cli_binary.clone(),
                })
                .map_err(|e| ProvisionError::Config(format!("{:#}", e)))?;
                Ok(Providers {
                    power: Arc::new(power),
                    jobs: Arc::new(CodeEngineRunner::new(cli_binary)),
                })
            }
            #[cfg(feature = "provider-mock")]
            "mock" => {
                let mock = Arc::new(powervs_providers::mock::MockProvider::new());
                Ok(Providers {
                    power: mock.clone(),
                    jobs: mock,
                })
            }
            other => Err(ProvisionError::Config(format!(
                "unknown or disabled PROVIDER '{}'",
                other
            ))),
        }
    }
}
