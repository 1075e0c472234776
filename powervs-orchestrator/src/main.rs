use std::process::ExitCode;

use powervs_common::ProvisionConfig;
use powervs_orchestrator::pipeline;
use powervs_orchestrator::provider_manager::ProviderManager;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = match ProvisionConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ {}", e);
            return ExitCode::from(e.exit_code());
        }
    };
    info!("✅ Configuration loaded: {:?}", cfg);

    let providers = match ProviderManager::get_providers(&cfg) {
        Ok(p) => p,
        Err(e) => {
            error!("❌ {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let outcome = pipeline::run(&cfg, providers.power.as_ref(), providers.jobs.as_ref()).await;
    ExitCode::from(outcome.exit_code())
}
