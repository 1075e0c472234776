use powervs_common::config::ChainConfig;
use powervs_common::extract::{first_string, JOB_RUN_ID_STRATEGIES};
use powervs_common::ProvisionError;
use powervs_providers::JobRunner;
use tracing::info;

use crate::state_machine::RunState;

/// Submit the downstream job. Runs after rollback is disarmed, so a failure
/// here is reported as-is and the provisioned LPAR stays where it is.
pub async fn trigger(
    chain: &ChainConfig,
    runner: &dyn JobRunner,
    state: &mut RunState,
) -> Result<String, ProvisionError> {
    let fail = |message: String| ProvisionError::ChainTrigger {
        message,
        raw_response: None,
    };

    info!(
        "🔗 Chaining to job '{}' in project '{}' (resource group '{}')",
        chain.job, chain.project, chain.resource_group
    );
    runner
        .target_resource_group(&chain.resource_group)
        .await
        .map_err(|e| fail(format!("targeting resource group '{}': {:#}", chain.resource_group, e)))?;
    runner
        .select_project(&chain.project)
        .await
        .map_err(|e| fail(format!("selecting project '{}': {:#}", chain.project, e)))?;

    let doc = runner
        .submit_job(&chain.job)
        .await
        .map_err(|e| fail(format!("submitting job '{}': {:#}", chain.job, e)))?;

    let run_id = first_string(&doc, JOB_RUN_ID_STRATEGIES).ok_or_else(|| {
        ProvisionError::ChainTrigger {
            message: format!("no run id in submission response for job '{}'", chain.job),
            raw_response: Some(doc.to_string()),
        }
    })?;

    info!("✅ Job run submitted: {}", run_id);
    state.chain_run_id = Some(run_id.clone());
    Ok(run_id)
}
