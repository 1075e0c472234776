use powervs_common::{NetworkAttachment, ProvisionConfig, ProvisionError, ProvisioningRequest};
use powervs_providers::{JobRunner, PowerProvider};
use serde_json::json;
use tracing::{error, info, warn};

use crate::logger;
use crate::rollback::{RollbackGuard, RollbackReport};
use crate::state_machine::{RunState, Step};
use crate::{chain, network, poller, provisioning, session};

/// Result of one run: final state, the fatal error if any, and what rollback did.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub error: Option<ProvisionError>,
    pub rollback: Option<RollbackReport>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.state.success
    }

    pub fn exit_code(&self) -> u8 {
        match &self.error {
            None => 0,
            Some(e) => e.exit_code(),
        }
    }
}

/// Run the whole pipeline once.
pub async fn run(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    jobs: &dyn JobRunner,
) -> RunOutcome {
    let mut state = RunState::new();
    info!(
        "🚀 Provisioning run {} for LPAR '{}' (provider={}, dual-homed={}, network policy={}, rollback network={})",
        state.run_id,
        cfg.lpar.name,
        cfg.provider,
        cfg.is_dual_homed(),
        cfg.network_policy.as_str(),
        cfg.rollback_network.as_str()
    );

    state.enter(Step::Authenticate);
    let action = logger::log_event_with_metadata(
        "AUTHENTICATE",
        state.run_id,
        Some(json!({"region": cfg.region, "resource_group": cfg.resource_group})),
    );
    let auth = session::authenticate(cfg, provider, &mut state).await;
    action.finish(&auth);
    if let Err(e) = auth {
        // Nothing exists yet, so there is nothing to roll back.
        return fail(state, e, None);
    }

    let mut guard = RollbackGuard::arm(cfg.rollback_network);
    if let Err(e) = provision(cfg, provider, &mut state).await {
        let report = guard.compensate(provider, &state).await;
        return fail(state, e, report);
    }
    guard.disarm();

    match &cfg.chain {
        Some(chain_cfg) => {
            state.enter(Step::ChainTrigger);
            let action = logger::log_event_with_metadata(
                "CHAIN_TRIGGER",
                state.run_id,
                Some(json!({"project": chain_cfg.project, "job": chain_cfg.job})),
            );
            let res = chain::trigger(chain_cfg, jobs, &mut state).await;
            action.finish(&res);
            if let Err(e) = res {
                return fail(state, e, None);
            }
        }
        None => info!(
            "ℹ️ Chain trigger disabled; LPAR left in {} for manual follow-up",
            state.final_status.as_deref().unwrap_or("its terminal state")
        ),
    }

    state.enter(Step::Complete);
    state.success = true;
    log_summary(cfg, &state);
    RunOutcome {
        state,
        error: None,
        rollback: None,
    }
}

/// The rollback-guarded stages: network, create, poll.
async fn provision(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    state: &mut RunState,
) -> Result<(), ProvisionError> {
    state.enter(Step::Network);
    let action = logger::log_event_with_metadata(
        "ENSURE_NETWORK",
        state.run_id,
        Some(json!({"name": cfg.public_network_name, "policy": cfg.network_policy.as_str()})),
    );
    let res = network::ensure_public_network(cfg, provider, state).await;
    action.finish(&res);
    let public = res?;

    let mut networks = Vec::new();
    if let Some(private) = &cfg.private_network {
        networks.push(private.clone());
    }
    networks.push(NetworkAttachment {
        network_id: public.id.clone(),
        ip_address: None,
    });
    let request = ProvisioningRequest::new(&cfg.lpar, networks);

    state.enter(Step::CreateInstance);
    let action = logger::log_event_with_metadata(
        "CREATE_LPAR",
        state.run_id,
        Some(json!({"name": request.server_name, "max_attempts": cfg.create_max_attempts})),
    );
    let res = provisioning::create_instance(cfg, provider, &request, state).await;
    action.finish(&res);
    let instance_id = res?;

    state.enter(Step::Poll);
    let action = logger::log_event_with_metadata(
        "POLL_STATUS",
        state.run_id,
        Some(json!({"instance_id": instance_id, "max_attempts": cfg.poll_max_attempts})),
    );
    let res = poller::wait_for_terminal(cfg, provider, &instance_id).await;
    action.finish(&res);
    let outcome = res?;

    state.final_status = Some(outcome.status);
    // The public network is attached on every run, private or not.
    let ip = poller::enrich_external_ip(provider, &instance_id, outcome.external_ip).await;
    state.external_ip = Some(ip);
    Ok(())
}

fn fail(state: RunState, error: ProvisionError, rollback: Option<RollbackReport>) -> RunOutcome {
    error!("❌ Run {} failed at step '{}': {}", state.run_id, state.step(), error);
    if let Some(raw) = error.raw_response() {
        error!("❌ Raw response: {}", raw);
    }
    if let Some(report) = &rollback {
        info!(
            "⏪ Rollback summary: lpar={:?} network={:?}",
            report.instance, report.network
        );
        if report.needs_manual_intervention() {
            warn!("⚠️ Some resources could not be cleaned up; manual intervention required");
        }
    }
    RunOutcome {
        state,
        error: Some(error),
        rollback,
    }
}

fn log_summary(cfg: &ProvisionConfig, state: &RunState) {
    info!("========== Provisioning complete ==========");
    info!("Run:          {}", state.run_id);
    info!(
        "LPAR:         {} ({})",
        cfg.lpar.name,
        state.instance_id.as_deref().unwrap_or("-")
    );
    info!(
        "Status:       {}",
        state.final_status.as_deref().unwrap_or("-")
    );
    info!(
        "External IP:  {}",
        state.external_ip.as_deref().unwrap_or(poller::PENDING_IP_PLACEHOLDER)
    );
    info!(
        "Network:      {} ({})",
        state.network_id.as_deref().unwrap_or("-"),
        if state.created_network_id.is_some() {
            "created"
        } else {
            "reused"
        }
    );
    if let Some(private) = &cfg.private_network {
        info!(
            "Private net:  {} ({})",
            private.network_id,
            private.ip_address.as_deref().unwrap_or("dhcp")
        );
    }
    if let Some(run_id) = &state.chain_run_id {
        info!("Chained run:  {}", run_id);
    }
}
