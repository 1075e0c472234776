use powervs_common::{is_terminal_status, ProvisionConfig, ProvisionError};
use powervs_providers::PowerProvider;
use tokio::time::sleep;
use tracing::{info, warn};

pub const PENDING_IP_PLACEHOLDER: &str = "pending (may appear after a few more minutes)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: String,
    pub external_ip: Option<String>,
    /// Non-terminal observations before the terminal one.
    pub attempts: u32,
    /// Failed queries; these never count against the budget.
    pub query_failures: u32,
}

/// Wait for the LPAR to reach `SHUTOFF`/`STOPPED`.
///
/// Sleeps `poll_initial_wait` first, then queries every `poll_interval`.
/// Only observed non-terminal statuses consume the `poll_max_attempts`
/// budget; a failed query is retried after the interval for free.
pub async fn wait_for_terminal(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    instance_id: &str,
) -> Result<PollOutcome, ProvisionError> {
    info!(
        "⏳ Waiting {}s before polling LPAR {} (every {}s, max {} attempts)",
        cfg.poll_initial_wait.as_secs(),
        instance_id,
        cfg.poll_interval.as_secs(),
        cfg.poll_max_attempts
    );
    sleep(cfg.poll_initial_wait).await;

    let mut attempts = 0u32;
    let mut query_failures = 0u32;
    loop {
        let details = match provider.get_instance(instance_id).await {
            Ok(details) => details,
            Err(e) => {
                query_failures += 1;
                warn!(
                    "⚠️ Status query for LPAR {} failed ({:#}); retrying, not counted",
                    instance_id, e
                );
                sleep(cfg.poll_interval).await;
                continue;
            }
        };

        let status = details.status.unwrap_or_else(|| "UNKNOWN".to_string());
        if is_terminal_status(&status) {
            info!("✅ LPAR {} reached terminal status {}", instance_id, status);
            return Ok(PollOutcome {
                status,
                external_ip: details.external_ip,
                attempts,
                query_failures,
            });
        }

        attempts += 1;
        info!(
            "🔍 LPAR {} status={} ({}/{})",
            instance_id, status, attempts, cfg.poll_max_attempts
        );
        if attempts >= cfg.poll_max_attempts {
            return Err(ProvisionError::PollTimeout {
                instance_id: instance_id.to_string(),
                attempts,
                last_status: status,
            });
        }
        sleep(cfg.poll_interval).await;
    }
}

/// Best-effort external IP: use what the terminal observation saw, otherwise
/// ask once more, otherwise report a placeholder. Never fails.
pub async fn enrich_external_ip(
    provider: &dyn PowerProvider,
    instance_id: &str,
    observed: Option<String>,
) -> String {
    if let Some(ip) = observed {
        return ip;
    }
    match provider.get_instance(instance_id).await {
        Ok(details) => match details.external_ip {
            Some(ip) => {
                info!("🌍 External IP for LPAR {}: {}", instance_id, ip);
                ip
            }
            None => PENDING_IP_PLACEHOLDER.to_string(),
        },
        Err(e) => {
            warn!(
                "⚠️ Could not re-query LPAR {} for its external IP: {:#}",
                instance_id, e
            );
            PENDING_IP_PLACEHOLDER.to_string()
        }
    }
}
