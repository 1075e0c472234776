use powervs_common::NetworkCleanup;
use powervs_providers::PowerProvider;
use tracing::{error, info, warn};

use crate::state_machine::{RunState, Step};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Nothing of this kind was created by the run.
    Skipped,
    Deleted(String),
    /// Created by the run but kept on purpose.
    Preserved(String),
    /// Deletion attempted and failed; an operator has to clean up.
    Failed { id: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub failed_step: Step,
    pub instance: CleanupOutcome,
    pub network: CleanupOutcome,
}

impl RollbackReport {
    pub fn needs_manual_intervention(&self) -> bool {
        matches!(self.instance, CleanupOutcome::Failed { .. })
            || matches!(self.network, CleanupOutcome::Failed { .. })
    }
}

/// Compensation for a partially provisioned run.
///
/// Armed once authentication succeeds, disarmed once polling succeeds.
/// While armed, a failing stage hands the guard to [`RollbackGuard::compensate`],
/// which deletes what the run recorded. Deletion errors are logged, never
/// returned. Cleanup is async, so it cannot happen in `Drop`; dropping an
/// armed guard only warns.
pub struct RollbackGuard {
    armed: bool,
    network_cleanup: NetworkCleanup,
}

impl RollbackGuard {
    pub fn arm(network_cleanup: NetworkCleanup) -> Self {
        Self {
            armed: true,
            network_cleanup,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn disarm(&mut self) {
        if self.armed {
            info!("🛡️ Rollback disarmed");
        }
        self.armed = false;
    }

    /// Delete the run's partial resources. Returns `None` if disarmed.
    pub async fn compensate(
        mut self,
        provider: &dyn PowerProvider,
        state: &RunState,
    ) -> Option<RollbackReport> {
        if !self.armed {
            return None;
        }
        self.armed = false;

        let failed_step = state.step();
        warn!("⏪ Rolling back: failure during step '{}'", failed_step);

        let instance = match state.instance_id.as_deref() {
            Some(id) => {
                info!("🗑️ Deleting LPAR {}", id);
                match provider.delete_instance(id).await {
                    Ok(()) => {
                        info!("✅ LPAR {} deleted", id);
                        CleanupOutcome::Deleted(id.to_string())
                    }
                    Err(e) => {
                        error!(
                            "❌ Failed to delete LPAR {}: {:#} - manual intervention required",
                            id, e
                        );
                        CleanupOutcome::Failed {
                            id: id.to_string(),
                            error: format!("{:#}", e),
                        }
                    }
                }
            }
            None => {
                info!("ℹ️ No LPAR ID recorded, skipping LPAR cleanup");
                CleanupOutcome::Skipped
            }
        };

        let network = match (state.created_network_id.as_deref(), self.network_cleanup) {
            (None, _) => CleanupOutcome::Skipped,
            (Some(id), NetworkCleanup::Preserve) => {
                info!(
                    "ℹ️ Keeping public network {} as a reusable resource",
                    id
                );
                CleanupOutcome::Preserved(id.to_string())
            }
            (Some(id), NetworkCleanup::Delete) => {
                info!("🗑️ Deleting public network {}", id);
                match provider.delete_network(id).await {
                    Ok(()) => {
                        info!("✅ Network {} deleted", id);
                        CleanupOutcome::Deleted(id.to_string())
                    }
                    Err(e) => {
                        error!(
                            "❌ Failed to delete network {}: {:#} - manual intervention required",
                            id, e
                        );
                        CleanupOutcome::Failed {
                            id: id.to_string(),
                            error: format!("{:#}", e),
                        }
                    }
                }
            }
        };

        Some(RollbackReport {
            failed_step,
            instance,
            network,
        })
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("⚠️ Rollback guard dropped while armed; created resources may need manual cleanup");
        }
    }
}
