use std::time::Instant;

use powervs_common::ProvisionError;
use tracing::{error, info};
use uuid::Uuid;

/// Simple action logger: one line when a stage starts, one when it ends
/// (with duration). The log id ties the two lines together.
pub struct ActionLog {
    log_id: Uuid,
    run_id: Uuid,
    action_type: &'static str,
    started: Instant,
}

/// Log event with metadata (context info)
pub fn log_event_with_metadata(
    action_type: &'static str,
    run_id: Uuid,
    metadata: Option<serde_json::Value>,
) -> ActionLog {
    let log_id = Uuid::new_v4();
    match metadata {
        Some(meta) => info!(
            "📝 [{}] in_progress run={} log={} {}",
            action_type, run_id, log_id, meta
        ),
        None => info!("📝 [{}] in_progress run={} log={}", action_type, run_id, log_id),
    }
    ActionLog {
        log_id,
        run_id,
        action_type,
        started: Instant::now(),
    }
}

impl ActionLog {
    /// Log event completion with duration
    pub fn complete(self, status: &str, error_message: Option<&str>) {
        let duration_ms = self.started.elapsed().as_millis();
        match error_message {
            Some(msg) => error!(
                "📝 [{}] {} run={} log={} duration_ms={} error={}",
                self.action_type, status, self.run_id, self.log_id, duration_ms, msg
            ),
            None => info!(
                "📝 [{}] {} run={} log={} duration_ms={}",
                self.action_type, status, self.run_id, self.log_id, duration_ms
            ),
        }
    }

    /// Complete from a stage result.
    pub fn finish<T>(self, result: &Result<T, ProvisionError>) {
        match result {
            Ok(_) => self.complete("success", None),
            Err(e) => self.complete("failed", Some(&e.to_string())),
        }
    }
}

/// Quick log for one-off events (like state transitions)
pub fn log_quick(action_type: &str, run_id: Uuid, details: &str) {
    info!("📝 [{}] run={} {}", action_type, run_id, details);
}
