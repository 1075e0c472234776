use std::fmt;

use powervs_common::{extract, ProvisionConfig, ProvisionError, ProvisioningRequest};
use powervs_providers::PowerProvider;
use tracing::{error, info};

use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};
use crate::state_machine::RunState;

/// Why a single create attempt did not yield an LPAR id.
#[derive(Debug)]
enum AttemptError {
    Transport(anyhow::Error),
    MissingId { status: u16, body: String },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(e) => write!(f, "transport error: {:#}", e),
            AttemptError::MissingId { status, .. } => {
                write!(f, "no pvmInstanceID in response (HTTP {})", status)
            }
        }
    }
}

/// Submit the create request and return the LPAR id.
///
/// Both transport failures and responses without an id are retried, up to
/// `cfg.create_max_attempts` with `cfg.create_backoff` in between. On success
/// the id is recorded in `state`, which arms LPAR deletion in rollback.
pub async fn create_instance(
    cfg: &ProvisionConfig,
    provider: &dyn PowerProvider,
    request: &ProvisioningRequest,
    state: &mut RunState,
) -> Result<String, ProvisionError> {
    let token = state
        .access_token()
        .ok_or_else(|| ProvisionError::InstanceCreation {
            attempts: 0,
            message: "no access token in session".to_string(),
            last_response: None,
        })?
        .to_string();
    let body = request.to_json();
    let policy = RetryPolicy {
        max_attempts: cfg.create_max_attempts,
        backoff: cfg.create_backoff,
    };

    info!(
        "🚀 Creating LPAR '{}' ({} GB, {} {} proc, {}, image {})",
        request.server_name,
        request.memory,
        request.processors,
        request.proc_type,
        request.sys_type,
        request.image_id
    );

    let token = token.as_str();
    let body = &body;
    let result = retry_with_backoff(
        policy,
        "LPAR create",
        move |attempt| async move {
            info!("🔵 LPAR create attempt {}/{}", attempt, policy.max_attempts);
            let resp = provider
                .create_instance(token, body)
                .await
                .map_err(AttemptError::Transport)?;
            extract::instance_id(&resp.body).ok_or(AttemptError::MissingId {
                status: resp.status,
                body: resp.body,
            })
        },
        |_| true,
    )
    .await;

    match result {
        Ok(id) => {
            info!("✅ LPAR created: {}", id);
            state.record_instance(&id);
            Ok(id)
        }
        Err(RetryError { attempts, last }) => {
            let last_response = match &last {
                AttemptError::MissingId { body, .. } => Some(body.clone()),
                AttemptError::Transport(_) => None,
            };
            error!(
                "❌ LPAR create gave up after {} attempt(s): {}",
                attempts, last
            );
            if let Some(raw) = &last_response {
                error!("❌ Last raw response: {}", raw);
            }
            Err(ProvisionError::InstanceCreation {
                attempts,
                message: last.to_string(),
                last_response,
            })
        }
    }
}
