use thiserror::Error;

/// Fatal outcomes of a provisioning run. Every variant exits the process with 1.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Missing or malformed settings. Raised before any remote call.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed during {stage}: {message}")]
    Auth { stage: String, message: String },

    #[error("network provisioning failed: {message}")]
    Network {
        message: String,
        raw_response: Option<String>,
    },

    #[error("LPAR creation failed after {attempts} attempt(s): {message}")]
    InstanceCreation {
        attempts: u32,
        message: String,
        last_response: Option<String>,
    },

    #[error(
        "LPAR {instance_id} did not reach a terminal status after {attempts} attempt(s) (last status: {last_status})"
    )]
    PollTimeout {
        instance_id: String,
        attempts: u32,
        last_status: String,
    },

    #[error("chain trigger failed: {message}")]
    ChainTrigger {
        message: String,
        raw_response: Option<String>,
    },
}

impl ProvisionError {
    pub fn auth(stage: &str, err: impl std::fmt::Display) -> Self {
        ProvisionError::Auth {
            stage: stage.to_string(),
            message: err.to_string(),
        }
    }

    /// Raw remote payload that could not be used, kept for manual diagnosis.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ProvisionError::Network { raw_response, .. } => raw_response.as_deref(),
            ProvisionError::InstanceCreation { last_response, .. } => last_response.as_deref(),
            ProvisionError::ChainTrigger { raw_response, .. } => raw_response.as_deref(),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_is_exposed_for_diagnosis() {
        let err = ProvisionError::InstanceCreation {
            attempts: 3,
            message: "no pvmInstanceID in response".into(),
            last_response: Some("{\"error\":\"quota\"}".into()),
        };
        assert_eq!(err.raw_response(), Some("{\"error\":\"quota\"}"));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("after 3 attempt(s)"));

        let err = ProvisionError::auth("token exchange", "401 Unauthorized");
        assert_eq!(err.raw_response(), None);
        assert_eq!(
            err.to_string(),
            "authentication failed during token exchange: 401 Unauthorized"
        );
    }
}
