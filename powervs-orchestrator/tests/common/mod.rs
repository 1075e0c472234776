// Common test fixtures
use std::collections::HashMap;

use powervs_common::ProvisionConfig;
use powervs_orchestrator::RunState;

pub const WORKSPACE_CRN: &str = "crn:v1:bluemix:public:power-iaas:dal10:a/acct42:ws-test::";

/// Config with every wait set to zero so no test sleeps.
pub fn test_config(overrides: &[(&str, &str)]) -> ProvisionConfig {
    let mut vars: HashMap<String, String> = [
        ("IBMCLOUD_API_KEY", "test-api-key"),
        ("POWERVS_WORKSPACE_CRN", WORKSPACE_CRN),
        ("LPAR_IMAGE_ID", "img-empty"),
        ("LPAR_NAME", "snap-lpar"),
        ("CREATE_BACKOFF_SECS", "0"),
        ("POLL_INITIAL_WAIT_SECS", "0"),
        ("POLL_INTERVAL_SECS", "0"),
        ("POLL_MAX_ATTEMPTS", "5"),
        ("PROVIDER", "mock"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    ProvisionConfig::from_lookup(|k| vars.get(k).cloned()).expect("test config must load")
}

/// Run state as it looks right after authentication.
#[allow(dead_code)]
pub fn authenticated_state() -> RunState {
    let mut state = RunState::new();
    state.set_access_token("test-token".to_string());
    state
}
