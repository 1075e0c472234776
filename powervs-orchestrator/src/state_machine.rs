use std::fmt;

use uuid::Uuid;

use crate::logger;

/// Pipeline stages, in the order a run walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Configure,
    Authenticate,
    Network,
    CreateInstance,
    Poll,
    ChainTrigger,
    Complete,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Configure => "configure",
            Step::Authenticate => "authenticate",
            Step::Network => "network",
            Step::CreateInstance => "create_instance",
            Step::Poll => "poll_status",
            Step::ChainTrigger => "chain_trigger",
            Step::Complete => "complete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run learns as it goes. Owned by the top-level run and passed
/// by `&mut` to each stage; read by rollback and the completion summary.
pub struct RunState {
    pub run_id: Uuid,
    step: Step,
    history: Vec<Step>,
    access_token: Option<String>,
    /// Set once creation succeeds. Its presence is what makes rollback delete the LPAR.
    pub instance_id: Option<String>,
    /// Public network attached to the LPAR, reused or created.
    pub network_id: Option<String>,
    /// Only set when this run created the network.
    pub created_network_id: Option<String>,
    pub final_status: Option<String>,
    pub external_ip: Option<String>,
    pub chain_run_id: Option<String>,
    pub success: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            step: Step::Configure,
            history: vec![Step::Configure],
            access_token: None,
            instance_id: None,
            network_id: None,
            created_network_id: None,
            final_status: None,
            external_ip: None,
            chain_run_id: None,
            success: false,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Steps entered so far, oldest first.
    pub fn history(&self) -> &[Step] {
        &self.history
    }

    /// Record a transition to `next`.
    pub fn enter(&mut self, next: Step) {
        if next == self.step {
            return;
        }
        logger::log_quick(
            "STEP",
            self.run_id,
            &format!("{} -> {}", self.step, next),
        );
        self.step = next;
        self.history.push(next);
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn set_access_token(&mut self, token: String) {
        self.access_token = Some(token);
    }

    pub fn record_instance(&mut self, instance_id: &str) {
        self.instance_id = Some(instance_id.to_string());
    }
}

// The bearer token never goes to logs.
impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("run_id", &self.run_id)
            .field("step", &self.step)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("instance_id", &self.instance_id)
            .field("network_id", &self.network_id)
            .field("created_network_id", &self.created_network_id)
            .field("final_status", &self.final_status)
            .field("external_ip", &self.external_ip)
            .field("chain_run_id", &self.chain_run_id)
            .field("success", &self.success)
            .finish()
    }
}
