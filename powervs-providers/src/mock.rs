use crate::{inventory, JobRunner, PowerProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// In-memory platform for local runs and tests.
///
/// Every call is recorded in order (see [`MockProvider::calls`]). Responses
/// are scripted with the `with_*` builders; once a script runs dry the mock
/// falls back to a happy-path answer (new LPAR id, `SHUTOFF` status).
pub struct MockProvider {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    networks: Vec<inventory::NetworkSummary>,
    failing: Vec<&'static str>,
    network_create: Option<Value>,
    create_script: VecDeque<Result<inventory::RawResponse, String>>,
    status_script: VecDeque<Result<inventory::InstanceDetails, String>>,
    job_response: Option<Value>,
    next_id: u32,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: String) -> bool {
        let mut st = self.lock();
        let op = call.split_whitespace().next().unwrap_or("").to_string();
        st.calls.push(call);
        st.failing.iter().any(|f| *f == op)
    }

    /// An existing network visible to `list_networks`.
    pub fn with_network(self, name: &str, id: &str) -> Self {
        self.lock().networks.push(inventory::NetworkSummary {
            name: name.to_string(),
            id: Some(id.to_string()),
        });
        self
    }

    /// Make every call to `op` (e.g. `"login"`, `"delete_instance"`) fail.
    pub fn failing(self, op: &'static str) -> Self {
        self.lock().failing.push(op);
        self
    }

    /// Raw document returned by the next `create_network` calls.
    pub fn with_network_create_response(self, doc: Value) -> Self {
        self.lock().network_create = Some(doc);
        self
    }

    /// Queue a completed create call returning `body` with HTTP `status`.
    pub fn with_create_body(self, status: u16, body: &str) -> Self {
        self.lock().create_script.push_back(Ok(inventory::RawResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    /// Queue a transport-level failure of the create call.
    pub fn with_create_transport_error(self, msg: &str) -> Self {
        self.lock().create_script.push_back(Err(msg.to_string()));
        self
    }

    /// Queue a successful status query.
    pub fn with_status(self, status: &str) -> Self {
        self.with_details(inventory::instance_details_from_json(json!({ "status": status })))
    }

    pub fn with_details(self, details: inventory::InstanceDetails) -> Self {
        self.lock().status_script.push_back(Ok(details));
        self
    }

    /// Queue a failed status query.
    pub fn with_status_error(self, msg: &str) -> Self {
        self.lock().status_script.push_back(Err(msg.to_string()));
        self
    }

    pub fn with_job_response(self, doc: Value) -> Self {
        self.lock().job_response = Some(doc);
        self
    }

    /// Every call made so far, as `"<op> <args>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }
}

#[async_trait]
impl PowerProvider for MockProvider {
    async fn login(&self, _api_key: &str, region: &str) -> Result<()> {
        if self.record(format!("login {}", region)) {
            return Err(anyhow!("mock login rejected"));
        }
        Ok(())
    }

    async fn target_resource_group(&self, resource_group: &str) -> Result<()> {
        if self.record(format!("target_resource_group {}", resource_group)) {
            return Err(anyhow!("mock resource group {} not found", resource_group));
        }
        Ok(())
    }

    async fn target_workspace(&self, workspace_crn: &str) -> Result<()> {
        if self.record(format!("target_workspace {}", workspace_crn)) {
            return Err(anyhow!("mock workspace not found"));
        }
        Ok(())
    }

    async fn exchange_token(&self, _api_key: &str) -> Result<String> {
        if self.record("exchange_token".to_string()) {
            return Err(anyhow!("mock IAM returned 400"));
        }
        Ok("mock-bearer-token".to_string())
    }

    async fn list_networks(&self) -> Result<Vec<inventory::NetworkSummary>> {
        if self.record("list_networks".to_string()) {
            return Err(anyhow!("mock subnet list failed"));
        }
        Ok(self.lock().networks.clone())
    }

    async fn create_network(&self, name: &str, net_type: &str) -> Result<Value> {
        if self.record(format!("create_network {} {}", name, net_type)) {
            return Err(anyhow!("mock subnet create failed"));
        }
        let mut st = self.lock();
        if let Some(doc) = st.network_create.clone() {
            return Ok(doc);
        }
        st.next_id += 1;
        let id = format!("mock-net-{}", st.next_id);
        st.networks.push(inventory::NetworkSummary {
            name: name.to_string(),
            id: Some(id.clone()),
        });
        Ok(json!({ "networkID": id, "name": name, "type": net_type }))
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        if self.record(format!("delete_network {}", network_id)) {
            return Err(anyhow!("mock subnet {} still in use", network_id));
        }
        Ok(())
    }

    async fn create_instance(
        &self,
        access_token: &str,
        body: &Value,
    ) -> Result<inventory::RawResponse> {
        let name = body["serverName"].as_str().unwrap_or("").to_string();
        if self.record(format!("create_instance {}", name)) {
            return Err(anyhow!("mock connection reset"));
        }
        if access_token.is_empty() {
            return Ok(inventory::RawResponse {
                status: 401,
                body: r#"{"error":"unauthorized"}"#.to_string(),
            });
        }
        let mut st = self.lock();
        match st.create_script.pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => {
                st.next_id += 1;
                Ok(inventory::RawResponse {
                    status: 201,
                    body: json!([{ "pvmInstanceID": format!("mock-lpar-{}", st.next_id), "serverName": name }])
                        .to_string(),
                })
            }
        }
    }

    async fn get_instance(&self, instance_id: &str) -> Result<inventory::InstanceDetails> {
        if self.record(format!("get_instance {}", instance_id)) {
            return Err(anyhow!("mock instance get failed"));
        }
        match self.lock().status_script.pop_front() {
            Some(Ok(details)) => Ok(details),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Ok(inventory::instance_details_from_json(json!({
                "status": "SHUTOFF",
                "networks": [{ "ipAddress": "192.168.0.10", "externalIP": "203.0.113.10" }]
            }))),
        }
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        if self.record(format!("delete_instance {}", instance_id)) {
            return Err(anyhow!("mock instance {} is locked", instance_id));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRunner for MockProvider {
    async fn target_resource_group(&self, resource_group: &str) -> Result<()> {
        if self.record(format!("job_target_resource_group {}", resource_group)) {
            return Err(anyhow!("mock resource group {} not found", resource_group));
        }
        Ok(())
    }

    async fn select_project(&self, project: &str) -> Result<()> {
        if self.record(format!("select_project {}", project)) {
            return Err(anyhow!("mock project {} not found", project));
        }
        Ok(())
    }

    async fn submit_job(&self, job: &str) -> Result<Value> {
        if self.record(format!("submit_job {}", job)) {
            return Err(anyhow!("mock job {} not found", job));
        }
        let mut st = self.lock();
        if let Some(doc) = st.job_response.clone() {
            return Ok(doc);
        }
        st.next_id += 1;
        Ok(json!({ "metadata": { "name": format!("{}-run-{}", job, st.next_id) } }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripts_are_consumed_in_order_then_default() {
        let mock = MockProvider::new()
            .with_create_transport_error("boom")
            .with_create_body(500, "oops");

        let body = json!({"serverName": "lpar"});
        assert!(mock.create_instance("tok", &body).await.is_err());
        let second = mock.create_instance("tok", &body).await.unwrap();
        assert_eq!(second.status, 500);
        let third = mock.create_instance("tok", &body).await.unwrap();
        assert!(third.body.contains("mock-lpar-"));
        assert_eq!(mock.count("create_instance"), 3);
    }

    #[tokio::test]
    async fn failing_ops_are_recorded_and_rejected() {
        let mock = MockProvider::new().failing("delete_instance");
        assert!(mock.delete_instance("abc").await.is_err());
        assert!(mock.delete_network("n-1").await.is_ok());
        assert_eq!(mock.calls(), vec!["delete_instance abc", "delete_network n-1"]);
    }
}
