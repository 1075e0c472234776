use crate::{inventory, JobRunner, PowerProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Endpoints and identifiers for a single PowerVS workspace.
#[derive(Clone, Debug)]
pub struct IbmSettings {
    pub api_endpoint: String,
    pub cloud_instance_id: String,
    pub workspace_crn: String,
    pub api_version: String,
    pub iam_token_url: String,
    pub http_timeout: Duration,
    pub cli_binary: String,
}

/// Thin wrapper around the `ibmcloud` CLI. Every command runs to completion
/// and its stdout is returned; a non-zero exit is an error.
#[derive(Clone, Debug)]
pub struct IbmCloudCli {
    binary: String,
}

impl IbmCloudCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str], api_key: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        // The CLI reads the key from its environment so it never shows up in `ps`.
        if let Some(key) = api_key {
            cmd.env("IBMCLOUD_API_KEY", key);
        }

        info!("🔵 [ibmcloud] {} {}", self.binary, args.join(" "));
        let output = cmd.output().await.map_err(|e| {
            anyhow!(
                "Failed to spawn '{}': {}. Make sure the IBM Cloud CLI and its power-iaas/code-engine plugins are installed.",
                self.binary,
                e
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "❌ [ibmcloud] {} failed: status={} stderr={}",
                args.join(" "),
                output.status,
                preview(&stderr)
            );
            return Err(anyhow!(
                "ibmcloud {} failed: status={} stderr={} stdout={}",
                args.join(" "),
                output.status,
                stderr.trim(),
                stdout.trim()
            ));
        }
        Ok(stdout)
    }

    async fn run_json(&self, args: &[&str]) -> Result<Value> {
        let stdout = self.run(args, None).await?;
        serde_json::from_str(stdout.trim()).with_context(|| {
            format!(
                "ibmcloud {} returned non-JSON output: {}",
                args.join(" "),
                preview(&stdout)
            )
        })
    }

    async fn target_resource_group(&self, resource_group: &str) -> Result<()> {
        self.run(&["target", "-g", resource_group], None).await?;
        Ok(())
    }
}

/// PowerVS through the `ibmcloud pi` CLI for session/network/instance reads
/// and the REST API for instance creation.
pub struct IbmPowerProvider {
    client: Client,
    cli: IbmCloudCli,
    settings: IbmSettings,
}

impl IbmPowerProvider {
    pub fn new(settings: IbmSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.http_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            cli: IbmCloudCli::new(settings.cli_binary.clone()),
            settings,
        })
    }

    fn create_url(&self) -> String {
        format!(
            "{}/pcloud/v1/cloud-instances/{}/pvm-instances",
            self.settings.api_endpoint, self.settings.cloud_instance_id
        )
    }
}

#[async_trait]
impl PowerProvider for IbmPowerProvider {
    async fn login(&self, api_key: &str, region: &str) -> Result<()> {
        self.cli.run(&["login", "-r", region, "-q"], Some(api_key)).await?;
        Ok(())
    }

    async fn target_resource_group(&self, resource_group: &str) -> Result<()> {
        self.cli.target_resource_group(resource_group).await
    }

    async fn target_workspace(&self, workspace_crn: &str) -> Result<()> {
        self.cli
            .run(&["pi", "workspace", "target", workspace_crn], None)
            .await?;
        Ok(())
    }

    async fn exchange_token(&self, api_key: &str) -> Result<String> {
        let url = &self.settings.iam_token_url;
        info!("🔵 [IAM] POST {} - Exchanging API key for bearer token", url);

        let resp = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", APIKEY_GRANT_TYPE), ("apikey", api_key)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("❌ [IAM] POST {} failed: status={}", url, status.as_u16());
            return Err(anyhow!(
                "IAM token exchange failed: status={} body={}",
                status.as_u16(),
                preview(&text)
            ));
        }

        let json_resp: Value = resp.json().await?;
        let token = json_resp["access_token"]
            .as_str()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("No access_token in IAM response"))?
            .to_string();
        info!("✅ [IAM] Bearer token obtained");
        Ok(token)
    }

    async fn list_networks(&self) -> Result<Vec<inventory::NetworkSummary>> {
        let doc = self.cli.run_json(&["pi", "subnet", "list", "--json"]).await?;
        let networks = inventory::networks_from_json(&doc);
        info!("✅ [PowerVS] Found {} network(s) in workspace", networks.len());
        Ok(networks)
    }

    async fn create_network(&self, name: &str, net_type: &str) -> Result<Value> {
        self.cli
            .run_json(&["pi", "subnet", "create", name, "--net-type", net_type, "--json"])
            .await
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.cli
            .run(&["pi", "subnet", "delete", network_id], None)
            .await?;
        Ok(())
    }

    async fn create_instance(
        &self,
        access_token: &str,
        body: &Value,
    ) -> Result<inventory::RawResponse> {
        let url = self.create_url();
        info!(
            "🔵 [PowerVS API] POST {} - Creating LPAR: version={}",
            url, self.settings.api_version
        );
        info!(
            "🔵 [PowerVS API] Request payload: {}",
            serde_json::to_string(body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("version", self.settings.api_version.as_str())])
            .bearer_auth(access_token)
            .header("CRN", &self.settings.workspace_crn)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if (200..300).contains(&status) {
            info!("✅ [PowerVS API] POST {} succeeded: status={}", url, status);
        } else {
            warn!(
                "❌ [PowerVS API] POST {} failed: status={}, response={}",
                url,
                status,
                preview(&text)
            );
        }
        Ok(inventory::RawResponse { status, body: text })
    }

    async fn get_instance(&self, instance_id: &str) -> Result<inventory::InstanceDetails> {
        let doc = self
            .cli
            .run_json(&["pi", "instance", "get", instance_id, "--json"])
            .await?;
        Ok(inventory::instance_details_from_json(doc))
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        self.cli
            .run(&["pi", "instance", "delete", instance_id], None)
            .await?;
        Ok(())
    }
}

/// IBM Cloud Code Engine, driven through `ibmcloud ce`.
pub struct CodeEngineRunner {
    cli: IbmCloudCli,
}

impl CodeEngineRunner {
    pub fn new(cli_binary: impl Into<String>) -> Self {
        Self {
            cli: IbmCloudCli::new(cli_binary),
        }
    }
}

#[async_trait]
impl JobRunner for CodeEngineRunner {
    async fn target_resource_group(&self, resource_group: &str) -> Result<()> {
        self.cli.target_resource_group(resource_group).await
    }

    async fn select_project(&self, project: &str) -> Result<()> {
        self.cli
            .run(&["ce", "project", "select", "--name", project], None)
            .await?;
        Ok(())
    }

    async fn submit_job(&self, job: &str) -> Result<Value> {
        self.cli
            .run_json(&["ce", "jobrun", "submit", "--job", job, "--output", "json"])
            .await
    }
}

/// First 500 characters, for log lines.
pub fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > 500 {
        format!("{}... (truncated)", text.chars().take(500).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> IbmSettings {
        IbmSettings {
            api_endpoint: "https://us-south.power-iaas.cloud.ibm.com".into(),
            cloud_instance_id: "ws-1".into(),
            workspace_crn: "crn:v1:bluemix:public:power-iaas:dal10:a/acct:ws-1::".into(),
            api_version: "2024-02-28".into(),
            iam_token_url: "https://iam.cloud.ibm.com/identity/token".into(),
            http_timeout: Duration::from_secs(5),
            cli_binary: "ibmcloud".into(),
        }
    }

    #[test]
    fn create_url_targets_workspace() {
        let p = IbmPowerProvider::new(settings()).unwrap();
        assert_eq!(
            p.create_url(),
            "https://us-south.power-iaas.cloud.ibm.com/pcloud/v1/cloud-instances/ws-1/pvm-instances"
        );
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let long = "x".repeat(600);
        let p = preview(&long);
        assert!(p.ends_with("... (truncated)"));
        assert_eq!(p.len(), 500 + "... (truncated)".len());
        assert_eq!(preview("  short  "), "short");
    }

    #[tokio::test]
    async fn missing_cli_binary_is_an_error() {
        let cli = IbmCloudCli::new("definitely-not-an-ibmcloud-binary");
        let err = cli.run(&["version"], None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
