use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{LparSpec, NetworkAttachment, NetworkCleanup, NetworkPolicy, ProvisionError};

pub const DEFAULT_IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const DEFAULT_API_VERSION: &str = "2024-02-28";

/// Downstream job submitted after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub resource_group: String,
    pub project: String,
    pub job: String,
}

/// Immutable settings for one provisioning run.
#[derive(Clone)]
pub struct ProvisionConfig {
    pub api_key: String,
    pub region: String,
    pub resource_group: String,
    pub workspace_crn: String,
    pub cloud_instance_id: String,
    pub api_endpoint: String,
    pub api_version: String,
    pub iam_token_url: String,

    pub lpar: LparSpec,
    pub private_network: Option<NetworkAttachment>,
    pub public_network_name: String,
    pub network_policy: NetworkPolicy,
    pub rollback_network: NetworkCleanup,

    pub create_max_attempts: u32,
    pub create_backoff: Duration,
    pub poll_initial_wait: Duration,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub http_timeout: Duration,

    pub chain: Option<ChainConfig>,
    pub provider: String,
}

// Never print the credential.
impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("resource_group", &self.resource_group)
            .field("workspace_crn", &self.workspace_crn)
            .field("cloud_instance_id", &self.cloud_instance_id)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_version", &self.api_version)
            .field("lpar", &self.lpar)
            .field("private_network", &self.private_network)
            .field("public_network_name", &self.public_network_name)
            .field("network_policy", &self.network_policy)
            .field("rollback_network", &self.rollback_network)
            .field("create_max_attempts", &self.create_max_attempts)
            .field("create_backoff", &self.create_backoff)
            .field("poll_initial_wait", &self.poll_initial_wait)
            .field("poll_interval", &self.poll_interval)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("chain", &self.chain)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ProvisionConfig {
    /// Load from the process environment. Secrets prefer `*_FILE` paths
    /// (Docker/K8s friendly) and fall back to the plain variable.
    pub fn from_env() -> Result<Self, ProvisionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let api_key = get("IBMCLOUD_API_KEY_FILE")
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| get("IBMCLOUD_API_KEY"))
            .ok_or_else(|| {
                ProvisionError::Config(
                    "IBMCLOUD_API_KEY (or IBMCLOUD_API_KEY_FILE) must be set".to_string(),
                )
            })?;

        let region = or("POWERVS_REGION", "us-south");
        let workspace_crn = get("POWERVS_WORKSPACE_CRN")
            .ok_or_else(|| ProvisionError::Config("POWERVS_WORKSPACE_CRN must be set".into()))?;
        let cloud_instance_id = match get("POWERVS_CLOUD_INSTANCE_ID") {
            Some(id) => id,
            None => cloud_instance_id_from_crn(&workspace_crn).ok_or_else(|| {
                ProvisionError::Config(format!(
                    "cannot derive cloud instance id from workspace CRN '{}'",
                    workspace_crn
                ))
            })?,
        };
        let api_endpoint = get("POWERVS_API_ENDPOINT")
            .unwrap_or_else(|| format!("https://{}.power-iaas.cloud.ibm.com", region))
            .trim_end_matches('/')
            .to_string();

        let lpar = LparSpec {
            name: or("LPAR_NAME", "empty-lpar"),
            memory_gb: parse_or(&get, "LPAR_MEMORY_GB", 2.0)?,
            processors: parse_or(&get, "LPAR_PROCESSORS", 0.25)?,
            proc_type: or("LPAR_PROC_TYPE", "shared"),
            sys_type: or("LPAR_SYS_TYPE", "s922"),
            image_id: get("LPAR_IMAGE_ID")
                .ok_or_else(|| ProvisionError::Config("LPAR_IMAGE_ID must be set".into()))?,
            deployment_type: or("LPAR_DEPLOYMENT_TYPE", "VMNoStorage"),
            key_pair_name: get("LPAR_KEY_PAIR"),
        };
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(lpar.memory_gb) || !positive(lpar.processors) {
            return Err(ProvisionError::Config(
                "LPAR_MEMORY_GB and LPAR_PROCESSORS must be positive numbers".into(),
            ));
        }

        let private_network = get("PRIVATE_NETWORK_ID").map(|network_id| NetworkAttachment {
            network_id,
            ip_address: get("PRIVATE_NETWORK_IP"),
        });

        let network_policy = match get("NETWORK_POLICY") {
            None => NetworkPolicy::Reuse,
            Some(raw) => NetworkPolicy::parse(&raw).ok_or_else(|| {
                ProvisionError::Config(format!(
                    "NETWORK_POLICY must be 'reuse' or 'create-always', got '{}'",
                    raw
                ))
            })?,
        };
        let rollback_network = match get("ROLLBACK_NETWORK") {
            None => NetworkCleanup::Preserve,
            Some(raw) => NetworkCleanup::parse(&raw).ok_or_else(|| {
                ProvisionError::Config(format!(
                    "ROLLBACK_NETWORK must be 'preserve' or 'delete', got '{}'",
                    raw
                ))
            })?,
        };

        let create_max_attempts: u32 = parse_or(&get, "CREATE_MAX_ATTEMPTS", 3)?;
        let poll_max_attempts: u32 = parse_or(&get, "POLL_MAX_ATTEMPTS", 40)?;
        if create_max_attempts == 0 || poll_max_attempts == 0 {
            return Err(ProvisionError::Config(
                "CREATE_MAX_ATTEMPTS and POLL_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        let chain = if parse_flag(get("RUN_CHAIN").as_deref()) {
            let project = get("CHAIN_PROJECT").ok_or_else(|| {
                ProvisionError::Config("CHAIN_PROJECT must be set when RUN_CHAIN is enabled".into())
            })?;
            let job = get("CHAIN_JOB").ok_or_else(|| {
                ProvisionError::Config("CHAIN_JOB must be set when RUN_CHAIN is enabled".into())
            })?;
            Some(ChainConfig {
                resource_group: or("CHAIN_RESOURCE_GROUP", "Default"),
                project,
                job,
            })
        } else {
            None
        };

        Ok(Self {
            api_key,
            region,
            resource_group: or("POWERVS_RESOURCE_GROUP", "Default"),
            workspace_crn,
            cloud_instance_id,
            api_endpoint,
            api_version: or("POWERVS_API_VERSION", DEFAULT_API_VERSION),
            iam_token_url: or("IAM_TOKEN_URL", DEFAULT_IAM_TOKEN_URL),
            lpar,
            private_network,
            public_network_name: or("PUBLIC_NETWORK_NAME", "public-net"),
            network_policy,
            rollback_network,
            create_max_attempts,
            create_backoff: secs(&get, "CREATE_BACKOFF_SECS", 5)?,
            poll_initial_wait: secs(&get, "POLL_INITIAL_WAIT_SECS", 45)?,
            poll_interval: secs(&get, "POLL_INTERVAL_SECS", 30)?,
            poll_max_attempts,
            http_timeout: secs(&get, "HTTP_TIMEOUT_SECS", 60)?,
            chain,
            provider: or("PROVIDER", "ibm").to_ascii_lowercase(),
        })
    }

    /// Both a private and the public network are attached.
    pub fn is_dual_homed(&self) -> bool {
        self.private_network.is_some()
    }
}

/// `1`, `true`, `yes`, `on` (any case) enable a flag. Anything else, or unset, disables it.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

/// Field 8 of `crn:v1:bluemix:public:power-iaas:<zone>:a/<account>:<cloud-instance-id>::`.
pub fn cloud_instance_id_from_crn(crn: &str) -> Option<String> {
    let parts: Vec<&str> = crn.trim().split(':').collect();
    if parts.len() < 8 || parts[0] != "crn" {
        return None;
    }
    let id = parts[7].trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ProvisionError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ProvisionError::Config(format!("{} has an invalid value '{}'", key, raw))),
    }
}

fn secs<G>(get: &G, key: &str, default: u64) -> Result<Duration, ProvisionError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CRN: &str = "crn:v1:bluemix:public:power-iaas:dal10:a/acct123:ws-9f2c::";

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("IBMCLOUD_API_KEY", "secret"),
            ("POWERVS_WORKSPACE_CRN", CRN),
            ("LPAR_IMAGE_ID", "img-1"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ProvisionConfig, ProvisionError> {
        ProvisionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = load(&base()).unwrap();
        assert_eq!(cfg.region, "us-south");
        assert_eq!(cfg.cloud_instance_id, "ws-9f2c");
        assert_eq!(cfg.api_endpoint, "https://us-south.power-iaas.cloud.ibm.com");
        assert_eq!(cfg.create_max_attempts, 3);
        assert_eq!(cfg.create_backoff, Duration::from_secs(5));
        assert_eq!(cfg.poll_max_attempts, 40);
        assert_eq!(cfg.network_policy, NetworkPolicy::Reuse);
        assert_eq!(cfg.rollback_network, NetworkCleanup::Preserve);
        assert_eq!(cfg.lpar.deployment_type, "VMNoStorage");
        assert!(cfg.chain.is_none());
        assert!(!cfg.is_dual_homed());
        assert_eq!(cfg.provider, "ibm");
    }

    #[test]
    fn missing_or_blank_credential_is_a_config_error() {
        let mut vars = base();
        vars.remove("IBMCLOUD_API_KEY");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));

        vars.insert("IBMCLOUD_API_KEY", "   ");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn credential_file_takes_precedence() {
        let path = std::env::temp_dir().join(format!("powervs-key-{}", std::process::id()));
        std::fs::write(&path, "from-file\n").unwrap();
        let path_str: &'static str = Box::leak(path.to_string_lossy().into_owned().into_boxed_str());

        let mut vars = base();
        vars.insert("IBMCLOUD_API_KEY_FILE", path_str);
        let cfg = load(&vars).unwrap();
        assert_eq!(cfg.api_key, "from-file");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn chain_requires_project_and_job() {
        let mut vars = base();
        vars.insert("RUN_CHAIN", "yes");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));

        vars.insert("CHAIN_PROJECT", "snapshots");
        vars.insert("CHAIN_JOB", "capture");
        let chain = load(&vars).unwrap().chain.unwrap();
        assert_eq!(chain.resource_group, "Default");
        assert_eq!(chain.project, "snapshots");
        assert_eq!(chain.job, "capture");
    }

    #[test]
    fn non_finite_sizes_are_rejected() {
        for (key, value) in [
            ("LPAR_MEMORY_GB", "NaN"),
            ("LPAR_MEMORY_GB", "inf"),
            ("LPAR_PROCESSORS", "infinity"),
            ("LPAR_PROCESSORS", "-0.5"),
        ] {
            let mut vars = base();
            vars.insert(key, value);
            assert!(
                matches!(load(&vars), Err(ProvisionError::Config(_))),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut vars = base();
        vars.insert("POLL_MAX_ATTEMPTS", "forty");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));

        let mut vars = base();
        vars.insert("CREATE_MAX_ATTEMPTS", "0");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));

        let mut vars = base();
        vars.insert("NETWORK_POLICY", "sometimes");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));

        let mut vars = base();
        vars.insert("POWERVS_WORKSPACE_CRN", "not-a-crn");
        assert!(matches!(load(&vars), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn private_network_makes_run_dual_homed() {
        let mut vars = base();
        vars.insert("PRIVATE_NETWORK_ID", "priv-1");
        vars.insert("PRIVATE_NETWORK_IP", "192.168.10.4");
        let cfg = load(&vars).unwrap();
        assert!(cfg.is_dual_homed());
        let net = cfg.private_network.unwrap();
        assert_eq!(net.network_id, "priv-1");
        assert_eq!(net.ip_address.as_deref(), Some("192.168.10.4"));
    }

    #[test]
    fn flag_parsing() {
        for on in ["1", "true", "TRUE", "yes", " on "] {
            assert!(parse_flag(Some(on)), "{on}");
        }
        for off in ["0", "false", "no", "", "maybe"] {
            assert!(!parse_flag(Some(off)), "{off}");
        }
        assert!(!parse_flag(None));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let cfg = load(&base()).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("secret"));
    }
}
