//! Client for the Vultr API
//!
//! The reconcilers only see the [`BlockStorageApi`] and [`FirewallRuleApi`]
//! traits. [`VultrClient`] implements both against the v1 HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use vultr_common::{network_from_parts, ApiError, BlockVolume, FirewallRule, FirewallRuleSpec, IpType};

use crate::config::ProviderConfig;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Block storage operations
#[async_trait]
pub trait BlockStorageApi: Send + Sync {
    /// Create a volume and return its id
    async fn create(&self, region_id: u32, size_gb: u64, label: &str) -> ApiResult<String>;

    async fn get(&self, id: &str) -> ApiResult<BlockVolume>;

    async fn list(&self) -> ApiResult<Vec<BlockVolume>>;

    async fn resize(&self, id: &str, size_gb: u64) -> ApiResult<()>;

    async fn set_label(&self, id: &str, label: &str) -> ApiResult<()>;

    /// Attach to an instance. `live` attaches without restarting it.
    async fn attach(&self, id: &str, instance_id: &str, live: bool) -> ApiResult<()>;

    async fn detach(&self, id: &str, live: bool) -> ApiResult<()>;

    async fn delete(&self, id: &str) -> ApiResult<()>;
}

/// Firewall rule operations. The API has no get-by-id for rules.
#[async_trait]
pub trait FirewallRuleApi: Send + Sync {
    /// Create an inbound rule and return the assigned rule number
    async fn create(&self, group_id: &str, spec: &FirewallRuleSpec) -> ApiResult<u32>;

    /// All inbound rules of the group, v4 first then v6
    async fn list(&self, group_id: &str) -> ApiResult<Vec<FirewallRule>>;

    async fn delete(&self, group_id: &str, rule_number: &str) -> ApiResult<()>;
}

/// HTTP client for the Vultr v1 API
pub struct VultrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VultrClient {
    /// Build a client from provider configuration
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("api_key is not configured (set VULTR_API_KEY)"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { http, base_url, api_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        debug!("GET {}", path);
        let resp = self
            .http
            .get(self.url(path))
            .header("API-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let body = check(resp).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> ApiResult<String> {
        debug!("POST {}", path);
        let resp = self
            .http
            .post(self.url(path))
            .header("API-Key", &self.api_key)
            .form(form)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

/// Turn a non-2xx response into an error, otherwise return the body
async fn check(resp: reqwest::Response) -> ApiResult<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }
    Ok(body)
}

fn live_flag(live: bool) -> &'static str {
    if live {
        "yes"
    } else {
        "no"
    }
}

#[async_trait]
impl BlockStorageApi for VultrClient {
    async fn create(&self, region_id: u32, size_gb: u64, label: &str) -> ApiResult<String> {
        let region = region_id.to_string();
        let size = size_gb.to_string();
        let body = self
            .post_form("block/create", &[("DCID", region.as_str()), ("size_gb", size.as_str()), ("label", label)])
            .await?;
        let created: CreatedVolume =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("block/create: {}", e)))?;
        Ok(created.id.into_string())
    }

    async fn get(&self, id: &str) -> ApiResult<BlockVolume> {
        let raw: RawVolume = self.get_json("block/list", &[("SUBID", id)]).await?;
        raw.into_volume()
    }

    async fn list(&self) -> ApiResult<Vec<BlockVolume>> {
        let raw: Vec<RawVolume> = self.get_json("block/list", &[]).await?;
        raw.into_iter().map(RawVolume::into_volume).collect()
    }

    async fn resize(&self, id: &str, size_gb: u64) -> ApiResult<()> {
        let size = size_gb.to_string();
        self.post_form("block/resize", &[("SUBID", id), ("size_gb", size.as_str())]).await?;
        Ok(())
    }

    async fn set_label(&self, id: &str, label: &str) -> ApiResult<()> {
        self.post_form("block/label", &[("SUBID", id), ("label", label)]).await?;
        Ok(())
    }

    async fn attach(&self, id: &str, instance_id: &str, live: bool) -> ApiResult<()> {
        self.post_form(
            "block/attach",
            &[("SUBID", id), ("attach_to_SUBID", instance_id), ("live", live_flag(live))],
        )
        .await?;
        Ok(())
    }

    async fn detach(&self, id: &str, live: bool) -> ApiResult<()> {
        self.post_form("block/detach", &[("SUBID", id), ("live", live_flag(live))]).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.post_form("block/delete", &[("SUBID", id)]).await?;
        Ok(())
    }
}

#[async_trait]
impl FirewallRuleApi for VultrClient {
    async fn create(&self, group_id: &str, spec: &FirewallRuleSpec) -> ApiResult<u32> {
        let subnet = spec.network.network().to_string();
        let subnet_size = spec.network.prefix().to_string();
        let body = self
            .post_form(
                "firewall/rule_create",
                &[
                    ("FIREWALLGROUPID", group_id),
                    ("direction", "in"),
                    ("ip_type", spec.ip_type().as_str()),
                    ("protocol", spec.protocol.as_str()),
                    ("subnet", subnet.as_str()),
                    ("subnet_size", subnet_size.as_str()),
                    ("port", spec.port.as_str()),
                    ("notes", spec.notes.as_str()),
                ],
            )
            .await?;
        let created: CreatedRule = serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("firewall/rule_create: {}", e)))?;
        Ok(created.rule_number)
    }

    async fn list(&self, group_id: &str) -> ApiResult<Vec<FirewallRule>> {
        let mut rules = Vec::new();
        for ip_type in [IpType::V4, IpType::V6] {
            let raw: RawRuleList = self
                .get_json(
                    "firewall/rule_list",
                    &[("FIREWALLGROUPID", group_id), ("direction", "in"), ("ip_type", ip_type.as_str())],
                )
                .await?;
            rules.extend(raw.into_rules(ip_type)?);
        }
        Ok(rules)
    }

    async fn delete(&self, group_id: &str, rule_number: &str) -> ApiResult<()> {
        self.post_form(
            "firewall/rule_delete",
            &[("FIREWALLGROUPID", group_id), ("rulenumber", rule_number)],
        )
        .await?;
        Ok(())
    }
}

/// The v1 API returns some ids and amounts as numbers, some as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn into_string(self) -> String {
        match self {
            Loose::Int(n) => n.to_string(),
            Loose::Float(n) => n.to_string(),
            Loose::Text(s) => s,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Loose::Int(n) => u64::try_from(*n).ok(),
            Loose::Float(_) => None,
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedVolume {
    #[serde(rename = "SUBID")]
    id: Loose,
}

#[derive(Debug, Deserialize)]
struct RawVolume {
    #[serde(rename = "SUBID")]
    id: Loose,
    #[serde(default)]
    date_created: String,
    cost_per_month: Option<Loose>,
    #[serde(default)]
    status: String,
    size_gb: Loose,
    #[serde(rename = "DCID")]
    region_id: Loose,
    #[serde(rename = "attached_to_SUBID")]
    attached_to: Option<Loose>,
    #[serde(default)]
    label: Option<String>,
}

impl RawVolume {
    fn into_volume(self) -> ApiResult<BlockVolume> {
        let size_gb = self
            .size_gb
            .as_u64()
            .ok_or_else(|| ApiError::Decode(format!("invalid size_gb {:?}", self.size_gb)))?;
        let region_id = self
            .region_id
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ApiError::Decode(format!("invalid DCID {:?}", self.region_id)))?;

        Ok(BlockVolume {
            id: self.id.into_string(),
            size_gb,
            region_id,
            date_created: self.date_created,
            cost_per_month: self.cost_per_month.map(Loose::into_string).unwrap_or_default(),
            status: self.status,
            attached_id: self
                .attached_to
                .map(Loose::into_string)
                .filter(|id| !id.is_empty() && id != "0"),
            label: self.label.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedRule {
    #[serde(rename = "rulenumber")]
    rule_number: u32,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "rulenumber")]
    rule_number: u32,
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    subnet: String,
    #[serde(default)]
    subnet_size: u8,
    #[serde(default)]
    notes: String,
}

/// Rule listings come back as an object keyed by rule number, or as `[]`
/// when the group has no rules.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRuleList {
    Keyed(HashMap<String, RawRule>),
    Empty(Vec<RawRule>),
}

impl RawRuleList {
    fn into_rules(self, ip_type: IpType) -> ApiResult<Vec<FirewallRule>> {
        let mut raw: Vec<RawRule> = match self {
            RawRuleList::Keyed(map) => map.into_values().collect(),
            RawRuleList::Empty(list) => list,
        };
        raw.sort_by_key(|r| r.rule_number);

        raw.into_iter()
            .map(|r| {
                let network = network_from_parts(&r.subnet, r.subnet_size, ip_type == IpType::V6)
                    .map_err(|e| ApiError::Decode(format!("rule {}: {}", r.rule_number, e)))?;
                Ok(FirewallRule {
                    rule_number: r.rule_number,
                    protocol: r.protocol,
                    port: r.port,
                    network,
                    notes: r.notes,
                })
            })
            .collect()
    }
}
