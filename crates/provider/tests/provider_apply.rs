//! Drives the provider through full resource lifecycles against an
//! in-memory Vultr API.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vultr_common::{ApiError, BlockVolume, FirewallRule, FirewallRuleSpec};
use vultr_provider::client::ApiResult;
use vultr_provider::resources::block_storage::Readiness;
use vultr_provider::resources::BlockStorageResource;
use vultr_provider::state::make_state;
use vultr_provider::{BlockStorageApi, DynamicValue, FirewallRuleApi, VultrProvider};

#[derive(Default)]
struct MemoryApi {
    volumes: Mutex<BTreeMap<String, BlockVolume>>,
    rules: Mutex<BTreeMap<String, Vec<FirewallRule>>>,
    log: Mutex<Vec<String>>,
}

impl MemoryApi {
    fn log(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn missing(id: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{} not found", id),
        }
    }

    fn with_volume<T>(&self, id: &str, f: impl FnOnce(&mut BlockVolume) -> T) -> ApiResult<T> {
        let mut volumes = self.volumes.lock().unwrap();
        volumes.get_mut(id).map(f).ok_or_else(|| Self::missing(id))
    }
}

#[async_trait]
impl BlockStorageApi for MemoryApi {
    async fn create(&self, region_id: u32, size_gb: u64, label: &str) -> ApiResult<String> {
        let mut volumes = self.volumes.lock().unwrap();
        let id = (100 + volumes.len()).to_string();
        volumes.insert(
            id.clone(),
            BlockVolume {
                id: id.clone(),
                size_gb,
                region_id,
                date_created: "2024-05-01 12:00:00".to_string(),
                cost_per_month: "1.00".to_string(),
                status: "active".to_string(),
                attached_id: None,
                label: label.to_string(),
            },
        );
        drop(volumes);
        self.log(format!("create {}", id));
        Ok(id)
    }

    async fn get(&self, id: &str) -> ApiResult<BlockVolume> {
        self.with_volume(id, |v| v.clone())
    }

    async fn list(&self) -> ApiResult<Vec<BlockVolume>> {
        Ok(self.volumes.lock().unwrap().values().cloned().collect())
    }

    async fn resize(&self, id: &str, size_gb: u64) -> ApiResult<()> {
        self.log(format!("resize {} {}", id, size_gb));
        self.with_volume(id, |v| v.size_gb = size_gb)
    }

    async fn set_label(&self, id: &str, label: &str) -> ApiResult<()> {
        self.log(format!("label {} {}", id, label));
        self.with_volume(id, |v| v.label = label.to_string())
    }

    async fn attach(&self, id: &str, instance_id: &str, live: bool) -> ApiResult<()> {
        self.log(format!("attach {} {} live={}", id, instance_id, live));
        self.with_volume(id, |v| v.attached_id = Some(instance_id.to_string()))
    }

    async fn detach(&self, id: &str, live: bool) -> ApiResult<()> {
        self.log(format!("detach {} live={}", id, live));
        self.with_volume(id, |v| v.attached_id = None)
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.log(format!("delete {}", id));
        self.volumes
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::missing(id))
    }
}

#[async_trait]
impl FirewallRuleApi for MemoryApi {
    async fn create(&self, group_id: &str, spec: &FirewallRuleSpec) -> ApiResult<u32> {
        let mut rules = self.rules.lock().unwrap();
        let group = rules.entry(group_id.to_string()).or_default();
        let rule_number = group.len() as u32 + 1;
        group.push(FirewallRule {
            rule_number,
            protocol: spec.protocol.clone(),
            port: spec.port.replace(':', " - "),
            network: spec.network,
            notes: spec.notes.clone(),
        });
        drop(rules);
        self.log(format!("rule_create {} {}", group_id, spec.port));
        Ok(rule_number)
    }

    async fn list(&self, group_id: &str) -> ApiResult<Vec<FirewallRule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, group_id: &str, rule_number: &str) -> ApiResult<()> {
        self.log(format!("rule_delete {} {}", group_id, rule_number));
        let mut rules = self.rules.lock().unwrap();
        let group = rules.get_mut(group_id).ok_or_else(|| Self::missing(group_id))?;
        group.retain(|r| r.rule_number.to_string() != rule_number);
        Ok(())
    }
}

async fn configured() -> (VultrProvider<MemoryApi>, Arc<MemoryApi>) {
    let readiness = Readiness {
        settle_delay: Duration::ZERO,
        poll_interval: Duration::ZERO,
        max_checks: 3,
    };
    let provider = VultrProvider::with_block_storage(BlockStorageResource::with_readiness(readiness));
    let api = Arc::new(MemoryApi::default());
    provider.configure(api.clone()).await;
    (provider, api)
}

fn attr<'a>(state: &'a DynamicValue, key: &str) -> Option<&'a DynamicValue> {
    state.get(key)
}

#[tokio::test]
async fn block_storage_lifecycle() {
    let (provider, api) = configured().await;

    let planned = make_state(vec![
        ("size_gb", 10i64.into()),
        ("region_id", 1i64.into()),
        ("label", "data".into()),
        ("attached_id", "576965".into()),
        ("live", true.into()),
    ]);
    let created = provider
        .apply_resource_change("vultr_block_storage", &DynamicValue::Null, &planned)
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(attr(&created.new_state, "status").and_then(|v| v.as_string()), Some("active"));
    assert_eq!(attr(&created.new_state, "live").and_then(|v| v.as_bool()), Some(true));

    // Move to another instance and grow the volume
    let mut next = created.new_state.as_map().cloned().unwrap();
    next.insert("attached_id".to_string(), "777777".into());
    next.insert("size_gb".to_string(), 20i64.into());
    let next = DynamicValue::Map(next);

    let plan = provider.plan_resource_change("vultr_block_storage", &created.new_state, &next);
    assert!(plan.requires_replace.is_empty());

    let updated = provider
        .apply_resource_change("vultr_block_storage", &created.new_state, &plan.planned_state)
        .await;
    assert!(updated.diagnostics.is_empty(), "{:?}", updated.diagnostics);
    assert_eq!(attr(&updated.new_state, "size_gb").and_then(|v| v.as_i64()), Some(20));
    assert_eq!(
        attr(&updated.new_state, "attached_id").and_then(|v| v.as_string()),
        Some("777777")
    );

    let deleted = provider
        .apply_resource_change("vultr_block_storage", &updated.new_state, &DynamicValue::Null)
        .await;
    assert!(deleted.diagnostics.is_empty());
    assert!(deleted.new_state.is_null());

    assert_eq!(
        api.entries(),
        vec![
            "create 100",
            "attach 100 576965 live=true",
            "resize 100 20",
            "detach 100 live=true",
            "attach 100 777777 live=true",
            "detach 100 live=true",
            "delete 100",
        ]
    );
}

#[tokio::test]
async fn firewall_rule_lifecycle_and_import() {
    let (provider, api) = configured().await;

    let planned = make_state(vec![
        ("firewall_group_id", "1234abcd".into()),
        ("protocol", "tcp".into()),
        ("network", "2001:db8::/32".into()),
        ("from_port", 8000i64.into()),
        ("to_port", 8080i64.into()),
        ("notes", "web".into()),
    ]);
    let created = provider
        .apply_resource_change("vultr_firewall_rule", &DynamicValue::Null, &planned)
        .await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(attr(&created.new_state, "ip_type").and_then(|v| v.as_string()), Some("v6"));
    assert_eq!(attr(&created.new_state, "to_port").and_then(|v| v.as_i64()), Some(8080));

    let imported = provider
        .import_resource_state("vultr_firewall_rule", "1234abcd,1")
        .await;
    assert!(imported.diagnostics.is_empty(), "{:?}", imported.diagnostics);
    assert_eq!(
        attr(&imported.new_state, "network").and_then(|v| v.as_string()),
        Some("2001:db8::/32")
    );
    assert_eq!(attr(&imported.new_state, "from_port").and_then(|v| v.as_i64()), Some(8000));

    let deleted = provider
        .apply_resource_change("vultr_firewall_rule", &created.new_state, &DynamicValue::Null)
        .await;
    assert!(deleted.new_state.is_null());

    // The rule is gone, so a refresh drops it from state
    let refreshed = provider
        .read_resource("vultr_firewall_rule", &created.new_state)
        .await;
    assert!(refreshed.diagnostics.is_empty());
    assert!(refreshed.new_state.is_null());

    assert_eq!(
        api.entries(),
        vec!["rule_create 1234abcd 8000:8080", "rule_delete 1234abcd 1"]
    );
}

#[tokio::test]
async fn import_missing_rule_reports_not_found() {
    let (provider, _) = configured().await;

    let resp = provider
        .import_resource_state("vultr_firewall_rule", "1234abcd,42")
        .await;

    assert_eq!(resp.diagnostics[0].summary, "Resource not found");
    assert!(resp.new_state.is_null());
}
