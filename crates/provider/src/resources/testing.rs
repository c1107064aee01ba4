//! In-memory API double that records every call

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vultr_common::{ApiError, BlockVolume, FirewallRule, FirewallRuleSpec};

use crate::client::{ApiResult, BlockStorageApi, FirewallRuleApi};

#[derive(Default)]
struct Inner {
    volumes: HashMap<String, BlockVolume>,
    rules: HashMap<String, Vec<FirewallRule>>,
    next_id: u32,
    gets: u32,
    calls: Vec<String>,
}

pub struct FakeApi {
    inner: Mutex<Inner>,
    /// Number of status checks answered "pending"; `None` never turns active
    ready_after: Option<u32>,
    fail_on: Option<&'static str>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1313217,
                ..Default::default()
            }),
            ready_after: Some(0),
            fail_on: None,
        }
    }

    pub fn ready_after(mut self, checks: u32) -> Self {
        self.ready_after = Some(checks);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    /// Make every call of the named operation fail
    pub fn fail_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Seed a volume attached to `instance` (empty for none) and return its id
    pub fn add_volume(&self, instance: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id.to_string();
        inner.next_id += 1;
        inner.volumes.insert(
            id.clone(),
            BlockVolume {
                id: id.clone(),
                size_gb: 10,
                region_id: 1,
                date_created: "2020-01-01 00:00:00".to_string(),
                cost_per_month: "1".to_string(),
                status: "active".to_string(),
                attached_id: Some(instance.to_string()).filter(|i| !i.is_empty()),
                label: String::new(),
            },
        );
        id
    }

    /// Simulate the attached instance being destroyed outside the provider
    pub fn release_volume(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(vol) = inner.volumes.get_mut(id) {
            vol.attached_id = None;
        }
    }

    pub fn add_rule(&self, group_id: &str, rule: FirewallRule) {
        let mut inner = self.inner.lock().unwrap();
        inner.rules.entry(group_id.to_string()).or_default().push(rule);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls of the named operation
    pub fn calls_matching(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls_matching(op).len()
    }

    fn record(&self, op: &'static str, call: String) -> ApiResult<()> {
        self.inner.lock().unwrap().calls.push(call);
        if self.fail_on == Some(op) {
            return Err(ApiError::Status {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn not_found(id: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{} not found", id),
        }
    }
}

#[async_trait]
impl BlockStorageApi for FakeApi {
    async fn create(&self, region_id: u32, size_gb: u64, label: &str) -> ApiResult<String> {
        self.record("create", format!("create {} {} {}", region_id, size_gb, label))?;
        let id = self.add_volume("");
        let mut inner = self.inner.lock().unwrap();
        if let Some(vol) = inner.volumes.get_mut(&id) {
            vol.size_gb = size_gb;
            vol.region_id = region_id;
            vol.label = label.to_string();
            vol.status = "pending".to_string();
        }
        Ok(id)
    }

    async fn get(&self, id: &str) -> ApiResult<BlockVolume> {
        self.record("get", format!("get {}", id))?;
        let mut inner = self.inner.lock().unwrap();
        inner.gets += 1;
        let gets = inner.gets;
        let ready = self.ready_after.is_some_and(|n| gets > n);

        let vol = inner.volumes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if ready {
            vol.status = "active".to_string();
        }
        Ok(vol.clone())
    }

    async fn list(&self) -> ApiResult<Vec<BlockVolume>> {
        self.record("list", "list".to_string())?;
        Ok(self.inner.lock().unwrap().volumes.values().cloned().collect())
    }

    async fn resize(&self, id: &str, size_gb: u64) -> ApiResult<()> {
        self.record("resize", format!("resize {} {}", id, size_gb))?;
        let mut inner = self.inner.lock().unwrap();
        let vol = inner.volumes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        vol.size_gb = size_gb;
        Ok(())
    }

    async fn set_label(&self, id: &str, label: &str) -> ApiResult<()> {
        self.record("label", format!("label {} {}", id, label))?;
        let mut inner = self.inner.lock().unwrap();
        let vol = inner.volumes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        vol.label = label.to_string();
        Ok(())
    }

    async fn attach(&self, id: &str, instance_id: &str, live: bool) -> ApiResult<()> {
        self.record("attach", format!("attach {} {} live={}", id, instance_id, live))?;
        let mut inner = self.inner.lock().unwrap();
        let vol = inner.volumes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        vol.attached_id = Some(instance_id.to_string());
        Ok(())
    }

    async fn detach(&self, id: &str, live: bool) -> ApiResult<()> {
        self.record("detach", format!("detach {} live={}", id, live))?;
        let mut inner = self.inner.lock().unwrap();
        let vol = inner.volumes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        vol.attached_id = None;
        Ok(())
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.record("delete", format!("delete {}", id))?;
        let mut inner = self.inner.lock().unwrap();
        inner.volumes.remove(id).map(|_| ()).ok_or_else(|| Self::not_found(id))
    }
}

#[async_trait]
impl FirewallRuleApi for FakeApi {
    async fn create(&self, group_id: &str, spec: &FirewallRuleSpec) -> ApiResult<u32> {
        self.record(
            "create",
            format!("create {} {} {:?} {}", group_id, spec.protocol, spec.port, spec.network),
        )?;
        let mut inner = self.inner.lock().unwrap();
        let rules = inner.rules.entry(group_id.to_string()).or_default();
        let rule_number = rules.iter().map(|r| r.rule_number).max().unwrap_or(0) + 1;
        // The API reports ranges back with a dash
        let port = spec.port.replace(':', " - ");
        rules.push(FirewallRule {
            rule_number,
            protocol: spec.protocol.clone(),
            port,
            network: spec.network,
            notes: spec.notes.clone(),
        });
        Ok(rule_number)
    }

    async fn list(&self, group_id: &str) -> ApiResult<Vec<FirewallRule>> {
        self.record("list", format!("list {}", group_id))?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rules
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, group_id: &str, rule_number: &str) -> ApiResult<()> {
        self.record("delete", format!("delete {} {}", group_id, rule_number))?;
        let mut inner = self.inner.lock().unwrap();
        let rules = inner.rules.get_mut(group_id).ok_or_else(|| Self::not_found(group_id))?;
        let before = rules.len();
        rules.retain(|r| r.rule_number.to_string() != rule_number);
        if rules.len() == before {
            return Err(Self::not_found(rule_number));
        }
        Ok(())
    }
}
