//! Vultr Provider Implementation
//!
//! Dispatches host requests to the resource handlers by type name and turns
//! handler errors into diagnostics.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::{BlockStorageApi, FirewallRuleApi};
use crate::resources::{BlockStorageResource, FirewallRuleResource, Resource};
use crate::schema::{provider_schema, Attribute, Presence, ResourceSchema};
use crate::state::{DynamicValue, ResourceData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn for_attribute(mut self, name: &str) -> Self {
        self.attribute = Some(name.to_string());
        self
    }
}

impl From<&vultr_common::Error> for Diagnostic {
    fn from(e: &vultr_common::Error) -> Self {
        Diagnostic::error(e.summary(), e.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub provider: Vec<Attribute>,
    pub resource_schemas: BTreeMap<&'static str, ResourceSchema>,
}

/// Outcome of read, apply and import: the state the host should record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

impl StateResponse {
    fn ok(new_state: DynamicValue) -> Self {
        Self { new_state, diagnostics: vec![] }
    }

    fn failed(new_state: DynamicValue, diagnostic: Diagnostic) -> Self {
        Self {
            new_state,
            diagnostics: vec![diagnostic],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Vultr provider
pub struct VultrProvider<C: ?Sized + Sync> {
    /// API client, set once the provider is configured
    client: RwLock<Option<Arc<C>>>,
    resources: HashMap<&'static str, Box<dyn Resource<C>>>,
}

impl<C> VultrProvider<C>
where
    C: BlockStorageApi + FirewallRuleApi + ?Sized + 'static,
{
    pub fn new() -> Self {
        Self::with_block_storage(BlockStorageResource::new())
    }

    /// Use a specific block storage handler, e.g. with a shorter readiness wait
    pub fn with_block_storage(block_storage: BlockStorageResource) -> Self {
        let handlers: Vec<Box<dyn Resource<C>>> = vec![Box::new(block_storage), Box::new(FirewallRuleResource)];
        let resources = handlers
            .into_iter()
            .map(|r| (r.type_name(), r))
            .collect();

        Self {
            client: RwLock::new(None),
            resources,
        }
    }

    pub async fn configure(&self, client: Arc<C>) {
        info!("Provider configured");
        *self.client.write().await = Some(client);
    }

    async fn client(&self) -> Result<Arc<C>, Diagnostic> {
        self.client.read().await.clone().ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "configure must be called before managing resources",
            )
        })
    }

    fn resource(&self, type_name: &str) -> Result<&dyn Resource<C>, Diagnostic> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| Diagnostic::error("Unknown resource type", type_name.to_string()))
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: provider_schema(),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, r)| (*name, r.schema()))
                .collect(),
        }
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &DynamicValue) -> Vec<Diagnostic> {
        debug!("ValidateResourceConfig called for {}", type_name);

        match self.resource(type_name) {
            Ok(resource) => resource
                .schema()
                .validate(config)
                .into_iter()
                .map(|(name, problem)| Diagnostic::error("Invalid configuration", problem).for_attribute(name))
                .collect(),
            Err(diagnostic) => vec![diagnostic],
        }
    }

    /// Planned state is the proposal, with computed attributes carried over
    /// from the prior state unless the resource is being replaced.
    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior: &DynamicValue,
        proposed: &DynamicValue,
    ) -> PlanResponse {
        debug!("PlanResourceChange called for {}", type_name);

        let schema = match self.resource(type_name) {
            Ok(resource) => resource.schema(),
            Err(diagnostic) => {
                return PlanResponse {
                    planned_state: proposed.clone(),
                    requires_replace: vec![],
                    diagnostics: vec![diagnostic],
                }
            }
        };

        if proposed.is_null() || prior.is_null() {
            let diagnostics = if proposed.is_null() {
                vec![]
            } else {
                self.validate_resource_config(type_name, proposed)
            };
            return PlanResponse {
                planned_state: proposed.clone(),
                requires_replace: vec![],
                diagnostics,
            };
        }

        let requires_replace = schema.requires_replace(prior, proposed);
        let mut planned = ResourceData::from_state(proposed);
        if requires_replace.is_empty() {
            planned.set_id(ResourceData::from_state(prior).id());
            for attr in schema.attributes.iter().filter(|a| a.presence == Presence::Computed) {
                let proposed_value = proposed.get(attr.name).cloned().unwrap_or_default();
                if let (true, Some(old)) = (proposed_value.is_null(), prior.get(attr.name)) {
                    planned.set(attr.name, old.clone());
                }
            }
        }

        let planned_state = if planned.id().is_empty() {
            proposed.clone()
        } else {
            planned.to_state()
        };

        PlanResponse {
            planned_state,
            requires_replace,
            diagnostics: self.validate_resource_config(type_name, proposed),
        }
    }

    pub async fn read_resource(&self, type_name: &str, current: &DynamicValue) -> StateResponse {
        info!("ReadResource called for {}", type_name);

        let (resource, client) = match self.prepare(type_name).await {
            Ok(found) => found,
            Err(diagnostic) => return StateResponse::failed(current.clone(), diagnostic),
        };

        let mut d = ResourceData::from_state(current);
        match resource.read(client.as_ref(), &mut d).await {
            Ok(()) => StateResponse::ok(d.to_state()),
            Err(e) => StateResponse::failed(current.clone(), Diagnostic::from(&e)),
        }
    }

    /// Create when there is no prior state, delete when there is no planned
    /// state, update otherwise.
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> StateResponse {
        info!("ApplyResourceChange called for {}", type_name);

        let (resource, client) = match self.prepare(type_name).await {
            Ok(found) => found,
            Err(diagnostic) => return StateResponse::failed(prior.clone(), diagnostic),
        };
        let client = client.as_ref();

        match (prior.is_null(), planned.is_null()) {
            // Create
            (true, false) => {
                let mut d = ResourceData::from_state(planned);
                match resource.create(client, &mut d).await {
                    Ok(()) => StateResponse::ok(d.to_state()),
                    Err(e) if d.id().is_empty() => StateResponse::failed(DynamicValue::Null, Diagnostic::from(&e)),
                    // A resource that was created before the failure is kept
                    // in state so it can be cleaned up or finished later.
                    Err(e) => {
                        let state = match resource.read(client, &mut d).await {
                            Ok(()) => d.to_state(),
                            Err(read_err) => {
                                warn!("Refreshing {} ({}) after failed create: {}", type_name, d.id(), read_err);
                                Self::inputs_only(&resource.schema(), &d)
                            }
                        };
                        StateResponse::failed(state, Diagnostic::from(&e))
                    }
                }
            }
            // Delete
            (false, true) => {
                let d = ResourceData::from_state(prior);
                match resource.delete(client, &d).await {
                    Ok(()) => StateResponse::ok(DynamicValue::Null),
                    Err(e) => StateResponse::failed(prior.clone(), Diagnostic::from(&e)),
                }
            }
            // Update
            (false, false) => {
                let mut d = ResourceData::from_change(prior, planned);
                match resource.update(client, &mut d).await {
                    Ok(()) => StateResponse::ok(d.to_state()),
                    // Record what the remote side holds now, not the plan
                    Err(e) => {
                        let state = match resource.read(client, &mut d).await {
                            Ok(()) => d.to_state(),
                            Err(read_err) => {
                                warn!("Refreshing {} ({}) after failed update: {}", type_name, d.id(), read_err);
                                prior.clone()
                            }
                        };
                        StateResponse::failed(state, Diagnostic::from(&e))
                    }
                }
            }
            // No change
            (true, true) => StateResponse::ok(DynamicValue::Null),
        }
    }

    /// Seed state through the resource's importer and read the rest
    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> StateResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);

        let (resource, client) = match self.prepare(type_name).await {
            Ok(found) => found,
            Err(diagnostic) => return StateResponse::failed(DynamicValue::Null, diagnostic),
        };

        let mut d = match resource.import(client.as_ref(), id).await {
            Ok(d) => d,
            Err(e) => return StateResponse::failed(DynamicValue::Null, Diagnostic::from(&e)),
        };

        if let Err(e) = resource.read(client.as_ref(), &mut d).await {
            return StateResponse::failed(DynamicValue::Null, Diagnostic::from(&e));
        }

        if d.id().is_empty() {
            return StateResponse::failed(
                DynamicValue::Null,
                Diagnostic::error("Resource not found", format!("{} {} does not exist", type_name, id)),
            );
        }

        StateResponse::ok(d.to_state())
    }

    /// Id plus the attributes that were settled by the create call itself
    fn inputs_only(schema: &ResourceSchema, d: &ResourceData) -> DynamicValue {
        let mut kept = ResourceData::new();
        kept.set_id(d.id());
        for attr in &schema.attributes {
            let settled = attr.presence == Presence::Required || attr.force_new || attr.client_only;
            if let (true, Some(value)) = (settled, d.get(attr.name)) {
                kept.set(attr.name, value.clone());
            }
        }
        kept.to_state()
    }

    async fn prepare(&self, type_name: &str) -> Result<(&dyn Resource<C>, Arc<C>), Diagnostic> {
        let resource = self.resource(type_name)?;
        let client = self.client().await?;
        Ok((resource, client))
    }
}

impl<C> Default for VultrProvider<C>
where
    C: BlockStorageApi + FirewallRuleApi + ?Sized + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
