//! Resource schemas
//!
//! Each resource kind is described by a tagged list of attributes. The
//! dispatcher uses them to validate configuration and to decide which
//! changes force the resource to be replaced.

use serde::Serialize;

use vultr_common::parse_network;

use crate::state::DynamicValue;

pub const BLOCK_STORAGE: &str = "vultr_block_storage";
pub const FIREWALL_RULE: &str = "vultr_firewall_rule";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Bool,
    /// Network in CIDR notation, compared by value
    Cidr,
}

impl AttributeType {
    fn matches(&self, value: &DynamicValue) -> bool {
        match (self, value) {
            (_, DynamicValue::Null) => true,
            (AttributeType::String | AttributeType::Cidr, DynamicValue::String(_)) => true,
            (AttributeType::Int, DynamicValue::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeType::Bool, DynamicValue::Bool(_)) => true,
            _ => false,
        }
    }

    fn same_value(&self, old: &DynamicValue, new: &DynamicValue) -> bool {
        if old.is_zero() && new.is_zero() {
            return true;
        }
        match (self, old.as_string(), new.as_string()) {
            (AttributeType::Cidr, Some(old), Some(new)) => match (parse_network(old), parse_network(new)) {
                (Ok(old), Ok(new)) => old == new,
                _ => old == new,
            },
            _ => old == new,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    Computed,
}

/// How `import` identifiers are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStyle {
    /// The identifier is the remote id
    Passthrough,
    /// `"parent,child"`
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub presence: Presence,
    /// Changing the value replaces the resource
    pub force_new: bool,
    /// Held in configuration only, never refreshed from the API
    pub client_only: bool,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeType, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
            force_new: false,
            client_only: false,
        }
    }

    pub fn required(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Required)
    }

    pub fn optional(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Optional)
    }

    pub fn computed(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Computed)
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn client_only(mut self) -> Self {
        self.client_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub attributes: Vec<Attribute>,
    pub import: ImportStyle,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a configuration object against the schema.
    ///
    /// Returns the offending attribute and a message per problem; an empty
    /// list means the configuration is acceptable.
    pub fn validate(&self, config: &DynamicValue) -> Vec<(&'static str, String)> {
        let mut problems = Vec::new();

        for attr in &self.attributes {
            let value = config.get(attr.name).unwrap_or(&DynamicValue::Null);

            if attr.presence == Presence::Required && value.is_null() {
                problems.push((attr.name, format!("{:?} is required", attr.name)));
                continue;
            }
            if !attr.kind.matches(value) {
                problems.push((attr.name, format!("{:?} must be of type {:?}", attr.name, attr.kind)));
            }
        }

        problems
    }

    /// Force-new attributes whose value differs between prior and planned
    pub fn requires_replace(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.force_new)
            .filter(|a| {
                let old = prior.get(a.name).cloned().unwrap_or_default();
                let new = planned.get(a.name).cloned().unwrap_or_default();
                !a.kind.same_value(&old, &new)
            })
            .map(|a| a.name.to_string())
            .collect()
    }
}

/// Provider-level configuration block
pub fn provider_schema() -> Vec<Attribute> {
    vec![
        Attribute::optional("api_key", AttributeType::String),
        Attribute::optional("base_url", AttributeType::String),
    ]
}

pub fn block_storage_schema() -> ResourceSchema {
    use AttributeType::*;

    ResourceSchema {
        type_name: BLOCK_STORAGE,
        attributes: vec![
            Attribute::required("size_gb", Int),
            Attribute::required("region_id", Int).force_new(),
            Attribute::computed("date_created", String),
            Attribute::computed("cost_per_month", String),
            Attribute::computed("status", String),
            Attribute::optional("attached_id", String),
            Attribute::optional("label", String),
            Attribute::optional("live", Bool).client_only(),
        ],
        import: ImportStyle::Passthrough,
    }
}

pub fn firewall_rule_schema() -> ResourceSchema {
    use AttributeType::*;

    ResourceSchema {
        type_name: FIREWALL_RULE,
        attributes: vec![
            Attribute::required("firewall_group_id", String).force_new(),
            Attribute::required("protocol", String).force_new(),
            Attribute::required("network", Cidr).force_new(),
            Attribute::optional("to_port", Int).force_new(),
            Attribute::optional("from_port", Int).force_new(),
            Attribute::optional("notes", String).force_new(),
            Attribute::computed("ip_type", String),
        ],
        import: ImportStyle::Composite,
    }
}
