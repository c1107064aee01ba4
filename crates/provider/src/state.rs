//! Resource State Management
//!
//! Dynamic attribute values exchanged with the host, and [`ResourceData`],
//! the get/set view over one resource's attributes that the reconcilers work
//! against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Dynamic value that can be encoded/decoded from resource state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    /// Null or the zero value of its type
    pub fn is_zero(&self) -> bool {
        match self {
            DynamicValue::Null => true,
            DynamicValue::Bool(b) => !b,
            DynamicValue::Number(n) => n.as_f64() == Some(0.0),
            DynamicValue::String(s) => s.is_empty(),
            DynamicValue::List(l) => l.is_empty(),
            DynamicValue::Map(m) => m.is_empty(),
        }
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Number(serde_json::Number::from(n))
    }
}

impl From<u64> for DynamicValue {
    fn from(n: u64) -> Self {
        DynamicValue::Number(serde_json::Number::from(n))
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Attribute view over a single resource.
///
/// Holds the current (or planned) attributes, plus the prior state during an
/// update so that changed attributes can be detected. An empty id means the
/// resource does not exist remotely.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    attrs: HashMap<String, DynamicValue>,
    prior: Option<HashMap<String, DynamicValue>>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a state or configuration object
    pub fn from_state(value: &DynamicValue) -> Self {
        let attrs = value.as_map().cloned().unwrap_or_default();
        let id = attrs
            .get("id")
            .and_then(|v| v.as_string())
            .unwrap_or_default()
            .to_string();
        Self { id, attrs, prior: None }
    }

    /// Build for an update: identity comes from the prior state, attribute
    /// values from the planned state.
    pub fn from_change(prior: &DynamicValue, planned: &DynamicValue) -> Self {
        let mut data = Self::from_state(planned);
        let prior = ResourceData::from_state(prior);
        if data.id.is_empty() {
            data.id = prior.id.clone();
        }
        data.prior = Some(prior.attrs);
        data
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.attrs.get(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    /// Integer attribute, or `None` when unset or zero
    pub fn get_ok_int(&self, key: &str) -> Option<i64> {
        Some(self.get_int(key)).filter(|n| *n != 0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set(&mut self, key: &str, value: impl Into<DynamicValue>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// Whether `key` differs between the prior and the planned state.
    /// Null and zero values compare equal.
    pub fn has_change(&self, key: &str) -> bool {
        let Some(prior) = &self.prior else {
            return false;
        };
        let old = prior.get(key).cloned().unwrap_or_default();
        let new = self.attrs.get(key).cloned().unwrap_or_default();
        if old.is_zero() && new.is_zero() {
            return false;
        }
        old != new
    }

    /// Prior and planned string values of `key`
    pub fn get_change_string(&self, key: &str) -> (String, String) {
        let old = self
            .prior
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string();
        (old, self.get_string(key))
    }

    /// Encode as host state; a resource without an id encodes as null.
    pub fn to_state(&self) -> DynamicValue {
        if self.id.is_empty() {
            return DynamicValue::Null;
        }
        let mut attrs = self.attrs.clone();
        attrs.insert("id".to_string(), DynamicValue::String(self.id.clone()));
        DynamicValue::Map(attrs)
    }
}
