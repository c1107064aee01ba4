//! Firewall rule resource handler
//!
//! Rules cannot be modified in place, so there is no update beyond a refresh.
//! The API offers no lookup by rule number: reads and imports list the whole
//! group and scan it.

use async_trait::async_trait;
use tracing::{info, warn};
use vultr_common::{
    decode_ports, encode_ports, parse_network, ApiResultExt, Error, FirewallRule, FirewallRuleSpec, Result, Step,
};

use super::Resource;
use crate::client::FirewallRuleApi;
use crate::schema::{firewall_rule_schema, ResourceSchema, FIREWALL_RULE};
use crate::state::ResourceData;

const KIND: &str = "firewall rule";

pub struct FirewallRuleResource;

/// Linear scan for a rule number, compared in its string form
fn find_rule<'a>(rules: &'a [FirewallRule], id: &str) -> Option<&'a FirewallRule> {
    rules.iter().find(|r| r.rule_number.to_string() == id)
}

/// Optional port attribute; unset and zero both mean absent
fn port_attr(d: &ResourceData, key: &str) -> Result<Option<u16>> {
    match d.get_ok_int(key) {
        None => Ok(None),
        Some(port) => u16::try_from(port)
            .map(Some)
            .map_err(|_| Error::Validation(format!("{} must be between 1 and 65535, got {}", key, port))),
    }
}

/// Split a composite `"group,rule"` import identifier at the first comma
pub fn split_import_id(id: &str) -> Result<(&str, &str)> {
    id.split_once(',').ok_or_else(|| {
        Error::Format(format!(
            "{:?}, expected \"firewallGroupID,firewallRuleID\"",
            id
        ))
    })
}

#[async_trait]
impl<C> Resource<C> for FirewallRuleResource
where
    C: FirewallRuleApi + ?Sized,
{
    fn type_name(&self) -> &'static str {
        FIREWALL_RULE
    }

    fn schema(&self) -> ResourceSchema {
        firewall_rule_schema()
    }

    async fn create(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        info!("Creating new firewall rule");

        let group_id = d.get_string("firewall_group_id");
        let protocol = d.get_string("protocol");

        if protocol != protocol.to_lowercase() {
            return Err(Error::Validation(format!("{:?} is required to be all lowercase", protocol)));
        }

        let network = parse_network(&d.get_string("network"))?;
        let port = encode_ports(&protocol, port_attr(d, "from_port")?, port_attr(d, "to_port")?)?;

        let spec = FirewallRuleSpec {
            protocol,
            port,
            network,
            notes: d.get_string("notes"),
        };

        let rule_number = client
            .create(&group_id, &spec)
            .await
            .context(KIND, Step::Create, &group_id)?;

        d.set_id(rule_number.to_string());
        d.set("ip_type", spec.ip_type().as_str());

        self.read(client, d).await
    }

    async fn read(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        let group_id = d.get_string("firewall_group_id");
        let id = d.id().to_string();

        let rules = client.list(&group_id).await.context(KIND, Step::List, &group_id)?;

        let Some(rule) = find_rule(&rules, &id) else {
            warn!("Removing firewall rule ({}) because it is gone", id);
            d.set_id("");
            return Ok(());
        };

        let (from, to) = decode_ports(&rule.port).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!("port range for firewall rule ({}): {}", id, msg)),
            other => other,
        })?;

        d.set("protocol", rule.protocol.as_str());
        d.set("network", rule.network.to_string());
        d.set("notes", rule.notes.as_str());
        d.set("ip_type", rule.ip_type().as_str());
        d.set("from_port", i64::from(from));
        d.set("to_port", i64::from(to));

        Ok(())
    }

    async fn delete(&self, client: &C, d: &ResourceData) -> Result<()> {
        let group_id = d.get_string("firewall_group_id");
        info!("Delete firewall rule : {}", d.id());

        client
            .delete(&group_id, d.id())
            .await
            .context(KIND, Step::Delete, d.id())
    }

    async fn import(&self, client: &C, id: &str) -> Result<ResourceData> {
        let (group_id, rule_id) = split_import_id(id)?;

        let rules = client.list(group_id).await.context(KIND, Step::List, group_id)?;
        let rule = find_rule(&rules, rule_id).ok_or_else(|| Error::NotFound {
            kind: KIND.to_string(),
            id: format!("{} in firewall group {}", rule_id, group_id),
        })?;

        let mut d = ResourceData::new();
        d.set_id(rule.rule_number.to_string());
        d.set("firewall_group_id", group_id);
        Ok(d)
    }
}
