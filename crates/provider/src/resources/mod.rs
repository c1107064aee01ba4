//! Resource Implementations
//!
//! Implements the create/read/update/delete/import operations for each
//! resource type. The host-side plan/apply loop lives in [`crate::provider`].

pub mod block_storage;
pub mod firewall_rule;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use vultr_common::Result;

use crate::schema::ResourceSchema;
use crate::state::ResourceData;

pub use block_storage::BlockStorageResource;
pub use firewall_rule::FirewallRuleResource;

/// Trait for resource operations against an API client `C`
#[async_trait]
pub trait Resource<C: ?Sized + Sync>: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    /// Attribute schema
    fn schema(&self) -> ResourceSchema;

    /// Create the remote object from configuration and set the id
    async fn create(&self, client: &C, d: &mut ResourceData) -> Result<()>;

    /// Refresh attributes from the remote object. Clearing the id signals
    /// that the object no longer exists.
    async fn read(&self, client: &C, d: &mut ResourceData) -> Result<()>;

    /// Apply in-place changes between prior and planned state
    async fn update(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        self.read(client, d).await
    }

    /// Delete the remote object
    async fn delete(&self, client: &C, d: &ResourceData) -> Result<()>;

    /// Seed state for an externally created object; a read follows
    async fn import(&self, _client: &C, id: &str) -> Result<ResourceData> {
        let mut d = ResourceData::new();
        d.set_id(id);
        Ok(d)
    }
}
