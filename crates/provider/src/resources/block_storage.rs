//! Block storage resource handler
//!
//! Volumes can be attached to an instance at creation time. A freshly created
//! volume cannot be attached until the API reports it as active, so creation
//! waits for readiness before attaching. Resizes are not waited on.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use vultr_common::{ApiResultExt, Error, Result, Step};

use super::Resource;
use crate::client::BlockStorageApi;
use crate::schema::{block_storage_schema, ResourceSchema, BLOCK_STORAGE};
use crate::state::ResourceData;

const KIND: &str = "block storage";

/// Wait before the first status check
pub const SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Wait between status checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Status checks before giving up, the first one included
pub const READINESS_CHECKS: u32 = 16;

/// Readiness wait applied before attaching a new volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub max_checks: u32,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
            max_checks: READINESS_CHECKS,
        }
    }
}

impl Readiness {
    /// Longest time [`wait_until_active`] can take, excluding API latency
    pub fn budget(&self) -> Duration {
        self.settle_delay + self.poll_interval * self.max_checks.saturating_sub(1)
    }
}

/// Sleep for the settle delay, then poll until the volume is active.
///
/// Only the status check is retried; an API error ends the wait immediately.
pub async fn wait_until_active<C>(client: &C, id: &str, readiness: &Readiness) -> Result<()>
where
    C: BlockStorageApi + ?Sized,
{
    tokio::time::sleep(readiness.settle_delay).await;

    for check in 1..=readiness.max_checks {
        let volume = client.get(id).await.context(KIND, Step::Get, id)?;
        if volume.is_active() {
            debug!("Block storage ({}) active after {} checks", id, check);
            return Ok(());
        }
        debug!("Block storage ({}) status {:?}, check {}/{}", id, volume.status, check, readiness.max_checks);

        if check < readiness.max_checks {
            tokio::time::sleep(readiness.poll_interval).await;
        }
    }

    Err(Error::ReadinessTimeout {
        id: id.to_string(),
        checks: readiness.max_checks,
    })
}

pub struct BlockStorageResource {
    readiness: Readiness,
}

impl BlockStorageResource {
    pub fn new() -> Self {
        Self::with_readiness(Readiness::default())
    }

    pub fn with_readiness(readiness: Readiness) -> Self {
        Self { readiness }
    }
}

impl Default for BlockStorageResource {
    fn default() -> Self {
        Self::new()
    }
}

fn size_gb(d: &ResourceData) -> Result<u64> {
    let size = d.get_int("size_gb");
    u64::try_from(size)
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| Error::Validation(format!("size_gb must be positive, got {}", size)))
}

fn region_id(d: &ResourceData) -> Result<u32> {
    let region = d.get_int("region_id");
    u32::try_from(region)
        .ok()
        .filter(|r| *r > 0)
        .ok_or_else(|| Error::Validation(format!("region_id must be positive, got {}", region)))
}

#[async_trait]
impl<C> Resource<C> for BlockStorageResource
where
    C: BlockStorageApi + ?Sized,
{
    fn type_name(&self) -> &'static str {
        BLOCK_STORAGE
    }

    fn schema(&self) -> ResourceSchema {
        block_storage_schema()
    }

    async fn create(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        let region_id = region_id(d)?;
        let size_gb = size_gb(d)?;
        let label = d.get_string("label");
        let attach_to = d.get_string("attached_id");
        let live = d.get_bool("live");

        let id = client
            .create(region_id, size_gb, &label)
            .await
            .context(KIND, Step::Create, &format!("region {}", region_id))?;
        d.set_id(id.clone());
        info!("Block Storage ID: {}", id);

        if !attach_to.is_empty() {
            info!("Attaching block storage ({})", id);
            wait_until_active(client, &id, &self.readiness).await?;
            client
                .attach(&id, &attach_to, live)
                .await
                .context(KIND, Step::Attach, &id)?;
        }

        self.read(client, d).await
    }

    async fn read(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let volume = client.get(&id).await.context(KIND, Step::Get, &id)?;

        // live never comes back from the API
        let live = d.get_bool("live");
        d.set("live", live);

        d.set("date_created", volume.date_created);
        d.set("cost_per_month", volume.cost_per_month);
        d.set("status", volume.status);
        d.set("size_gb", volume.size_gb);
        d.set("region_id", u64::from(volume.region_id));
        d.set("attached_id", volume.attached_id.unwrap_or_default());
        d.set("label", volume.label);

        Ok(())
    }

    async fn update(&self, client: &C, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let live = d.get_bool("live");

        if d.has_change("label") {
            info!("Updating block storage label ({})", id);
            let (_, label) = d.get_change_string("label");
            client.set_label(&id, &label).await.context(KIND, Step::Label, &id)?;
        }

        if d.has_change("size_gb") {
            info!("Resizing block storage ({})", id);
            let size = size_gb(d)?;
            client.resize(&id, size).await.context(KIND, Step::Resize, &id)?;
        }

        if d.has_change("attached_id") {
            let (old, new) = d.get_change_string("attached_id");

            if !old.is_empty() {
                // The old instance may have been destroyed or replaced, which
                // already released the volume.
                let volume = client.get(&id).await.context(KIND, Step::Get, &id)?;
                if volume.is_attached() {
                    info!("Detaching block storage ({})", id);
                    client.detach(&id, live).await.context(KIND, Step::Detach, &id)?;
                }
            }

            if !new.is_empty() {
                info!("Attaching block storage ({})", id);
                client.attach(&id, &new, live).await.context(KIND, Step::Attach, &id)?;
            }
        }

        self.read(client, d).await
    }

    async fn delete(&self, client: &C, d: &ResourceData) -> Result<()> {
        let id = d.id();

        if !d.get_string("attached_id").is_empty() {
            info!("Detaching block storage ({})", id);
            client
                .detach(id, d.get_bool("live"))
                .await
                .context(KIND, Step::Detach, id)?;
        }

        info!("Deleting block storage: {}", id);
        client.delete(id).await.context(KIND, Step::Delete, id)
    }
}
