//! Wire types for the DigitalOcean v2 API.

use serde::Deserialize;

use crate::gateway::{ActionStatus, Droplet, DropletId, Snapshot, SnapshotId, Tag};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Links {
    #[serde(default)]
    pub(crate) pages: Pages,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Pages {
    #[serde(default)]
    pub(crate) next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DropletsPage {
    pub(crate) droplets: Vec<WireDroplet>,
    #[serde(default)]
    pub(crate) links: Links,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDroplet {
    pub(crate) id: u64,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}

impl From<WireDroplet> for Droplet {
    fn from(value: WireDroplet) -> Self {
        Self {
            id: DropletId::from(value.id.to_string()),
            name: value.name,
            status: value.status,
            tags: value.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotsPage {
    pub(crate) snapshots: Vec<WireSnapshot>,
    #[serde(default)]
    pub(crate) links: Links,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSnapshot {
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) created_at: String,
}

impl From<WireSnapshot> for Snapshot {
    fn from(value: WireSnapshot) -> Self {
        Self {
            id: SnapshotId::from(value.id),
            name: value.name,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionEnvelope {
    pub(crate) action: WireAction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAction {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) status: String,
}

impl WireAction {
    /// Maps the provider's status string onto the domain status. Unknown
    /// strings map to `Errored` so pollers cannot loop forever on a status
    /// this client does not understand.
    pub(crate) fn parsed_status(&self) -> ActionStatus {
        match self.status.as_str() {
            "in-progress" => ActionStatus::InProgress,
            "completed" => ActionStatus::Completed,
            _ => ActionStatus::Errored,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsPage {
    pub(crate) tags: Vec<WireTag>,
    #[serde(default)]
    pub(crate) links: Links,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTag {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) resources: WireTagResources,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireTagResources {
    #[serde(default)]
    pub(crate) droplets: WireTagCount,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireTagCount {
    #[serde(default)]
    pub(crate) count: u64,
}

impl From<WireTag> for Tag {
    fn from(value: WireTag) -> Self {
        Self {
            name: value.name,
            droplet_count: value.resources.droplets.count,
        }
    }
}
