//! Test support utilities shared across unit and integration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::gateway::{
    ActionHandle, ActionId, ActionStatus, Droplet, DropletId, GatewayFuture, ProviderGateway,
    Snapshot, SnapshotId, Tag,
};

/// Error produced by [`ScriptedGateway`] when a call is scripted to fail.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted gateway failure: {0}")]
pub struct ScriptedGatewayError(pub String);

/// A call recorded by [`ScriptedGateway`], in invocation order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GatewayCall {
    /// `list_droplets` with the optional tag filter.
    ListDroplets(Option<String>),
    /// `list_snapshots`.
    ListSnapshots,
    /// `create_snapshot` with droplet id, requested name, and power-off
    /// flag.
    CreateSnapshot(String, String, bool),
    /// `action_status` with the action id.
    ActionStatus(String),
    /// `power_on` with the droplet id.
    PowerOn(String),
    /// `delete_snapshot` with the snapshot id.
    DeleteSnapshot(String),
    /// `create_tag` with the tag name.
    CreateTag(String),
    /// `tag_droplets` with the tag name and droplet ids.
    TagDroplets(String, Vec<String>),
    /// `untag_droplets` with the tag name and droplet ids.
    UntagDroplets(String, Vec<String>),
    /// `list_tags`.
    ListTags,
}

#[derive(Debug, Default)]
struct State {
    droplets: Vec<Droplet>,
    snapshots: Vec<Snapshot>,
    tags: Vec<Tag>,
    action_scripts: HashMap<String, VecDeque<ActionStatus>>,
    failing_snapshot_requests: HashSet<String>,
    rejected_power_ons: HashSet<String>,
    rejected_deletes: HashSet<String>,
    fail_listing: bool,
    calls: Vec<GatewayCall>,
}

/// Scripted in-memory gateway for deterministic orchestration tests.
///
/// Droplets, snapshots, and per-droplet action status sequences are seeded
/// up front; every call is recorded so tests can assert ordering and call
/// counts. Unscripted actions complete on the first poll.
#[derive(Clone, Debug, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<State>>,
}

impl ScriptedGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("scripted gateway lock poisoned: {err}"))
    }

    /// Seeds a droplet.
    pub fn push_droplet(&self, droplet: Droplet) {
        self.state().droplets.push(droplet);
    }

    /// Seeds a snapshot.
    pub fn push_snapshot(&self, snapshot: Snapshot) {
        self.state().snapshots.push(snapshot);
    }

    /// Seeds a tag for `list_tags`.
    pub fn push_tag(&self, tag: Tag) {
        self.state().tags.push(tag);
    }

    /// Scripts the status sequence returned for the droplet's snapshot
    /// action. Once the sequence is exhausted further polls return
    /// `Completed`.
    pub fn script_action(&self, droplet_id: &str, statuses: &[ActionStatus]) {
        self.state()
            .action_scripts
            .insert(droplet_id.to_owned(), statuses.iter().copied().collect());
    }

    /// Makes `create_snapshot` fail for the given droplet.
    pub fn fail_snapshot_request(&self, droplet_id: &str) {
        self.state()
            .failing_snapshot_requests
            .insert(droplet_id.to_owned());
    }

    /// Makes `power_on` report rejection for the given droplet.
    pub fn reject_power_on(&self, droplet_id: &str) {
        self.state()
            .rejected_power_ons
            .insert(droplet_id.to_owned());
    }

    /// Makes `delete_snapshot` report rejection for the given snapshot.
    pub fn reject_delete(&self, snapshot_id: &str) {
        self.state().rejected_deletes.insert(snapshot_id.to_owned());
    }

    /// Makes listing calls fail.
    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Counts `power_on` calls recorded for the given droplet.
    #[must_use]
    pub fn power_on_calls(&self, droplet_id: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::PowerOn(id) if id == droplet_id))
            .count()
    }

    /// Counts `create_snapshot` calls recorded so far.
    #[must_use]
    pub fn snapshot_request_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::CreateSnapshot(..)))
            .count()
    }

    /// Counts `delete_snapshot` calls recorded so far.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::DeleteSnapshot(_)))
            .count()
    }
}

fn action_id_for(droplet_id: &DropletId) -> ActionId {
    ActionId::from(format!("action-{droplet_id}"))
}

fn droplet_id_of_action(action_id: &ActionId) -> String {
    action_id
        .as_str()
        .strip_prefix("action-")
        .unwrap_or(action_id.as_str())
        .to_owned()
}

impl ProviderGateway for ScriptedGateway {
    type Error = ScriptedGatewayError;

    fn list_droplets<'a>(
        &'a self,
        tag: Option<&'a str>,
    ) -> GatewayFuture<'a, Vec<Droplet>, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(GatewayCall::ListDroplets(tag.map(str::to_owned)));
            if state.fail_listing {
                return Err(ScriptedGatewayError(String::from("listing failed")));
            }
            let droplets = state
                .droplets
                .iter()
                .filter(|droplet| {
                    tag.is_none_or(|name| droplet.tags.iter().any(|candidate| candidate == name))
                })
                .cloned()
                .collect();
            Ok(droplets)
        })
    }

    fn list_snapshots(&self) -> GatewayFuture<'_, Vec<Snapshot>, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(GatewayCall::ListSnapshots);
            if state.fail_listing {
                return Err(ScriptedGatewayError(String::from("listing failed")));
            }
            Ok(state.snapshots.clone())
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        droplet_id: &'a DropletId,
        name: &'a str,
        power_off: bool,
    ) -> GatewayFuture<'a, ActionHandle, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(GatewayCall::CreateSnapshot(
                droplet_id.as_str().to_owned(),
                name.to_owned(),
                power_off,
            ));
            if state.failing_snapshot_requests.contains(droplet_id.as_str()) {
                return Err(ScriptedGatewayError(String::from(
                    "snapshot request refused",
                )));
            }
            Ok(ActionHandle {
                id: action_id_for(droplet_id),
                droplet_id: droplet_id.clone(),
            })
        })
    }

    fn action_status<'a>(
        &'a self,
        action: &'a ActionHandle,
    ) -> GatewayFuture<'a, ActionStatus, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(GatewayCall::ActionStatus(action.id.as_str().to_owned()));
            let droplet_id = droplet_id_of_action(&action.id);
            let status = state
                .action_scripts
                .get_mut(&droplet_id)
                .and_then(VecDeque::pop_front)
                .unwrap_or(ActionStatus::Completed);
            Ok(status)
        })
    }

    fn power_on<'a>(&'a self, droplet_id: &'a DropletId) -> GatewayFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(GatewayCall::PowerOn(droplet_id.as_str().to_owned()));
            Ok(!state.rejected_power_ons.contains(droplet_id.as_str()))
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        snapshot_id: &'a SnapshotId,
    ) -> GatewayFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .calls
                .push(GatewayCall::DeleteSnapshot(snapshot_id.as_str().to_owned()));
            Ok(!state.rejected_deletes.contains(snapshot_id.as_str()))
        })
    }

    fn create_tag<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.state()
                .calls
                .push(GatewayCall::CreateTag(name.to_owned()));
            Ok(())
        })
    }

    fn tag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let ids = droplet_ids
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect();
            self.state()
                .calls
                .push(GatewayCall::TagDroplets(name.to_owned(), ids));
            Ok(())
        })
    }

    fn untag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let ids = droplet_ids
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect();
            self.state()
                .calls
                .push(GatewayCall::UntagDroplets(name.to_owned(), ids));
            Ok(())
        })
    }

    fn list_tags(&self) -> GatewayFuture<'_, Vec<Tag>, Self::Error> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(GatewayCall::ListTags);
            if state.fail_listing {
                return Err(ScriptedGatewayError(String::from("listing failed")));
            }
            Ok(state.tags.clone())
        })
    }
}

/// Builds a droplet with the given id, name, and tags.
#[must_use]
pub fn droplet(id: &str, name: &str, tags: &[&str]) -> Droplet {
    Droplet {
        id: DropletId::from(id),
        name: name.to_owned(),
        status: String::from("active"),
        tags: tags.iter().map(|&tag| tag.to_owned()).collect(),
    }
}

/// Builds a snapshot with the given id and name.
#[must_use]
pub fn snapshot(id: &str, name: &str) -> Snapshot {
    Snapshot {
        id: SnapshotId::from(id),
        name: name.to_owned(),
        created_at: String::from("2024-01-01T00:00:00Z"),
    }
}
