//! Provider gateway seam for droplet, snapshot, and tag operations.
//!
//! The backup and retention engines depend on this trait rather than on a
//! concrete provider so they can be exercised against scripted in-memory
//! gateways in tests.

use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a provider-assigned identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(
    /// Opaque identifier of a droplet.
    DropletId
);
id_newtype!(
    /// Opaque identifier of a snapshot.
    SnapshotId
);
id_newtype!(
    /// Opaque identifier of an asynchronous provider action.
    ActionId
);

/// A provisioned droplet as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Droplet {
    /// Provider-assigned identifier.
    pub id: DropletId,
    /// Display name; embedded in snapshot names created by this tool.
    pub name: String,
    /// Power state as last reported by the provider (for example `active`
    /// or `off`). Known only via provider queries, never tracked locally.
    pub status: String,
    /// Tags currently applied to the droplet.
    pub tags: Vec<String>,
}

/// A point-in-time image of a droplet's disk state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// Provider-assigned identifier.
    pub id: SnapshotId,
    /// Snapshot name. Names created by this tool embed a creation
    /// timestamp after the `--auto-backup--` marker.
    pub name: String,
    /// Creation time as reported by the provider, verbatim. Retention
    /// decisions use the name-embedded timestamp instead.
    pub created_at: String,
}

/// Handle for an in-flight provider-side operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionHandle {
    /// Provider-assigned action identifier.
    pub id: ActionId,
    /// Droplet the action targets.
    pub droplet_id: DropletId,
}

/// Status of an asynchronous action, observable only by polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionStatus {
    /// The action has not reached a terminal state yet.
    InProgress,
    /// The action completed successfully.
    Completed,
    /// The action reached a failed terminal state.
    Errored,
}

impl ActionStatus {
    /// Reports whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A label grouping droplets for batch selection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Number of droplets currently carrying the tag.
    pub droplet_count: u64,
}

/// Future returned by gateway operations.
pub type GatewayFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface the backup and retention engines need from a cloud
/// provider. All operations authenticate with the single bearer credential
/// the gateway was constructed with.
pub trait ProviderGateway {
    /// Provider specific error type returned by the gateway.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists droplets, restricted to those carrying `tag` when present.
    fn list_droplets<'a>(
        &'a self,
        tag: Option<&'a str>,
    ) -> GatewayFuture<'a, Vec<Droplet>, Self::Error>;

    /// Lists every droplet snapshot visible to the credential.
    fn list_snapshots(&self) -> GatewayFuture<'_, Vec<Snapshot>, Self::Error>;

    /// Requests a snapshot of `droplet_id` under `name`, powering the
    /// droplet off first when `power_off` is set. Returns the handle of the
    /// snapshot action for completion tracking.
    fn create_snapshot<'a>(
        &'a self,
        droplet_id: &'a DropletId,
        name: &'a str,
        power_off: bool,
    ) -> GatewayFuture<'a, ActionHandle, Self::Error>;

    /// Fetches the current status of an action. Callers poll until a
    /// terminal status is observed.
    fn action_status<'a>(
        &'a self,
        action: &'a ActionHandle,
    ) -> GatewayFuture<'a, ActionStatus, Self::Error>;

    /// Requests power-on for a droplet. The returned flag reports immediate
    /// acceptance only; the eventual powered-on state is not tracked.
    fn power_on<'a>(&'a self, droplet_id: &'a DropletId) -> GatewayFuture<'a, bool, Self::Error>;

    /// Deletes a snapshot, reporting whether the provider accepted the
    /// request.
    fn delete_snapshot<'a>(
        &'a self,
        snapshot_id: &'a SnapshotId,
    ) -> GatewayFuture<'a, bool, Self::Error>;

    /// Creates a tag. Creating a tag that already exists is not an error.
    fn create_tag<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, (), Self::Error>;

    /// Applies `name` to the given droplets.
    fn tag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error>;

    /// Removes `name` from the given droplets.
    fn untag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error>;

    /// Lists all tags known to the provider.
    fn list_tags(&self) -> GatewayFuture<'_, Vec<Tag>, Self::Error>;
}
