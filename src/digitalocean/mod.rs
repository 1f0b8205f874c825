//! DigitalOcean implementation of the provider gateway.
//!
//! Speaks the v2 REST API directly over HTTPS with a bearer token. List
//! endpoints follow pagination links; droplet power and snapshot requests
//! go through the droplet actions endpoint.

mod error;
mod types;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::gateway::{
    ActionHandle, ActionId, ActionStatus, Droplet, DropletId, GatewayFuture, ProviderGateway,
    Snapshot, SnapshotId, Tag,
};

pub use error::DoGatewayError;
use types::{ActionEnvelope, DropletsPage, SnapshotsPage, TagsPage};

const DO_API_BASE: &str = "https://api.digitalocean.com/v2";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 200;

// Creating a tag that already exists answers 422; callers treat the tag as
// present either way.
const TAG_EXISTS_STATUS: u16 = 422;

/// Gateway speaking to the DigitalOcean v2 REST API.
#[derive(Clone, Debug)]
pub struct DoGateway {
    http: Client,
    base_url: String,
    token: String,
}

impl DoGateway {
    /// Builds a gateway authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`DoGatewayError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(token: impl Into<String>) -> Result<Self, DoGatewayError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: String::from(DO_API_BASE),
            token: token.into(),
        })
    }

    /// Overrides the API base URL. Primarily used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> Result<T, DoGatewayError> {
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        decode(response, resource).await
    }

    async fn post_droplet_action(
        &self,
        droplet_id: &DropletId,
        body: &serde_json::Value,
        resource: &str,
    ) -> Result<ActionHandle, DoGatewayError> {
        let url = format!("{}/droplets/{droplet_id}/actions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let envelope: ActionEnvelope = decode(response, resource).await?;
        Ok(ActionHandle {
            id: ActionId::from(envelope.action.id.to_string()),
            droplet_id: droplet_id.clone(),
        })
    }

    async fn list_droplet_pages(&self, first_url: String) -> Result<Vec<Droplet>, DoGatewayError> {
        let mut url = first_url;
        let mut droplets = Vec::new();
        loop {
            let page: DropletsPage = self.get_json(&url, "droplets").await?;
            droplets.extend(page.droplets.into_iter().map(Droplet::from));
            match page.links.pages.next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(droplets)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, DoGatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DoGatewayError::Api {
            status: status.as_u16(),
            message: format!("{resource}: {body}"),
        });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| DoGatewayError::Decode {
        resource: resource.to_owned(),
        message: err.to_string(),
    })
}

async fn expect_success(
    response: reqwest::Response,
    resource: &str,
) -> Result<(), DoGatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DoGatewayError::Api {
        status: status.as_u16(),
        message: format!("{resource}: {body}"),
    })
}

fn tag_resources_body(droplet_ids: &[DropletId]) -> serde_json::Value {
    let resources: Vec<serde_json::Value> = droplet_ids
        .iter()
        .map(|id| json!({"resource_id": id.as_str(), "resource_type": "droplet"}))
        .collect();
    json!({ "resources": resources })
}

impl ProviderGateway for DoGateway {
    type Error = DoGatewayError;

    fn list_droplets<'a>(
        &'a self,
        tag: Option<&'a str>,
    ) -> GatewayFuture<'a, Vec<Droplet>, Self::Error> {
        Box::pin(async move {
            let first_url = tag.map_or_else(
                || format!("{}/droplets?per_page={PAGE_SIZE}", self.base_url),
                |tag_name| {
                    format!(
                        "{}/droplets?per_page={PAGE_SIZE}&tag_name={tag_name}",
                        self.base_url
                    )
                },
            );
            self.list_droplet_pages(first_url).await
        })
    }

    fn list_snapshots(&self) -> GatewayFuture<'_, Vec<Snapshot>, Self::Error> {
        Box::pin(async move {
            let mut url = format!(
                "{}/snapshots?resource_type=droplet&per_page={PAGE_SIZE}",
                self.base_url
            );
            let mut snapshots = Vec::new();
            loop {
                let page: SnapshotsPage = self.get_json(&url, "snapshots").await?;
                snapshots.extend(page.snapshots.into_iter().map(Snapshot::from));
                match page.links.pages.next {
                    Some(next) => url = next,
                    None => break,
                }
            }
            Ok(snapshots)
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        droplet_id: &'a DropletId,
        name: &'a str,
        power_off: bool,
    ) -> GatewayFuture<'a, ActionHandle, Self::Error> {
        Box::pin(async move {
            if power_off {
                // Droplet actions queue server-side in submission order, so
                // the snapshot only starts once the power-off has completed.
                self.post_droplet_action(droplet_id, &json!({"type": "power_off"}), "power_off")
                    .await?;
            }
            self.post_droplet_action(
                droplet_id,
                &json!({"type": "snapshot", "name": name}),
                "snapshot",
            )
            .await
        })
    }

    fn action_status<'a>(
        &'a self,
        action: &'a ActionHandle,
    ) -> GatewayFuture<'a, ActionStatus, Self::Error> {
        Box::pin(async move {
            let url = format!("{}/actions/{}", self.base_url, action.id);
            let envelope: ActionEnvelope = self.get_json(&url, "action").await?;
            Ok(envelope.action.parsed_status())
        })
    }

    fn power_on<'a>(&'a self, droplet_id: &'a DropletId) -> GatewayFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            let url = format!("{}/droplets/{droplet_id}/actions", self.base_url);
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&json!({"type": "power_on"}))
                .send()
                .await?;
            Ok(response.status().is_success())
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        snapshot_id: &'a SnapshotId,
    ) -> GatewayFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            let url = format!("{}/snapshots/{snapshot_id}", self.base_url);
            let response = self
                .http
                .delete(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            Ok(response.status().is_success())
        })
    }

    fn create_tag<'a>(&'a self, name: &'a str) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!("{}/tags", self.base_url);
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&json!({"name": name}))
                .send()
                .await?;
            if response.status().as_u16() == TAG_EXISTS_STATUS {
                return Ok(());
            }
            expect_success(response, "tags").await
        })
    }

    fn tag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!("{}/tags/{name}/resources", self.base_url);
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&tag_resources_body(droplet_ids))
                .send()
                .await?;
            expect_success(response, "tag resources").await
        })
    }

    fn untag_droplets<'a>(
        &'a self,
        name: &'a str,
        droplet_ids: &'a [DropletId],
    ) -> GatewayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = format!("{}/tags/{name}/resources", self.base_url);
            let response = self
                .http
                .delete(&url)
                .bearer_auth(&self.token)
                .json(&tag_resources_body(droplet_ids))
                .send()
                .await?;
            expect_success(response, "tag resources").await
        })
    }

    fn list_tags(&self) -> GatewayFuture<'_, Vec<Tag>, Self::Error> {
        Box::pin(async move {
            let mut url = format!("{}/tags?per_page={PAGE_SIZE}", self.base_url);
            let mut tags = Vec::new();
            loop {
                let page: TagsPage = self.get_json(&url, "tags").await?;
                tags.extend(page.tags.into_iter().map(Tag::from));
                match page.links.pages.next {
                    Some(next) => url = next,
                    None => break,
                }
            }
            Ok(tags)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn gateway_defaults_to_the_public_api() {
        let gateway = DoGateway::new("dop_v1_secret").expect("client should build");

        assert_eq!(gateway.base_url, DO_API_BASE);
    }

    #[rstest]
    fn base_url_override_applies() {
        let gateway = DoGateway::new("dop_v1_secret")
            .expect("client should build")
            .with_base_url("http://127.0.0.1:8080/v2");

        assert_eq!(gateway.base_url, "http://127.0.0.1:8080/v2");
    }

    #[rstest]
    fn tag_resources_body_targets_droplets() {
        let body = tag_resources_body(&[DropletId::from("3164444"), DropletId::from("3164445")]);

        assert_eq!(
            body,
            serde_json::json!({
                "resources": [
                    {"resource_id": "3164444", "resource_type": "droplet"},
                    {"resource_id": "3164445", "resource_type": "droplet"},
                ]
            })
        );
    }
}
