// SPDX-License-Identifier: MPL-2.0
//! HTTP implementations of the backend seams, speaking the JSON
//! contracts of the annotation service.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::{Error, Result};
use crate::item::SectionDescriptor;
use crate::tiles::TileKey;

use super::{
    FrameSource, PageRequest, SectionPageResponse, SectionSource, TileSource, TileUrlRequest,
};

/// Backend client for one team/content scope.
///
/// `reqwest::Client` is internally reference-counted, so the backend is
/// cheap to clone into spawned request futures.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    team_slug: String,
    content_id: String,
    task_id: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, team_slug: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            team_slug: team_slug.into(),
            content_id: content_id.into(),
            task_id: None,
        }
    }

    /// Scopes tile URL requests to an annotation task/session.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    fn tiles_url(&self) -> String {
        format!(
            "{}/teams/{}/tiles/{}/sign",
            self.base_url, self.team_slug, self.content_id
        )
    }

    fn sections_url(&self, item_id: &str, slot_name: &str) -> String {
        format!(
            "{}/teams/{}/items/{}/slots/{}/sections",
            self.base_url, self.team_slug, item_id, slot_name
        )
    }

    async fn fetch_bytes(client: reqwest::Client, url: String) -> Result<Vec<u8>> {
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl TileSource for HttpBackend {
    fn resolve_tile_urls(
        &self,
        tiles: Vec<TileKey>,
    ) -> BoxFuture<'static, Result<HashMap<TileKey, String>>> {
        let client = self.client.clone();
        let url = self.tiles_url();
        let body = TileUrlRequest {
            content_id: self.content_id.clone(),
            task_id: self.task_id.clone(),
            tiles: tiles.iter().copied().map(Into::into).collect(),
        };

        async move {
            let response = client.post(&url).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(Error::Transport(format!(
                    "POST {} returned {}",
                    url,
                    response.status()
                )));
            }
            // Response is keyed by the wire form `#z#y#x`.
            let by_wire_key: HashMap<String, String> = response.json().await?;
            Ok(tiles
                .into_iter()
                .filter_map(|key| {
                    by_wire_key
                        .get(&key.wire_key())
                        .map(|signed| (key, signed.clone()))
                })
                .collect())
        }
        .boxed()
    }

    fn fetch_tile(&self, url: String) -> BoxFuture<'static, Result<Vec<u8>>> {
        Self::fetch_bytes(self.client.clone(), url).boxed()
    }
}

impl SectionSource for HttpBackend {
    fn load_page(
        &self,
        item_id: String,
        slot_name: String,
        page: PageRequest,
    ) -> BoxFuture<'static, Result<Vec<SectionDescriptor>>> {
        let client = self.client.clone();
        let url = self.sections_url(&item_id, &slot_name);

        async move {
            let response = client
                .get(&url)
                .query(&[("offset", page.offset), ("size", page.size)])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Error::Transport(format!(
                    "GET {} returned {}",
                    url,
                    response.status()
                )));
            }
            let page: SectionPageResponse = response.json().await?;
            Ok(page.sections)
        }
        .boxed()
    }
}

impl FrameSource for HttpBackend {
    fn fetch_frame(&self, url: String) -> BoxFuture<'static, Result<Vec<u8>>> {
        Self::fetch_bytes(self.client.clone(), url).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_scoped_to_team_and_content() {
        let backend = HttpBackend::new("https://api.example.com/v2", "acme", "img-9");
        assert_eq!(
            backend.tiles_url(),
            "https://api.example.com/v2/teams/acme/tiles/img-9/sign"
        );
        assert_eq!(
            backend.sections_url("item-1", "0"),
            "https://api.example.com/v2/teams/acme/items/item-1/slots/0/sections"
        );
    }

    #[test]
    fn with_task_sets_request_scope() {
        let backend = HttpBackend::new("https://api.example.com", "acme", "img-9")
            .with_task("task-3");
        assert_eq!(backend.task_id.as_deref(), Some("task-3"));
    }
}
