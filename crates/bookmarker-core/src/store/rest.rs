//! PostgREST-backed bookmark store.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use super::BookmarkStore;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};
use crate::realtime::{ChangeFilter, RealtimeClient, Subscription, BOOKMARKS_TABLE};
use crate::state::AccessToken;
use crate::util::describe_api_error;

#[derive(Clone)]
pub struct PostgrestBookmarkStore {
    table_url: String,
    anon_key: String,
    access_token: AccessToken,
    client: Client,
    realtime: RealtimeClient,
}

impl PostgrestBookmarkStore {
    /// Each request is authorized with whatever `access_token` holds at send
    /// time, otherwise with the anon key (which row-level security scopes to
    /// nothing).
    pub fn new(config: &ClientConfig, access_token: AccessToken) -> Result<Self> {
        Ok(Self {
            table_url: format!("{}/{BOOKMARKS_TABLE}", config.rest_url()),
            anon_key: config.anon_key().to_string(),
            realtime: RealtimeClient::new(config, access_token.clone()),
            access_token,
            client: Client::builder().build()?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .get()
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api(describe_api_error(status, &body)))
        }
    }
}

fn id_filter(id: &BookmarkId) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl BookmarkStore for PostgrestBookmarkStore {
    async fn list(&self) -> Result<Vec<Bookmark>> {
        let request = self
            .client
            .get(&self.table_url)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        Ok(self.send(request).await?.json().await?)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        let request = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=representation")
            .json(&[bookmark]);
        let rows: Vec<Bookmark> = self.send(request).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Api("insert returned no row".to_string()))
    }

    async fn update(&self, id: &BookmarkId, patch: &BookmarkPatch) -> Result<Bookmark> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        let request = self
            .client
            .patch(&self.table_url)
            .query(&id_filter(id))
            .header("Prefer", "return=representation")
            .json(patch);
        let rows: Vec<Bookmark> = self.send(request).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &BookmarkId) -> Result<()> {
        let request = self.client.delete(&self.table_url).query(&id_filter(id));
        self.send(request).await?;
        Ok(())
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        self.realtime.subscribe(filter).await
    }
}
