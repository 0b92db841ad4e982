use super::auth::TwitterAuth;
use super::types::*;
use super::SocialApi;
use crate::engine::failure::{classify, UpstreamError};
use crate::store::types::{Follower, FollowerId};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Largest id page the followers/ids endpoint serves.
const IDS_PAGE_SIZE: u32 = 5000;

pub struct TwitterRest {
    client: Client,
    auth: Arc<TwitterAuth>,
    base_url: String,
}

impl TwitterRest {
    pub fn new(auth: Arc<TwitterAuth>, base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signed GET with query parameters.
    async fn get_response(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, UpstreamError> {
        let url = self.url(path);
        let header = self.auth.authorization_header("GET", &url, query);
        let req = self.client.get(&url).query(query).header("Authorization", header);
        Self::send(req).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let resp = self.get_response(path, query).await?;
        Self::read(path, resp).await
    }

    async fn send(req: RequestBuilder) -> Result<Response, UpstreamError> {
        Ok(req.send().await?)
    }

    async fn read<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, UpstreamError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = classify(status.as_u16(), &body);
            tracing::debug!(path, status = status.as_u16(), error = %err, "upstream call failed");
            return Err(err);
        }
        resp.json()
            .await
            .map_err(|e| UpstreamError::other(format!("failed to parse {} response: {}", path, e)))
    }

    async fn lookup(&self, key: &str, values: String) -> Result<Vec<Follower>, UpstreamError> {
        let path = "/1.1/users/lookup.json";
        let query = [(key, values), ("include_entities", "false".to_string())];
        let resp = self.get_response(path, &query).await?;
        // 404 (code 17): none of the requested accounts exist anymore.
        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(key, "lookup matched no users");
            return Ok(Vec::new());
        }
        let users: Vec<UserObject> = Self::read(path, resp).await?;
        users.into_iter().map(UserObject::into_follower).collect()
    }
}

#[async_trait]
impl SocialApi for TwitterRest {
    async fn follower_count(&self) -> Result<u64, UpstreamError> {
        let query = [
            ("skip_status", "true".to_string()),
            ("include_entities", "false".to_string()),
        ];
        let resp: AccountResponse =
            self.get("/1.1/account/verify_credentials.json", &query).await?;
        Ok(resp.followers_count)
    }

    async fn follower_id_page(&self, cursor: Cursor) -> Result<IdPage, UpstreamError> {
        let query = [
            ("cursor", cursor.value().to_string()),
            ("count", IDS_PAGE_SIZE.to_string()),
        ];
        let resp: IdsResponse = self.get("/1.1/followers/ids.json", &query).await?;
        Ok(resp.into())
    }

    async fn lookup_profiles(
        &self,
        ids: &[FollowerId],
    ) -> Result<Vec<Follower>, UpstreamError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.lookup("user_id", joined).await
    }

    async fn lookup_screen_names(
        &self,
        names: &[String],
    ) -> Result<Vec<Follower>, UpstreamError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.lookup("screen_name", names.join(",")).await
    }

    async fn send_direct_message(
        &self,
        recipient: FollowerId,
        text: &str,
    ) -> Result<(), UpstreamError> {
        let path = "/1.1/direct_messages/events/new.json";
        let url = self.url(path);
        let header = self.auth.authorization_header("POST", &url, &[]);
        let req = self
            .client
            .post(&url)
            .header("Authorization", header)
            .json(&DirectMessageRequest::new(recipient, text));
        let resp = Self::send(req).await?;
        let _: serde_json::Value = Self::read(path, resp).await?;
        Ok(())
    }
}
