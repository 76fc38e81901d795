//! List management on behalf of an authorized user.
use crate::twitter::client::{oauth_opts, signed_url};
use crate::twitter::oauth::{OAuthSigner, TokenCredentials};
use crate::twitter::types::{List, ListMode};
use anyhow::{Context, Result};
use futures::future::try_join_all;
use tlmirror_http::HttpClient;

/// `lists/members/create_all` accepts at most this many user ids per call.
pub const MEMBERS_PER_REQUEST: usize = 100;

#[derive(Clone, Debug)]
pub struct UserClient {
    http: HttpClient,
    signer: OAuthSigner,
    token: TokenCredentials,
}

impl UserClient {
    pub(crate) fn new(http: HttpClient, signer: OAuthSigner, token: TokenCredentials) -> Self {
        Self {
            http,
            signer,
            token,
        }
    }

    /// Create a list owned by the user and return its `id_str`.
    pub async fn create_list(&self, name: &str, mode: ListMode, description: &str) -> Result<String> {
        let url = signed_url(
            &self.http,
            "1.1/lists/create.json",
            &[
                ("name", name),
                ("mode", mode.as_str()),
                ("description", description),
            ],
        )?;
        let list: List = self
            .http
            .post_for_json(url.as_str(), oauth_opts(&self.signer, &url, Some(&self.token))?)
            .await
            .with_context(|| format!("creating list `{name}`"))?;

        tracing::info!(list_id = %list.id_str, name, %mode, "twitter.lists.create");
        Ok(list.id_str)
    }

    /// Add `user_ids` to the list, one request per chunk of [`MEMBERS_PER_REQUEST`],
    /// all chunks in flight at once. Returns the number of ids submitted.
    pub async fn add_members(&self, list_id: &str, user_ids: &[String]) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let batches = user_ids
            .chunks(MEMBERS_PER_REQUEST)
            .enumerate()
            .map(|(idx, chunk)| async move {
                self.add_member_batch(list_id, chunk)
                    .await
                    .with_context(|| format!("adding member batch {idx} to list {list_id}"))
            });
        let sent = try_join_all(batches).await?;

        tracing::info!(
            list_id,
            batches = sent.len(),
            members = user_ids.len(),
            "twitter.lists.members.added"
        );
        Ok(user_ids.len())
    }

    async fn add_member_batch(&self, list_id: &str, chunk: &[String]) -> Result<()> {
        let joined = chunk.join(",");
        let url = signed_url(
            &self.http,
            "1.1/lists/members/create_all.json",
            &[("list_id", list_id), ("user_id", joined.as_str())],
        )?;
        let _list: List = self
            .http
            .post_for_json(url.as_str(), oauth_opts(&self.signer, &url, Some(&self.token))?)
            .await?;
        tracing::debug!(list_id, batch_len = chunk.len(), "twitter.lists.members.batch");
        Ok(())
    }
}
