use serde::{Deserialize, Serialize};
use std::fmt;

/// Subset of the v1.1 user object (`users/show.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
}

/// One page of `friends/ids.json` with `stringify_ids=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendIdsPage {
    #[serde(default)]
    pub ids: Vec<String>,
    pub next_cursor_str: String,
}

impl FriendIdsPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor_str == "0"
    }
}

/// The only part of the v1.1 list object the mirror needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id_str: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    Public,
    #[default]
    Private,
}

impl ListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListMode::Public => "public",
            ListMode::Private => "private",
        }
    }
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temporary credentials from `oauth/request_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub oauth_callback_confirmed: Option<String>,
}

/// Token credentials from `oauth/access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
}
