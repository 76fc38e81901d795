//! Copy the set of accounts one user follows into a fresh list owned by another.
use crate::twitter::client::TwitterApi;
use crate::twitter::lists::UserClient;
use crate::twitter::types::{ListMode, User};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Twitter rejects list descriptions longer than this.
const MAX_DESCRIPTION_CHARS: usize = 100;

/// Name and visibility of the list to create; the `list` section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListSettings {
    pub name: String,
    pub mode: ListMode,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            name: "TL再現リスト".to_string(),
            mode: ListMode::Private,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    pub list_id: String,
    pub members_added: usize,
}

/// Create the list, add `source` itself, then every account `source` follows.
pub async fn mirror_timeline(
    api: &TwitterApi,
    user: &UserClient,
    source: &User,
    settings: &ListSettings,
) -> Result<MirrorReport> {
    let description = list_description(source);
    let list_id = user
        .create_list(&settings.name, settings.mode, &description)
        .await?;

    // The source's own tweets are part of its home timeline.
    let mut members_added = user
        .add_members(&list_id, std::slice::from_ref(&source.id_str))
        .await?;

    let friends = api.friend_ids(&source.screen_name).await?;
    members_added += user.add_members(&list_id, &friends).await?;

    tracing::info!(
        source = %source.screen_name,
        list_id = %list_id,
        members_added,
        "timeline.mirrored"
    );
    Ok(MirrorReport {
        list_id,
        members_added,
    })
}

fn list_description(source: &User) -> String {
    let label = if source.name.trim().is_empty() {
        source.screen_name.as_str()
    } else {
        source.name.as_str()
    };
    label.chars().take(MAX_DESCRIPTION_CHARS).collect()
}
