use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Full user record as held by the external user-profile store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_pic: String,
    #[serde(default)]
    pub bio: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Slim projection carried in wire payloads: message senders, conversation
/// participants, call peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_pic: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl From<&UserProfile> for UserSummary {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            profile_pic: user.profile_pic.clone(),
            is_online: user.is_online,
            last_seen: user.last_seen,
        }
    }
}
