use crate::domain_model::Relations;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new_v4() -> Self {
        UserId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImage {
    pub name: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

/// Public view of a user, returned alongside every relationship change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: UserId,
    pub username: String,
    pub profile_image: Option<ProfileImage>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub profile_image: Option<ProfileImage>,
    pub relations: Relations,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// A freshly registered user: no friends, no pending requests.
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        UserRecord {
            user_id,
            username: username.into(),
            profile_image: None,
            relations: Relations::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_profile_image(mut self, image: ProfileImage) -> Self {
        self.profile_image = Some(image);
        self
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.user_id,
            username: self.username.clone(),
            profile_image: self.profile_image.clone(),
        }
    }
}
