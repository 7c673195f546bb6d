use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::types::Json;
use sqlx::{MySqlPool, Row};
use std::collections::BTreeSet;

/// `user_relation` table with a `version` column used for compare-and-set.
pub struct MySqlRelationshipStore {
    pool: MySqlPool,
    max_attempts: u32,
}

impl MySqlRelationshipStore {
    pub fn new(pool: MySqlPool, max_attempts: u32) -> Self {
        MySqlRelationshipStore {
            pool,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Inserts the relation row for a user. Returns `false` if the row already
    /// exists, in which case it is left as it is.
    pub async fn create_user(&self, record: &UserRecord) -> Result<bool, FriendshipError> {
        let (image_name, image_url) = split_image(record.profile_image.as_ref());

        let result = sqlx::query(
            r#"
INSERT INTO user_relation
    (user_id, username, profile_image_name, profile_image_url,
     friends, incoming_requests, outgoing_requests, version, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
ON DUPLICATE KEY UPDATE user_id = user_id
"#,
        )
        .bind(record.user_id)
        .bind(&record.username)
        .bind(image_name)
        .bind(image_url)
        .bind(Json(&record.relations.friends))
        .bind(Json(&record.relations.incoming_requests))
        .bind(Json(&record.relations.outgoing_requests))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| FriendshipError::Store(format!("insert user relation: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch(&self, user_id: UserId) -> Result<(UserRecord, i64), FriendshipError> {
        let row = sqlx::query(
            r#"
SELECT user_id, username, profile_image_name, profile_image_url,
       friends, incoming_requests, outgoing_requests, version, updated_at
FROM user_relation
WHERE user_id = ?
"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FriendshipError::Store(format!("select user relation: {e}")))?
        .ok_or(FriendshipError::NotFound(user_id))?;

        decode_row(&row).map_err(|e| FriendshipError::Store(format!("decode user relation: {e}")))
    }
}

fn split_image(image: Option<&ProfileImage>) -> (Option<&str>, Option<&str>) {
    match image {
        Some(image) => (Some(image.name.as_str()), Some(image.image_url.as_str())),
        None => (None, None),
    }
}

fn decode_row(row: &MySqlRow) -> Result<(UserRecord, i64), sqlx::Error> {
    let image_name: Option<String> = row.try_get("profile_image_name")?;
    let image_url: Option<String> = row.try_get("profile_image_url")?;
    let profile_image = match (image_name, image_url) {
        (Some(name), Some(image_url)) => Some(ProfileImage { name, image_url }),
        _ => None,
    };

    let Json(friends): Json<BTreeSet<UserId>> = row.try_get("friends")?;
    let Json(incoming_requests): Json<BTreeSet<UserId>> = row.try_get("incoming_requests")?;
    let Json(outgoing_requests): Json<BTreeSet<UserId>> = row.try_get("outgoing_requests")?;

    let record = UserRecord {
        user_id: row.try_get::<UserId, _>("user_id")?,
        username: row.try_get("username")?,
        profile_image,
        relations: Relations {
            friends,
            incoming_requests,
            outgoing_requests,
        },
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    };
    Ok((record, row.try_get("version")?))
}

#[async_trait::async_trait]
impl RelationshipStore for MySqlRelationshipStore {
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, FriendshipError> {
        let (record, _) = self.fetch(user_id).await?;
        Ok(record)
    }

    async fn atomic_update(
        &self,
        user_id: UserId,
        mutation: &RecordMutation<'_>,
    ) -> Result<RecordUpdate, FriendshipError> {
        update_with_retries(self, user_id, mutation, self.max_attempts).await
    }
}

#[async_trait::async_trait]
impl VersionedRecords for MySqlRelationshipStore {
    async fn fetch_versioned(&self, user_id: UserId) -> Result<(UserRecord, i64), FriendshipError> {
        self.fetch(user_id).await
    }

    async fn compare_and_set(&self, record: &UserRecord, version: i64) -> Result<bool, FriendshipError> {
        let result = sqlx::query(
            r#"
UPDATE user_relation
SET friends = ?, incoming_requests = ?, outgoing_requests = ?,
    version = version + 1, updated_at = ?
WHERE user_id = ? AND version = ?
"#,
        )
        .bind(Json(&record.relations.friends))
        .bind(Json(&record.relations.incoming_requests))
        .bind(Json(&record.relations.outgoing_requests))
        .bind(record.updated_at)
        .bind(record.user_id)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(|e| FriendshipError::Store(format!("update user relation: {e}")))?;

        Ok(result.rows_affected() == 1)
    }
}
