use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub token_verifier: Arc<dyn AccessTokenVerifier>,
    pub friendship_service: Arc<dyn FriendshipService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pool = None;
        let store: Arc<dyn RelationshipStore> = match settings.store.backend.as_str() {
            "memory" => {
                let memory = MemoryRelationshipStore::new();
                for record in seed_records(settings) {
                    memory.insert_user(record);
                }
                Arc::new(memory)
            }
            "mysql" => {
                let dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.mysql_dsn is required for the mysql backend"))?;
                let mysql = Pool::<MySql>::connect(dsn).await?;
                pool = Some(mysql.clone());
                let mysql_store = MySqlRelationshipStore::new(mysql, settings.store.max_attempts);
                for record in seed_records(settings) {
                    if !mysql_store.create_user(&record).await? {
                        debug!(user_id = %record.user_id, "seed user already present");
                    }
                }
                Arc::new(mysql_store)
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let token_verifier: Arc<dyn AccessTokenVerifier> = match settings.auth.backend.as_str() {
            "fake" => Arc::new(FakeAccessTokenVerifier::new()),
            "redis" => {
                let dsn = settings
                    .auth
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("auth.redis_dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                let prefix = settings.auth.token_prefix.as_deref().unwrap_or("access");
                Arc::new(RedisAccessTokenVerifier::new(redis_manager, prefix))
            }
            other => return Err(anyhow!("Unknown auth backend: {}", other)),
        };

        info!(
            store = %settings.store.backend,
            auth = %settings.auth.backend,
            seeded = settings.store.seed_users.len(),
            "server started"
        );

        Ok(Self::with_parts(store, token_verifier, pool))
    }

    /// Wires a server around an existing store, e.g. a seeded in-memory one.
    pub fn from_store(
        store: Arc<dyn RelationshipStore>,
        token_verifier: Arc<dyn AccessTokenVerifier>,
    ) -> Self {
        Self::with_parts(store, token_verifier, None)
    }

    fn with_parts(
        store: Arc<dyn RelationshipStore>,
        token_verifier: Arc<dyn AccessTokenVerifier>,
        pool: Option<Pool<MySql>>,
    ) -> Self {
        let friendship_service: Arc<dyn FriendshipService> =
            Arc::new(RealFriendshipService::new(store));
        Self {
            token_verifier,
            friendship_service,
            pool,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn seed_records(settings: &Settings) -> Vec<UserRecord> {
    settings
        .store
        .seed_users
        .iter()
        .map(|seed| UserRecord::new(UserId(seed.id), seed.username.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::parse_settings;

    #[tokio::test]
    async fn dev_settings_serve_seeded_users() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        let server = Server::try_new(&settings).await.unwrap();
        let seeds = &settings.store.seed_users;
        let (a, b) = (UserId(seeds[0].id), UserId(seeds[1].id));

        let token = FakeAccessTokenVerifier::token_for(a);
        assert_eq!(server.token_verifier.verify_token(&token).await.unwrap(), a);

        let sent = server.friendship_service.request_friendship(a, b).await.unwrap();
        assert_eq!(sent.user.username, seeds[1].username);
        let view = server.friendship_service.list_relations(b).await.unwrap();
        assert_eq!(view.incoming_requests[0].id, a);
    }
}
