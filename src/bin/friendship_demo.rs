//! Walks two users through the friendship lifecycle on the in-memory store.
//!
//! $ cargo run --bin friendship_demo

use moody::application_impl::RealFriendshipService;
use moody::application_port::FriendshipService;
use moody::domain_model::{ProfileImage, UserId, UserRecord};
use moody::infra_memory::MemoryRelationshipStore;
use moody::logger::Logger;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::new_bootstrap();

    let store = Arc::new(MemoryRelationshipStore::new());
    let alice = UserRecord::new(UserId::new_v4(), "alice").with_profile_image(ProfileImage {
        name: "alice.png".to_string(),
        image_url: "https://img.example/avatars/alice.png".to_string(),
    });
    let bobby = UserRecord::new(UserId::new_v4(), "bobby");
    let (a, b) = (alice.user_id, bobby.user_id);
    store.insert_user(alice);
    store.insert_user(bobby);

    let service = RealFriendshipService::new(store.clone());

    let sent = service.request_friendship(a, b).await?;
    println!("{}", serde_json::to_string_pretty(&sent)?);

    let denied = service.deny_friendship(b, a).await?;
    println!("{}", denied.message);

    service.request_friendship(a, b).await?;
    let crossed = service.request_friendship(b, a).await?;
    println!("{}", serde_json::to_string_pretty(&crossed)?);

    let view = service.list_relations(a).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    let dropped = service.unfollow(a, b).await?;
    println!("{}", dropped.message);

    match service.accept_friendship(b, a).await {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("accept without request: {e}"),
    }

    Ok(())
}
