//! Collaborator ports - push channel, key-value cache and session

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::events::{ChangeEvent, ChangeTopic};
use crate::traits::RepoResult;
use crate::value_objects::UserId;

/// Push surface of the authoritative store
#[async_trait]
pub trait ChangeBus: Send + Sync {
    /// Publish a change to every subscriber of its topic
    async fn publish(&self, event: &ChangeEvent) -> RepoResult<()>;

    /// Subscribe to the given topics
    ///
    /// The stream ends when the subscription is torn down. Events from one
    /// topic arrive in publish order; there is no ordering across topics.
    async fn subscribe(&self, topics: &[ChangeTopic]) -> RepoResult<BoxStream<'static, ChangeEvent>>;
}

/// String key-value storage that survives restarts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`
    async fn get(&self, key: &str) -> RepoResult<Option<String>>;

    /// Overwrite the value under `key`
    async fn set(&self, key: &str, value: String) -> RepoResult<()>;
}

/// Authentication collaborator
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Id of the user currently using the client
    async fn current_user_id(&self) -> RepoResult<UserId>;

    /// Session changes; `None` means signed out
    fn session_changes(&self) -> BoxStream<'static, Option<UserId>>;
}
