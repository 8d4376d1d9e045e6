//! Anonymous identity
//!
//! Without sign-in, a device is identified by a random user id minted on
//! first use and kept in the key-value cache.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, instrument};

use feed_core::{KeyValueStore, RepoResult, SessionProvider, UserId};

/// Cache key holding the anonymous user id
pub const USER_ID_KEY: &str = "feed_user_id";

/// [`SessionProvider`] for anonymous, per-device users
pub struct AnonymousSession {
    kv: Arc<dyn KeyValueStore>,
    /// Serialises get-or-create so two callers never mint different ids
    lock: Mutex<()>,
    changes: watch::Sender<Option<UserId>>,
}

impl AnonymousSession {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            kv,
            lock: Mutex::new(()),
            changes,
        }
    }

    /// Forget the current id and mint a new one
    #[instrument(skip(self))]
    pub async fn reset(&self) -> RepoResult<UserId> {
        let _guard = self.lock.lock().await;
        let user_id = UserId::generate();
        self.kv.set(USER_ID_KEY, user_id.to_string()).await?;
        info!(user_id = %user_id, "Anonymous identity reset");
        self.changes.send_replace(Some(user_id.clone()));
        Ok(user_id)
    }
}

#[async_trait]
impl SessionProvider for AnonymousSession {
    async fn current_user_id(&self) -> RepoResult<UserId> {
        let _guard = self.lock.lock().await;

        if let Some(stored) = self.kv.get(USER_ID_KEY).await? {
            if let Ok(user_id) = UserId::parse(&stored) {
                self.changes.send_if_modified(|current| {
                    if current.as_ref() == Some(&user_id) {
                        false
                    } else {
                        *current = Some(user_id.clone());
                        true
                    }
                });
                return Ok(user_id);
            }
        }

        let user_id = UserId::generate();
        self.kv.set(USER_ID_KEY, user_id.to_string()).await?;
        info!(user_id = %user_id, "Minted anonymous identity");
        self.changes.send_replace(Some(user_id.clone()));
        Ok(user_id)
    }

    fn session_changes(&self) -> BoxStream<'static, Option<UserId>> {
        // A fresh receiver only reports changes made after this call
        let rx = self.changes.subscribe();

        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let current = rx.borrow_and_update().clone();
            Some((current, rx))
        })
        .boxed()
    }
}
