use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::KeyValueStore;

pub const DEFAULT_USERNAME_KEY: &str = "@username";
const FALLBACK_DISPLAY_NAME: &str = "User";

/// The user-name record. Independent of the task list and stored as a plain string.
pub struct Profile<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
}

impl<S: KeyValueStore + ?Sized> Profile<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, DEFAULT_USERNAME_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Empty when nothing is stored or the read fails.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub async fn load_user_name(&self) -> String {
        match self.store.get(&self.key).await {
            Ok(name) => name.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "failed to load user name");
                String::new()
            }
        }
    }

    /// Trims and stores `name`, returning what was written.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub async fn save_user_name(&self, name: &str) -> Result<String, StoreError> {
        let trimmed = name.trim().to_string();
        self.store.set(&self.key, trimmed.clone()).await?;
        debug!("user name saved");
        Ok(trimmed)
    }
}

/// Name shown in the greeting.
pub fn display_name(user_name: &str) -> &str {
    if user_name.is_empty() {
        FALLBACK_DISPLAY_NAME
    } else {
        user_name
    }
}
