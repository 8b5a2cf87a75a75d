use std::sync::Arc;

use log::{debug, error, info};

use crate::errors::StoreError;
use crate::models::player::{PlayerRecord, Presence, PLAYERS};
use crate::store::{Filter, Store};

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Marks the local player online or offline in the shared store. The owning
// screen calls online() when it starts and offline() when it is torn down;
// there is no ambient lifecycle hook, the caller drives it explicitly.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct PresenceTracker {
    store: Arc<dyn Store>,
    name: String,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn Store>, name: &str) -> Self {
        PresenceTracker { store, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn online(&self) -> Result<(), StoreError> {
        self.set_presence(Presence::Online).await
    }

    pub async fn offline(&self) -> Result<(), StoreError> {
        self.set_presence(Presence::Offline).await
    }

    // Idempotent upsert: update the existing record's status, or create the
    // record on first login. Re-applying the same status is a no-op as far
    // as anyone observing the collection can tell.
    pub async fn set_presence(&self, status: Presence) -> Result<(), StoreError> {
        let found = self
            .store
            .query(PLAYERS, &[Filter::eq("name", self.name.as_str())])
            .await?;

        match found.first() {
            Some(document) => {
                debug!("presence: {} -> {}", self.name, status);
                self.store
                    .update(PLAYERS, &document.id, PlayerRecord::status_delta(status))
                    .await
            }
            None => {
                info!("presence: first login for {}", self.name);
                self.store
                    .create(PLAYERS, PlayerRecord::fields(&self.name, status))
                    .await
                    .map(|_| ())
            }
        }
    }

    // Best-effort variant for lifecycle transitions: presence is a signal,
    // a failed write is logged and not retried.
    pub async fn announce(&self, status: Presence) {
        if let Err(err) = self.set_presence(status).await {
            error!("error updating presence for {}: {:?}", self.name, err);
        }
    }
}
