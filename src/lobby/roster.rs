use log::warn;

use crate::errors::StoreError;
use crate::models::player::{PlayerRecord, Presence, PLAYERS};
use crate::store::{Snapshot, Store, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub status: Presence,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Live list of the other known players and their presence, derived from a
// subscription on the full players collection. The list is recomputed from
// scratch on every snapshot, so delivering the same snapshot twice leaves it
// unchanged. Entries keep store order; the UI may sort however it likes.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct Roster {
    local_name: String,
    subscription: Subscription,
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn subscribe(store: &dyn Store, local_name: &str) -> Result<Roster, StoreError> {
        let subscription = store.subscribe(PLAYERS, &[])?;
        Ok(Roster {
            local_name: local_name.to_string(),
            subscription,
            entries: Vec::new(),
        })
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    /// Wait for the next snapshot and recompute the roster. Returns false
    /// once the subscription has ended; a delivery error is logged and the
    /// last good roster is kept.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.subscription.next().await {
                Some(Ok(snapshot)) => {
                    self.apply(&snapshot);
                    return true;
                }
                Some(Err(err)) => {
                    warn!("error fetching players: {:?}", err);
                }
                None => return false,
            }
        }
    }

    pub(crate) fn apply(&mut self, snapshot: &Snapshot) {
        self.entries = snapshot
            .iter()
            .filter_map(PlayerRecord::from_document)
            .filter(|record| record.name != self.local_name)
            .map(|record| RosterEntry { name: record.name, status: record.status })
            .collect();
    }
}
