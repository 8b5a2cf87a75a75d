use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::errors::ChallengeError;
use crate::game::session::SessionContext;
use crate::models::challenge::{ChallengeRecord, ChallengeStatus, CHALLENGES};
use crate::store::{Filter, Store, Subscription};

/// A pending challenge surfaced to the local player for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingChallenge {
    pub id: String,
    pub from_player: String,
    pub to_player: String,
}

/// How a sent challenge ended, as observed by the challenger.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeOutcome {
    Accepted(SessionContext),
    Declined,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Creation, acceptance, decline and observation of challenge records. Both
// clients run one of these against the same store: the challenger creates a
// pending record and watches it, the challenged player sees it through an
// incoming feed and resolves it. A challenge record transitions away from
// pending exactly once.
//
// Crossed challenges (A challenges B while B challenges A) are deliberately
// not de-duplicated: each side only acts on the record it created and the
// records addressed to it, so both challenges can be accepted independently
// and each produces its own session with the roles swapped.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct ChallengeCoordinator {
    store: Arc<dyn Store>,
}

impl ChallengeCoordinator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        ChallengeCoordinator { store }
    }

    /// Create a pending challenge from one player to another and return the
    /// store-assigned id. The caller is expected to follow up with
    /// [`await_outcome`](Self::await_outcome).
    pub async fn send_challenge(&self, from: &str, to: &str) -> Result<String, ChallengeError> {
        info!("{} challenges {}", from, to);
        let id = self
            .store
            .create(CHALLENGES, ChallengeRecord::fields(from, to))
            .await
            .map_err(|err| {
                error!("failed to send challenge: {:?}", err);
                err
            })?;
        debug!("challenge sent to {} with id {}", to, id);
        Ok(id)
    }

    /// Feed of pending challenges addressed to the given player.
    pub fn incoming(&self, identity: &str) -> Result<IncomingChallenges, ChallengeError> {
        let subscription = self.store.subscribe(
            CHALLENGES,
            &[
                Filter::eq("toPlayer", identity),
                Filter::eq("status", ChallengeStatus::Pending.as_str()),
            ],
        )?;
        Ok(IncomingChallenges { subscription, surfaced: None })
    }

    /// Accept a pending challenge on behalf of the challenged player and
    /// enter the session: the acceptor plays against the challenger, who
    /// moves first.
    pub async fn accept_challenge(
        &self,
        id: &str,
        from: &str,
        to: &str,
    ) -> Result<SessionContext, ChallengeError> {
        self.transition(id, ChallengeStatus::Accepted).await?;
        info!("{} accepted challenge {} from {}", to, id, from);
        Ok(SessionContext::for_acceptor(id, from, to))
    }

    /// Decline a pending challenge. The challenger learns about it only
    /// through the status field on the record it is watching.
    pub async fn decline_challenge(&self, id: &str) -> Result<(), ChallengeError> {
        self.transition(id, ChallengeStatus::Declined).await?;
        info!("challenge {} declined", id);
        Ok(())
    }

    // Guarded pending -> terminal transition. The read-then-write is not
    // atomic; last write wins if an accept and a decline race, but an honest
    // client can no longer move a record out of a terminal status.
    async fn transition(&self, id: &str, status: ChallengeStatus) -> Result<(), ChallengeError> {
        let document = self
            .store
            .get(CHALLENGES, id)
            .await?
            .ok_or_else(|| ChallengeError::Missing(id.to_string()))?;
        let record = ChallengeRecord::from_document(&document)
            .ok_or_else(|| ChallengeError::Missing(id.to_string()))?;
        if record.status != ChallengeStatus::Pending {
            return Err(ChallengeError::AlreadyResolved { id: id.to_string(), status: record.status });
        }
        self.store
            .update(CHALLENGES, id, ChallengeRecord::status_delta(status))
            .await
            .map_err(|err| {
                error!("error resolving challenge {}: {:?}", id, err);
                ChallengeError::Store(err)
            })
    }

    /// Challenger-side completion: watch the record created by
    /// [`send_challenge`](Self::send_challenge) until the other player
    /// resolves it. Snapshots whose players do not match what was sent are
    /// ignored, guarding against watching a stale id.
    pub async fn await_outcome(
        &self,
        id: &str,
        from: &str,
        to: &str,
    ) -> Result<ChallengeOutcome, ChallengeError> {
        let mut subscription = self.store.watch(CHALLENGES, id)?;
        while let Some(item) = subscription.next().await {
            let snapshot = match item {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!("error listening to challenge {}: {:?}", id, err);
                    continue;
                }
            };
            let Some(record) = snapshot.first().and_then(ChallengeRecord::from_document) else {
                continue;
            };
            if record.from_player != from || record.to_player != to {
                warn!("challenge {} does not match the sent players, ignoring", id);
                continue;
            }
            match record.status {
                ChallengeStatus::Pending => continue,
                ChallengeStatus::Accepted => {
                    info!("challenge {} accepted by {}", id, to);
                    return Ok(ChallengeOutcome::Accepted(SessionContext::for_challenger(id, from, to)));
                }
                ChallengeStatus::Declined => {
                    info!("challenge {} declined by {}", id, to);
                    return Ok(ChallengeOutcome::Declined);
                }
            }
        }
        Err(ChallengeError::SubscriptionClosed)
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Single-slot incoming feed, a deliberate design choice: only the
// FIRST pending challenge of each snapshot is surfaced, in whatever order
// the store presents, and a later snapshot silently replaces whatever the
// UI is currently showing. Concurrent challenges to the same player are not
// disambiguated; the ones not surfaced stay pending in the store and come
// back in the next snapshot once the surfaced one resolves. A snapshot whose
// first pending record is the one already surfaced is a no-op, so duplicate
// deliveries do not re-prompt the player.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct IncomingChallenges {
    subscription: Subscription,
    surfaced: Option<String>,
}

impl IncomingChallenges {
    /// Wait until a challenge should be surfaced (or re-surfaced) to the
    /// player. Returns `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<IncomingChallenge> {
        while let Some(item) = self.subscription.next().await {
            let snapshot = match item {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!("error listening to challenges: {:?}", err);
                    continue;
                }
            };
            let first = snapshot
                .iter()
                .filter_map(ChallengeRecord::from_document)
                .find(|record| record.status == ChallengeStatus::Pending);
            match first {
                Some(record) if self.surfaced.as_deref() != Some(record.id.as_str()) => {
                    self.surfaced = Some(record.id.clone());
                    return Some(IncomingChallenge {
                        id: record.id,
                        from_player: record.from_player,
                        to_player: record.to_player,
                    });
                }
                Some(_) => continue,
                None => {
                    self.surfaced = None;
                    continue;
                }
            }
        }
        None
    }
}
