use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use serde_json::json;

use crate::errors::StoreError;
use crate::game::board::{Coord, ShotOutcome};
use crate::game::session::{MoveOutcome, SessionContext};
use crate::store::{Document, Fields, Filter, Snapshot, Store, Subscription};

/// Collection of per-player ready markers, one document per side.
pub const READY: &str = "ready";

/// Collection of move records, one document per shot.
pub const MOVES: &str = "moves";

/// An opponent move pulled off the store, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub id: String,
    pub seq: u64,
    pub coord: Coord,
}

impl MoveRecord {
    fn from_document(document: &Document) -> Option<MoveRecord> {
        let seq = document.u64_field("seq")?;
        let row = document.u64_field("row")? as usize;
        let col = document.u64_field("col")? as usize;
        Some(MoveRecord { id: document.id.clone(), seq, coord: Coord::new(row, col) })
    }
}

fn result_delta(result: MoveOutcome) -> Fields {
    let mut fields = Fields::new();
    let outcome = match result.outcome {
        ShotOutcome::Hit => "hit",
        ShotOutcome::Miss => "miss",
    };
    fields.insert("result".to_string(), json!(outcome));
    fields.insert("fleetSunk".to_string(), json!(result.fleet_sunk));
    fields
}

fn parse_result(document: &Document) -> Option<MoveOutcome> {
    let outcome = match document.str_field("result")? {
        "hit" => ShotOutcome::Hit,
        "miss" => ShotOutcome::Miss,
        _ => return None,
    };
    let fleet_sunk = document.bool_field("fleetSunk").unwrap_or(false);
    Some(MoveOutcome { outcome, fleet_sunk })
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Store-mediated session state: readiness and moves are records keyed by the
// challenge id, symmetric to the challenge protocol itself. A move document
// is created by the attacker with result "pending" and later completed by
// the defender with the resolution, so every write still touches exactly one
// document. Sequence numbers make duplicate or re-ordered snapshot
// deliveries harmless: each side numbers its own moves from zero and the
// consumer only ever acts on the next expected number.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct SessionSync {
    store: Arc<dyn Store>,
    context: SessionContext,
}

impl SessionSync {
    pub fn new(store: Arc<dyn Store>, context: SessionContext) -> Self {
        SessionSync { store, context }
    }

    /// Mark the local player ready for this session.
    pub async fn publish_ready(&self) -> Result<(), StoreError> {
        info!("{} publishes ready for session {}", self.context.player, self.context.challenge_id);
        let mut fields = Fields::new();
        fields.insert("challengeId".to_string(), json!(self.context.challenge_id));
        fields.insert("player".to_string(), json!(self.context.player));
        fields.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
        self.store.create(READY, fields).await.map(|_| ())
    }

    /// Wait until the opponent's ready marker shows up.
    pub async fn await_opponent_ready(&self) -> Result<(), StoreError> {
        let mut subscription = self.store.subscribe(
            READY,
            &[
                Filter::eq("challengeId", self.context.challenge_id.as_str()),
                Filter::eq("player", self.context.opponent.as_str()),
            ],
        )?;
        while let Some(item) = subscription.next().await {
            match item {
                Ok(snapshot) if !snapshot.is_empty() => {
                    debug!("{} sees {} ready", self.context.player, self.context.opponent);
                    return Ok(());
                }
                Ok(_) => continue,
                Err(err) => error!("error listening for ready: {:?}", err),
            }
        }
        Err(StoreError::Read("ready subscription closed".to_string()))
    }

    /// Publish the local player's next shot and return the move document id
    /// for [`await_move_result`](Self::await_move_result).
    pub async fn publish_move(&self, seq: u64, coord: Coord) -> Result<String, StoreError> {
        let mut fields = Fields::new();
        fields.insert("challengeId".to_string(), json!(self.context.challenge_id));
        fields.insert("player".to_string(), json!(self.context.player));
        fields.insert("seq".to_string(), json!(seq));
        fields.insert("row".to_string(), json!(coord.row));
        fields.insert("col".to_string(), json!(coord.col));
        fields.insert("result".to_string(), json!("pending"));
        let id = self.store.create(MOVES, fields).await?;
        debug!("{} published move {} (seq {})", self.context.player, id, seq);
        Ok(id)
    }

    /// Complete a move document with the defender's resolution.
    pub async fn resolve_move(&self, move_id: &str, result: MoveOutcome) -> Result<(), StoreError> {
        self.store.update(MOVES, move_id, result_delta(result)).await
    }

    /// Watch an outgoing move until the opponent resolves it.
    pub async fn await_move_result(&self, move_id: &str) -> Result<MoveOutcome, StoreError> {
        let mut subscription = self.store.watch(MOVES, move_id)?;
        while let Some(item) = subscription.next().await {
            match item {
                Ok(snapshot) => {
                    if let Some(result) = snapshot.first().and_then(parse_result) {
                        return Ok(result);
                    }
                }
                Err(err) => error!("error listening to move {}: {:?}", move_id, err),
            }
        }
        Err(StoreError::Read("move subscription closed".to_string()))
    }

    /// Sequence-ordered feed of the opponent's moves for this session.
    pub fn opponent_moves(&self) -> Result<OpponentMoves, StoreError> {
        let subscription = self.store.subscribe(
            MOVES,
            &[
                Filter::eq("challengeId", self.context.challenge_id.as_str()),
                Filter::eq("player", self.context.opponent.as_str()),
            ],
        )?;
        Ok(OpponentMoves { subscription, next_seq: 0, buffered: Snapshot::new() })
    }
}

/// Delivers opponent moves strictly by sequence number. Snapshots are full
/// sets, so a duplicate delivery or one containing several moves at once is
/// fine: anything below the expected number is already consumed, anything
/// above it waits its turn.
pub struct OpponentMoves {
    subscription: Subscription,
    next_seq: u64,
    buffered: Snapshot,
}

impl OpponentMoves {
    pub async fn next(&mut self) -> Option<MoveRecord> {
        loop {
            let found = self
                .buffered
                .iter()
                .filter_map(MoveRecord::from_document)
                .find(|record| record.seq == self.next_seq);
            if let Some(record) = found {
                self.next_seq += 1;
                return Some(record);
            }
            match self.subscription.next().await {
                Some(Ok(snapshot)) => self.buffered = snapshot,
                Some(Err(err)) => error!("error listening for moves: {:?}", err),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::store::MemoryStore;

    fn pair(store: &Arc<MemoryStore>) -> (SessionSync, SessionSync) {
        let alice = SessionSync::new(
            store.clone(),
            SessionContext::for_challenger("c1", "alice", "bob"),
        );
        let bob = SessionSync::new(
            store.clone(),
            SessionContext::for_acceptor("c1", "alice", "bob"),
        );
        (alice, bob)
    }

    #[tokio::test]
    async fn ready_handshake_completes_in_either_order() {
        let store = Arc::new(MemoryStore::new());
        let (alice, bob) = pair(&store);

        // Bob publishes before Alice starts waiting; the initial snapshot
        // already carries his marker.
        bob.publish_ready().await.unwrap();
        alice.await_opponent_ready().await.unwrap();

        // Alice publishes while Bob is already waiting.
        let waiter = tokio::spawn(async move { bob.await_opponent_ready().await });
        alice.publish_ready().await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn ready_markers_are_scoped_to_the_session() {
        let store = Arc::new(MemoryStore::new());
        let (alice, _bob) = pair(&store);

        // A ready marker from another session must not complete the wait.
        let other = SessionSync::new(
            store.clone(),
            SessionContext::for_acceptor("c2", "alice", "bob"),
        );
        other.publish_ready().await.unwrap();

        let quiet = timeout(Duration::from_millis(50), alice.await_opponent_ready()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test]
    async fn moves_round_trip_with_defender_resolution() {
        let store = Arc::new(MemoryStore::new());
        let (alice, bob) = pair(&store);

        let mut bob_feed = bob.opponent_moves().unwrap();
        let move_id = alice.publish_move(0, Coord::new(3, 4)).await.unwrap();

        let incoming = bob_feed.next().await.unwrap();
        assert_eq!(incoming.id, move_id);
        assert_eq!(incoming.coord, Coord::new(3, 4));

        let result = MoveOutcome { outcome: ShotOutcome::Hit, fleet_sunk: false };
        bob.resolve_move(&incoming.id, result).await.unwrap();
        assert_eq!(alice.await_move_result(&move_id).await.unwrap(), result);
    }

    #[tokio::test]
    async fn duplicate_snapshots_do_not_redeliver_moves() {
        let store = Arc::new(MemoryStore::new());
        let (alice, bob) = pair(&store);

        let mut bob_feed = bob.opponent_moves().unwrap();
        let move_id = alice.publish_move(0, Coord::new(1, 1)).await.unwrap();
        assert_eq!(bob_feed.next().await.unwrap().seq, 0);

        // Resolving the move re-delivers a snapshot containing seq 0; the
        // feed must not hand it out again.
        bob.resolve_move(&move_id, MoveOutcome { outcome: ShotOutcome::Miss, fleet_sunk: false })
            .await
            .unwrap();
        let quiet = timeout(Duration::from_millis(50), bob_feed.next()).await;
        assert!(quiet.is_err());

        // The next sequence number flows through as usual.
        alice.publish_move(1, Coord::new(2, 2)).await.unwrap();
        assert_eq!(bob_feed.next().await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn several_moves_in_one_snapshot_come_out_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (alice, bob) = pair(&store);

        // Both moves exist before the feed attaches; the initial snapshot
        // carries them together.
        alice.publish_move(0, Coord::new(0, 0)).await.unwrap();
        alice.publish_move(1, Coord::new(0, 1)).await.unwrap();

        let mut bob_feed = bob.opponent_moves().unwrap();
        assert_eq!(bob_feed.next().await.unwrap().seq, 0);
        assert_eq!(bob_feed.next().await.unwrap().seq, 1);
    }
}
