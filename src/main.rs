use std::sync::Arc;

use log::{error, info};
use simplelog::*;

use broadside::errors::ChallengeError;
use broadside::game::{Coord, GameSession, Phase, SessionContext, SessionSync};
use broadside::lobby::{ChallengeCoordinator, ChallengeOutcome, PresenceTracker, Roster};
use broadside::models::player::Presence;
use broadside::store::{MemoryStore, Store};

// A legal layout for the whole catalog; both scripted players use it.
const LAYOUT: [((usize, usize), (usize, usize)); 6] = [
    ((0, 0), (0, 3)),
    ((2, 0), (2, 2)),
    ((4, 0), (4, 1)),
    ((6, 0), (6, 1)),
    ((8, 0), (8, 0)),
    ((0, 9), (0, 9)),
];

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Scripted two-client demo match over the in-memory store: both clients come
// online, Alice finds Bob in the roster and challenges him, Bob accepts, and
// the match runs through the store-mediated ready handshake and move
// exchange until Alice sinks the fleet.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up tracing facility
    let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
    info!("Starting..");

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    let bob_store = store.clone();
    let bob = tokio::spawn(async move { run_bob(bob_store).await });
    run_alice(store).await?;
    bob.await??;

    info!("Done");
    Ok(())
}

// Alice: go online, wait for Bob in the roster, challenge him and play.
async fn run_alice(store: Arc<dyn Store>) -> anyhow::Result<()> {
    let presence = PresenceTracker::new(store.clone(), "alice");
    presence.online().await?;

    let mut roster = Roster::subscribe(store.as_ref(), "alice")?;
    while roster.changed().await {
        if roster
            .entries()
            .iter()
            .any(|entry| entry.name == "bob" && entry.status == Presence::Online)
        {
            break;
        }
    }
    info!("lobby roster for alice: {:?}", roster.entries());

    let coordinator = ChallengeCoordinator::new(store.clone());
    let id = coordinator.send_challenge("alice", "bob").await?;
    let context = match coordinator.await_outcome(&id, "alice", "bob").await? {
        ChallengeOutcome::Accepted(context) => context,
        ChallengeOutcome::Declined => {
            error!("bob declined the challenge");
            return Ok(());
        }
    };

    play(store.clone(), context).await?;
    presence.announce(Presence::Offline).await;
    Ok(())
}

// Bob: go online, accept the first incoming challenge and play.
async fn run_bob(store: Arc<dyn Store>) -> anyhow::Result<()> {
    let presence = PresenceTracker::new(store.clone(), "bob");
    presence.online().await?;

    let coordinator = ChallengeCoordinator::new(store.clone());
    let mut incoming = coordinator.incoming("bob")?;
    let challenge = incoming
        .next()
        .await
        .ok_or_else(|| ChallengeError::SubscriptionClosed)?;
    info!("{} has challenged bob", challenge.from_player);
    let context = coordinator
        .accept_challenge(&challenge.id, &challenge.from_player, &challenge.to_player)
        .await?;

    play(store.clone(), context).await?;
    presence.announce(Presence::Offline).await;
    Ok(())
}

// Place the fleet, run the ready handshake and exchange moves until the
// match is decided. The challenger aims at real ship cells (the scripted
// layouts are identical); the other side wastes its shots on open water.
async fn play(store: Arc<dyn Store>, context: SessionContext) -> anyhow::Result<()> {
    let mut session = GameSession::new(context.clone());
    for (start, end) in LAYOUT {
        session.select_cell(Coord::new(start.0, start.1))?;
        session.select_cell(Coord::new(end.0, end.1))?;
    }

    let sync = SessionSync::new(store, context.clone());
    sync.publish_ready().await?;
    sync.await_opponent_ready().await?;
    session.ready()?;

    let mut feed = sync.opponent_moves()?;
    let mut seq: u64 = 0;
    let mut targets = session.own_board().ship_cells().into_iter();
    let mut wasted = (0..10)
        .map(|col| Coord::new(9, col))
        .chain((3..10).map(|col| Coord::new(7, col)));

    loop {
        if let Phase::Won(winner) = session.phase() {
            info!("match over for {}: {:?}", context.player, winner);
            return Ok(());
        }
        if session.my_turn() {
            let coord = if context.moves_first() { targets.next() } else { wasted.next() }
                .expect("scripted shots exhausted");
            session.fire(coord)?;
            let move_id = sync.publish_move(seq, coord).await?;
            seq += 1;
            let result = sync.await_move_result(&move_id).await?;
            session.record_shot_result(coord, result)?;
        } else {
            let Some(incoming) = feed.next().await else {
                error!("move feed for {} ended early", context.player);
                return Ok(());
            };
            let result = session.opponent_fire(incoming.coord)?;
            sync.resolve_move(&incoming.id, result).await?;
        }
    }
}
