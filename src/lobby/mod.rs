pub mod challenge;
pub mod presence;
pub mod roster;

pub use challenge::{ChallengeCoordinator, ChallengeOutcome, IncomingChallenge, IncomingChallenges};
pub use presence::PresenceTracker;
pub use roster::{Roster, RosterEntry};
