use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::store::{Document, Fields};

/// Name of the challenges collection in the shared store.
pub const CHALLENGES: &str = "challenges";

// Lifecycle of a challenge record. Pending is the only non-terminal state:
// a record moves to accepted or declined exactly once and never leaves it.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<ChallengeStatus> {
        match value {
            "pending" => Some(ChallengeStatus::Pending),
            "accepted" => Some(ChallengeStatus::Accepted),
            "declined" => Some(ChallengeStatus::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A challenge as stored in the challenges collection. The id is assigned by
// the store on creation; records accumulate, they are never deleted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChallengeRecord {
    pub id: String,
    pub from_player: String,
    pub to_player: String,
    pub status: ChallengeStatus,
}

impl ChallengeRecord {
    /// Field map for a fresh pending challenge.
    pub fn fields(from_player: &str, to_player: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("fromPlayer".to_string(), json!(from_player));
        fields.insert("toPlayer".to_string(), json!(to_player));
        fields.insert("status".to_string(), json!(ChallengeStatus::Pending.as_str()));
        fields.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
        fields
    }

    pub fn status_delta(status: ChallengeStatus) -> Fields {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(status.as_str()));
        fields
    }

    /// Parse a store document; malformed documents are skipped, not errors.
    pub fn from_document(document: &Document) -> Option<ChallengeRecord> {
        let from_player = document.str_field("fromPlayer")?;
        let to_player = document.str_field("toPlayer")?;
        let status = ChallengeStatus::parse(document.str_field("status")?)?;
        Some(ChallengeRecord {
            id: document.id.clone(),
            from_player: from_player.to_string(),
            to_player: to_player.to_string(),
            status,
        })
    }
}
