use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::store::{Document, Fields};

/// Name of the players collection in the shared store.
pub const PLAYERS: &str = "players";

// Whether a player's client currently considers itself active. Stored as
// the lowercase wire strings.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }

    pub fn parse(value: &str) -> Option<Presence> {
        match value {
            "online" => Some(Presence::Online),
            "offline" => Some(Presence::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A player as stored in the players collection. The display name is the
// primary key; records are created on first login and never deleted, so a
// stale offline record sticks around for every name ever used.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub status: Presence,
}

impl PlayerRecord {
    /// Field map for a fresh record on first login.
    pub fn fields(name: &str, status: Presence) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("status".to_string(), json!(status.as_str()));
        fields.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
        fields
    }

    pub fn status_delta(status: Presence) -> Fields {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), json!(status.as_str()));
        fields
    }

    /// Parse a store document; malformed documents are skipped, not errors.
    pub fn from_document(document: &Document) -> Option<PlayerRecord> {
        let name = document.str_field("name")?;
        let status = Presence::parse(document.str_field("status")?)?;
        Some(PlayerRecord { name: name.to_string(), status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_round_trips_through_wire_strings() {
        assert_eq!(Presence::parse("online"), Some(Presence::Online));
        assert_eq!(Presence::parse("offline"), Some(Presence::Offline));
        assert_eq!(Presence::parse("away"), None);
        assert_eq!(Presence::Online.as_str(), "online");
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let document = Document {
            id: "abc".to_string(),
            fields: PlayerRecord::fields("alice", Presence::Online),
        };
        let record = PlayerRecord::from_document(&document).unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(record.status, Presence::Online);

        let mut broken = document.clone();
        broken.fields.remove("status");
        assert!(PlayerRecord::from_document(&broken).is_none());
    }
}
