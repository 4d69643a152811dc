//! Notification channel protocol
//!
//! Server → client: [`ServerMessage`] (named event + JSON payload)
//! Client → server: [`ClientCommand`] (room membership only)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, ErrorCode};

/// Logical room a session can join
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    Supplier(String),
    Operator(String),
    Store(String),
    /// Every supplier session that joined the group
    Suppliers,
    /// Every operator session that joined the group
    Operators,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplier(id) => write!(f, "supplier:{id}"),
            Self::Operator(id) => write!(f, "operator:{id}"),
            Self::Store(id) => write!(f, "store:{id}"),
            Self::Suppliers => f.write_str("suppliers"),
            Self::Operators => f.write_str("operators"),
        }
    }
}

impl FromStr for Room {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            AppError::with_message(
                ErrorCode::NotificationRoomInvalid,
                format!("Invalid room: {raw}"),
            )
        };
        match raw {
            "suppliers" => return Ok(Self::Suppliers),
            "operators" => return Ok(Self::Operators),
            _ => {}
        }
        let (prefix, id) = raw.split_once(':').ok_or_else(invalid)?;
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(invalid());
        }
        match prefix {
            "supplier" => Ok(Self::Supplier(id.to_string())),
            "operator" => Ok(Self::Operator(id.to_string())),
            "store" => Ok(Self::Store(id.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Room {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Room {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Server → client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event: String,
    pub data: Value,
}

impl ServerMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Client → server command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    Join { room: Room },
    Leave { room: Room },
}

/// Event names pushed by the hub
pub mod events {
    pub const ORDER_CREATED: &str = "order-created";
    pub const ORDER_UPDATED: &str = "order-updated";
    pub const ORDER_COMPLETED: &str = "order-completed";
    pub const ORDER_CANCELLED: &str = "order-cancelled";
    pub const ROOM_JOINED: &str = "room-joined";
    pub const ROOM_LEFT: &str = "room-left";
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_round_trips_through_strings() {
        for raw in ["supplier:S1", "operator:42", "store:9", "suppliers", "operators"] {
            let room: Room = raw.parse().unwrap();
            assert_eq!(room.to_string(), raw);
        }
    }

    #[test]
    fn invalid_rooms_rejected() {
        for raw in ["", "supplier:", "admin:1", "everyone", "supplier:a b"] {
            let err = raw.parse::<Room>().unwrap_err();
            assert_eq!(err.code, ErrorCode::NotificationRoomInvalid);
        }
    }

    #[test]
    fn client_command_wire_format() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"join","room":"supplier:S1"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Join {
                room: Room::Supplier("S1".into())
            }
        );
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"join","room":"nope"}"#).is_err());
    }

    #[test]
    fn server_message_wire_format() {
        let msg = ServerMessage::new(events::ORDER_CANCELLED, serde_json::json!({"id": "T-1"}));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "order-cancelled");
        assert_eq!(json["data"]["id"], "T-1");
    }
}
