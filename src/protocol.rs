// Wire messages on the map event channel.
//
// Every frame is a JSON object `{"event": "<name>", "data": {...}}` where
// `data` always carries a non-empty `mapId`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::editor::TerritoryExport;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame has an empty mapId")]
    EmptyMapId,
}

/// Messages a client sends to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinMap {
        #[serde(rename = "mapId")]
        map_id: String,
    },
    LeaveMap {
        #[serde(rename = "mapId")]
        map_id: String,
    },
}

impl ClientMessage {
    pub fn join(map_id: &str) -> Self {
        ClientMessage::JoinMap {
            map_id: map_id.to_string(),
        }
    }

    pub fn leave(map_id: &str) -> Self {
        ClientMessage::LeaveMap {
            map_id: map_id.to_string(),
        }
    }

    pub fn map_id(&self) -> &str {
        match self {
            ClientMessage::JoinMap { map_id } | ClientMessage::LeaveMap { map_id } => map_id,
        }
    }

    /// Decode and validate a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMessage = serde_json::from_str(text)?;
        if msg.map_id().trim().is_empty() {
            return Err(ProtocolError::EmptyMapId);
        }
        Ok(msg)
    }

    pub fn to_json(&self) -> String {
        // Plain string fields only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Events the hub pushes to clients joined to a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The full territory set of a map was replaced.
    TerritoryUpdate {
        #[serde(rename = "mapId")]
        map_id: String,
        territories: Vec<TerritoryExport>,
    },
    /// Map metadata changed.
    MapUpdate {
        #[serde(rename = "mapId")]
        map_id: String,
        name: String,
        #[serde(rename = "imageUrl")]
        image_url: Option<String>,
    },
}

impl ServerEvent {
    pub fn map_id(&self) -> &str {
        match self {
            ServerEvent::TerritoryUpdate { map_id, .. } | ServerEvent::MapUpdate { map_id, .. } => {
                map_id
            }
        }
    }

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::TerritoryUpdate { .. } => "territory-update",
            ServerEvent::MapUpdate { .. } => "map-update",
        }
    }

    /// Decode and validate a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let event: ServerEvent = serde_json::from_str(text)?;
        if event.map_id().trim().is_empty() {
            return Err(ProtocolError::EmptyMapId);
        }
        Ok(event)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{Color, Point};

    #[test]
    fn test_client_message_wire_format() {
        let json = ClientMessage::join("map-1").to_json();
        assert_eq!(json, r#"{"event":"join-map","data":{"mapId":"map-1"}}"#);
        let json = ClientMessage::leave("map-1").to_json();
        assert_eq!(json, r#"{"event":"leave-map","data":{"mapId":"map-1"}}"#);
    }

    #[test]
    fn test_client_message_parse() {
        let msg = ClientMessage::parse(r#"{"event":"join-map","data":{"mapId":"m"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::join("m"));
    }

    #[test]
    fn test_client_message_rejects_bad_frames() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"event":"explode","data":{"mapId":"m"}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"event":"join-map","data":{}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"event":"join-map","data":{"mapId":"  "}}"#),
            Err(ProtocolError::EmptyMapId)
        ));
    }

    #[test]
    fn test_territory_update_payload() {
        let event = ServerEvent::TerritoryUpdate {
            map_id: "map-1".into(),
            territories: vec![TerritoryExport {
                name: "Base".into(),
                points: vec![
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(0.0, 1.0),
                ],
                color: Color::default(),
            }],
        };
        let json = event.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "territory-update");
        assert_eq!(value["data"]["mapId"], "map-1");
        assert_eq!(value["data"]["territories"][0]["color"], "#3B82F6");

        let back = ServerEvent::parse(&json).unwrap();
        assert_eq!(back.map_id(), "map-1");
        assert_eq!(back.name(), "territory-update");
    }

    #[test]
    fn test_map_update_parse() {
        let json = r#"{"event":"map-update","data":{"mapId":"m2","name":"Island","imageUrl":null}}"#;
        let event = ServerEvent::parse(json).unwrap();
        assert_eq!(
            event,
            ServerEvent::MapUpdate {
                map_id: "m2".into(),
                name: "Island".into(),
                image_url: None
            }
        );
    }

    #[test]
    fn test_server_event_requires_map_id() {
        let json = r#"{"event":"map-update","data":{"name":"Island"}}"#;
        assert!(ServerEvent::parse(json).is_err());
        let json = r#"{"event":"map-update","data":{"mapId":"","name":"Island"}}"#;
        assert!(matches!(ServerEvent::parse(json), Err(ProtocolError::EmptyMapId)));
    }
}
