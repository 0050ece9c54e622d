use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::participant::{Participant, ProductDetails, Role};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Binary frames are not supported")]
    Binary,
}

/// Events sent by browser clients, framed as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Register {
        name: String,
        #[serde(rename = "type")]
        role: Role,
        #[serde(default)]
        language: String,
    },
    JoinRoom(String),
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        product_details: Option<ProductDetails>,
    },
    Typing,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user: Participant,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_details: Option<ProductDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connection { socket_id: String },
    UserList(Vec<Participant>),
    RoomUsers {
        room: String,
        users: Vec<Participant>,
    },
    Message(ChatMessage),
    Typing(Participant),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
