use serde::{Deserialize, Serialize};

pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
    pub language: String,
}

/// Structured attachment a seller can put on a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: f64,
    pub description: String,
}
