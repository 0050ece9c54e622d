//! In-memory presence directory and room bookkeeping.
//!
//! `RelayState` is transport agnostic: every mutator returns the deliveries
//! the caller has to perform, which keeps the state machine testable without
//! sockets.

use std::collections::{BTreeSet, HashMap};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use log::{debug, info, warn};

use crate::messages::{ChatMessage, ServerMessage};
use crate::participant::{ConnectionId, Participant, ProductDetails, Role};
use crate::room::Room;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Everyone,
    Connections(Vec<ConnectionId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: ServerMessage,
}

impl Outbound {
    fn everyone(message: ServerMessage) -> Self {
        Outbound {
            target: Target::Everyone,
            message,
        }
    }

    fn to(connections: Vec<ConnectionId>, message: ServerMessage) -> Self {
        Outbound {
            target: Target::Connections(connections),
            message,
        }
    }
}

/// Optional payload carried alongside the text of a chat message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    pub image: Option<String>,
    pub product_details: Option<ProductDetails>,
}

pub struct RelayState {
    participants: HashMap<ConnectionId, Participant>,
    rooms: HashMap<String, Room>,
    max_image_bytes: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl RelayState {
    pub fn new(max_image_bytes: usize) -> Self {
        RelayState {
            participants: HashMap::new(),
            rooms: HashMap::new(),
            max_image_bytes,
        }
    }

    pub fn register(
        &mut self,
        connection_id: &str,
        name: String,
        role: Role,
        language: String,
    ) -> Vec<Outbound> {
        info!("Registering {connection_id} as {name} ({role:?})");
        self.participants.insert(
            connection_id.to_string(),
            Participant {
                id: connection_id.to_string(),
                name,
                role,
                language,
            },
        );

        vec![Outbound::everyone(ServerMessage::UserList(self.participants()))]
    }

    pub fn join_room(&mut self, connection_id: &str, room_id: &str) -> Vec<Outbound> {
        if !self.participants.contains_key(connection_id) {
            debug!("Ignoring joinRoom from unregistered connection {connection_id}");
            return Vec::new();
        }

        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_default();
        room.add_member(connection_id);
        info!("{connection_id} joined room {room_id} ({} members)", room.len());

        let members = member_ids(room);
        let users = self.room_users(room_id).unwrap_or_default();
        vec![Outbound::to(
            members,
            ServerMessage::RoomUsers {
                room: room_id.to_string(),
                users,
            },
        )]
    }

    pub fn send_message(
        &mut self,
        connection_id: &str,
        room_id: &str,
        text: String,
        attachments: Attachments,
    ) -> Vec<Outbound> {
        let Some(sender) = self.participants.get(connection_id) else {
            debug!("Dropping message from unregistered connection {connection_id}");
            return Vec::new();
        };
        let Some(room) = self.rooms.get(room_id) else {
            debug!("Dropping message to unknown room {room_id}");
            return Vec::new();
        };

        let image = attachments
            .image
            .and_then(|image| self.accept_image(connection_id, image));

        let message = ChatMessage {
            user: sender.clone(),
            message: text,
            timestamp: Utc::now(),
            image,
            product_details: attachments.product_details,
        };

        vec![Outbound::to(member_ids(room), ServerMessage::Message(message))]
    }

    /// Relays a typing notice to everyone sharing a room with the sender.
    /// A peer sharing several rooms is notified once.
    pub fn typing(&mut self, connection_id: &str) -> Vec<Outbound> {
        let Some(sender) = self.participants.get(connection_id) else {
            return Vec::new();
        };

        let others: BTreeSet<&ConnectionId> = self
            .rooms
            .values()
            .filter(|room| room.contains(connection_id))
            .flat_map(|room| room.members())
            .filter(|id| id.as_str() != connection_id)
            .collect();
        if others.is_empty() {
            return Vec::new();
        }

        vec![Outbound::to(
            others.into_iter().cloned().collect(),
            ServerMessage::Typing(sender.clone()),
        )]
    }

    pub fn disconnect(&mut self, connection_id: &str) -> Vec<Outbound> {
        self.participants.remove(connection_id);

        for room in self.rooms.values_mut() {
            room.remove_member(connection_id);
        }
        self.rooms.retain(|room_id, room| {
            if room.is_empty() {
                info!("Room {room_id} is empty, removing it");
            }
            !room.is_empty()
        });

        vec![Outbound::everyone(ServerMessage::UserList(self.participants()))]
    }

    pub fn participants(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self.participants.values().cloned().collect();
        participants.sort_by(|a, b| a.id.cmp(&b.id));
        participants
    }

    pub fn participant(&self, connection_id: &str) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    /// Members of a room resolved against the directory, `None` when the room
    /// does not exist.
    pub fn room_users(&self, room_id: &str) -> Option<Vec<Participant>> {
        let room = self.rooms.get(room_id)?;
        let mut users: Vec<Participant> = room
            .members()
            .filter_map(|id| self.participants.get(id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Some(users)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn accept_image(&self, connection_id: &str, image: String) -> Option<String> {
        let payload = match image.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => image.as_str(),
        };

        match BASE64.decode(payload) {
            Ok(bytes) if bytes.len() <= self.max_image_bytes => Some(image),
            Ok(bytes) => {
                warn!(
                    "Stripping {} byte image from {connection_id}, limit is {}",
                    bytes.len(),
                    self.max_image_bytes
                );
                None
            }
            Err(e) => {
                warn!("Stripping undecodable image from {connection_id}: {e}");
                None
            }
        }
    }
}

fn member_ids(room: &Room) -> Vec<ConnectionId> {
    let mut ids: Vec<ConnectionId> = room.members().cloned().collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(relay: &mut RelayState, id: &str, name: &str) {
        relay.register(id, name.to_string(), Role::Buyer, "en".to_string());
    }

    fn targets(outbound: &Outbound) -> Vec<ConnectionId> {
        match &outbound.target {
            Target::Connections(ids) => ids.clone(),
            Target::Everyone => panic!("expected a room scoped delivery"),
        }
    }

    #[test]
    fn register_broadcasts_full_user_list() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        let out = relay.register("b", "Ben".to_string(), Role::Seller, "fr".to_string());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, Target::Everyone);
        match &out[0].message {
            ServerMessage::UserList(users) => {
                let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
                assert_eq!(names, vec!["Ana", "Ben"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn register_overwrites_same_connection() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "a", "Anabel");
        assert_eq!(relay.participants().len(), 1);
        assert_eq!(relay.participant("a").unwrap().name, "Anabel");
    }

    #[test]
    fn duplicate_names_are_distinct_participants() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Sam");
        register(&mut relay, "b", "Sam");
        assert_eq!(relay.participants().len(), 2);
    }

    #[test]
    fn room_users_contains_every_joined_participant() {
        let mut relay = RelayState::default();
        let ids = ["c1", "c2", "c3", "c4"];
        let mut last = Vec::new();
        for id in ids {
            register(&mut relay, id, id);
            last = relay.join_room(id, "general");
        }

        assert_eq!(last.len(), 1);
        assert_eq!(targets(&last[0]), ids.to_vec());
        match &last[0].message {
            ServerMessage::RoomUsers { room, users } => {
                assert_eq!(room, "general");
                assert_eq!(users.len(), ids.len());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn joining_twice_keeps_one_membership() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        relay.join_room("a", "general");
        let out = relay.join_room("a", "general");
        assert_eq!(targets(&out[0]), vec!["a".to_string()]);
        assert_eq!(relay.room_users("general").unwrap().len(), 1);
    }

    #[test]
    fn join_before_register_is_ignored() {
        let mut relay = RelayState::default();
        assert!(relay.join_room("ghost", "general").is_empty());
        assert!(relay.room_users("general").is_none());
        assert_eq!(relay.room_count(), 0);
    }

    #[test]
    fn disconnect_removes_member_and_empty_rooms() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "b", "Ben");
        relay.join_room("a", "general");
        relay.join_room("b", "general");
        relay.join_room("a", "solo");

        let out = relay.disconnect("a");
        assert_eq!(out[0].target, Target::Everyone);
        match &out[0].message {
            ServerMessage::UserList(users) => assert_eq!(users.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        let general = relay.room_users("general").unwrap();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].id, "b");
        assert!(relay.room_users("solo").is_none());
        assert_eq!(relay.room_count(), 1);

        relay.disconnect("b");
        assert!(relay.room_users("general").is_none());
        assert_eq!(relay.room_count(), 0);
    }

    #[test]
    fn message_from_unregistered_connection_is_dropped() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        relay.join_room("a", "general");

        let out = relay.send_message("ghost", "general", "hi".to_string(), Attachments::default());
        assert!(out.is_empty());
    }

    #[test]
    fn message_reaches_every_member_including_sender() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "b", "Ben");
        register(&mut relay, "c", "Cy");
        relay.join_room("a", "general");
        relay.join_room("b", "general");
        relay.join_room("c", "elsewhere");

        let out = relay.send_message("a", "general", "hi".to_string(), Attachments::default());
        assert_eq!(out.len(), 1);
        assert_eq!(targets(&out[0]), vec!["a".to_string(), "b".to_string()]);
        match &out[0].message {
            ServerMessage::Message(message) => {
                assert_eq!(message.user.id, "a");
                assert_eq!(message.message, "hi");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn message_to_unknown_room_is_dropped() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        assert!(relay
            .send_message("a", "nowhere", "hi".to_string(), Attachments::default())
            .is_empty());
    }

    #[test]
    fn oversized_or_invalid_images_are_stripped() {
        let mut relay = RelayState::new(4);
        register(&mut relay, "a", "Ana");
        relay.join_room("a", "general");

        let small = format!("data:image/png;base64,{}", BASE64.encode([1u8, 2, 3]));
        let large = BASE64.encode([0u8; 16]);
        let cases = [
            (small.clone(), Some(small)),
            (large, None),
            ("%%%not-base64".to_string(), None),
        ];

        for (image, expected) in cases {
            let out = relay.send_message(
                "a",
                "general",
                "pic".to_string(),
                Attachments {
                    image: Some(image),
                    product_details: None,
                },
            );
            match &out[0].message {
                ServerMessage::Message(message) => {
                    assert_eq!(message.image, expected);
                    assert_eq!(message.message, "pic");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn typing_reaches_other_room_members_only() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "b", "Ben");
        relay.join_room("a", "general");
        relay.join_room("b", "general");

        let out = relay.typing("a");
        assert_eq!(out.len(), 1);
        assert_eq!(targets(&out[0]), vec!["b".to_string()]);
        assert!(relay.typing("ghost").is_empty());
    }

    #[test]
    fn typing_is_sent_once_to_peers_sharing_several_rooms() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "b", "Ben");
        register(&mut relay, "c", "Cy");
        for room in ["general", "deals"] {
            relay.join_room("a", room);
            relay.join_room("b", room);
        }
        relay.join_room("c", "deals");

        let out = relay.typing("a");
        assert_eq!(out.len(), 1);
        assert_eq!(targets(&out[0]), vec!["b".to_string(), "c".to_string()]);
        match &out[0].message {
            ServerMessage::Typing(participant) => assert_eq!(participant.name, "Ana"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typing_alone_in_a_room_sends_nothing() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        relay.join_room("a", "general");
        assert!(relay.typing("a").is_empty());
    }

    #[test]
    fn product_details_reach_every_member() {
        let mut relay = RelayState::default();
        register(&mut relay, "a", "Ana");
        register(&mut relay, "b", "Ben");
        relay.join_room("a", "general");
        relay.join_room("b", "general");

        let details = ProductDetails {
            kind: "vegetables".to_string(),
            quantity: 2.5,
            description: "Organic carrots".to_string(),
        };
        let out = relay.send_message(
            "a",
            "general",
            "fresh today".to_string(),
            Attachments {
                image: None,
                product_details: Some(details.clone()),
            },
        );

        assert_eq!(targets(&out[0]), vec!["a".to_string(), "b".to_string()]);
        match &out[0].message {
            ServerMessage::Message(message) => {
                assert_eq!(message.product_details, Some(details));
                assert!(message.image.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
