use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Reply};

use crate::config::Config;
use crate::messages::{ClientMessage, ProtocolError, ServerMessage};
use crate::participant::{ConnectionId, Participant};
use crate::relay::{Attachments, Outbound, RelayState, Target};

type Connections = Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>>;

#[derive(Clone)]
pub struct Server {
    relay: Arc<Mutex<RelayState>>,
    connections: Connections,
}

impl Server {
    pub fn new(max_image_bytes: usize) -> Self {
        Server {
            relay: Arc::new(Mutex::new(RelayState::new(max_image_bytes))),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn handle_connection(&self, ws: WebSocket) {
        let connection_id = Uuid::new_v4().to_string();
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(connection_id.clone(), tx);
        }
        info!("Connection {connection_id} opened");

        let writer_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_tx.send(message).await {
                    warn!("Failed to send WebSocket message to {writer_id}: {e}");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        self.send_to(
            &connection_id,
            &ServerMessage::Connection {
                socket_id: connection_id.clone(),
            },
        )
        .await;

        while let Some(result) = ws_rx.next().await {
            match result {
                Ok(msg) if msg.is_close() => break,
                Ok(msg) => match decode_frame(&msg) {
                    Ok(Some(client_msg)) => self.dispatch(&connection_id, client_msg).await,
                    Ok(None) => {}
                    Err(e) => debug!("Ignoring frame from {connection_id}: {e}"),
                },
                Err(e) => {
                    warn!("WebSocket error on {connection_id}: {e}");
                    break;
                }
            }
        }

        self.disconnect(&connection_id).await;
        info!("Connection {connection_id} closed");
    }

    /// Applies one client event. Events are handled one at a time and their
    /// deliveries are queued before the next event starts.
    pub async fn dispatch(&self, connection_id: &str, message: ClientMessage) {
        let mut relay = self.relay.lock().await;
        let outbound = match message {
            ClientMessage::Register {
                name,
                role,
                language,
            } => relay.register(connection_id, name, role, language),
            ClientMessage::JoinRoom(room_id) => relay.join_room(connection_id, &room_id),
            ClientMessage::SendMessage {
                room_id,
                message,
                image,
                product_details,
            } => relay.send_message(
                connection_id,
                &room_id,
                message,
                Attachments {
                    image,
                    product_details,
                },
            ),
            ClientMessage::Typing => relay.typing(connection_id),
        };
        self.deliver(outbound).await;
    }

    pub async fn disconnect(&self, connection_id: &str) {
        let mut relay = self.relay.lock().await;
        {
            let mut connections = self.connections.write().await;
            connections.remove(connection_id);
        }
        let outbound = relay.disconnect(connection_id);
        self.deliver(outbound).await;
    }

    pub async fn room_users(&self, room_id: &str) -> Option<Vec<Participant>> {
        self.relay.lock().await.room_users(room_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn deliver(&self, outbound: Vec<Outbound>) {
        let connections = self.connections.read().await;
        for Outbound { target, message } in outbound {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode outbound event: {e}");
                    continue;
                }
            };

            match target {
                Target::Everyone => {
                    for sender in connections.values() {
                        let _ = sender.send(Message::text(text.clone()));
                    }
                }
                Target::Connections(ids) => {
                    for id in ids {
                        if let Some(sender) = connections.get(&id) {
                            let _ = sender.send(Message::text(text.clone()));
                        }
                    }
                }
            }
        }
    }

    async fn send_to(&self, connection_id: &str, message: &ServerMessage) {
        match message.encode() {
            Ok(text) => {
                let connections = self.connections.read().await;
                if let Some(sender) = connections.get(connection_id) {
                    let _ = sender.send(Message::text(text));
                }
            }
            Err(e) => warn!("Failed to encode event for {connection_id}: {e}"),
        }
    }
}

fn decode_frame(msg: &Message) -> Result<Option<ClientMessage>, ProtocolError> {
    if let Ok(text) = msg.to_str() {
        return ClientMessage::decode(text).map(Some);
    }
    if msg.is_binary() {
        return Err(ProtocolError::Binary);
    }
    Ok(None)
}

fn with_server(server: Server) -> impl Filter<Extract = (Server,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

/// `GET /ws`, the relay socket.
pub fn ws_route(server: Server) -> BoxedFilter<(Box<dyn Reply>,)> {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_server(server))
        .map(|ws: Ws, server: Server| {
            let reply = ws.on_upgrade(move |socket| async move {
                server.handle_connection(socket).await;
            });
            Box::new(reply) as Box<dyn Reply>
        })
        .boxed()
}

pub fn routes(server: Server, config: &Config) -> BoxedFilter<(Box<dyn Reply>,)> {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| Box::new("ok") as Box<dyn Reply>);

    let api = ws_route(server).or(health).unify().boxed();
    let api = match &config.static_dir {
        Some(dir) => api
            .or(warp::fs::dir(dir.clone()))
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed(),
        None => api,
    };

    let cors = if config.cors_origin == "*" {
        warp::cors().allow_any_origin()
    } else {
        warp::cors().allow_origin(config.cors_origin.as_str())
    }
    .allow_methods(vec!["GET", "POST"]);

    api.with(cors)
        .map(|reply| Box::new(reply) as Box<dyn Reply>)
        .boxed()
}
