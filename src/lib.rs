pub mod config;
pub mod gesture;
pub mod messages;
pub mod orders;
pub mod participant;
pub mod relay;
pub mod room;
pub mod server;
pub mod tls;
