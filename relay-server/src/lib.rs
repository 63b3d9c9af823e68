//! The relay server of the two player sessions. It pairs a host and a guest in a room and passes
//! the gameplay frames between them.

pub mod config;
pub mod directory;
pub mod lobby;
pub mod message_relay;
pub mod pairing;
